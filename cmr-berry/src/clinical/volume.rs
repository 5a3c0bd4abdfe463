//! 体积积分.
//!
//! 对某个相位, 逐深度计算轮廓的物理面积, 再乘以有效切片厚度求和:
//!
//! 1. base (第一个面积非 0 的深度) 和 apex (最后一个) 的有效厚度为
//!   `(slice_thickness + spacing) / 2`, 一个深度同时是 base 和 apex 时累加两次;
//! 2. 其它深度的有效厚度为 `spacing`;
//! 3. mapping 序列额外补偿缺失切片: 相邻深度位置差为最小间距的 `n` 倍时,
//!   中间的 `n - 1` 个虚拟切片各贡献 `(a_d + a_{d+1}) / 2 * spacing`.

use log::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::MM3_PER_ML;
use crate::sorting::{DepthTimeIndex, Protocol};
use crate::{AnnotationProvider, ImageProvider, SpatialAttr};

/// 切片堆叠的物理参数, 以毫米为单位.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackGeometry {
    /// 切片厚度.
    pub thickness: f64,

    /// 名义切片间距.
    pub spacing: f64,

    /// 相邻深度切片位置之差的最小值. 少于 2 个深度时为 `None`.
    pub min_gap: Option<f64>,
}

impl StackGeometry {
    /// 从深度 0 相位 0 的图像和各深度切片位置推导.
    ///
    /// - 间距: 优先使用图像的切片间距属性, 缺失时退化为最小位置差;
    ///   mapping 序列总是优先使用最小位置差, 缺失切片由插值补偿.
    /// - 厚度: 缺失时退化为间距.
    /// - 两者都无法确定时为 0, 此时所有体积为 0.
    pub fn derive(index: &DepthTimeIndex, images: &impl ImageProvider) -> Self {
        let min_gap = index
            .depth_locations()
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .filter(|g| g.is_finite() && *g > 0.0)
            .min_by(f64::total_cmp);

        let reference = index.image_id(0, 0).and_then(|id| images.image(id));
        let spacing_attr = reference.and_then(|img| img.slice_spacing());
        let thickness_attr = reference.and_then(|img| img.slice_thickness());

        let spacing = match index.protocol() {
            Protocol::ShortAxisMapping => min_gap.or(spacing_attr),
            _ => spacing_attr.or_else(|| {
                debug!("缺少切片间距属性, 使用最小切片位置差 {min_gap:?}");
                min_gap
            }),
        };
        let thickness = thickness_attr.or(spacing);

        let (thickness, spacing) = match (thickness, spacing) {
            (Some(t), Some(s)) => (t, s),
            (Some(t), None) => (t, t),
            _ => {
                warn!("无法确定切片厚度和间距, 体积按 0 计算");
                (0.0, 0.0)
            }
        };
        Self {
            thickness,
            spacing,
            min_gap,
        }
    }

    /// base/apex 切片的有效厚度.
    #[inline]
    pub fn boundary_thickness(&self) -> f64 {
        (self.thickness + self.spacing) / 2.0
    }
}

/// 基于深度-时间索引, 图像和标注计算结构体积.
pub struct VolumeIntegrator<'a, I, A> {
    index: &'a DepthTimeIndex,
    images: &'a I,
    annotations: &'a A,
    stack: StackGeometry,
    interpolate_missing: bool,
}

impl<'a, I, A> VolumeIntegrator<'a, I, A>
where
    I: ImageProvider,
    A: AnnotationProvider,
{
    /// 创建积分器. mapping 序列自动打开缺失切片补偿.
    pub fn new(index: &'a DepthTimeIndex, images: &'a I, annotations: &'a A) -> Self {
        let stack = StackGeometry::derive(index, images);
        Self {
            index,
            images,
            annotations,
            stack,
            interpolate_missing: index.protocol() == Protocol::ShortAxisMapping,
        }
    }

    /// 覆盖推导出的堆叠参数.
    #[inline]
    pub fn with_stack_geometry(mut self, stack: StackGeometry) -> Self {
        self.stack = stack;
        self
    }

    /// 打开或关闭缺失切片补偿.
    #[inline]
    pub fn with_missing_slice_interpolation(mut self, on: bool) -> Self {
        self.interpolate_missing = on;
        self
    }

    /// 深度-时间索引.
    #[inline]
    pub fn index(&self) -> &DepthTimeIndex {
        self.index
    }

    /// 堆叠参数.
    #[inline]
    pub fn stack_geometry(&self) -> &StackGeometry {
        &self.stack
    }

    /// 结构 `structure` 在 `(depth, phase)` 上的面积, 以平方毫米为单位.
    ///
    /// 没有图像, 没有轮廓或缺少像素分辨率时为 0.
    pub fn area_mm2(&self, structure: &str, depth: usize, phase: usize) -> f64 {
        let Some(id) = self.index.image_id(depth, phase) else {
            return 0.0;
        };
        let area = self.annotations.annotation_or_empty(id).area(structure);
        if area <= 0.0 {
            return 0.0;
        }
        match self.images.image(id).and_then(|img| img.pixel_area()) {
            Some(px) => area * px,
            None => {
                warn!("图像 `{id}` 缺少像素分辨率, 其 `{structure}` 面积按 0 计算");
                0.0
            }
        }
    }

    /// 相位 `phase` 上每个深度的面积, 以平方毫米为单位.
    pub fn areas_mm2(&self, structure: &str, phase: usize) -> Vec<f64> {
        (0..self.index.nr_slices())
            .map(|d| self.area_mm2(structure, d, phase))
            .collect()
    }

    /// 结构 `structure` 在相位 `phase` 上的体积, 以毫升为单位.
    ///
    /// 结果从不为负; 所有深度都没有轮廓时恰好为 0.
    pub fn volume(&self, structure: &str, phase: usize) -> f64 {
        let areas = self.areas_mm2(structure, phase);
        let Some(base) = areas.iter().position(|&a| a > 0.0) else {
            return 0.0;
        };
        let apex = areas.iter().rposition(|&a| a > 0.0).unwrap_or(base);

        let boundary = self.stack.boundary_thickness();
        let mut mm3: f64 = areas
            .iter()
            .enumerate()
            .map(|(d, &a)| {
                let weight = match (d == base, d == apex) {
                    (true, true) => 2.0 * boundary,
                    (true, false) | (false, true) => boundary,
                    (false, false) => self.stack.spacing,
                };
                a * weight
            })
            .sum();

        if self.interpolate_missing {
            mm3 += self.missing_slices_mm3(&areas);
        }
        (mm3 / MM3_PER_ML).max(0.0)
    }

    /// 缺失切片的补偿体积, 以立方毫米为单位.
    fn missing_slices_mm3(&self, areas: &[f64]) -> f64 {
        let Some(min_gap) = self.stack.min_gap else {
            return 0.0;
        };
        let locations = self.index.depth_locations();
        areas
            .windows(2)
            .zip(locations.windows(2))
            .map(|(a, l)| {
                let ratio = ((l[1] - l[0]).abs() / min_gap).round();
                if ratio > 1.0 {
                    (ratio - 1.0) * (a[0] + a[1]) / 2.0 * self.stack.spacing
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// 结构 `structure` 在所有相位上的体积曲线, 以毫升为单位.
    pub fn volume_curve(&self, structure: &str) -> Vec<f64> {
        (0..self.index.nr_phases())
            .map(|p| self.volume(structure, p))
            .collect()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl<I, A> VolumeIntegrator<'_, I, A>
where
    I: ImageProvider + Sync,
    A: AnnotationProvider + Sync,
{
    /// 借助 `rayon`, 并行地计算体积曲线. 结果与 [`Self::volume_curve`] 一致.
    pub fn par_volume_curve(&self, structure: &str) -> Vec<f64> {
        (0..self.index.nr_phases())
            .into_par_iter()
            .map(|p| self.volume(structure, p))
            .collect()
    }
}
