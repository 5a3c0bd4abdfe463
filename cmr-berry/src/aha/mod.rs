//! AHA 心肌分段.
//!
//! 对每个短轴切片, 以心肌轮廓质心为中心, 以指向参考点 (右心室插入点) 的方向为 0 度,
//! 将心肌像素按角度等分到若干扇区. 同一区域 (base/mid/apex) 的切片像素合并后统计.
//!
//! 输出按 6 (base) + 6 (mid) + 4 (apex) 排列, 每个区域内整体循环右移一位,
//! 使各区域的第一个解剖学分段对齐.

mod zones;

pub use zones::{LandmarkError, LongAxisLandmarks, Zone};

use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::landmark::SAX_REFERENCE;
use crate::consts::structure::LV_MYO;
use crate::data::sector::{degree_between, Sector};
use crate::frame::to_reference_frame;
use crate::geometry::{to_mask, Geometry};
use crate::{Annotation, CmrImage, Point2d, Point3d};

/// 分段参数.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AhaConfig {
    bins: [usize; 3],
    fractions: [f64; 3],
}

impl Default for AhaConfig {
    /// 标准 16 分段: 6/6/4 个扇区, 区域标志点位于长轴的 1/6, 1/2 和 5/6 处.
    fn default() -> Self {
        Self {
            bins: [6, 6, 4],
            fractions: [1.0 / 6.0, 0.5, 5.0 / 6.0],
        }
    }
}

impl AhaConfig {
    /// 指定各区域的扇区个数和标志点在长轴上的位置 (base 为 0, apex 为 1).
    ///
    /// 扇区个数必须为正, 位置必须在 `[0, 1]` 内且严格递增, 否则返回 `None`.
    pub fn new(bins: [usize; 3], fractions: [f64; 3]) -> Option<Self> {
        let bins_ok = bins.iter().all(|&n| n > 0);
        let fractions_ok = fractions.iter().all(|f| (0.0..=1.0).contains(f))
            && fractions.windows(2).all(|w| w[0] < w[1]);
        (bins_ok && fractions_ok).then_some(Self { bins, fractions })
    }

    /// 区域 `zone` 的扇区个数.
    #[inline]
    pub fn bins(&self, zone: Zone) -> usize {
        self.bins[zone.index()]
    }

    /// 区域标志点在长轴上的位置.
    #[inline]
    pub fn fractions(&self) -> &[f64; 3] {
        &self.fractions
    }

    /// 分段总数.
    #[inline]
    pub fn nr_segments(&self) -> usize {
        self.bins.iter().sum()
    }
}

/// 参与分段的一个短轴切片.
#[derive(Debug, Clone, Copy)]
pub struct AhaSlice<'a> {
    image: &'a CmrImage,
    myocardium: &'a Geometry,
    reference: Option<Point2d>,
}

impl<'a> AhaSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(image: &'a CmrImage, myocardium: &'a Geometry, reference: Option<Point2d>) -> Self {
        Self {
            image,
            myocardium,
            reference,
        }
    }

    /// 使用标注中的左心室心肌轮廓和参考点.
    pub fn from_annotation(image: &'a CmrImage, annotation: &'a Annotation) -> Self {
        Self::new(
            image,
            annotation.contour_or_empty(LV_MYO),
            annotation.point(SAX_REFERENCE),
        )
    }

    /// 替换参考点. 比较两位标注者时, 双方应使用同一个参考点.
    #[inline]
    pub fn with_reference(mut self, reference: Point2d) -> Self {
        self.reference = Some(reference);
        self
    }

    /// 心肌质心在参考坐标系中的位置.
    fn position(&self) -> Option<Point3d> {
        let c = zones::to_frame_coords(self.myocardium.centroid()?);
        to_reference_frame(self.image, [c]).ok()?.pop()
    }

    /// 将心肌像素值按扇区分组. 第 `i` 个扇区的像素进入第 `(i + 1) % n` 组.
    ///
    /// 缺少参考点或心肌轮廓时返回 `None`.
    fn binned_values(&self, n: usize) -> Option<Vec<Vec<f64>>> {
        let centroid = self.myocardium.centroid()?;
        let reference = self.reference?;
        let start = degree_between(centroid, reference);
        let sectors = Sector::equal_bins(centroid, start, n).ok()?;

        let (height, width) = self.image.shape();
        let mask = to_mask(self.myocardium, height, width);
        let pixels = self.image.pixels();
        let mut groups = vec![Vec::new(); n];
        for (h, w) in mask.as_view().foreground_pos_in_box() {
            let centre = (w as f64 + 0.5, h as f64 + 0.5);
            if let Some(i) = sectors.iter().position(|s| s.contains(centre)) {
                groups[(i + 1) % n].push(f64::from(pixels[(h, w)]));
            }
        }
        Some(groups)
    }
}

/// 单个分段的统计量. 无法定义时各浮点字段为 NaN.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    /// 像素均值.
    pub mean: f64,

    /// 像素总体标准差.
    pub std: f64,

    /// 像素个数.
    pub count: usize,

    /// 贡献像素的切片个数 (即该区域的切片个数).
    pub slices: usize,

    /// 总体权重 `count / slices`.
    pub weight: f64,
}

impl Default for SegmentStats {
    fn default() -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
            count: 0,
            slices: 0,
            weight: f64::NAN,
        }
    }
}

impl SegmentStats {
    /// 由合并后的像素值计算.
    fn from_pooled(values: &[f64], slices: usize) -> Self {
        let count = values.len();
        let weight = if slices > 0 {
            count as f64 / slices as f64
        } else {
            f64::NAN
        };
        if count == 0 {
            return Self {
                slices,
                weight,
                ..Default::default()
            };
        }
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt(),
            count,
            slices,
            weight,
        }
    }

    /// 该分段是否有定义?
    #[inline]
    pub fn is_defined(&self) -> bool {
        !self.mean.is_nan()
    }
}

/// 全部分段, 按 base, mid, apex 排列.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AhaSegments {
    bins: [usize; 3],
    segments: Vec<SegmentStats>,
}

impl AhaSegments {
    /// 所有分段都无法定义.
    fn undefined(config: &AhaConfig) -> Self {
        Self {
            bins: config.bins,
            segments: vec![SegmentStats::default(); config.nr_segments()],
        }
    }

    /// 区域 `zone` 的分段.
    pub fn zone(&self, zone: Zone) -> &[SegmentStats] {
        let start: usize = self.bins[..zone.index()].iter().sum();
        &self.segments[start..start + self.bins[zone.index()]]
    }

    fn zone_mut(&mut self, zone: Zone) -> &mut [SegmentStats] {
        let start: usize = self.bins[..zone.index()].iter().sum();
        &mut self.segments[start..start + self.bins[zone.index()]]
    }

    /// 基底段.
    #[inline]
    pub fn base(&self) -> &[SegmentStats] {
        self.zone(Zone::Base)
    }

    /// 中间段.
    #[inline]
    pub fn mid(&self) -> &[SegmentStats] {
        self.zone(Zone::Mid)
    }

    /// 心尖段.
    #[inline]
    pub fn apex(&self) -> &[SegmentStats] {
        self.zone(Zone::Apex)
    }

    /// 第 `n` 个分段, 从 1 开始编号.
    #[inline]
    pub fn segment(&self, n: usize) -> Option<&SegmentStats> {
        n.checked_sub(1).and_then(|i| self.segments.get(i))
    }

    /// 所有分段.
    #[inline]
    pub fn segments(&self) -> &[SegmentStats] {
        &self.segments
    }

    /// 所有分段的均值.
    pub fn means(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.mean).collect()
    }
}

/// 计算 AHA 分段.
///
/// `slices` 按 base -> apex 的深度顺序排列. 1 个切片视为 mid, 3 个切片依次为 base/mid/apex;
/// 其它切片个数需要 `landmarks` 来确定每个切片所属的区域, 缺少时全部分段为 NaN.
/// 缺少参考点或心肌轮廓的切片被跳过.
pub fn aha_segments(
    slices: &[AhaSlice<'_>],
    landmarks: Option<&LongAxisLandmarks>,
    config: &AhaConfig,
) -> AhaSegments {
    let positions: Vec<_> = match (slices.len(), landmarks) {
        (1 | 3, _) | (_, None) => vec![None; slices.len()],
        _ => slices.iter().map(AhaSlice::position).collect(),
    };
    let zones = zones::assign_zones(&positions, landmarks, config.fractions());

    let mut result = AhaSegments::undefined(config);
    for zone in Zone::ALL {
        let n = config.bins(zone);
        let mut pooled = vec![Vec::new(); n];
        let mut nr_slices = 0;
        for (i, slice) in slices.iter().enumerate() {
            if zones[i] != Some(zone) {
                continue;
            }
            let Some(groups) = slice.binned_values(n) else {
                warn!("第 {i} 个短轴切片缺少参考点或心肌轮廓, 已跳过");
                continue;
            };
            nr_slices += 1;
            for (dst, src) in pooled.iter_mut().zip(groups) {
                dst.extend(src);
            }
        }
        if nr_slices == 0 {
            continue;
        }
        for (seg, values) in result.zone_mut(zone).iter_mut().zip(&pooled) {
            *seg = SegmentStats::from_pooled(values, nr_slices);
        }
    }
    result
}
