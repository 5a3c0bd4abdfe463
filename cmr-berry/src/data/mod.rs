use std::collections::HashMap;
use std::ops::Index;

use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sorting::Protocol;
use crate::{Idx2d, ImageId, Point3d};

pub mod annotation;
pub mod frame;
pub mod mask;
pub mod sector;

/// 单张 2D 图像的空间元信息. 所有字段都可能缺失,
/// 只有在真正需要时才会报告 [`frame::MissingSpatialMetadata`].
///
/// 该结构完全透明, 字段含义与 DICOM 对应标签一致.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialMeta {
    /// 像素分辨率 `(行间距, 列间距)`, 即 `(height_mm, width_mm)`, 以毫米为单位.
    pub pixel_spacing: Option<(f64, f64)>,

    /// 切片厚度, 以毫米为单位.
    pub slice_thickness: Option<f64>,

    /// 相邻切片中心的间距, 以毫米为单位.
    pub spacing_between_slices: Option<f64>,

    /// 图像第一个像素 (左上角) 在参考坐标系中的位置.
    pub position: Option<Point3d>,

    /// 行方向余弦 (3 个) 与列方向余弦 (3 个).
    pub orientation: Option<[f64; 6]>,

    /// 切片位置, 以毫米为单位.
    pub slice_location: Option<f64>,

    /// 采集实例编号. 同一切片内按该值决定时间顺序.
    pub instance_number: i32,

    /// 序列描述等自由文本, 长轴视图筛选依赖于此.
    pub series_tag: String,
}

/// 图像空间元信息的共用属性和部分通用操作.
pub trait SpatialAttr {
    /// 获取空间元信息部分.
    fn spatial(&self) -> &SpatialMeta;

    /// 获取像素分辨率 `[height, width]`. 以毫米为单位.
    ///
    /// 该值也可以通过 `self.{height_mm, width_mm}` 分别获取.
    #[inline]
    fn pix_dim(&self) -> Option<[f64; 2]> {
        self.spatial().pixel_spacing.map(|(h, w)| [h, w])
    }

    /// 获取 height 方向 (自然 2D 图像的垂直方向) 像素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> Option<f64> {
        self.spatial().pixel_spacing.map(|(h, _)| h)
    }

    /// 获取 width 方向 (自然 2D 图像的水平方向) 像素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> Option<f64> {
        self.spatial().pixel_spacing.map(|(_, w)| w)
    }

    /// 像素分辨率在两个维度上是否是各向同的? 分辨率缺失时返回 `false`.
    #[inline]
    fn is_isotropic(&self) -> bool {
        matches!(self.pix_dim(), Some([h, w]) if h == w)
    }

    /// 获取像素的实际面积值, 以平方毫米为单位.
    #[inline]
    fn pixel_area(&self) -> Option<f64> {
        self.pix_dim().map(|d| d.iter().product())
    }

    /// 获取切片厚度, 以毫米为单位.
    #[inline]
    fn slice_thickness(&self) -> Option<f64> {
        self.spatial().slice_thickness
    }

    /// 获取相邻切片间距, 以毫米为单位.
    #[inline]
    fn slice_spacing(&self) -> Option<f64> {
        self.spatial().spacing_between_slices
    }

    /// 获取体素的实际体积值 (像素面积乘以切片厚度), 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> Option<f64> {
        Some(self.pixel_area()? * self.slice_thickness()?)
    }
}

impl SpatialAttr for SpatialMeta {
    #[inline]
    fn spatial(&self) -> &SpatialMeta {
        self
    }
}

/// 单张 2D CMR 图像, 包括像素值和空间元信息. 像素值以 `f32` 保存.
///
/// 图像由外部提供者创建, 核心库从不修改它.
#[derive(Debug, Clone)]
pub struct CmrImage {
    id: ImageId,
    pixels: Array2<f32>,
    meta: SpatialMeta,
}

impl SpatialAttr for CmrImage {
    #[inline]
    fn spatial(&self) -> &SpatialMeta {
        &self.meta
    }
}

impl Index<Idx2d> for CmrImage {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.pixels[index]
    }
}

impl CmrImage {
    /// 以标识 `id`, `(H, W)` 像素矩阵 `pixels` 和空间元信息 `meta` 创建图像.
    pub fn new(id: impl Into<ImageId>, pixels: Array2<f32>, meta: SpatialMeta) -> Self {
        Self {
            id: id.into(),
            pixels,
            meta,
        }
    }

    /// 图像唯一标识.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 获得像素数据的一份不可变 shallow copy.
    #[inline]
    pub fn pixels(&self) -> ArrayView2<'_, f32> {
        self.pixels.view()
    }

    /// 空间元信息.
    #[inline]
    pub fn meta(&self) -> &SpatialMeta {
        &self.meta
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.pixels.dim()
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }
}

/// 外部图像提供者. 对同一个 `id` 必须返回确定的结果.
pub trait ImageProvider {
    /// 获取标识为 `id` 的图像. 不存在时返回 `None`.
    fn image(&self, id: &str) -> Option<&CmrImage>;

    /// 所有图像标识, 无顺序保证.
    fn ids(&self) -> Vec<&str>;
}

impl ImageProvider for HashMap<ImageId, CmrImage> {
    #[inline]
    fn image(&self, id: &str) -> Option<&CmrImage> {
        self.get(id)
    }

    fn ids(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

/// 一次采集 (同一协议下的一组图像).
///
/// 采集标识 `id` 同时是排序缓存的键, 因此调用方应保证其唯一性.
#[derive(Debug, Clone)]
pub struct Acquisition {
    id: String,
    protocol: Protocol,
    images: Vec<CmrImage>,
    lookup: HashMap<ImageId, usize>,
}

impl ImageProvider for Acquisition {
    #[inline]
    fn image(&self, id: &str) -> Option<&CmrImage> {
        self.lookup.get(id).map(|&i| &self.images[i])
    }

    fn ids(&self) -> Vec<&str> {
        self.images.iter().map(CmrImage::id).collect()
    }
}

impl Acquisition {
    /// 创建采集. 若 `images` 中存在重复标识, 则后出现者覆盖前者的查找项.
    pub fn new(id: impl Into<String>, protocol: Protocol, images: Vec<CmrImage>) -> Self {
        let lookup = images
            .iter()
            .enumerate()
            .map(|(i, img)| (img.id.clone(), i))
            .collect();
        Self {
            id: id.into(),
            protocol,
            images,
            lookup,
        }
    }

    /// 采集标识.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 采集协议.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// 全部图像, 顺序与创建时一致 (无排序保证).
    #[inline]
    pub fn images(&self) -> &[CmrImage] {
        &self.images
    }

    /// 图像个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// 采集是否不含任何图像?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
