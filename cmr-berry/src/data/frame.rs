//! 图像坐标系 (ICS) 与参考坐标系 (RCS) 之间的转换.
//!
//! 图像坐标 `(x, y)` 中 `x` 为列方向, `y` 为行方向, 以像素为单位;
//! `(0, 0)` 是第一个像素的中心, 即 DICOM 图像位置所描述的点.
//! 参考坐标系以毫米为单位.

use ndarray::{arr1, Array1, Array2};
use thiserror::Error;

use super::{CmrImage, SpatialAttr};
use crate::{Point2d, Point3d};

/// 缺少必需的空间元信息. 受影响的图像不能用于三维定位,
/// 但不影响面积等二维计算.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("图像 `{image}` 缺少空间元信息 `{field}`")]
pub struct MissingSpatialMetadata {
    /// 图像标识.
    pub image: String,

    /// 缺失的字段名.
    pub field: &'static str,
}

impl MissingSpatialMetadata {
    #[inline]
    fn new(image: &CmrImage, field: &'static str) -> Self {
        Self {
            image: image.id().to_string(),
            field,
        }
    }
}

/// 转换结果.
pub type FrameResult<T> = Result<T, MissingSpatialMetadata>;

/// 单张图像的坐标系.
///
/// `basis` 的三列依次为 `行方向余弦 * 列间距`, `列方向余弦 * 行间距` 和切片法向量.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    basis: Array2<f64>,
    position: Array1<f64>,
    row_cosine: Array1<f64>,
    column_cosine: Array1<f64>,
    spacing: (f64, f64),
}

#[inline]
fn cross(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    arr1(&[
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ])
}

impl ImageFrame {
    /// 从图像空间元信息构建坐标系.
    ///
    /// 方向余弦, 图像位置或像素分辨率缺失时返回 `Err`.
    pub fn from_image(image: &CmrImage) -> FrameResult<Self> {
        let meta = image.meta();
        let o = meta
            .orientation
            .ok_or_else(|| MissingSpatialMetadata::new(image, "orientation"))?;
        let position = meta
            .position
            .ok_or_else(|| MissingSpatialMetadata::new(image, "position"))?;
        let (ph, pw) = image
            .pix_dim()
            .map(|[h, w]| (h, w))
            .ok_or_else(|| MissingSpatialMetadata::new(image, "pixel_spacing"))?;

        let row_cosine = arr1(&o[..3]);
        let column_cosine = arr1(&o[3..]);
        let normal = cross(&row_cosine, &column_cosine);

        let mut basis = Array2::<f64>::zeros((3, 3));
        for i in 0..3 {
            basis[(i, 0)] = row_cosine[i] * pw;
            basis[(i, 1)] = column_cosine[i] * ph;
            basis[(i, 2)] = normal[i];
        }

        Ok(Self {
            basis,
            position: arr1(&position),
            row_cosine,
            column_cosine,
            spacing: (ph, pw),
        })
    }

    /// 切片法向量 (行方向余弦与列方向余弦的叉积).
    #[inline]
    pub fn normal(&self) -> Point3d {
        let n = self.basis.column(2);
        [n[0], n[1], n[2]]
    }

    /// 图像位置在法向量上的投影. 可用作切片位置.
    #[inline]
    pub fn normal_offset(&self) -> f64 {
        self.basis.column(2).dot(&self.position)
    }

    /// 图像坐标 -> 参考坐标.
    pub fn to_reference(&self, (x, y): Point2d) -> Point3d {
        let p = self.basis.dot(&arr1(&[x, y, 0.0])) + &self.position;
        [p[0], p[1], p[2]]
    }

    /// 参考坐标 -> 图像坐标. 参考点会先被正交投影到切片平面上.
    pub fn to_image(&self, p: Point3d) -> Point2d {
        let (ph, pw) = self.spacing;
        let d = arr1(&p) - &self.position;
        (d.dot(&self.row_cosine) / pw, d.dot(&self.column_cosine) / ph)
    }
}

/// 将图像 `image` 上的一组像素坐标转换为参考坐标.
pub fn to_reference_frame<I: IntoIterator<Item = Point2d>>(
    image: &CmrImage,
    pixel_points: I,
) -> FrameResult<Vec<Point3d>> {
    let f = ImageFrame::from_image(image)?;
    Ok(pixel_points.into_iter().map(|p| f.to_reference(p)).collect())
}

/// 将一组参考坐标投影回图像 `image` 的像素坐标.
pub fn to_image_frame<I: IntoIterator<Item = Point3d>>(
    image: &CmrImage,
    points: I,
) -> FrameResult<Vec<Point2d>> {
    let f = ImageFrame::from_image(image)?;
    Ok(points.into_iter().map(|p| f.to_image(p)).collect())
}

/// 图像 `image` 的切片法向量.
#[inline]
pub fn slice_normal(image: &CmrImage) -> FrameResult<Point3d> {
    ImageFrame::from_image(image).map(|f| f.normal())
}

/// 图像位置沿切片法向量的偏移量.
#[inline]
pub fn normal_offset(image: &CmrImage) -> FrameResult<f64> {
    ImageFrame::from_image(image).map(|f| f.normal_offset())
}

/// 两个三维点的欧几里得距离.
#[inline]
pub fn distance3d(a: &Point3d, b: &Point3d) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p - q).powi(2))
        .sum::<f64>()
        .sqrt()
}
