//! 单张图像上的轮廓标注.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::{ImageId, Point2d};

/// 所有 "不存在的标注" 共享的空标注.
static EMPTY_ANNOTATION: Lazy<Annotation> = Lazy::new(Annotation::default);

/// 单张图像的标注: 结构名 -> 轮廓, 以及结构名 -> 标志点.
///
/// 面积为 0 的轮廓被视为不存在, 无论其几何对象本身是否存在.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    contours: HashMap<String, Geometry>,
    points: HashMap<String, Point2d>,
}

impl Annotation {
    /// 创建空标注.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 以结构名 `name` 设置轮廓, 返回被替换的旧轮廓.
    pub fn set_contour(&mut self, name: impl Into<String>, geo: Geometry) -> Option<Geometry> {
        self.contours.insert(name.into(), geo)
    }

    /// 以名字 `name` 设置标志点, 返回被替换的旧点.
    pub fn set_point(&mut self, name: impl Into<String>, p: Point2d) -> Option<Point2d> {
        self.points.insert(name.into(), p)
    }

    /// 链式设置轮廓.
    #[inline]
    pub fn with_contour(mut self, name: impl Into<String>, geo: Geometry) -> Self {
        self.set_contour(name, geo);
        self
    }

    /// 链式设置标志点.
    #[inline]
    pub fn with_point(mut self, name: impl Into<String>, p: Point2d) -> Self {
        self.set_point(name, p);
        self
    }

    /// 获取结构 `name` 的轮廓. 轮廓不存在或面积为 0 时返回 `None`.
    pub fn contour(&self, name: &str) -> Option<&Geometry> {
        self.contours.get(name).filter(|g| !g.is_absent())
    }

    /// 获取结构 `name` 的轮廓; 不存在时返回空几何体.
    #[inline]
    pub fn contour_or_empty(&self, name: &str) -> &Geometry {
        static EMPTY: Geometry = Geometry::Empty;
        self.contour(name).unwrap_or(&EMPTY)
    }

    /// 结构 `name` 的轮廓是否存在 (面积非 0)?
    #[inline]
    pub fn has_contour(&self, name: &str) -> bool {
        self.contour(name).is_some()
    }

    /// 获取标志点 `name`.
    #[inline]
    pub fn point(&self, name: &str) -> Option<Point2d> {
        self.points.get(name).copied()
    }

    /// 结构 `name` 轮廓的像素面积. 不存在时为 0.
    #[inline]
    pub fn area(&self, name: &str) -> f64 {
        self.contour(name).map_or(0.0, Geometry::area)
    }

    /// 是否不含任何存在的轮廓和标志点?
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.contours.values().all(Geometry::is_absent)
    }
}

/// 外部标注提供者.
pub trait AnnotationProvider {
    /// 获取图像 `id` 的标注. 没有标注时返回 `None`.
    fn annotation(&self, id: &str) -> Option<&Annotation>;

    /// 获取图像 `id` 的标注; 没有标注时返回 (共享的) 空标注, 从不失败.
    #[inline]
    fn annotation_or_empty(&self, id: &str) -> &Annotation {
        self.annotation(id).unwrap_or(&EMPTY_ANNOTATION)
    }
}

impl AnnotationProvider for HashMap<ImageId, Annotation> {
    #[inline]
    fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Annotation, AnnotationProvider};
    use crate::consts::landmark::SAX_REFERENCE;
    use crate::consts::structure::{LV_ENDO, LV_MYO};
    use crate::geometry::Geometry;
    use std::collections::HashMap;

    #[test]
    fn test_zero_area_is_absent() {
        let degenerate = Geometry::polygon(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)], vec![]);
        let a = Annotation::new()
            .with_contour(LV_ENDO, degenerate)
            .with_contour(LV_MYO, Geometry::rect(0.0, 0.0, 2.0, 3.0));
        assert!(!a.has_contour(LV_ENDO));
        assert!(a.contour_or_empty(LV_ENDO).is_absent());
        assert!(a.has_contour(LV_MYO));
        assert_eq!(a.area(LV_MYO), 6.0);
        assert_eq!(a.area("rv_endo"), 0.0);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_provider_never_fails() {
        let mut db: HashMap<String, Annotation> = HashMap::new();
        db.insert(
            "a".to_string(),
            Annotation::new().with_point(SAX_REFERENCE, (3.0, 4.0)),
        );
        assert_eq!(db.annotation_or_empty("a").point(SAX_REFERENCE), Some((3.0, 4.0)));
        let missing = db.annotation_or_empty("b");
        assert!(missing.is_empty());
        assert_eq!(missing.area(LV_ENDO), 0.0);
    }
}
