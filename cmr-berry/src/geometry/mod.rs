//! 图像坐标系中的二维轮廓几何体.
//!
//! 所有坐标都以像素为单位, `x` 为列方向, `y` 为行方向.
//! 像素 `(h, w)` 覆盖单位正方形 `[w, w + 1] x [h, h + 1]`, 因此其中心为 `(w + 0.5, h + 0.5)`.
//!
//! 环 (ring) 以首尾隐式相连的顶点序列存储, 不重复首顶点.

use either::Either;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Point2d;

mod overlap;
mod raster;
mod trace;

pub use overlap::{difference, intersection, intersection_area, overlap_areas, union, OverlapCanvas};
pub use raster::to_mask;
pub use trace::to_polygon;

/// 首尾隐式相连的顶点序列.
pub type Ring = Vec<Point2d>;

/// 鞋带公式计算环的有向面积.
///
/// 在 `y` 轴向下的图像坐标系中, 屏幕上顺时针连接的环面积为正.
/// 少于 3 个顶点的环面积为 0.
pub fn signed_ring_area(ring: &[Point2d]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    ring_edges(ring)
        .map(|((x1, y1), (x2, y2))| x1 * y2 - x2 * y1)
        .sum::<f64>()
        / 2.0
}

/// 迭代环上的所有有向边 (包含从末顶点回到首顶点的边).
#[inline]
pub(crate) fn ring_edges(ring: &[Point2d]) -> impl Iterator<Item = (Point2d, Point2d)> + '_ {
    ring.iter()
        .copied()
        .zip(ring.iter().copied().cycle().skip(1))
}

/// 环的一阶矩 `(有向面积, x 方向矩, y 方向矩)`, 质心为 `(mx / a, my / a)`.
fn ring_moments(ring: &[Point2d]) -> (f64, f64, f64) {
    if ring.len() < 3 {
        return (0.0, 0.0, 0.0);
    }
    let (mut a, mut mx, mut my) = (0.0, 0.0, 0.0);
    for ((x1, y1), (x2, y2)) in ring_edges(ring) {
        let cross = x1 * y2 - x2 * y1;
        a += cross;
        mx += (x1 + x2) * cross;
        my += (y1 + y2) * cross;
    }
    (a / 2.0, mx / 6.0, my / 6.0)
}

/// 去掉与首顶点重复的末顶点.
fn open_ring(mut ring: Ring) -> Ring {
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// 带孔的简单多边形.
///
/// 构造时统一方向: 外环有向面积为正, 孔为负.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Ring,
    interiors: Vec<Ring>,
}

impl Polygon {
    /// 以外环 `exterior` 和孔 `interiors` 构造多边形. 重复的闭合顶点会被去掉.
    pub fn new(exterior: Ring, interiors: Vec<Ring>) -> Self {
        let mut exterior = open_ring(exterior);
        if signed_ring_area(&exterior) < 0.0 {
            exterior.reverse();
        }
        let interiors = interiors
            .into_iter()
            .map(open_ring)
            .map(|mut r| {
                if signed_ring_area(&r) > 0.0 {
                    r.reverse();
                }
                r
            })
            .collect();
        Self {
            exterior,
            interiors,
        }
    }

    /// 外环.
    #[inline]
    pub fn exterior(&self) -> &[Point2d] {
        &self.exterior
    }

    /// 所有孔.
    #[inline]
    pub fn interiors(&self) -> &[Ring] {
        &self.interiors
    }

    /// 迭代外环和所有孔.
    #[inline]
    pub fn rings(&self) -> impl Iterator<Item = &[Point2d]> {
        std::iter::once(self.exterior.as_slice()).chain(self.interiors.iter().map(Vec::as_slice))
    }

    /// 面积 (外环面积减去孔面积), 不小于 0.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.interiors.iter().map(|r| signed_ring_area(r).abs()).sum();
        (signed_ring_area(&self.exterior).abs() - holes).max(0.0)
    }

    /// `(面积, x 方向矩, y 方向矩)`, 孔的贡献为负.
    fn moments(&self) -> (f64, f64, f64) {
        self.rings().fold((0.0, 0.0, 0.0), |(a, mx, my), r| {
            let (ra, rx, ry) = ring_moments(r);
            (a + ra, mx + rx, my + ry)
        })
    }
}

/// 二维轮廓: 空, 多边形或多个多边形.
///
/// 面积为 0 的几何体被视为 "不存在" ([`Geometry::is_absent`]).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Geometry {
    /// 空几何体.
    #[default]
    Empty,

    /// 单个多边形.
    Polygon(Polygon),

    /// 多个多边形.
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// 以外环和孔构造单个多边形.
    #[inline]
    pub fn polygon(exterior: Ring, interiors: Vec<Ring>) -> Self {
        Self::Polygon(Polygon::new(exterior, interiors))
    }

    /// 构造轴对齐矩形 `[x0, x1] x [y0, y1]`.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::polygon(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)], vec![])
    }

    /// 由一组多边形构造: 0 个为空, 1 个为多边形, 否则为多多边形.
    pub fn from_polygons(mut polygons: Vec<Polygon>) -> Self {
        match polygons.len() {
            0 => Self::Empty,
            1 => Self::Polygon(polygons.swap_remove(0)),
            _ => Self::MultiPolygon(polygons),
        }
    }

    /// 迭代所有多边形.
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        match self {
            Self::Empty => Either::Left(None.into_iter()),
            Self::Polygon(p) => Either::Left(Some(p).into_iter()),
            Self::MultiPolygon(ps) => Either::Right(ps.iter()),
        }
    }

    /// 迭代所有环 (外环与孔).
    #[inline]
    pub fn rings(&self) -> impl Iterator<Item = &[Point2d]> {
        self.polygons().flat_map(|p| p.rings())
    }

    /// 迭代所有顶点.
    #[inline]
    pub fn vertices(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.rings().flat_map(|r| r.iter().copied())
    }

    /// 总面积, 以平方像素为单位.
    #[inline]
    pub fn area(&self) -> f64 {
        self.polygons().map(Polygon::area).sum()
    }

    /// 几何体是否 "不存在" (面积为 0 或无法定义)?
    #[inline]
    pub fn is_absent(&self) -> bool {
        !(self.area() > 0.0)
    }

    /// 面积加权质心. 不存在的几何体没有质心.
    pub fn centroid(&self) -> Option<Point2d> {
        let (a, mx, my) = self.polygons().fold((0.0, 0.0, 0.0), |(a, mx, my), p| {
            let (pa, px, py) = p.moments();
            (a + pa, mx + px, my + py)
        });
        (a != 0.0 && a.is_finite()).then(|| (mx / a, my / a))
    }

    /// 包围盒 `((min_x, min_y), (max_x, max_y))`. 没有顶点时返回 `None`.
    pub fn bounds(&self) -> Option<(Point2d, Point2d)> {
        self.vertices().fold(None, |acc, (x, y)| match acc {
            None => Some(((x, y), (x, y))),
            Some(((x0, y0), (x1, y1))) => Some(((x0.min(x), y0.min(y)), (x1.max(x), y1.max(y)))),
        })
    }

    /// 对每个顶点应用 `f`, 返回新几何体. `f` 必须保持或整体翻转方向,
    /// 构造时会重新统一环的方向.
    pub(crate) fn map_points(&self, f: impl Fn(Point2d) -> Point2d) -> Self {
        let map_ring = |r: &[Point2d]| r.iter().map(|&p| f(p)).collect::<Ring>();
        Self::from_polygons(
            self.polygons()
                .map(|p| {
                    Polygon::new(
                        map_ring(p.exterior()),
                        p.interiors().iter().map(|r| map_ring(r.as_slice())).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl From<Polygon> for Geometry {
    #[inline]
    fn from(p: Polygon) -> Self {
        Self::Polygon(p)
    }
}
