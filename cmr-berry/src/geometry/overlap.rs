//! 几何体的重叠运算: 交集, 差集, 并集与重叠面积.
//!
//! 重叠面积 ([`intersection_area`], [`overlap_areas`]) 按竖直条带分解精确计算:
//! 在所有顶点和边交点的 `x` 坐标之间, 每条边都是不相交的线段, 条带内的交集是若干梯形,
//! 其面积等于条带宽度乘以中线上的交集长度.
//!
//! 交集, 差集与并集的几何体结果则在同一块画布上逐像素运算, 再追踪回几何体.
//! 对于顶点位于画布格点上的轮廓 (例如由掩膜追踪而来的轮廓), 这些结果是精确的.

use itertools::Itertools;
use log::warn;
use num::ToPrimitive;

use super::raster::fill_geometry;
use super::{ring_edges, to_polygon, Geometry};
use crate::{Idx2d, OwnedMask, Point2d};

/// 有向线段.
type Edge = (Point2d, Point2d);

/// 包围盒 `((x0, y0), (x1, y1))`.
type Bounds = (Point2d, Point2d);

/// 重叠运算的画布参数.
///
/// `supersampling` 为每个像素边长上的采样数. 默认值为 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapCanvas {
    supersampling: usize,
}

impl Default for OverlapCanvas {
    #[inline]
    fn default() -> Self {
        Self { supersampling: 1 }
    }
}

/// 画布在图像坐标系中的位置.
#[derive(Debug, Clone, Copy)]
struct Frame {
    origin: Point2d,
    scale: f64,
    shape: Idx2d,
}

impl Frame {
    #[inline]
    fn to_canvas(&self, (x, y): Point2d) -> Point2d {
        ((x - self.origin.0) * self.scale, (y - self.origin.1) * self.scale)
    }

    #[inline]
    fn to_image(&self, (x, y): Point2d) -> Point2d {
        (x / self.scale + self.origin.0, y / self.scale + self.origin.1)
    }

    fn rasterize(&self, geo: &Geometry) -> OwnedMask {
        let mut m = OwnedMask::zeros(self.shape);
        fill_geometry(&mut m, geo, |p| self.to_canvas(p));
        m
    }

    fn trace(&self, m: &OwnedMask) -> Geometry {
        to_polygon(m.as_view()).map_points(|p| self.to_image(p))
    }
}

/// 两个包围盒的并.
fn union_bounds(a: Option<Bounds>, b: Option<Bounds>) -> Option<Bounds> {
    match (a, b) {
        (None, None) => None,
        (Some(r), None) | (None, Some(r)) => Some(r),
        (Some(((ax0, ay0), (ax1, ay1))), Some(((bx0, by0), (bx1, by1)))) => Some((
            (ax0.min(bx0), ay0.min(by0)),
            (ax1.max(bx1), ay1.max(by1)),
        )),
    }
}

/// 两个包围盒的交. 不相交 (或仅边界接触) 时返回 `None`.
fn common_bounds(a: Option<Bounds>, b: Option<Bounds>) -> Option<Bounds> {
    let (((ax0, ay0), (ax1, ay1)), ((bx0, by0), (bx1, by1))) = (a?, b?);
    let (x0, y0) = (ax0.max(bx0), ay0.max(by0));
    let (x1, y1) = (ax1.min(bx1), ay1.min(by1));
    (x0 < x1 && y0 < y1).then_some(((x0, y0), (x1, y1)))
}

impl OverlapCanvas {
    /// 以每像素边长 `supersampling` 个采样创建画布参数. `supersampling` 为 0 时返回 `None`.
    #[inline]
    pub fn new(supersampling: usize) -> Option<Self> {
        (supersampling > 0).then_some(Self { supersampling })
    }

    /// 每个像素边长上的采样数.
    #[inline]
    pub fn supersampling(&self) -> usize {
        self.supersampling
    }

    /// 覆盖包围盒 `bounds` 的画布.
    /// 坐标非有限, 或画布尺寸超出 `usize` 范围时返回 `None`.
    fn frame(&self, ((x0, y0), (x1, y1)): Bounds) -> Option<Frame> {
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (ox, oy) = (x0.floor(), y0.floor());
        let k = self.supersampling;
        let side = |lo: f64, hi: f64| (hi.ceil() - lo).to_usize()?.checked_mul(k);
        let (w, h) = (side(ox, x1)?, side(oy, y1)?);
        h.checked_mul(w)?;
        Some(Frame {
            origin: (ox, oy),
            scale: k as f64,
            shape: (h, w),
        })
    }

    /// 在覆盖 `bounds` 的画布上逐像素组合 `a` 与 `b`, 再追踪回几何体.
    fn combine(
        &self,
        bounds: Bounds,
        a: &Geometry,
        b: &Geometry,
        op: impl FnOnce(&mut OwnedMask, &OwnedMask),
    ) -> Geometry {
        let Some(f) = self.frame(bounds) else {
            warn!("无法为包围盒 {bounds:?} 建立 {} 倍采样画布", self.supersampling);
            return Geometry::Empty;
        };
        let mut m = f.rasterize(a);
        op(&mut m, &f.rasterize(b));
        f.trace(&m)
    }

    /// `a` 与 `b` 的交集. 画布只覆盖二者包围盒的公共部分.
    pub fn intersection(&self, a: &Geometry, b: &Geometry) -> Geometry {
        let Some(bounds) = common_bounds(a.bounds(), b.bounds()) else {
            return Geometry::Empty;
        };
        self.combine(bounds, a, b, |m, o| m.intersect_with(o.as_view()))
    }

    /// `a` 减去 `b` 的差集.
    pub fn difference(&self, a: &Geometry, b: &Geometry) -> Geometry {
        let Some(bounds) = a.bounds() else {
            return Geometry::Empty;
        };
        if common_bounds(Some(bounds), b.bounds()).is_none() {
            return a.clone();
        }
        self.combine(bounds, a, b, |m, o| m.subtract(o.as_view()))
    }

    /// `a` 与 `b` 的并集.
    pub fn union(&self, a: &Geometry, b: &Geometry) -> Geometry {
        if common_bounds(a.bounds(), b.bounds()).is_none() {
            let polygons = a.polygons().chain(b.polygons()).cloned().collect();
            return Geometry::from_polygons(polygons);
        }
        let Some(bounds) = union_bounds(a.bounds(), b.bounds()) else {
            return Geometry::Empty;
        };
        self.combine(bounds, a, b, |m, o| m.union_with(o.as_view()))
    }
}

/// 几何体所有环 (外环与孔) 的边.
fn edges_of(geo: &Geometry) -> Vec<Edge> {
    geo.rings().flat_map(ring_edges).collect()
}

/// 两条线段的交点横坐标. 平行或不相交时返回 `None`.
fn crossing_x(((px, py), (px2, py2)): Edge, ((qx, qy), (qx2, qy2)): Edge) -> Option<f64> {
    let (rx, ry) = (px2 - px, py2 - py);
    let (sx, sy) = (qx2 - qx, qy2 - qy);
    let d = rx * sy - ry * sx;
    if d == 0.0 {
        return None;
    }
    let (wx, wy) = (qx - px, qy - py);
    let t = (wx * sy - wy * sx) / d;
    let u = (wx * ry - wy * rx) / d;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then_some(px + t * rx)
}

/// 竖直线 `x` 上位于 `edges` 围成区域内部的 `y` 区间 (奇偶规则), 按升序排列.
fn inside_spans(edges: &[Edge], x: f64) -> Vec<(f64, f64)> {
    let mut ys: Vec<f64> = edges
        .iter()
        .filter(|&&((x0, _), (x1, _))| (x0 <= x) != (x1 <= x))
        .map(|&((x0, y0), (x1, y1))| y0 + (x - x0) * (y1 - y0) / (x1 - x0))
        .collect();
    ys.sort_by(f64::total_cmp);
    ys.into_iter().tuples().collect()
}

/// 两组有序且互不重叠的区间的公共长度.
fn common_length(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    let (mut i, mut j, mut len) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        let lo = a[i].0.max(b[j].0);
        let hi = a[i].1.min(b[j].1);
        if hi > lo {
            len += hi - lo;
        }
        if a[i].1 < b[j].1 {
            i += 1;
        } else {
            j += 1;
        }
    }
    len
}

/// `a ∩ b` 的精确面积, 以平方像素为单位.
///
/// 每个几何体内部按奇偶规则判定, 因此同一几何体的多个多边形不应相互重叠
/// (由掩膜追踪得到的几何体总是满足). 包围盒不相交或坐标非有限时为 0.
pub fn intersection_area(a: &Geometry, b: &Geometry) -> f64 {
    let Some(((x0, _), (x1, _))) = common_bounds(a.bounds(), b.bounds()) else {
        return 0.0;
    };
    if !(x0.is_finite() && x1.is_finite()) {
        return 0.0;
    }
    let in_window = |&((ex0, _), (ex1, _)): &Edge| ex0.max(ex1) >= x0 && ex0.min(ex1) <= x1;
    let ea: Vec<Edge> = edges_of(a).into_iter().filter(in_window).collect();
    let eb: Vec<Edge> = edges_of(b).into_iter().filter(in_window).collect();

    let all: Vec<Edge> = ea.iter().chain(eb.iter()).copied().collect();
    let mut xs: Vec<f64> = vec![x0, x1];
    xs.extend(all.iter().flat_map(|&((ex0, _), (ex1, _))| [ex0, ex1]));
    xs.extend(
        all.iter()
            .tuple_combinations()
            .filter_map(|(&e, &f)| crossing_x(e, f)),
    );
    xs.retain(|&x| (x0..=x1).contains(&x));
    xs.sort_by(f64::total_cmp);
    xs.dedup();

    xs.iter()
        .tuple_windows()
        .filter(|(l, r)| r > l)
        .map(|(&l, &r)| {
            let mid = (l + r) / 2.0;
            (r - l) * common_length(&inside_spans(&ea, mid), &inside_spans(&eb, mid))
        })
        .sum()
}

/// 以默认画布计算 `a` 与 `b` 的交集.
#[inline]
pub fn intersection(a: &Geometry, b: &Geometry) -> Geometry {
    OverlapCanvas::default().intersection(a, b)
}

/// 以默认画布计算 `a` 减去 `b` 的差集.
#[inline]
pub fn difference(a: &Geometry, b: &Geometry) -> Geometry {
    OverlapCanvas::default().difference(a, b)
}

/// 以默认画布计算 `a` 与 `b` 的并集.
#[inline]
pub fn union(a: &Geometry, b: &Geometry) -> Geometry {
    OverlapCanvas::default().union(a, b)
}

/// 精确的 `(area(a), area(b), area(a ∩ b))`, 以平方像素为单位.
#[inline]
pub fn overlap_areas(a: &Geometry, b: &Geometry) -> (f64, f64, f64) {
    (a.area(), b.area(), intersection_area(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn circle(cx: f64, cy: f64, r: f64, n: usize) -> Geometry {
        let ring = (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                (cx + r * t.cos(), cy + r * t.sin())
            })
            .collect();
        Geometry::polygon(ring, vec![])
    }

    #[test]
    fn test_canvas_config() {
        assert!(OverlapCanvas::new(0).is_none());
        assert_eq!(OverlapCanvas::default().supersampling(), 1);
        assert_eq!(OverlapCanvas::new(4).map(|c| c.supersampling()), Some(4));
    }

    #[test]
    fn test_intersection_and_difference() {
        let a = Geometry::rect(10.0, 10.0, 14.0, 14.0);
        let b = Geometry::rect(12.0, 11.0, 16.0, 13.0);

        let i = intersection(&a, &b);
        assert!(f64_eq(i.area(), 4.0));
        assert_eq!(i.bounds(), Some(((12.0, 11.0), (14.0, 13.0))));

        let d = difference(&a, &b);
        assert!(f64_eq(d.area(), 12.0));
        assert!(f64_eq(union(&a, &b).area(), 20.0));

        let (aa, ab, ai) = overlap_areas(&a, &b);
        assert!(f64_eq(aa, 16.0) && f64_eq(ab, 8.0) && f64_eq(ai, 4.0));
    }

    #[test]
    fn test_difference_makes_hole() {
        let outer = Geometry::rect(0.0, 0.0, 6.0, 6.0);
        let inner = Geometry::rect(2.0, 2.0, 4.0, 4.0);
        let ring = difference(&outer, &inner);
        assert!(f64_eq(ring.area(), 32.0));
        assert_eq!(ring.polygons().next().unwrap().interiors().len(), 1);
        assert!(f64_eq(intersection_area(&ring, &outer), 32.0));
        assert!(f64_eq(intersection_area(&ring, &inner), 0.0));
    }

    #[test]
    fn test_disjoint_and_empty() {
        let a = Geometry::rect(0.0, 0.0, 2.0, 2.0);
        let b = Geometry::rect(5.0, 5.0, 6.0, 6.0);
        assert!(intersection(&a, &b).is_absent());
        assert_eq!(difference(&a, &b), a);
        assert!(f64_eq(union(&a, &b).area(), 5.0));
        assert!(intersection(&Geometry::Empty, &Geometry::Empty).is_absent());
        assert_eq!(overlap_areas(&Geometry::Empty, &a), (0.0, 4.0, 0.0));
    }

    #[test]
    fn test_sub_pixel_overlap_area_is_exact() {
        let a = Geometry::rect(0.25, 0.25, 1.75, 1.75);
        let b = Geometry::rect(0.0, 0.0, 1.0, 1.0);
        let (aa, ab, ai) = overlap_areas(&a, &b);
        assert!(f64_eq(aa, 2.25) && f64_eq(ab, 1.0));
        assert!(f64_eq(ai, 0.5625));

        // 四倍采样的画布格点恰好落在 0.25 的倍数上.
        let fine = OverlapCanvas::new(4).unwrap();
        assert!(f64_eq(fine.intersection(&a, &b).area(), 0.5625));
    }

    #[test]
    fn test_slanted_overlap_area() {
        // 两个直角三角形交出顶点为 (0, 0), (2, 0), (1, 1) 的三角形.
        let a = Geometry::polygon(vec![(0.0, 0.0), (2.0, 0.0), (0.0, 2.0)], vec![]);
        let b = Geometry::polygon(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0)], vec![]);
        assert!(f64_eq(intersection_area(&a, &b), 1.0));

        let c = circle(10.3, 10.7, 6.0, 128);
        assert!(f64_eq(intersection_area(&c, &c), c.area()));

        let inner = Geometry::rect(8.0, 8.0, 12.0, 12.0);
        assert!(f64_eq(intersection_area(&c, &inner), 16.0));
    }

    #[test]
    fn test_far_apart_contours() {
        let a = Geometry::rect(0.101, 0.101, 0.104, 0.104);
        let b = Geometry::rect(250.101, 250.101, 250.104, 250.104);
        assert_eq!(intersection_area(&a, &b), 0.0);
        assert!(OverlapCanvas::new(64).unwrap().intersection(&a, &b).is_absent());
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let huge = Geometry::rect(0.0, 0.0, 1e18, 1.0);
        let unit = Geometry::rect(0.0, 0.0, 1.0, 1.0);
        let canvas = OverlapCanvas::new(16).unwrap();
        let bounds = huge.bounds().unwrap();
        assert!(canvas.frame(bounds).is_none());
        assert!(canvas.frame(((0.0, 0.0), (f64::INFINITY, 1.0))).is_none());

        // 交集只在公共包围盒上建立画布.
        assert!(f64_eq(canvas.intersection(&huge, &unit).area(), 1.0));
        assert!(f64_eq(intersection_area(&huge, &unit), 1.0));
        assert!(canvas.union(&huge, &unit).is_absent());
    }
}
