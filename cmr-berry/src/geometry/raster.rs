//! 多边形 -> 掩膜: 像素中心扫描线填充.

use num::ToPrimitive;

use super::{ring_edges, Geometry, Polygon};
use crate::{OwnedMask, Point2d};

/// 将几何体栅格化为 `height x width` 的二值掩膜.
///
/// 像素 `(h, w)` 为前景, 当且仅当其中心 `(w + 0.5, h + 0.5)` 按奇偶规则位于某个多边形内部.
/// 多个多边形的结果取并集. 空几何体得到全背景掩膜, 从不失败.
///
/// 顶点位于像素格点上的多边形, 栅格化后再追踪回来面积严格不变.
/// 一般多边形的往返面积误差随边界长度增长, 不超过周长的一半.
pub fn to_mask(geo: &Geometry, height: usize, width: usize) -> OwnedMask {
    let mut mask = OwnedMask::zeros((height, width));
    fill_geometry(&mut mask, geo, |p| p);
    mask
}

/// 将几何体经 `map` 变换后填充到 `mask` 上 (与已有前景取并集).
pub(crate) fn fill_geometry(mask: &mut OwnedMask, geo: &Geometry, map: impl Fn(Point2d) -> Point2d) {
    for poly in geo.polygons() {
        fill_polygon(mask, poly, &map);
    }
}

fn fill_polygon(mask: &mut OwnedMask, poly: &Polygon, map: &impl Fn(Point2d) -> Point2d) {
    let edges: Vec<(Point2d, Point2d)> = poly
        .rings()
        .flat_map(ring_edges)
        .map(|(a, b)| (map(a), map(b)))
        .collect();
    if edges.is_empty() {
        return;
    }

    let (height, width) = mask.shape();
    let (y_min, y_max) = edges
        .iter()
        .flat_map(|&((_, y0), (_, y1))| [y0, y1])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });
    let Some(r0) = pixel_floor(y_min - 0.5, height) else {
        return;
    };
    let Some(r1) = pixel_floor(y_max - 0.5, height).map(|r| r + 1) else {
        return;
    };

    let mut crossings = Vec::with_capacity(8);
    for r in r0..r1.min(height) {
        let y = r as f64 + 0.5;
        crossings.clear();
        crossings.extend(edges.iter().filter_map(|&((x0, y0), (x1, y1))| {
            ((y0 <= y) != (y1 <= y)).then(|| x0 + (y - y0) * (x1 - x0) / (y1 - y0))
        }));
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            // 填充满足 `x_a <= c + 0.5 < x_b` 的列 `c`.
            let c0 = pixel_ceil(pair[0] - 0.5, width);
            let c1 = pixel_ceil(pair[1] - 0.5, width);
            if let (Some(c0), Some(c1)) = (c0, c1) {
                mask.fill_row(r, c0, c1);
            }
        }
    }
}

/// `ceil(v)` 截断到 `[0, limit]`. 非有限值返回 `None`.
#[inline]
fn pixel_ceil(v: f64, limit: usize) -> Option<usize> {
    v.is_finite()
        .then(|| v.ceil().max(0.0).min(limit as f64))
        .and_then(|v| v.to_usize())
}

/// `floor(v)` 截断到 `[0, limit]`. 非有限值返回 `None`.
#[inline]
fn pixel_floor(v: f64, limit: usize) -> Option<usize> {
    v.is_finite()
        .then(|| v.floor().max(0.0).min(limit as f64))
        .and_then(|v| v.to_usize())
}

#[cfg(test)]
mod tests {
    use super::to_mask;
    use crate::geometry::Geometry;
    use ndarray::array;

    #[test]
    fn test_empty_geometry() {
        let m = to_mask(&Geometry::Empty, 3, 5);
        assert_eq!(m.shape(), (3, 5));
        assert_eq!(m.count_foreground(), 0);
    }

    #[test]
    fn test_lattice_rect_is_exact() {
        let m = to_mask(&Geometry::rect(1.0, 0.0, 3.0, 2.0), 3, 4);
        assert_eq!(
            m.into_raw(),
            array![[0u8, 1, 1, 0], [0, 1, 1, 0], [0, 0, 0, 0]]
        );
    }

    #[test]
    fn test_hole_is_not_filled() {
        let g = Geometry::polygon(
            vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)],
            vec![vec![(1.0, 1.0), (4.0, 1.0), (4.0, 4.0), (1.0, 4.0)]],
        );
        let m = to_mask(&g, 5, 5);
        assert_eq!(m.count_foreground(), 25 - 9);
        assert_eq!(m[(2, 2)], 0);
        assert_eq!(m[(0, 2)], 1);
    }

    #[test]
    fn test_clipped_to_canvas() {
        let m = to_mask(&Geometry::rect(-3.0, -3.0, 2.0, 10.0), 4, 4);
        assert_eq!(m.count_foreground(), 2 * 4);
    }

    #[test]
    fn test_pixel_centre_rule() {
        // 斜边 x + y = 3 恰好穿过若干像素中心, 边界上的中心不计入.
        let g = Geometry::polygon(vec![(0.0, 0.0), (3.0, 0.0), (0.0, 3.0)], vec![]);
        let m = to_mask(&g, 3, 3);
        assert_eq!(m[(0, 0)], 1);
        assert_eq!(m[(0, 1)], 1);
        assert_eq!(m[(0, 2)], 0);
        assert_eq!(m[(1, 0)], 1);
        assert_eq!(m[(1, 1)], 0);
        assert_eq!(m[(2, 0)], 0);
        assert_eq!(m.count_foreground(), 3);
    }
}
