//! 掩膜 -> 多边形: 沿像素边界 (crack) 追踪.
//!
//! 每个前景像素与背景 (或图像外) 相邻的每条边都是一条有向边界边.
//! 方向约定为 `左上 -> 右上 -> 右下 -> 左下`, 因此外环的有向面积为正, 孔为负.
//! 所有顶点都在整数格点上, 追踪得到的面积与前景像素个数严格一致.

use std::collections::HashMap;

use log::debug;
use ndarray::Array2;

use super::{signed_ring_area, Geometry, Polygon, Ring};
use crate::consts::ElemType;
use crate::{Idx2d, Mask};

/// 格点 `(x, y)`.
type Vertex = (usize, usize);

/// 有向边界边.
#[derive(Debug, Clone, Copy)]
struct Crack {
    from: Vertex,
    to: Vertex,
    /// 该边所属的前景像素.
    pixel: Idx2d,
}

/// 将二值掩膜还原为几何体.
///
/// 按 4-相邻规则提取前景连通区域, 每个区域得到一个外环及其所有孔.
/// 鞍点 (两个前景像素仅对角相邻) 处, 追踪保持在当前像素上, 因此不同区域的边界不会相连.
/// 共线顶点被合并. 退化的环 (少于 3 个顶点或面积为 0) 被丢弃并记录日志, 从不失败.
pub fn to_polygon(mask: Mask<'_>) -> Geometry {
    let areas = mask.foreground_areas();
    if areas.is_empty() {
        return Geometry::Empty;
    }

    let mut label = Array2::<usize>::zeros(mask.shape());
    for (k, area) in areas.iter().enumerate() {
        for &pos in area {
            label[pos] = k;
        }
    }

    let cracks = collect_cracks(mask);
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::with_capacity(cracks.len());
    for (i, c) in cracks.iter().enumerate() {
        outgoing.entry(c.from).or_default().push(i);
    }

    let mut exteriors: Vec<Vec<Ring>> = vec![vec![]; areas.len()];
    let mut holes: Vec<Vec<Ring>> = vec![vec![]; areas.len()];
    let mut used = vec![false; cracks.len()];

    for start in 0..cracks.len() {
        if used[start] {
            continue;
        }
        let mut ring: Vec<Vertex> = Vec::new();
        let mut cur = start;
        loop {
            used[cur] = true;
            ring.push(cracks[cur].from);
            cur = successor(&cracks, &outgoing, cur);
            if cur == start || used[cur] {
                break;
            }
        }

        let ring = collapse_collinear(&ring);
        let k = label[cracks[start].pixel];
        let area = signed_ring_area(&ring);
        if ring.len() < 3 || area == 0.0 {
            debug!("丢弃退化的追踪环: 区域 {k}, {} 个顶点", ring.len());
        } else if area > 0.0 {
            exteriors[k].push(ring);
        } else {
            holes[k].push(ring);
        }
    }

    let mut polygons = Vec::with_capacity(areas.len());
    for (mut ext, mut hs) in exteriors.into_iter().zip(holes) {
        if ext.is_empty() {
            if !hs.is_empty() {
                debug!("丢弃没有外环的 {} 个孔", hs.len());
            }
            continue;
        }
        // 4-连通区域只有一个外环; 多余的外环单独成为多边形.
        let first = ext.remove(0);
        polygons.push(Polygon::new(first, std::mem::take(&mut hs)));
        polygons.extend(ext.into_iter().map(|r| Polygon::new(r, vec![])));
    }
    Geometry::from_polygons(polygons)
}

/// 收集所有有向边界边.
fn collect_cracks(mask: Mask<'_>) -> Vec<Crack> {
    let is_bg = |pos: Option<Idx2d>| match pos {
        Some(p) => mask.get(p).map_or(true, |&v| ElemType::of(v).is_background()),
        None => true,
    };

    let mut cracks = Vec::new();
    for ((h, w), &v) in mask.indexed_iter() {
        if ElemType::of(v).is_background() {
            continue;
        }
        let pixel = (h, w);
        let (tl, tr, br, bl) = ((w, h), (w + 1, h), (w + 1, h + 1), (w, h + 1));
        let sides = [
            (h.checked_sub(1).map(|u| (u, w)), tl, tr),
            (Some((h, w + 1)), tr, br),
            (Some((h + 1, w)), br, bl),
            (w.checked_sub(1).map(|l| (h, l)), bl, tl),
        ];
        cracks.extend(
            sides
                .into_iter()
                .filter(|&(n, _, _)| is_bg(n))
                .map(|(_, from, to)| Crack { from, to, pixel }),
        );
    }
    cracks
}

/// 边 `cur` 之后的下一条边. 鞍点处优先选择属于同一像素的出边.
fn successor(cracks: &[Crack], outgoing: &HashMap<Vertex, Vec<usize>>, cur: usize) -> usize {
    let c = &cracks[cur];
    match outgoing.get(&c.to).map(Vec::as_slice) {
        Some([only]) => *only,
        Some(candidates) if !candidates.is_empty() => candidates
            .iter()
            .copied()
            .find(|&i| cracks[i].pixel == c.pixel)
            .unwrap_or(candidates[0]),
        // 边界边总是闭合的, 这里只是让调用方终止追踪.
        _ => cur,
    }
}

/// 合并共线顶点, 并转换为浮点坐标.
fn collapse_collinear(ring: &[Vertex]) -> Ring {
    let n = ring.len();
    if n < 3 {
        return ring.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
    }
    let cross = |a: Vertex, b: Vertex, c: Vertex| {
        let (ax, ay) = (a.0 as i64, a.1 as i64);
        let (bx, by) = (b.0 as i64, b.1 as i64);
        let (cx, cy) = (c.0 as i64, c.1 as i64);
        (bx - ax) * (cy - by) - (by - ay) * (cx - bx)
    };
    (0..n)
        .filter(|&i| cross(ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]) != 0)
        .map(|i| (ring[i].0 as f64, ring[i].1 as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::to_polygon;
    use crate::geometry::{to_mask, Geometry};
    use crate::OwnedMask;
    use ndarray::array;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_mask() {
        assert_eq!(to_polygon(OwnedMask::zeros((4, 4)).as_view()), Geometry::Empty);
    }

    #[test]
    fn test_single_pixel() {
        let m = OwnedMask::from(array![[0u8, 0], [0, 1]]);
        let g = to_polygon(m.as_view());
        let p = g.polygons().next().unwrap();
        assert_eq!(p.exterior().len(), 4);
        assert!(f64_eq(g.area(), 1.0));
        assert_eq!(g.bounds(), Some(((1.0, 1.0), (2.0, 2.0))));
    }

    #[test]
    fn test_collinear_collapsed() {
        let m = OwnedMask::from(array![[1u8, 1, 1], [1, 1, 1]]);
        let g = to_polygon(m.as_view());
        assert_eq!(g.polygons().next().unwrap().exterior().len(), 4);
        assert!(f64_eq(g.area(), 6.0));
    }

    #[test]
    fn test_hole_attached() {
        let m = OwnedMask::from(array![
            [1u8, 1, 1, 0],
            [1, 0, 1, 0],
            [1, 1, 1, 0],
            [0, 0, 0, 1],
        ]);
        let g = to_polygon(m.as_view());
        // 右下角像素与环仅对角相邻, 自成一个区域.
        assert_eq!(g.polygons().count(), 2);
        let ring = g.polygons().find(|p| p.area() > 1.0).unwrap();
        assert_eq!(ring.interiors().len(), 1);
        assert!(f64_eq(ring.area(), 8.0));
        assert!(f64_eq(g.area(), 9.0));
    }

    #[test]
    fn test_area_equals_pixel_count() {
        let m = OwnedMask::from(array![
            [0u8, 1, 1, 0, 0],
            [1, 1, 0, 1, 0],
            [0, 1, 1, 1, 1],
            [1, 0, 1, 0, 1],
        ]);
        let g = to_polygon(m.as_view());
        assert!(f64_eq(g.area(), m.count_foreground() as f64));
        assert_eq!(to_mask(&g, 4, 5), m);
    }

    #[test]
    fn test_round_trip_area() {
        // 八边形的斜边恰好经过像素角点, 栅格化没有误差.
        let octagon = Geometry::polygon(
            vec![
                (1.0, 0.0),
                (3.0, 0.0),
                (4.0, 1.0),
                (4.0, 3.0),
                (3.0, 4.0),
                (1.0, 4.0),
                (0.0, 3.0),
                (0.0, 1.0),
            ],
            vec![],
        );
        let back = to_polygon(to_mask(&octagon, 6, 6).as_view());
        assert!((back.area() - octagon.area()).abs() <= 1.0);

        let with_hole = Geometry::polygon(
            vec![(1.0, 1.0), (7.0, 1.0), (7.0, 6.0), (1.0, 6.0)],
            vec![vec![(3.0, 2.0), (5.0, 2.0), (5.0, 4.0), (3.0, 4.0)]],
        );
        let back = to_polygon(to_mask(&with_hole, 8, 8).as_view());
        assert!(f64_eq(back.area(), with_hole.area()));
        assert_eq!(back.polygons().next().unwrap().interiors().len(), 1);
    }

    #[test]
    fn test_round_trip_area_circle() {
        use crate::geometry::ring_edges;
        use std::f64::consts::PI;

        for r in [3.0, 6.0, 20.0] {
            let (cx, cy) = (r + 1.3, r + 1.7);
            let ring: Vec<_> = (0..128)
                .map(|i| {
                    let t = 2.0 * PI * i as f64 / 128.0;
                    (cx + r * t.cos(), cy + r * t.sin())
                })
                .collect();
            let perimeter: f64 = ring_edges(&ring)
                .map(|((x0, y0), (x1, y1))| (x1 - x0).hypot(y1 - y0))
                .sum();
            let circle = Geometry::polygon(ring, vec![]);

            let side = (2.0 * r) as usize + 4;
            let back = to_polygon(to_mask(&circle, side, side).as_view());
            assert_eq!(back.polygons().count(), 1);
            // 像素中心采样的面积误差随边界长度增长, 不超过周长的一半.
            assert!((back.area() - circle.area()).abs() <= perimeter / 2.0);
        }
    }
}
