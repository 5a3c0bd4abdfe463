//! 两份轮廓标注之间的相似度与差异度量.
//!
//! "不存在" 的轮廓 (面积为 0) 有专门的约定:
//!
//! | 函数            | 均不存在 | 仅一方不存在 |
//! |-----------------|----------|--------------|
//! | [`dice`]        | 100      | 0            |
//! | [`dice_or_nan`] | 100      | NaN          |
//! | [`hausdorff`]   | 0        | NaN          |
//!
//! 两种 Dice 约定都被保留, 下游统计依赖 NaN 版本来剔除 "仅一方标注" 的样本.

use log::debug;
use ordered_float::NotNan;

use crate::geometry::{overlap_areas, Geometry};
use crate::consts::MM3_PER_ML;
use crate::Point2d;

/// 两个都存在的几何体的 Dice 百分比, 由精确的多边形面积计算.
fn dice_present(a: &Geometry, b: &Geometry) -> f64 {
    if a == b {
        return 100.0;
    }
    let (area_a, area_b, area_i) = overlap_areas(a, b);
    let total = area_a + area_b;
    if total > 0.0 && total.is_finite() {
        100.0 * 2.0 * area_i / total
    } else {
        debug!("轮廓面积 {area_a} + {area_b} 无法计算 Dice");
        0.0
    }
}

/// Dice 相似度 (百分比): `100 * 2 * |A ∩ B| / (|A| + |B|)`.
///
/// 两者都不存在时为 100 (对 "不存在" 完全一致), 仅一方不存在时为 0.
pub fn dice(a: &Geometry, b: &Geometry) -> f64 {
    match (a.is_absent(), b.is_absent()) {
        (true, true) => 100.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => dice_present(a, b),
    }
}

/// Dice 相似度 (百分比), 剔除版本.
///
/// 与 [`dice`] 的唯一区别是: 仅一方不存在时返回 NaN, 供聚合统计过滤.
pub fn dice_or_nan(a: &Geometry, b: &Geometry) -> f64 {
    match (a.is_absent(), b.is_absent()) {
        (true, true) => 100.0,
        (true, false) | (false, true) => f64::NAN,
        (false, false) => dice_present(a, b),
    }
}

/// 点集 `from` 到点集 `to` 的有向 Hausdorff 距离. 坐标先按 `(sx, sy)` 缩放.
fn directed_hausdorff(from: &[Point2d], to: &[Point2d], (sx, sy): (f64, f64)) -> f64 {
    from.iter()
        .filter_map(|&(fx, fy)| {
            to.iter()
                .filter_map(|&(tx, ty)| {
                    NotNan::new(((fx - tx) * sx).powi(2) + ((fy - ty) * sy).powi(2)).ok()
                })
                .min()
        })
        .max()
        .map_or(f64::NAN, |d| d.sqrt())
}

fn hausdorff_scaled(a: &Geometry, b: &Geometry, scale: (f64, f64)) -> f64 {
    match (a.is_absent(), b.is_absent()) {
        (true, true) => 0.0,
        (true, false) | (false, true) => f64::NAN,
        (false, false) => {
            let pa: Vec<Point2d> = a.vertices().collect();
            let pb: Vec<Point2d> = b.vertices().collect();
            directed_hausdorff(&pa, &pb, scale).max(directed_hausdorff(&pb, &pa, scale))
        }
    }
}

/// 对称 Hausdorff 距离, 以像素为单位, 在两者的环顶点上离散计算.
///
/// 两者都不存在时为 0, 仅一方不存在时为 NaN (不可比较).
#[inline]
pub fn hausdorff(a: &Geometry, b: &Geometry) -> f64 {
    hausdorff_scaled(a, b, (1.0, 1.0))
}

/// 对称 Hausdorff 距离, 以毫米为单位. `pixel_spacing` 为 `(行间距, 列间距)`.
#[inline]
pub fn hausdorff_mm(a: &Geometry, b: &Geometry, (ph, pw): (f64, f64)) -> f64 {
    hausdorff_scaled(a, b, (pw, ph))
}

/// 面积差 `area(a) - area(b)`, 以平方毫米为单位.
#[inline]
pub fn area_difference_mm2(a: &Geometry, b: &Geometry, (ph, pw): (f64, f64)) -> f64 {
    (a.area() - b.area()) * ph * pw
}

/// 单层切片的体积差 `area(a) - area(b)`, 以毫升为单位.
#[inline]
pub fn ml_difference(a: &Geometry, b: &Geometry, pixel_spacing: (f64, f64), thickness: f64) -> f64 {
    area_difference_mm2(a, b, pixel_spacing) * thickness / MM3_PER_ML
}

/// [`ml_difference`] 的绝对值.
#[inline]
pub fn abs_ml_difference(
    a: &Geometry,
    b: &Geometry,
    pixel_spacing: (f64, f64),
    thickness: f64,
) -> f64 {
    ml_difference(a, b, pixel_spacing, thickness).abs()
}
