//! 切片堆叠方向检查.
//!
//! 约定: 从 base 到 apex, 参考坐标系中 `x` 增大, `y` 与 `z` 减小.
//! 取深度 0 与深度 1 (相位 0) 的图像, 将第一个像素的位置之差投影到 `(1, -1, -1)` 上,
//! 投影为负说明顺序与约定相反.

use super::{AmbiguousOrderingError, DepthTimeIndex};
use crate::data::frame::to_reference_frame;
use crate::{ImageProvider, Point3d};

/// base -> apex 方向约定.
const BASE_TO_APEX: Point3d = [1.0, -1.0, -1.0];

/// 深度 `depth` 相位 0 的图像第一个像素在参考坐标系中的位置.
fn sample(
    index: &DepthTimeIndex,
    images: &impl ImageProvider,
    depth: usize,
) -> Result<Point3d, AmbiguousOrderingError> {
    let image = index
        .image_id(depth, 0)
        .and_then(|id| images.image(id))
        .ok_or(AmbiguousOrderingError::MissingSample { depth })?;
    to_reference_frame(image, [(0.0, 0.0)])?
        .pop()
        .ok_or(AmbiguousOrderingError::MissingSample { depth })
}

/// 检查并 (在需要时) 就地修正 `index` 的深度方向.
///
/// 返回 `Ok(true)` 表示已翻转全部深度 (`depth -> max_depth - depth`),
/// `Ok(false)` 表示原顺序已符合约定. 这是一次性的全局修正.
///
/// # 错误
///
/// - 少于 2 个深度: `AmbiguousOrderingError::TooFewSlices`;
/// - 采样图像缺失或缺少空间元信息: `MissingSample` / `MissingSpatialMetadata`;
/// - 位移投影为 0 或 NaN: `NoDisplacement`.
///
/// 出错时 `index` 不被修改.
pub fn correct_orientation(
    index: &mut DepthTimeIndex,
    images: &impl ImageProvider,
) -> Result<bool, AmbiguousOrderingError> {
    if index.nr_slices() < 2 {
        return Err(AmbiguousOrderingError::TooFewSlices(index.nr_slices()));
    }
    let p0 = sample(index, images, 0)?;
    let p1 = sample(index, images, 1)?;
    let projection: f64 = (0..3).map(|i| (p1[i] - p0[i]) * BASE_TO_APEX[i]).sum();

    if projection < 0.0 {
        index.flip_depths();
        Ok(true)
    } else if projection > 0.0 {
        Ok(false)
    } else {
        Err(AmbiguousOrderingError::NoDisplacement)
    }
}
