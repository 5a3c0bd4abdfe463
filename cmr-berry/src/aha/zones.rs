//! 短轴切片的 base / mid / apex 区域划分.

use log::warn;
use ordered_float::NotNan;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::landmark::{LAX_APEX, LAX_EXTENT_1, LAX_EXTENT_2};
use crate::frame::{distance3d, ImageFrame};
use crate::{Annotation, CmrImage, MissingSpatialMetadata, Point2d, Point3d};

/// 心室长轴上的三个区域.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Zone {
    /// 基底段.
    Base,

    /// 中间段.
    Mid,

    /// 心尖段.
    Apex,
}

impl Zone {
    /// 按 base -> apex 排列的所有区域.
    pub const ALL: [Zone; 3] = [Zone::Base, Zone::Mid, Zone::Apex];

    /// 在 [`Self::ALL`] 中的位置.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 长轴标志点提取错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LandmarkError {
    /// 标注中缺少标志点.
    #[error("长轴标注缺少标志点 `{0}`")]
    MissingPoint(&'static str),

    /// 长轴图像无法定位到参考坐标系.
    #[error(transparent)]
    MissingSpatialMetadata(#[from] MissingSpatialMetadata),
}

/// 标注坐标 (像素左上角为原点) 到像素中心坐标系.
#[inline]
pub(crate) fn to_frame_coords((x, y): Point2d) -> Point2d {
    (x - 0.5, y - 0.5)
}

/// 参考坐标系中的长轴: 二尖瓣平面中点 (base) 和心尖 (apex).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongAxisLandmarks {
    base: Point3d,
    apex: Point3d,
}

impl LongAxisLandmarks {
    /// 直接指定两端.
    #[inline]
    pub fn new(base: Point3d, apex: Point3d) -> Self {
        Self { base, apex }
    }

    /// 从长轴图像的标注中提取: base 为两个范围点的中点.
    pub fn from_annotation(image: &CmrImage, annotation: &Annotation) -> Result<Self, LandmarkError> {
        let point = |name: &'static str| {
            annotation
                .point(name)
                .map(to_frame_coords)
                .ok_or(LandmarkError::MissingPoint(name))
        };
        let pts = [point(LAX_EXTENT_1)?, point(LAX_EXTENT_2)?, point(LAX_APEX)?];
        let frame = ImageFrame::from_image(image)?;
        let [e1, e2, apex] = pts.map(|p| frame.to_reference(p));
        let base = [0, 1, 2].map(|i| (e1[i] + e2[i]) / 2.0);
        Ok(Self { base, apex })
    }

    /// 二尖瓣平面中点.
    #[inline]
    pub fn base(&self) -> Point3d {
        self.base
    }

    /// 心尖.
    #[inline]
    pub fn apex(&self) -> Point3d {
        self.apex
    }

    /// 长轴上 `t` 处的点; `t = 0` 为 base, `t = 1` 为 apex.
    #[inline]
    pub fn along(&self, t: f64) -> Point3d {
        [0, 1, 2].map(|i| self.base[i] + t * (self.apex[i] - self.base[i]))
    }

    /// 距 `p` 最近的区域标志点. 距离相同时取靠近 base 的区域.
    pub fn nearest_zone(&self, p: &Point3d, fractions: &[f64; 3]) -> Option<Zone> {
        Zone::ALL
            .into_iter()
            .filter_map(|z| {
                let d = distance3d(p, &self.along(fractions[z.index()]));
                NotNan::new(d).ok().map(|d| (z, d))
            })
            .min_by_key(|&(_, d)| d)
            .map(|(z, _)| z)
    }
}

/// 为每个切片指定区域. `positions` 为切片心肌质心的三维位置 (无法定位时为 `None`),
/// 按 base -> apex 的深度顺序排列.
///
/// 1 个切片视为 mid, 3 个切片依次为 base/mid/apex, 其它情况下需要长轴标志点;
/// 缺少标志点时所有区域都无法定义.
pub(crate) fn assign_zones(
    positions: &[Option<Point3d>],
    landmarks: Option<&LongAxisLandmarks>,
    fractions: &[f64; 3],
) -> Vec<Option<Zone>> {
    match (positions.len(), landmarks) {
        (1, _) => vec![Some(Zone::Mid)],
        (3, _) => Zone::ALL.into_iter().map(Some).collect(),
        (n, None) => {
            warn!("{n} 个短轴切片但缺少长轴标志点, AHA 分段无法定义");
            vec![None; n]
        }
        (_, Some(lm)) => positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let zone = p.as_ref().and_then(|p| lm.nearest_zone(p, fractions));
                if zone.is_none() {
                    warn!("第 {i} 个短轴切片无法三维定位, 已跳过");
                }
                zone
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpatialMeta;
    use ndarray::Array2;

    const FRACTIONS: [f64; 3] = [1.0 / 6.0, 0.5, 5.0 / 6.0];

    #[test]
    fn test_fixed_counts() {
        let lm = LongAxisLandmarks::new([0.0; 3], [0.0, 0.0, -60.0]);
        assert_eq!(assign_zones(&[None], None, &FRACTIONS), vec![Some(Zone::Mid)]);
        assert_eq!(
            assign_zones(&[None; 3], Some(&lm), &FRACTIONS),
            vec![Some(Zone::Base), Some(Zone::Mid), Some(Zone::Apex)]
        );
        assert_eq!(assign_zones(&[None; 4], None, &FRACTIONS), vec![None; 4]);
        assert!(assign_zones(&[], None, &FRACTIONS).is_empty());
    }

    #[test]
    fn test_nearest_landmark() {
        // 标志点 z = -8, -24, -40.
        let lm = LongAxisLandmarks::new([0.0; 3], [0.0, 0.0, -48.0]);
        let positions: Vec<_> = [0.0, -10.0, -20.0, -30.0, -40.0]
            .into_iter()
            .map(|z| Some([0.0, 0.0, z]))
            .chain([None])
            .collect();
        let zones = assign_zones(&positions, Some(&lm), &FRACTIONS);
        use Zone::*;
        assert_eq!(
            zones,
            vec![Some(Base), Some(Base), Some(Mid), Some(Mid), Some(Apex), None]
        );
    }

    #[test]
    fn test_landmarks_from_annotation() {
        // 行方向沿 x, 列方向沿 -z: 像素 (x, y) -> (x, 0, -y).
        let meta = SpatialMeta {
            pixel_spacing: Some((1.0, 1.0)),
            position: Some([0.0, 0.0, 0.0]),
            orientation: Some([1.0, 0.0, 0.0, 0.0, 0.0, -1.0]),
            instance_number: 1,
            ..Default::default()
        };
        let image = CmrImage::new("lax", Array2::zeros((48, 20)), meta);
        let ann = Annotation::new()
            .with_point(LAX_EXTENT_1, (4.5, 0.5))
            .with_point(LAX_EXTENT_2, (14.5, 0.5))
            .with_point(LAX_APEX, (9.5, 40.5));

        let lm = LongAxisLandmarks::from_annotation(&image, &ann).unwrap();
        assert_eq!(lm.base(), [9.0, 0.0, 0.0]);
        assert_eq!(lm.apex(), [9.0, 0.0, -40.0]);
        assert_eq!(lm.along(0.5), [9.0, 0.0, -20.0]);

        let partial = Annotation::new().with_point(LAX_EXTENT_1, (0.0, 0.0));
        assert_eq!(
            LongAxisLandmarks::from_annotation(&image, &partial),
            Err(LandmarkError::MissingPoint(LAX_EXTENT_2))
        );
    }
}
