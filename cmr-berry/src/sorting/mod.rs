//! 深度-时间排序: 将一次采集的全部图像映射到稠密的 `(depth, phase)` 网格.
//!
//! 三种采集协议使用同一个入口 [`sort`]:
//!
//! 1. 短轴电影序列 ([`Protocol::ShortAxisCine`]): 切片位置决定深度 (位置差小于
//!   [`LOCATION_TOLERANCE`] 的图像属于同一深度), 深度内按实例编号决定相位.
//! 2. 短轴 mapping 序列 ([`Protocol::ShortAxisMapping`]): 每个切片位置只保留一张图像, 相位恒为 0.
//! 3. 长轴电影序列 ([`Protocol::LongAxisCine`]): 只保留匹配视图的图像, 深度恒为 0.
//!
//! 前两种协议排序后还会检查并修正切片堆叠方向 (见 [`correct_orientation`]).
//! 排序结果可以通过 [`SortCache`] 按采集缓存.

use std::collections::HashMap;

use itertools::Itertools;
use log::warn;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::LOCATION_TOLERANCE;
use crate::data::frame::{self, MissingSpatialMetadata};
use crate::{Acquisition, CmrImage, ImageId, ImageProvider};

mod cache;
mod orientation;

pub use cache::SortCache;
pub use orientation::correct_orientation;

/// 长轴视图.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// 两腔心.
    TwoChamber,

    /// 三腔心 (左室流出道).
    ThreeChamber,

    /// 四腔心.
    FourChamber,
}

impl View {
    /// 序列描述中标识该视图的关键字 (小写).
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::TwoChamber => &["2ch", "2cv", "2-ch", "two chamber"],
            Self::ThreeChamber => &["3ch", "3cv", "3-ch", "three chamber", "lvot"],
            Self::FourChamber => &["4ch", "4cv", "4-ch", "four chamber"],
        }
    }

    /// 序列描述 `tag` 是否属于该视图? 大小写不敏感.
    pub fn matches(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.keywords().iter().any(|k| tag.contains(k))
    }
}

/// 采集协议. 决定排序方式.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// 短轴电影序列: 多切片, 多相位.
    ShortAxisCine,

    /// 短轴 mapping 序列: 多切片, 单相位. 切片之间可能有缺失.
    ShortAxisMapping,

    /// 长轴电影序列: 单切片, 多相位.
    LongAxisCine(View),
}

impl Protocol {
    /// 该协议是否需要检查切片堆叠方向?
    #[inline]
    pub fn is_stack(&self) -> bool {
        !matches!(self, Self::LongAxisCine(_))
    }
}

/// 切片堆叠方向无法确认.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmbiguousOrderingError {
    /// 少于 2 个深度, 无法比较.
    #[error("只有 {0} 个深度, 无法确认切片堆叠方向")]
    TooFewSlices(usize),

    /// 采样图像缺少空间元信息.
    #[error(transparent)]
    MissingSpatialMetadata(#[from] MissingSpatialMetadata),

    /// 深度 `depth` 相位 0 处没有图像.
    #[error("深度 {depth} 相位 0 处没有图像")]
    MissingSample {
        /// 缺失的深度.
        depth: usize,
    },

    /// 两个采样点的位移在方向约定上的投影为 0 或无法定义.
    #[error("深度 0 与深度 1 之间没有可判断的位移")]
    NoDisplacement,
}

/// 切片堆叠方向检查结果.
#[derive(Debug, Clone, PartialEq)]
pub enum OrientationCheck {
    /// 原顺序已符合 base -> apex 约定.
    Verified,

    /// 原顺序与约定相反, 已翻转全部深度.
    Flipped,

    /// 无法确认, 保留了未修正的顺序.
    Unverified(AmbiguousOrderingError),

    /// 单切片协议, 无需检查.
    NotApplicable,
}

impl OrientationCheck {
    /// 顺序是否经过确认 (无论是否翻转)?
    #[inline]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified | Self::Flipped)
    }
}

/// 无法建立任何深度-时间索引.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    /// 采集不含任何图像.
    #[error("采集不含任何图像")]
    NoImages,

    /// 没有任何图像可以参与该协议的排序.
    #[error("没有可用于 {protocol:?} 排序的图像")]
    NoUsableImages {
        /// 采集协议.
        protocol: Protocol,
    },
}

/// 排序结果.
pub type SortResult<T> = Result<T, SortError>;

/// 图像标识与 `(depth, phase)` 之间的双射.
///
/// 深度取值为 `0..nr_slices`, 相位取值为 `0..nr_phases`, 均稠密.
/// 深度 0 为 base 端 (方向修正之后).
#[derive(Debug, Clone)]
pub struct DepthTimeIndex {
    protocol: Protocol,
    positions: HashMap<ImageId, (usize, usize)>,
    grid: HashMap<(usize, usize), ImageId>,
    nr_slices: usize,
    nr_phases: usize,
    depth_locations: Vec<f64>,
    orientation: OrientationCheck,
}

impl DepthTimeIndex {
    /// 由 `(深度位置, 该深度按相位排好的图像)` 列表构建.
    fn from_buckets(protocol: Protocol, buckets: Vec<(f64, Vec<ImageId>)>) -> Self {
        let nr_slices = buckets.len();
        let nr_phases = buckets.iter().map(|(_, ids)| ids.len()).max().unwrap_or(0);
        let mut positions = HashMap::new();
        let mut grid = HashMap::new();
        let mut depth_locations = Vec::with_capacity(nr_slices);
        for (depth, (loc, ids)) in buckets.into_iter().enumerate() {
            depth_locations.push(loc);
            for (phase, id) in ids.into_iter().enumerate() {
                positions.insert(id.clone(), (depth, phase));
                grid.insert((depth, phase), id);
            }
        }
        Self {
            protocol,
            positions,
            grid,
            nr_slices,
            nr_phases,
            depth_locations,
            orientation: OrientationCheck::NotApplicable,
        }
    }

    /// 采集协议.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// 深度个数.
    #[inline]
    pub fn nr_slices(&self) -> usize {
        self.nr_slices
    }

    /// 相位个数.
    #[inline]
    pub fn nr_phases(&self) -> usize {
        self.nr_phases
    }

    /// 参与索引的图像个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// 索引是否为空? 由 [`sort`] 得到的索引从不为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// 图像 `id` 的 `(depth, phase)`.
    #[inline]
    pub fn position(&self, id: &str) -> Option<(usize, usize)> {
        self.positions.get(id).copied()
    }

    /// `(depth, phase)` 处的图像标识. 并非每个位置都有图像.
    #[inline]
    pub fn image_id(&self, depth: usize, phase: usize) -> Option<&str> {
        self.grid.get(&(depth, phase)).map(String::as_str)
    }

    /// 相位 `phase` 上所有图像, 按深度升序.
    pub fn phase_slice(&self, phase: usize) -> impl Iterator<Item = (usize, &str)> {
        (0..self.nr_slices).filter_map(move |d| self.image_id(d, phase).map(|id| (d, id)))
    }

    /// 深度 `depth` 的切片位置 (毫米). 长轴序列缺少位置信息时为 NaN.
    #[inline]
    pub fn depth_location(&self, depth: usize) -> Option<f64> {
        self.depth_locations.get(depth).copied()
    }

    /// 所有深度的切片位置, 按深度排列.
    #[inline]
    pub fn depth_locations(&self) -> &[f64] {
        &self.depth_locations
    }

    /// 切片堆叠方向检查结果.
    #[inline]
    pub fn orientation(&self) -> &OrientationCheck {
        &self.orientation
    }

    /// 迭代所有 `(图像标识, (depth, phase))`, 按 `(depth, phase)` 升序.
    pub fn iter(&self) -> impl Iterator<Item = (&str, (usize, usize))> {
        self.grid
            .iter()
            .sorted_unstable_by_key(|(pos, _)| **pos)
            .map(|(pos, id)| (id.as_str(), *pos))
    }

    /// 翻转深度: `depth -> nr_slices - 1 - depth`. 切片位置一并翻转.
    pub(crate) fn flip_depths(&mut self) {
        let Some(max_depth) = self.nr_slices.checked_sub(1) else {
            return;
        };
        for (d, _) in self.positions.values_mut() {
            *d = max_depth - *d;
        }
        self.grid = self
            .positions
            .iter()
            .map(|(id, &pos)| (pos, id.clone()))
            .collect();
        self.depth_locations.reverse();
    }
}

/// 以 `&[CmrImage]` 为后端的临时图像查找表.
struct SliceLookup<'a>(HashMap<&'a str, &'a CmrImage>);

impl<'a> SliceLookup<'a> {
    fn new(images: &'a [CmrImage]) -> Self {
        Self(images.iter().map(|img| (img.id(), img)).collect())
    }
}

impl ImageProvider for SliceLookup<'_> {
    #[inline]
    fn image(&self, id: &str) -> Option<&CmrImage> {
        self.0.get(id).copied()
    }

    fn ids(&self) -> Vec<&str> {
        self.0.keys().copied().collect()
    }
}

/// 图像的切片位置: 优先使用切片位置属性, 否则使用图像位置在法向量上的投影.
fn slice_location(image: &CmrImage) -> Option<f64> {
    image
        .meta()
        .slice_location
        .or_else(|| frame::normal_offset(image).ok())
}

/// 将图像按切片位置分组, 位置差小于 [`LOCATION_TOLERANCE`] 的图像属于同一组.
/// 缺少位置信息的图像被排除并记录警告.
fn group_by_location(images: &[CmrImage]) -> Vec<(f64, Vec<&CmrImage>)> {
    let located = images
        .iter()
        .filter_map(|img| match slice_location(img) {
            Some(loc) if loc.is_finite() => Some((loc, img)),
            _ => {
                warn!("图像 `{}` 缺少切片位置, 已排除", img.id());
                None
            }
        })
        .sorted_by(|(a, _), (b, _)| a.total_cmp(b));

    let mut groups: Vec<(f64, Vec<&CmrImage>)> = Vec::new();
    for (loc, img) in located {
        match groups.last_mut() {
            Some((first, members)) if (loc - *first).abs() < LOCATION_TOLERANCE => {
                members.push(img)
            }
            _ => groups.push((loc, vec![img])),
        }
    }
    groups
}

/// 按实例编号 (其次按标识) 排序.
fn by_instance<'a>(images: impl IntoIterator<Item = &'a CmrImage>) -> Vec<&'a CmrImage> {
    images
        .into_iter()
        .sorted_by(|a, b| {
            a.meta()
                .instance_number
                .cmp(&b.meta().instance_number)
                .then_with(|| a.id().cmp(b.id()))
        })
        .collect()
}

fn ids(images: Vec<&CmrImage>) -> Vec<ImageId> {
    images.into_iter().map(|img| img.id().to_string()).collect()
}

fn sort_short_axis_cine(images: &[CmrImage]) -> Vec<(f64, Vec<ImageId>)> {
    group_by_location(images)
        .into_iter()
        .map(|(loc, members)| (loc, ids(by_instance(members))))
        .collect()
}

fn sort_mapping(images: &[CmrImage]) -> Vec<(f64, Vec<ImageId>)> {
    group_by_location(images)
        .into_iter()
        .filter_map(|(loc, members)| {
            let mut members = by_instance(members);
            let kept = members.pop()?;
            for dropped in members {
                warn!(
                    "切片位置 {loc:.3} 处有重复图像, 保留 `{}`, 丢弃 `{}`",
                    kept.id(),
                    dropped.id()
                );
            }
            Some((loc, vec![kept.id().to_string()]))
        })
        .collect()
}

fn sort_long_axis(images: &[CmrImage], view: View) -> Vec<(f64, Vec<ImageId>)> {
    let members = by_instance(images.iter().filter(|img| view.matches(&img.meta().series_tag)));
    if members.is_empty() {
        return vec![];
    }
    let loc = slice_location(members[0]).unwrap_or(f64::NAN);
    vec![(loc, ids(members))]
}

/// 将一次采集的图像映射到 `(depth, phase)` 网格.
///
/// 短轴协议在排序后修正堆叠方向; 若方向无法确认, 则保留未修正的顺序,
/// 记录警告并在结果中标记为 [`OrientationCheck::Unverified`].
///
/// # 错误
///
/// - 没有图像时返回 `Err(SortError::NoImages)`;
/// - 没有任何图像可参与排序 (例如全部缺少切片位置, 或没有匹配视图的长轴图像)
///   时返回 `Err(SortError::NoUsableImages)`.
pub fn sort(protocol: Protocol, images: &[CmrImage]) -> SortResult<DepthTimeIndex> {
    if images.is_empty() {
        return Err(SortError::NoImages);
    }

    let buckets = match protocol {
        Protocol::ShortAxisCine => sort_short_axis_cine(images),
        Protocol::ShortAxisMapping => sort_mapping(images),
        Protocol::LongAxisCine(view) => sort_long_axis(images, view),
    };
    if buckets.is_empty() {
        return Err(SortError::NoUsableImages { protocol });
    }

    let mut index = DepthTimeIndex::from_buckets(protocol, buckets);
    if protocol.is_stack() {
        index.orientation = match correct_orientation(&mut index, &SliceLookup::new(images)) {
            Ok(true) => OrientationCheck::Flipped,
            Ok(false) => OrientationCheck::Verified,
            Err(e) => {
                warn!("无法确认切片堆叠方向, 使用未修正的顺序: {e}");
                OrientationCheck::Unverified(e)
            }
        };
    }
    Ok(index)
}

/// 按采集自身的协议排序. 等价于 `sort(acq.protocol(), acq.images())`.
#[inline]
pub fn sort_acquisition(acq: &Acquisition) -> SortResult<DepthTimeIndex> {
    sort(acq.protocol(), acq.images())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::SpatialMeta;
    use ndarray::Array2;

    /// 轴位切片, 图像位置沿 z 轴. `instance` 决定时间顺序.
    pub(crate) fn axial_image(id: &str, z: f64, instance: i32) -> CmrImage {
        let meta = SpatialMeta {
            pixel_spacing: Some((1.0, 1.0)),
            slice_thickness: Some(8.0),
            spacing_between_slices: Some(10.0),
            position: Some([0.0, 0.0, z]),
            orientation: Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            slice_location: Some(z),
            instance_number: instance,
            series_tag: "sax cine".to_string(),
        };
        CmrImage::new(id, Array2::zeros((4, 4)), meta)
    }

    /// `nr_slices` 个切片, 每个 `nr_phases` 个相位. 切片位置 `z = 10 * d`.
    pub(crate) fn sax_stack(nr_slices: usize, nr_phases: usize) -> Vec<CmrImage> {
        let mut v = Vec::new();
        for d in 0..nr_slices {
            for p in 0..nr_phases {
                let id = format!("s{d}p{p}");
                v.push(axial_image(&id, 10.0 * d as f64, (d * nr_phases + p + 1) as i32));
            }
        }
        // 打乱输入顺序.
        v.reverse();
        v
    }

    #[test]
    fn test_view_matches() {
        assert!(View::FourChamber.matches("CINE_4CH_retro"));
        assert!(View::TwoChamber.matches("cine 2cv"));
        assert!(!View::TwoChamber.matches("CINE_4CH"));
        assert!(View::ThreeChamber.matches("LVOT cine"));
    }

    #[test]
    fn test_empty() {
        assert_eq!(sort(Protocol::ShortAxisCine, &[]).unwrap_err(), SortError::NoImages);
    }

    #[test]
    fn test_short_axis_cine_dense_and_base_to_apex() {
        let _ = simple_logger::SimpleLogger::new().init();
        let images = sax_stack(4, 3);
        let index = sort(Protocol::ShortAxisCine, &images).unwrap();
        assert_eq!(index.nr_slices(), 4);
        assert_eq!(index.nr_phases(), 3);
        assert_eq!(index.len(), 12);

        let depths: Vec<usize> = (0..4)
            .map(|d| index.position(&format!("s{d}p0")).unwrap().0)
            .sorted()
            .collect();
        assert_eq!(depths, vec![0, 1, 2, 3]);

        // z 随深度增加而减小: 最高的切片是深度 0.
        assert_eq!(index.orientation(), &OrientationCheck::Flipped);
        assert_eq!(index.position("s3p0"), Some((0, 0)));
        assert_eq!(index.position("s0p2"), Some((3, 2)));
        let locs = index.depth_locations();
        assert!(locs.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_location_ties_share_depth() {
        let images = vec![
            axial_image("a", 0.0, 2),
            axial_image("b", 0.004, 1),
            axial_image("c", -10.0, 3),
        ];
        let index = sort(Protocol::ShortAxisCine, &images).unwrap();
        assert_eq!(index.nr_slices(), 2);
        assert_eq!(index.position("b"), Some((0, 0)));
        assert_eq!(index.position("a"), Some((0, 1)));
        assert_eq!(index.position("c"), Some((1, 0)));
        assert_eq!(index.orientation(), &OrientationCheck::Flipped);
    }

    #[test]
    fn test_single_slice_is_unverified() {
        let _ = simple_logger::SimpleLogger::new().init();
        let images = sax_stack(1, 5);
        let index = sort(Protocol::ShortAxisCine, &images).unwrap();
        assert_eq!(index.nr_slices(), 1);
        assert_eq!(index.nr_phases(), 5);
        assert_eq!(
            index.orientation(),
            &OrientationCheck::Unverified(AmbiguousOrderingError::TooFewSlices(1))
        );
    }

    #[test]
    fn test_missing_location_excluded() {
        let _ = simple_logger::SimpleLogger::new().init();
        let mut bad = axial_image("bad", 0.0, 1);
        let mut meta = bad.meta().clone();
        meta.slice_location = None;
        meta.position = None;
        bad = CmrImage::new(bad.id(), Array2::zeros((2, 2)), meta);

        let images = vec![bad.clone(), axial_image("ok", 5.0, 1)];
        let index = sort(Protocol::ShortAxisCine, &images).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.position("bad").is_none());

        let err = sort(Protocol::ShortAxisCine, &[bad]).unwrap_err();
        assert!(matches!(err, SortError::NoUsableImages { .. }));
    }

    #[test]
    fn test_location_from_normal_offset() {
        let mut images = sax_stack(3, 1);
        images = images
            .into_iter()
            .map(|img| {
                let mut meta = img.meta().clone();
                meta.slice_location = None;
                CmrImage::new(img.id(), Array2::zeros((4, 4)), meta)
            })
            .collect();
        let index = sort(Protocol::ShortAxisCine, &images).unwrap();
        assert_eq!(index.nr_slices(), 3);
        assert_eq!(index.position("s2p0"), Some((0, 0)));
    }

    #[test]
    fn test_mapping_keeps_latest_duplicate() {
        let _ = simple_logger::SimpleLogger::new().init();
        let images = vec![
            axial_image("m0", 20.0, 1),
            axial_image("m0-repeat", 20.0, 7),
            axial_image("m1", 10.0, 2),
            axial_image("m2", -20.0, 3),
        ];
        let index = sort(Protocol::ShortAxisMapping, &images).unwrap();
        assert_eq!(index.nr_slices(), 3);
        assert_eq!(index.nr_phases(), 1);
        assert!(index.position("m0").is_none());
        assert_eq!(index.position("m0-repeat"), Some((0, 0)));
        assert_eq!(index.position("m1"), Some((1, 0)));
        assert_eq!(index.position("m2"), Some((2, 0)));
        assert_eq!(index.depth_locations(), &[20.0, 10.0, -20.0]);
    }

    #[test]
    fn test_long_axis_view_filter() {
        let mk = |id: &str, tag: &str, instance: i32| {
            let img = axial_image(id, 0.0, instance);
            let mut meta = img.meta().clone();
            meta.series_tag = tag.to_string();
            CmrImage::new(id, Array2::zeros((4, 4)), meta)
        };
        let images = vec![
            mk("a", "cine_4ch", 3),
            mk("b", "cine_4ch", 1),
            mk("c", "cine_2ch", 2),
            mk("d", "cine_4ch", 2),
        ];
        let index = sort(Protocol::LongAxisCine(View::FourChamber), &images).unwrap();
        assert_eq!(index.nr_slices(), 1);
        assert_eq!(index.nr_phases(), 3);
        assert_eq!(index.position("b"), Some((0, 0)));
        assert_eq!(index.position("d"), Some((0, 1)));
        assert_eq!(index.position("a"), Some((0, 2)));
        assert!(index.position("c").is_none());
        assert_eq!(index.orientation(), &OrientationCheck::NotApplicable);

        let err = sort(Protocol::LongAxisCine(View::ThreeChamber), &images).unwrap_err();
        assert_eq!(
            err,
            SortError::NoUsableImages {
                protocol: Protocol::LongAxisCine(View::ThreeChamber)
            }
        );
    }

    #[test]
    fn test_iter_order() {
        let index = sort(Protocol::ShortAxisCine, &sax_stack(2, 2)).unwrap();
        let order: Vec<_> = index.iter().map(|(_, pos)| pos).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        let phase1: Vec<_> = index.phase_slice(1).map(|(d, _)| d).collect();
        assert_eq!(phase1, vec![0, 1]);
    }
}
