#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供心脏 MRI (CMR) 二维轮廓标注的结构化信息和基础定量算法.
//!
//! 该 crate 目前仅提供 `safe` 接口, 且所有计算都是同步的.
//!
//! # 注意
//!
//! 1. 该 crate 不负责 DICOM 文件读取, 标注文件持久化和任何图形界面.
//!   图像和标注由调用方通过 [`ImageProvider`] 和 [`AnnotationProvider`] 提供.
//! 2. "数据缺失" 不会导致 panic: 无法定义的临床值以 `Option::None`
//!   或 `NaN` 返回, 只有完全无法建立深度/时间索引时才返回 `Err`.
//!
//! # 开发计划
//!
//! ### 深度-时间排序 ✅
//!
//! 将一次采集的所有图像映射到稠密的 `(depth, phase)` 网格,
//! 并根据空间元信息修正切片堆叠方向 (base -> apex).
//! 排序结果按采集缓存, 支持多线程下的单次计算.
//!
//! 实现位于 `cmr-berry/src/sorting`.
//!
//! ### 图像坐标系到参考坐标系 (RCS) 的转换 ✅
//!
//! 实现位于 `cmr-berry/src/data/frame.rs`.
//!
//! ### 多边形与二值掩膜互转换, 重叠运算 ✅
//!
//! 1. 多边形以像素中心扫描线栅格化.
//! 2. 掩膜以像素边界追踪还原为多边形, 面积与像素个数严格一致.
//! 3. 交集/差集在公共画布上计算.
//!
//! 实现位于 `cmr-berry/src/geometry`.
//!
//! ### Dice / Hausdorff 相似度 ✅
//!
//! Dice 提供两种约定: 百分比版本 (单侧缺失为 0) 和剔除版本 (单侧缺失为 NaN).
//!
//! 实现位于 `cmr-berry/src/metrics`.
//!
//! ### 体积积分, ED/ES 相位选取, 临床参数 ✅
//!
//! 边界切片半权重, mapping 序列缺失切片插值.
//! EDV, ESV, SV, EF, 心肌质量.
//!
//! 实现位于 `cmr-berry/src/clinical`.
//!
//! ### AHA 16 分段 ✅
//!
//! 以心肌轮廓质心和参考点 (右心室插入点) 为基准划分扇区,
//! 并按 base/mid/apex 三个区域汇总像素统计量.
//!
//! 实现位于 `cmr-berry/src/aha`.
//!
//! ### AHA 第 17 段 (apex cap) ⌛️
//!
//! 需要长轴图像上的心尖帽轮廓, 目前未支持.

/// 二维像素索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 图像坐标系中的连续点 `(x, y)`. `x` 沿宽度 (列) 方向增长, `y` 沿高度 (行) 方向增长.
pub type Point2d = (f64, f64);

/// 参考坐标系 (RCS) 中的三维点, 单位为毫米.
pub type Point3d = [f64; 3];

/// 图像唯一标识 (SOP instance UID 等).
pub type ImageId = String;

type Predicate = fn(u8) -> bool;

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

/// 图像, 采集和标注等基础数据结构.
mod data;

pub use data::annotation::{Annotation, AnnotationProvider};
pub use data::frame::{self, MissingSpatialMetadata};
pub use data::mask::{Mask, OwnedMask};
pub use data::{sector, Acquisition, CmrImage, ImageProvider, SpatialAttr, SpatialMeta};

pub mod aha;
pub mod clinical;
pub mod consts;
pub mod geometry;
pub mod metrics;
pub mod prelude;
pub mod sorting;

pub use geometry::Geometry;
