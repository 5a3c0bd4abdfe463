//! 临床定量: 体积积分, ED/ES 相位选取和心室功能参数.
//!
//! 所有计算都基于已经排序的 [`DepthTimeIndex`](crate::sorting::DepthTimeIndex).
//! 无法定义的临床值以 `None` 表示.

mod phase;
mod results;
mod volume;

pub use phase::{select_end_diastole, select_end_systole, select_phase, Extremum, PhaseSelector};
pub use results::{Chamber, ChamberResults};
pub use volume::{StackGeometry, VolumeIntegrator};
