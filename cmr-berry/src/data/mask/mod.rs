//! 二值掩膜 (轮廓的栅格形式) 的操作.

mod core;
mod iter;

pub use self::core::{Mask, OwnedMask};

pub(crate) use iter::PosIter;
