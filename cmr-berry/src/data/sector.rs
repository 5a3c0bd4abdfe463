//! 短轴切片上的扇区.
//!
//! 扇区定义在图像坐标系 `(x, y)` 上, 其中 `x` 沿宽度 (列) 方向增长, `y` 沿高度 (行) 方向增长.
//! 以中心点为原点, 平面上任意点的方向通过 `atan2(dy, dx)` 确定, 并以 **角度** 表示.
//! 注意我们通过归一化保证了角度的范围为 `[0, 360)`. 由于 `y` 轴向下,
//! 角度增长的方向在屏幕上表现为顺时针.

use std::fmt::Formatter;

use thiserror::Error;

use crate::Point2d;

const FULL_TURN: f64 = 360.0;

/// 将任意有限角度归一化到 `[0, 360)`.
#[inline]
pub fn normalize_degree(deg: f64) -> f64 {
    let r = deg.rem_euclid(FULL_TURN);
    // 极小的负数取模后可能得到 360.0.
    if r >= FULL_TURN {
        0.0
    } else {
        r
    }
}

/// 点 `to` 相对于点 `from` 的角度, 取值范围为 `[0, 360)`.
///
/// # 角度规范
///
/// - x 增加的方向角度为 `0`;
/// - y 增加的方向角度为 `90`;
/// - x 减少的方向角度为 `180`;
/// - y 减少的方向角度为 `270`.
///
/// `to == from` 时返回 `0`.
#[inline]
pub fn degree_between((fx, fy): Point2d, (tx, ty): Point2d) -> f64 {
    normalize_degree(f64::atan2(ty - fy, tx - fx).to_degrees())
}

/// 二维图像上的一个扇区, 由顶点和两条射线 (通过角度表示) 组成.
///
/// 扇区扫过的区域为 `[from, to)`, 左闭右开, 因此相邻扇区不会重复包含边界上的点.
/// 该结构不负责检测图像越界.
#[derive(Copy, Clone, PartialEq)]
pub struct Sector {
    /// 中心坐标
    center: Point2d,
    /// [0, 360)
    from: f64,
    /// [0, 360]; `from -> 角度增长方向 -> to`. 等于 360 时表示整圆.
    to: f64,
}

/// 压缩到一行.
impl std::fmt::Debug for Sector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Sector {{ center: ({:.2}, {:.2}), from: {:.4}°, to: {:.4}° }}",
            self.center.0, self.center.1, self.from, self.to
        ))
    }
}

/// `Sector` 初始化错误.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum InitSectorError {
    /// 中心点含有非有限值.
    #[error("扇区中心不是有限值")]
    NonFiniteCenter,

    /// 角度超出表示范围.
    #[error("扇区角度超出 [0, 360) 范围")]
    AngleOutOfRange,

    /// 空范围. 该情况不在 `Sector` 的考虑范围内.
    #[error("扇区范围为空")]
    EmptyRange,

    /// 等分个数为 0.
    #[error("扇区等分个数为 0")]
    NoBins,
}

impl Sector {
    /// 以 `center` 为原点, `from` 和 `to` 分别为两条射线相对于原点的角度, 创建一个扇区.
    /// 这个扇区扫过的区域被认定为从 `from` 出发,
    /// 沿角度增长方向前进直到触碰到 `to` 所经过的所有区域 (不含 `to` 本身).
    ///
    /// # 返回值
    ///
    /// - 当 `center` 含有 NaN 或无穷时, 返回 `Err(InitSectorError::NonFiniteCenter)`;
    /// - 当 `from` 或 `to` 不在 `[0, 360)` 范围内时, 返回 `Err(InitSectorError::AngleOutOfRange)`;
    /// - 当 `from == to` 时, 返回 `Err(InitSectorError::EmptyRange)`;
    /// - 其他情况下成功, 返回 `Ok(Sector)`.
    pub fn new(center: Point2d, from: f64, to: f64) -> Result<Self, InitSectorError> {
        Self::check_center(center)?;
        const R: std::ops::Range<f64> = 0.0..FULL_TURN;
        if !R.contains(&from) || !R.contains(&to) {
            return Err(InitSectorError::AngleOutOfRange);
        }
        if from == to {
            return Err(InitSectorError::EmptyRange);
        }
        Ok(Self { center, from, to })
    }

    /// 创建全区域扇区 (圆).
    ///
    /// 注意该方法是必要的, 因为 `Self::new` 只能创建一个严格的扇区 (360 度不被允许).
    pub fn new_circle(center: Point2d) -> Result<Self, InitSectorError> {
        Self::check_center(center)?;
        Ok(Self {
            center,
            from: 0.0,
            to: FULL_TURN,
        })
    }

    /// 从角度 `start` 出发, 将整圆等分为 `n` 个扇区.
    ///
    /// 相邻扇区共享同一个边界值, 因此任意方向恰好落在一个扇区内.
    /// `n == 1` 时返回一个整圆.
    pub fn equal_bins(center: Point2d, start: f64, n: usize) -> Result<Vec<Self>, InitSectorError> {
        if n == 0 {
            return Err(InitSectorError::NoBins);
        } else if !start.is_finite() {
            return Err(InitSectorError::AngleOutOfRange);
        } else if n == 1 {
            return Ok(vec![Self::new_circle(center)?]);
        }

        let width = FULL_TURN / n as f64;
        let bounds: Vec<f64> = (0..n)
            .map(|i| normalize_degree(start + width * i as f64))
            .collect();
        (0..n)
            .map(|i| Self::new(center, bounds[i], bounds[(i + 1) % n]))
            .collect()
    }

    #[inline]
    fn check_center((x, y): Point2d) -> Result<(), InitSectorError> {
        if x.is_finite() && y.is_finite() {
            Ok(())
        } else {
            Err(InitSectorError::NonFiniteCenter)
        }
    }

    /// 获取中心点.
    #[inline]
    pub fn center(&self) -> Point2d {
        self.center
    }

    /// 获取起始射线角度.
    #[inline]
    pub fn from(&self) -> f64 {
        self.from
    }

    /// 判断点 `point` 是否被包含在扇区中. 中心点本身的角度视为 `0`.
    #[inline]
    pub fn contains(&self, point: Point2d) -> bool {
        self.contains_degree(self.degree_to(point))
    }

    /// 判断方向 `deg` 是否落在扇区内. `deg` 必须已归一化到 `[0, 360)`.
    pub fn contains_degree(&self, deg: f64) -> bool {
        if self.is_circle() {
            return true;
        } else if !(0.0..FULL_TURN).contains(&deg) {
            return false;
        }

        if self.from < self.to {
            (self.from..self.to).contains(&deg)
        } else {
            debug_assert!(self.to < self.from);
            deg >= self.from || deg < self.to
        }
    }

    /// 获取本扇区的角度.
    pub fn angle(&self) -> f64 {
        match self.to - self.from {
            d if d > 0.0 => d,
            d => {
                debug_assert_ne!(d, 0.0);
                FULL_TURN + d
            }
        }
    }

    /// 获取点 `point` 相对于 `self.center` 的角度. 取值范围为 `[0, 360)`.
    #[inline]
    pub fn degree_to(&self, point: Point2d) -> f64 {
        degree_between(self.center, point)
    }

    /// 该扇区是否是一个圆 (特殊情况)?
    #[inline]
    fn is_circle(&self) -> bool {
        self.to == FULL_TURN
    }
}
