//! 收缩末期 (ES) / 舒张末期 (ED) 相位选取.
//!
//! 某些相位可能因为缺少轮廓而得到 0 甚至负的体积. ES 只考虑 `V - V_subtract > 0` 的相位,
//! 这样不会选中一个 "空" 相位. ED 在所有有限差值上取最大者, 只要曲线上存在轮廓.
//! NaN 从不参与比较.

use std::cmp::Reverse;

use ordered_float::NotNan;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::VolumeIntegrator;
use crate::{AnnotationProvider, ImageProvider};

/// 选取目标.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extremum {
    /// 收缩末期: 最小的正体积.
    Systole,

    /// 舒张末期: 最大体积.
    Diastole,
}

/// `diff[p] = curve[p] - subtract[p]` 中所有非 NaN 的值.
fn differences<'a>(
    curve: &'a [f64],
    subtract: Option<&'a [f64]>,
) -> impl Iterator<Item = (usize, NotNan<f64>)> + 'a {
    curve.iter().enumerate().filter_map(move |(p, &v)| {
        let sub = subtract.and_then(|s| s.get(p).copied()).unwrap_or(0.0);
        NotNan::new(v - sub).ok().map(|d| (p, d))
    })
}

/// 收缩末期: 有效相位中差值最小者 (并列时取第一个). 没有有效相位时返回 `None`.
pub fn select_end_systole(curve: &[f64], subtract: Option<&[f64]>) -> Option<usize> {
    differences(curve, subtract)
        .filter(|&(_, d)| *d > 0.0)
        .min_by_key(|&(_, d)| d)
        .map(|(p, _)| p)
}

/// 舒张末期: 所有相位中差值最大者 (并列时取第一个), 差值不必为正.
/// 曲线上没有任何正体积 (即没有轮廓) 时返回 `None`.
pub fn select_end_diastole(curve: &[f64], subtract: Option<&[f64]>) -> Option<usize> {
    if !curve.iter().any(|&v| v > 0.0) {
        return None;
    }
    differences(curve, subtract)
        .min_by_key(|&(_, d)| Reverse(d))
        .map(|(p, _)| p)
}

/// 按目标分发到 [`select_end_systole`] 或 [`select_end_diastole`].
#[inline]
pub fn select_phase(extremum: Extremum, curve: &[f64], subtract: Option<&[f64]>) -> Option<usize> {
    match extremum {
        Extremum::Systole => select_end_systole(curve, subtract),
        Extremum::Diastole => select_end_diastole(curve, subtract),
    }
}

/// 参数化的相位选择器: 结构名, 需要扣除的结构名与选取目标.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSelector {
    /// 体积曲线所属的结构.
    pub structure: String,

    /// 需要从体积中扣除的结构 (例如乳头肌).
    pub subtract: Option<String>,

    /// 选取目标.
    pub extremum: Extremum,
}

impl PhaseSelector {
    /// 直接初始化.
    pub fn new(structure: impl Into<String>, subtract: Option<&str>, extremum: Extremum) -> Self {
        Self {
            structure: structure.into(),
            subtract: subtract.map(str::to_string),
            extremum,
        }
    }

    /// 结构 `structure` 的收缩末期选择器.
    #[inline]
    pub fn end_systole(structure: impl Into<String>) -> Self {
        Self::new(structure, None, Extremum::Systole)
    }

    /// 结构 `structure` 的舒张末期选择器.
    #[inline]
    pub fn end_diastole(structure: impl Into<String>) -> Self {
        Self::new(structure, None, Extremum::Diastole)
    }

    /// 设置需要扣除的结构.
    #[inline]
    pub fn subtracting(mut self, structure: impl Into<String>) -> Self {
        self.subtract = Some(structure.into());
        self
    }

    /// 对给定曲线选取相位.
    #[inline]
    pub fn select_from(&self, curve: &[f64], subtract: Option<&[f64]>) -> Option<usize> {
        select_phase(self.extremum, curve, subtract)
    }

    /// 由积分器计算体积曲线并选取相位.
    pub fn select<I, A>(&self, integrator: &VolumeIntegrator<'_, I, A>) -> Option<usize>
    where
        I: ImageProvider,
        A: AnnotationProvider,
    {
        let curve = integrator.volume_curve(&self.structure);
        let sub = self
            .subtract
            .as_deref()
            .map(|s| integrator.volume_curve(s));
        self.select_from(&curve, sub.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_positive_and_global_max() {
        let curve = [10.0, 40.0, 5.0, 35.0];
        assert_eq!(select_end_systole(&curve, None), Some(2));
        assert_eq!(select_end_diastole(&curve, None), Some(1));
    }

    #[test]
    fn test_all_zero_is_undefined() {
        let curve = [0.0; 4];
        assert_eq!(select_end_systole(&curve, None), None);
        assert_eq!(select_end_diastole(&curve, None), None);
        assert_eq!(select_end_systole(&[], None), None);
    }

    #[test]
    fn test_empty_phase_never_systole() {
        let curve = [30.0, 0.0, 12.0, f64::NAN, 20.0];
        assert_eq!(select_end_systole(&curve, None), Some(2));
        assert_eq!(select_end_diastole(&curve, None), Some(0));
    }

    #[test]
    fn test_subtract_curve() {
        let curve = [10.0, 40.0, 5.0, 35.0];
        let pamu = [1.0, 2.0, 5.0, 1.0];
        // 相位 2 扣除后为 0, 不再有效.
        assert_eq!(select_end_systole(&curve, Some(&pamu)), Some(0));
        assert_eq!(select_end_diastole(&curve, Some(&pamu)), Some(1));
    }

    #[test]
    fn test_diastole_without_positive_difference() {
        // 扣除后所有差值都不为正, ES 无定义, ED 仍取最大差值.
        let curve = [3.0, 4.0, 2.0];
        let pamu = [5.0, 9.0, 6.0];
        assert_eq!(select_end_systole(&curve, Some(&pamu)), None);
        assert_eq!(select_end_diastole(&curve, Some(&pamu)), Some(0));

        let curve = [0.0, f64::NAN, 0.0];
        assert_eq!(select_end_diastole(&curve, Some(&[1.0, 0.0, 2.0])), None);
    }

    #[test]
    fn test_ties_take_first() {
        let curve = [7.0, 3.0, 9.0, 3.0, 9.0];
        assert_eq!(select_end_systole(&curve, None), Some(1));
        assert_eq!(select_end_diastole(&curve, None), Some(2));
    }

    #[test]
    fn test_selector_dispatch() {
        let curve = [10.0, 40.0, 5.0, 35.0];
        let es = PhaseSelector::end_systole("lv_endo").subtracting("lv_pamu");
        assert_eq!(es.subtract.as_deref(), Some("lv_pamu"));
        assert_eq!(es.select_from(&curve, None), Some(2));
        assert_eq!(PhaseSelector::end_diastole("lv_endo").select_from(&curve, None), Some(1));
    }
}
