//! 心室功能参数: EDV, ESV, SV, EF 与心肌质量.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{select_end_diastole, select_end_systole, VolumeIntegrator};
use crate::consts::structure::{LV_ENDO, LV_MYO, LV_PAMU, RV_ENDO, RV_MYO, RV_PAMU};
use crate::consts::MYOCARDIAL_DENSITY;
use crate::{AnnotationProvider, ImageProvider};

/// 心室.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chamber {
    /// 左心室.
    Left,

    /// 右心室.
    Right,
}

impl Chamber {
    /// 心内膜 (血池) 结构名.
    pub fn endo(self) -> &'static str {
        match self {
            Chamber::Left => LV_ENDO,
            Chamber::Right => RV_ENDO,
        }
    }

    /// 心肌结构名.
    pub fn myo(self) -> &'static str {
        match self {
            Chamber::Left => LV_MYO,
            Chamber::Right => RV_MYO,
        }
    }

    /// 乳头肌结构名.
    pub fn pamu(self) -> &'static str {
        match self {
            Chamber::Left => LV_PAMU,
            Chamber::Right => RV_PAMU,
        }
    }
}

/// 一个心室的功能参数. 体积以毫升, 质量以克, EF 以百分比为单位.
///
/// 无法定义的值为 `None`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChamberResults {
    /// 舒张末期相位.
    pub ed_phase: Option<usize>,

    /// 收缩末期相位.
    pub es_phase: Option<usize>,

    /// 舒张末期容积.
    pub edv: Option<f64>,

    /// 收缩末期容积.
    pub esv: Option<f64>,

    /// 每搏输出量 `EDV - ESV`.
    pub sv: Option<f64>,

    /// 射血分数 `100 * SV / EDV`.
    pub ef: Option<f64>,

    /// 舒张末期心肌质量 (含乳头肌).
    pub mass: Option<f64>,
}

impl ChamberResults {
    /// 由体积积分器计算心室 `chamber` 的参数.
    ///
    /// 血池容积扣除乳头肌, 心肌质量计入乳头肌.
    pub fn compute<I, A>(integrator: &VolumeIntegrator<'_, I, A>, chamber: Chamber) -> Self
    where
        I: ImageProvider,
        A: AnnotationProvider,
    {
        let endo = integrator.volume_curve(chamber.endo());
        let pamu = integrator.volume_curve(chamber.pamu());
        let blood = |p: usize| endo[p] - pamu[p];

        let ed_phase = select_end_diastole(&endo, Some(&pamu));
        let es_phase = select_end_systole(&endo, Some(&pamu));
        let edv = ed_phase.map(blood);
        let esv = es_phase.map(blood);

        let sv = edv.zip(esv).map(|(ed, es)| ed - es);
        let ef = edv
            .zip(sv)
            .filter(|&(ed, _)| ed > 0.0)
            .map(|(ed, sv)| 100.0 * sv / ed);

        let mass = ed_phase
            .map(|p| {
                (integrator.volume(chamber.myo(), p) + pamu[p]) * MYOCARDIAL_DENSITY
            })
            .filter(|&m| m > 0.0);

        Self {
            ed_phase,
            es_phase,
            edv,
            esv,
            sv,
            ef,
            mass,
        }
    }
}
