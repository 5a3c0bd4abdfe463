//! 通用常量.

/// 单通道掩膜颜色.
pub mod gray {
    /// 掩膜中背景的像素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜中前景 (轮廓内部) 的像素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }

    /// 像素是否是前景? 任何非零值都被视为前景.
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }
}

/// 标注中的结构名称.
pub mod structure {
    /// 左心室心内膜 (血池).
    pub const LV_ENDO: &str = "lv_endo";

    /// 左心室心肌.
    pub const LV_MYO: &str = "lv_myo";

    /// 左心室乳头肌.
    pub const LV_PAMU: &str = "lv_pamu";

    /// 右心室心内膜 (血池).
    pub const RV_ENDO: &str = "rv_endo";

    /// 右心室心肌.
    pub const RV_MYO: &str = "rv_myo";

    /// 右心室乳头肌.
    pub const RV_PAMU: &str = "rv_pamu";

    /// 左心房.
    pub const LA: &str = "la";

    /// 右心房.
    pub const RA: &str = "ra";
}

/// 标注中的解剖学标志点名称.
pub mod landmark {
    /// 短轴切片上的 AHA 参考点 (前侧右心室插入点).
    pub const SAX_REFERENCE: &str = "sax_ref";

    /// 长轴图像上左心室范围的第一个二尖瓣环点.
    pub const LAX_EXTENT_1: &str = "lv_lax_extent_1";

    /// 长轴图像上左心室范围的第二个二尖瓣环点.
    pub const LAX_EXTENT_2: &str = "lv_lax_extent_2";

    /// 长轴图像上的左心室心尖.
    pub const LAX_APEX: &str = "lv_lax_apex";
}

/// 心肌密度, 单位为 g/ml.
pub const MYOCARDIAL_DENSITY: f64 = 1.05;

/// 两个切片位置之差小于该值 (单位: 毫米) 时, 被视为同一深度.
pub const LOCATION_TOLERANCE: f64 = 0.01;

/// 立方毫米到毫升的换算系数.
pub const MM3_PER_ML: f64 = 1000.0;

/// 轮廓类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_BACKGROUND`, 代表背景.
    Background,

    /// 其它值, 代表前景.
    Foreground,
}

impl ElemType {
    /// 由像素值判断类型.
    #[inline]
    pub const fn of(p: u8) -> Self {
        if gray::is_foreground(p) {
            Self::Foreground
        } else {
            Self::Background
        }
    }

    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }
}
