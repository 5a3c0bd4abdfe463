//! 🫐欢迎光临🍒
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, ImageId, Point2d, Point3d};

pub use crate::frame::{to_image_frame, to_reference_frame, MissingSpatialMetadata};
pub use crate::{Acquisition, CmrImage, ImageProvider, SpatialAttr, SpatialMeta};
pub use crate::{Annotation, AnnotationProvider};
pub use crate::{Mask, OwnedMask};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::{landmark, structure, ElemType};

pub use crate::geometry::{to_mask, to_polygon, Geometry, OverlapCanvas, Polygon};
pub use crate::metrics::{dice, dice_or_nan, hausdorff, hausdorff_mm};

pub use crate::sorting::{
    sort, DepthTimeIndex, OrientationCheck, Protocol, SortCache, SortError, View,
};

pub use crate::clinical::{
    select_end_diastole, select_end_systole, Chamber, ChamberResults, PhaseSelector,
    VolumeIntegrator,
};

pub use crate::aha::{aha_segments, AhaConfig, AhaSegments, AhaSlice, LongAxisLandmarks};

pub use crate::sector::Sector;
