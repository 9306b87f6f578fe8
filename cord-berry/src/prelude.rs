//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx2dF, Idx3d};

pub use crate::data::slice::{ImgWriteRaw, ImgWriteVis, OwnedSegSlice, SegSlice, SegSliceMut};
pub use crate::data::{CordSeg, MriScan, NiftiHeaderAttr};

pub use crate::consts::gray::{SEG_BACKGROUND, SEG_CORD};
pub use crate::consts::{AXIS_SWAP_DEG, MISSING};

pub use crate::centerline::{Centerline, CenterlineError, FitConfig};
pub use crate::fitting::CurveType;
pub use crate::imgproc::Threshold;
pub use crate::shape::{
    PropertySeries, ShapeConfig, ShapeError, ShapeProperties, ShapeProperty,
};
