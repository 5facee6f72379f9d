//! Packing propagated splats into the splat renderer's buffer layouts.

mod rotation;
mod writer;

pub use rotation::{decode_rotation, encode_rotation};
pub use writer::{
    OtherData, SplatAttributeBuffers, COLOR_STRIDE, OTHER_DATA_STRIDE, POSITION_STRIDE,
};
