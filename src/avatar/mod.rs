//! Runtime side of an avatar: driving re-skinning each frame, pose playback
//! and the registry the renderer draws from.

mod joints;
mod pose_switch;
mod registry;
mod reskin;

pub use joints::{JointError, JointTable, SMPLX_BODY_JOINTS};
pub use pose_switch::{PoseSwitcher, PoseTarget, SwitchState};
pub use registry::{
    DrawItem, DrawSetup, InstanceSource, MaterialKind, RenderMode, SplatHandle, SplatObject,
    SplatRenderRegistry,
};
pub use reskin::{AvatarDriver, CpuReskinner, FrameStats, ReskinBackend, ReskinError};
