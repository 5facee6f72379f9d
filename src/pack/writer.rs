//! Renderer-facing splat attribute buffers.
//!
//! Three flat arrays, all indexed by splat:
//! - positions: `[f32; 3]` per splat, tightly packed (12 bytes)
//! - other data: packed rotation + scale (16 bytes), see [`OtherData`]
//! - colors: `[r, g, b, opacity]` (16 bytes), static after load
//!
//! Splat i always occupies slot i. The count is fixed when the buffers are
//! created, so renderer-side caches keyed by index stay valid across frames.

use crate::core::{FrameError, PropagatedSplat, SplatBindingTable};
use crate::pack::rotation::encode_rotation;
use nalgebra::UnitQuaternion;
use rayon::prelude::*;

/// Bytes per splat in the position buffer.
pub const POSITION_STRIDE: usize = 12;

/// Bytes per splat in the other-data buffer.
pub const OTHER_DATA_STRIDE: usize = 16;

/// Bytes per splat in the color buffer.
pub const COLOR_STRIDE: usize = 16;

/// Rotation and scale of one splat, as the renderer reads them.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OtherData {
    /// 10.10.10.2 packed rotation
    pub rotation: u32,

    /// World-space scale
    pub scale: [f32; 3],
}

impl OtherData {
    pub fn from_splat(splat: &PropagatedSplat) -> Self {
        Self {
            rotation: encode_rotation(&splat.world_rotation),
            scale: splat.world_scale.into(),
        }
    }
}

/// Output buffers for one avatar.
#[derive(Clone, Debug)]
pub struct SplatAttributeBuffers {
    positions: Vec<[f32; 3]>,
    other: Vec<OtherData>,
    colors: Vec<[f32; 4]>,
}

impl SplatAttributeBuffers {
    /// Allocate buffers for every splat of `table`.
    ///
    /// Positions and other data start zeroed; colors are filled from the
    /// bindings and never change afterwards.
    pub fn new(table: &SplatBindingTable) -> Self {
        let n = table.len();
        let colors = table
            .bindings()
            .iter()
            .map(|b| [b.color.x, b.color.y, b.color.z, b.opacity])
            .collect();

        Self {
            positions: vec![[0.0; 3]; n],
            other: vec![
                OtherData {
                    rotation: encode_rotation(&UnitQuaternion::identity()),
                    scale: [0.0; 3],
                };
                n
            ],
            colors,
        }
    }

    /// Number of splats.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Overwrite positions and other data with this frame's splats.
    ///
    /// Fails without touching the buffers if the splat count differs.
    pub fn write_frame(&mut self, splats: &[PropagatedSplat]) -> Result<(), FrameError> {
        if splats.len() != self.len() {
            return Err(FrameError::SplatCountMismatch {
                expected: self.len(),
                actual: splats.len(),
            });
        }

        self.positions
            .par_iter_mut()
            .zip(self.other.par_iter_mut())
            .zip(splats.par_iter())
            .for_each(|((pos, other), splat)| {
                *pos = splat.world_position.into();
                *other = OtherData::from_splat(splat);
            });
        Ok(())
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn other_data(&self) -> &[OtherData] {
        &self.other
    }

    pub fn colors(&self) -> &[[f32; 4]] {
        &self.colors
    }

    /// Position buffer as raw bytes, ready for upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn other_data_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.other)
    }

    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BindingArrays, MeshTopology};
    use nalgebra::Vector3;

    fn table(n: usize) -> SplatBindingTable {
        let arrays = BindingArrays {
            offsets: vec![[0.0; 3]; n],
            rotations: vec![[1.0, 0.0, 0.0, 0.0]; n],
            scales: vec![[0.0; 3]; n],
            opacities: (0..n).map(|i| i as f32 / n as f32).collect(),
            colors: vec![[0.2, 0.4, 0.6]; n],
            face_indices: vec![0; n],
        };
        let topology = MeshTopology::new(vec![[0, 1, 2]]).unwrap();
        SplatBindingTable::from_arrays(arrays, topology).unwrap()
    }

    #[test]
    fn test_strides_match_layout() {
        assert_eq!(std::mem::size_of::<OtherData>(), OTHER_DATA_STRIDE);
        assert_eq!(std::mem::size_of::<[f32; 3]>(), POSITION_STRIDE);
        assert_eq!(std::mem::size_of::<[f32; 4]>(), COLOR_STRIDE);
    }

    #[test]
    fn test_byte_lengths() {
        let buffers = SplatAttributeBuffers::new(&table(5));
        assert_eq!(buffers.position_bytes().len(), 5 * POSITION_STRIDE);
        assert_eq!(buffers.other_data_bytes().len(), 5 * OTHER_DATA_STRIDE);
        assert_eq!(buffers.color_bytes().len(), 5 * COLOR_STRIDE);
    }

    #[test]
    fn test_colors_carry_opacity() {
        let buffers = SplatAttributeBuffers::new(&table(4));
        assert_eq!(buffers.colors()[2], [0.2, 0.4, 0.6, 0.5]);
    }

    #[test]
    fn test_write_frame_keeps_order() {
        let mut buffers = SplatAttributeBuffers::new(&table(3));
        let splats: Vec<_> = (0..3)
            .map(|i| PropagatedSplat {
                world_position: Vector3::new(i as f32, 0.0, 0.0),
                world_rotation: UnitQuaternion::identity(),
                world_scale: Vector3::repeat(0.1 * i as f32),
            })
            .collect();
        buffers.write_frame(&splats).unwrap();

        for (i, pos) in buffers.positions().iter().enumerate() {
            assert_eq!(pos[0], i as f32);
            assert_eq!(buffers.other_data()[i].scale[0], 0.1 * i as f32);
        }
    }

    #[test]
    fn test_write_frame_rejects_count_change() {
        let mut buffers = SplatAttributeBuffers::new(&table(3));
        let err = buffers.write_frame(&[]).unwrap_err();
        assert_eq!(err, FrameError::SplatCountMismatch { expected: 3, actual: 0 });
        assert_eq!(buffers.len(), 3);
    }
}
