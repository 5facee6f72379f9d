//! Per-frame re-skinning: vertices in, renderer buffers out.
//!
//! A backend owns the buffers for one avatar and turns a vertex buffer into
//! fresh splat attributes. [`AvatarDriver`] pulls vertices from a
//! [`MeshSource`] once per tick and skips the tick when nothing new arrived.

use crate::config::ReskinConfig;
use crate::core::{
    build_face_frames_into, propagate_splats_into, FaceFrame, FrameError, MeshSource,
    PropagatedSplat, SplatBindingTable,
};
use crate::pack::SplatAttributeBuffers;
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReskinError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[cfg(feature = "gpu")]
    #[error(transparent)]
    Gpu(#[from] crate::gpu::GpuError),
}

/// Summary of one re-skinned frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames completed so far, including this one
    pub frame_index: u64,
    pub splats: usize,
    /// Faces clamped to a degenerate frame, when the backend counts them
    pub clamped_faces: Option<usize>,
}

/// Something that can re-skin an avatar for a new vertex buffer.
pub trait ReskinBackend {
    fn reskin(&mut self, vertices: &[Vector3<f32>]) -> Result<FrameStats, ReskinError>;

    /// Frames completed so far.
    fn frame_index(&self) -> u64;
}

/// CPU backend (rayon).
///
/// Intermediate buffers are kept between frames so steady-state frames do
/// not allocate.
#[derive(Debug)]
pub struct CpuReskinner {
    table: SplatBindingTable,
    config: ReskinConfig,
    frames: Vec<FaceFrame>,
    splats: Vec<PropagatedSplat>,
    buffers: SplatAttributeBuffers,
    frame_index: u64,
}

impl CpuReskinner {
    pub fn new(table: SplatBindingTable, config: ReskinConfig) -> Self {
        let buffers = SplatAttributeBuffers::new(&table);
        Self {
            frames: Vec::with_capacity(table.triangle_count()),
            splats: Vec::with_capacity(table.len()),
            table,
            config,
            buffers,
            frame_index: 0,
        }
    }

    pub fn table(&self) -> &SplatBindingTable {
        &self.table
    }

    pub fn config(&self) -> &ReskinConfig {
        &self.config
    }

    pub fn buffers(&self) -> &SplatAttributeBuffers {
        &self.buffers
    }

    /// Face frames of the last completed frame.
    pub fn face_frames(&self) -> &[FaceFrame] {
        &self.frames
    }

    /// World-space splats of the last completed frame.
    pub fn splats(&self) -> &[PropagatedSplat] {
        &self.splats
    }
}

impl ReskinBackend for CpuReskinner {
    fn reskin(&mut self, vertices: &[Vector3<f32>]) -> Result<FrameStats, ReskinError> {
        // Validate before touching any buffer so a bad frame leaves the last
        // good one in place.
        self.table.topology().check_vertices(vertices.len())?;

        let clamped =
            build_face_frames_into(vertices, self.table.topology(), &self.config, &mut self.frames)?;
        propagate_splats_into(
            &self.frames,
            &self.table,
            &self.config.scale_activation,
            &mut self.splats,
        )?;
        self.buffers.write_frame(&self.splats)?;
        self.frame_index += 1;

        Ok(FrameStats {
            frame_index: self.frame_index,
            splats: self.splats.len(),
            clamped_faces: Some(clamped),
        })
    }

    fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// Ties a mesh source to a backend.
pub struct AvatarDriver<S, B> {
    source: S,
    backend: B,
    skipped: u64,
}

impl<S: MeshSource, B: ReskinBackend> AvatarDriver<S, B> {
    pub fn new(source: S, backend: B) -> Self {
        Self {
            source,
            backend,
            skipped: 0,
        }
    }

    /// Run one tick. `Ok(None)` means no new vertices were available and the
    /// output buffers still hold the previous frame.
    pub fn tick(&mut self) -> Result<Option<FrameStats>, ReskinError> {
        let Some(vertices) = self.source.latest_vertices() else {
            self.skipped += 1;
            log::debug!("No baked vertices this tick ({} skipped so far)", self.skipped);
            return Ok(None);
        };

        let stats = self.backend.reskin(vertices)?;
        log::debug!(
            "Frame {}: {} splats, {} clamped faces",
            stats.frame_index,
            stats.splats,
            stats
                .clamped_faces
                .map_or_else(|| "n/a".to_string(), |c| c.to_string())
        );
        Ok(Some(stats))
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_parts(self) -> (S, B) {
        (self.source, self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BakedFrameQueue, BindingArrays, MeshTopology};

    fn table() -> SplatBindingTable {
        let arrays = BindingArrays {
            offsets: vec![[0.0; 3], [0.1, 0.0, 0.0]],
            rotations: vec![[1.0, 0.0, 0.0, 0.0]; 2],
            scales: vec![[0.0; 3]; 2],
            opacities: vec![1.0; 2],
            colors: vec![[1.0; 3]; 2],
            face_indices: vec![0, 0],
        };
        SplatBindingTable::from_arrays(arrays, MeshTopology::new(vec![[0, 1, 2]]).unwrap()).unwrap()
    }

    fn triangle(dx: f32) -> Vec<Vector3<f32>> {
        vec![
            Vector3::new(dx, 0.0, 0.0),
            Vector3::new(dx + 1.0, 0.0, 0.0),
            Vector3::new(dx, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_skipped_tick_keeps_buffers() {
        let mut queue = BakedFrameQueue::new();
        queue.push(triangle(0.0));
        let mut driver = AvatarDriver::new(queue, CpuReskinner::new(table(), ReskinConfig::default()));

        let stats = driver.tick().unwrap().unwrap();
        assert_eq!(stats.frame_index, 1);
        let before = driver.backend().buffers().positions().to_vec();

        assert_eq!(driver.tick().unwrap(), None);
        assert_eq!(driver.skipped_ticks(), 1);
        assert_eq!(driver.backend().buffers().positions(), &before[..]);
        assert_eq!(driver.backend().frame_index(), 1);
    }

    #[test]
    fn test_short_vertex_buffer_leaves_previous_frame() {
        let mut backend = CpuReskinner::new(table(), ReskinConfig::default());
        backend.reskin(&triangle(0.0)).unwrap();
        let before = backend.buffers().positions().to_vec();

        let err = backend.reskin(&triangle(5.0)[..2]).unwrap_err();
        assert!(matches!(err, ReskinError::Frame(FrameError::TooFewVertices { .. })));
        assert_eq!(backend.buffers().positions(), &before[..]);
    }

    #[test]
    fn test_frame_follows_vertices() {
        let mut backend = CpuReskinner::new(table(), ReskinConfig::default());
        backend.reskin(&triangle(0.0)).unwrap();
        let a = backend.buffers().positions()[0];
        backend.reskin(&triangle(2.0)).unwrap();
        let b = backend.buffers().positions()[0];
        assert!((b[0] - a[0] - 2.0).abs() < 1e-5);
    }
}
