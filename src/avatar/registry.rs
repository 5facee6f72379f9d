//! Registry of splat avatars the renderer draws each frame.
//!
//! Owned by whoever owns the renderer. Avatars register once and get a
//! [`SplatHandle`] back; dropping out of the scene means handing that handle
//! back to [`SplatRenderRegistry::unregister`]. Per camera,
//! [`SplatRenderRegistry::prepare_frame`] picks the drawable avatars, orders
//! them nearest first (ascending view-space depth) and resolves each one's
//! draw setup.

use crate::core::{Camera, CameraKind};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an avatar's splats are displayed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    #[default]
    Splats,
    DebugPoints,
    DebugPointIndices,
    DebugBoxes,
    DebugChunkBounds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    Splats,
    DebugPoints,
    DebugBoxes,
}

/// What the instance count of a draw is taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceSource {
    Splats,
    Chunks,
}

/// Static draw parameters of a render mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawSetup {
    pub material: MaterialKind,
    /// Indices per instance: a quad per splat, a cube per box
    pub index_count: u32,
    pub instances: InstanceSource,
    pub display_index: bool,
    pub display_chunks: bool,
}

const DRAW_SETUPS: [(RenderMode, DrawSetup); 5] = [
    (
        RenderMode::Splats,
        DrawSetup {
            material: MaterialKind::Splats,
            index_count: 6,
            instances: InstanceSource::Splats,
            display_index: false,
            display_chunks: false,
        },
    ),
    (
        RenderMode::DebugPoints,
        DrawSetup {
            material: MaterialKind::DebugPoints,
            index_count: 6,
            instances: InstanceSource::Splats,
            display_index: false,
            display_chunks: false,
        },
    ),
    (
        RenderMode::DebugPointIndices,
        DrawSetup {
            material: MaterialKind::DebugPoints,
            index_count: 6,
            instances: InstanceSource::Splats,
            display_index: true,
            display_chunks: false,
        },
    ),
    (
        RenderMode::DebugBoxes,
        DrawSetup {
            material: MaterialKind::DebugBoxes,
            index_count: 36,
            instances: InstanceSource::Splats,
            display_index: false,
            display_chunks: false,
        },
    ),
    (
        RenderMode::DebugChunkBounds,
        DrawSetup {
            material: MaterialKind::DebugBoxes,
            index_count: 36,
            instances: InstanceSource::Chunks,
            display_index: false,
            display_chunks: true,
        },
    ),
];

impl RenderMode {
    pub const ALL: [RenderMode; 5] = [
        RenderMode::Splats,
        RenderMode::DebugPoints,
        RenderMode::DebugPointIndices,
        RenderMode::DebugBoxes,
        RenderMode::DebugChunkBounds,
    ];

    pub fn draw_setup(self) -> DrawSetup {
        DRAW_SETUPS[self as usize].1
    }
}

/// Proof of registration. Not `Clone`: exactly one owner can unregister.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SplatHandle(u64);

impl SplatHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Per-avatar render state tracked by the registry.
#[derive(Clone, Debug)]
pub struct SplatObject {
    /// World-space anchor used for depth ordering
    pub position: Vector3<f32>,
    pub splat_count: u32,
    /// Valid chunk count, if the asset carries chunk bounds
    pub chunk_count: Option<u32>,
    pub render_mode: RenderMode,
    /// Re-sort splats every n-th frame this avatar is drawn
    pub sort_every_nth_frame: u32,
    pub active: bool,
    pub has_valid_asset: bool,
    frame_counter: u64,
}

impl SplatObject {
    pub fn new(position: Vector3<f32>, splat_count: u32) -> Self {
        Self {
            position,
            splat_count,
            chunk_count: None,
            render_mode: RenderMode::default(),
            sort_every_nth_frame: 1,
            active: true,
            has_valid_asset: true,
            frame_counter: 0,
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frame_counter
    }

    fn drawable(&self) -> bool {
        self.active && self.has_valid_asset && self.splat_count > 0
    }
}

/// One avatar's draw for the current camera.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub handle_id: u64,
    pub depth: f32,
    /// Whether the splat sort runs before this draw
    pub sort_splats: bool,
    pub setup: DrawSetup,
    pub instance_count: u32,
}

#[derive(Debug, Default)]
pub struct SplatRenderRegistry {
    objects: BTreeMap<u64, SplatObject>,
    next_id: u64,
}

impl SplatRenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, object: SplatObject) -> SplatHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        log::debug!("Registered splat object {id} ({} live)", self.objects.len());
        SplatHandle(id)
    }

    /// Remove an avatar, returning its last state.
    pub fn unregister(&mut self, handle: SplatHandle) -> Option<SplatObject> {
        let removed = self.objects.remove(&handle.0);
        log::debug!("Unregistered splat object {} ({} live)", handle.0, self.objects.len());
        removed
    }

    pub fn get(&self, handle: &SplatHandle) -> Option<&SplatObject> {
        self.objects.get(&handle.0)
    }

    pub fn get_mut(&mut self, handle: &SplatHandle) -> Option<&mut SplatObject> {
        self.objects.get_mut(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drawable avatars ordered by camera-space depth, nearest first.
    ///
    /// Preview cameras see nothing.
    pub fn gather_for_camera(&self, camera: &Camera) -> Vec<(u64, f32)> {
        if camera.kind == CameraKind::Preview {
            return Vec::new();
        }

        let mut gathered: Vec<(u64, f32)> = self
            .objects
            .iter()
            .filter(|(_, o)| o.drawable())
            .map(|(&id, o)| (id, camera.depth_of(&o.position)))
            .collect();

        gathered.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        gathered
    }

    /// Resolve the draws for one camera and advance per-avatar frame counters.
    pub fn prepare_frame(&mut self, camera: &Camera) -> Vec<DrawItem> {
        let gathered = self.gather_for_camera(camera);
        let mut items = Vec::with_capacity(gathered.len());

        for (id, depth) in gathered {
            let Some(object) = self.objects.get_mut(&id) else {
                continue;
            };

            let nth = u64::from(object.sort_every_nth_frame.max(1));
            let sort_splats = object.frame_counter % nth == 0;
            object.frame_counter += 1;

            let setup = object.render_mode.draw_setup();
            let instance_count = match setup.instances {
                InstanceSource::Splats => object.splat_count,
                InstanceSource::Chunks => object.chunk_count.unwrap_or(0),
            };

            items.push(DrawItem {
                handle_id: id,
                depth,
                sort_splats,
                setup,
                instance_count,
            });
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    #[test]
    fn test_table_matches_enum_order() {
        for mode in RenderMode::ALL {
            assert_eq!(DRAW_SETUPS[mode as usize].0, mode);
        }
    }

    #[test]
    fn test_draw_setups() {
        assert_eq!(RenderMode::Splats.draw_setup().index_count, 6);
        assert_eq!(RenderMode::DebugBoxes.draw_setup().index_count, 36);
        assert_eq!(RenderMode::DebugPointIndices.draw_setup().material, MaterialKind::DebugPoints);
        assert!(RenderMode::DebugPointIndices.draw_setup().display_index);
        assert!(RenderMode::DebugChunkBounds.draw_setup().display_chunks);
        assert_eq!(RenderMode::DebugChunkBounds.draw_setup().instances, InstanceSource::Chunks);
    }

    #[test]
    fn test_preview_camera_gathers_nothing() {
        let mut registry = SplatRenderRegistry::new();
        let _h = registry.register(SplatObject::new(Vector3::zeros(), 10));
        let cam = Camera::preview(Matrix3::identity(), Vector3::zeros());
        assert!(registry.prepare_frame(&cam).is_empty());
    }

    #[test]
    fn test_sort_every_nth_frame() {
        let mut registry = SplatRenderRegistry::new();
        let mut object = SplatObject::new(Vector3::new(0.0, 0.0, 1.0), 10);
        object.sort_every_nth_frame = 3;
        let handle = registry.register(object);
        let cam = Camera::new(Matrix3::identity(), Vector3::zeros());

        let sorted: Vec<bool> = (0..6).map(|_| registry.prepare_frame(&cam)[0].sort_splats).collect();
        assert_eq!(sorted, vec![true, false, false, true, false, false]);
        assert_eq!(registry.get(&handle).unwrap().frames_drawn(), 6);
    }

    #[test]
    fn test_chunk_bounds_without_chunks_draws_zero_instances() {
        let mut registry = SplatRenderRegistry::new();
        let mut object = SplatObject::new(Vector3::zeros(), 10);
        object.render_mode = RenderMode::DebugChunkBounds;
        registry.register(object);
        let cam = Camera::new(Matrix3::identity(), Vector3::zeros());
        assert_eq!(registry.prepare_frame(&cam)[0].instance_count, 0);
    }
}
