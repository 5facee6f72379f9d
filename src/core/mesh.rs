//! Mesh topology and the per-frame vertex source.
//!
//! The skinning system that deforms the body mesh lives outside this crate.
//! All the re-skinning pipeline needs from it is a fixed triangle list and,
//! once per frame, the latest baked vertex positions.

use nalgebra::Vector3;
use std::collections::VecDeque;
use thiserror::Error;

/// Three vertex indices of one triangle.
pub type Triangle = [u32; 3];

/// Errors raised while validating mesh topology at load time.
#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("triangle list is empty")]
    Empty,

    #[error("triangle {triangle} references vertex {vertex} but the mesh has {vertex_count} vertices")]
    VertexOutOfRange {
        triangle: usize,
        vertex: u32,
        vertex_count: usize,
    },
}

/// Errors raised per frame when the supplied vertex buffer does not fit the topology.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("vertex buffer has {actual} vertices but the topology needs at least {required}")]
    TooFewVertices { required: usize, actual: usize },

    #[error("expected {expected} propagated splats, got {actual}")]
    SplatCountMismatch { expected: usize, actual: usize },

    #[error("expected {expected} face frames, got {actual}")]
    FaceFrameCountMismatch { expected: usize, actual: usize },
}

/// Immutable triangle list of the body mesh.
#[derive(Clone, Debug)]
pub struct MeshTopology {
    triangles: Vec<Triangle>,
    required_vertices: usize,
}

impl MeshTopology {
    /// Build a topology from a triangle list.
    ///
    /// The vertex count is inferred from the largest referenced index.
    pub fn new(triangles: Vec<Triangle>) -> Result<Self, TopologyError> {
        if triangles.is_empty() {
            return Err(TopologyError::Empty);
        }

        let required_vertices = triangles
            .iter()
            .flat_map(|t| t.iter())
            .map(|&v| v as usize + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            triangles,
            required_vertices,
        })
    }

    /// Build a topology and check every index against a known vertex count.
    pub fn with_vertex_count(
        triangles: Vec<Triangle>,
        vertex_count: usize,
    ) -> Result<Self, TopologyError> {
        for (triangle, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(TopologyError::VertexOutOfRange {
                    triangle,
                    vertex,
                    vertex_count,
                });
            }
        }
        Self::new(triangles)
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Smallest vertex buffer this topology can be evaluated against.
    pub fn required_vertex_count(&self) -> usize {
        self.required_vertices
    }

    /// O(1) per-frame guard before indexing into a vertex buffer.
    pub fn check_vertices(&self, vertex_count: usize) -> Result<(), FrameError> {
        if vertex_count < self.required_vertices {
            return Err(FrameError::TooFewVertices {
                required: self.required_vertices,
                actual: vertex_count,
            });
        }
        Ok(())
    }
}

/// Supplier of baked, skinned vertex positions.
///
/// `None` means no fresh vertices are available this frame; the pipeline then
/// skips the frame and the output buffers keep their previous contents.
pub trait MeshSource {
    fn latest_vertices(&mut self) -> Option<&[Vector3<f32>]>;
}

/// A mesh that never deforms: every frame sees the same vertices.
#[derive(Clone, Debug)]
pub struct StaticMesh {
    vertices: Vec<Vector3<f32>>,
}

impl StaticMesh {
    pub fn new(vertices: Vec<Vector3<f32>>) -> Self {
        Self { vertices }
    }
}

impl MeshSource for StaticMesh {
    fn latest_vertices(&mut self) -> Option<&[Vector3<f32>]> {
        Some(&self.vertices)
    }
}

/// Queue of baked frames handed over by a skinning system running elsewhere.
///
/// Each call to `latest_vertices` drains the queue and keeps only the newest
/// frame; older frames baked since the last call are dropped.
#[derive(Clone, Debug, Default)]
pub struct BakedFrameQueue {
    pending: VecDeque<Vec<Vector3<f32>>>,
    current: Vec<Vector3<f32>>,
}

impl BakedFrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a freshly baked vertex buffer.
    pub fn push(&mut self, vertices: Vec<Vector3<f32>>) {
        self.pending.push_back(vertices);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl MeshSource for BakedFrameQueue {
    fn latest_vertices(&mut self) -> Option<&[Vector3<f32>]> {
        let newest = self.pending.drain(..).last()?;
        self.current = newest;
        Some(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_topology_rejected() {
        assert_eq!(MeshTopology::new(vec![]).unwrap_err(), TopologyError::Empty);
    }

    #[test]
    fn test_required_vertices_from_max_index() {
        let topo = MeshTopology::new(vec![[0, 1, 2], [2, 7, 3]]).unwrap();
        assert_eq!(topo.required_vertex_count(), 8);
        assert!(topo.check_vertices(8).is_ok());
        assert_eq!(
            topo.check_vertices(7),
            Err(FrameError::TooFewVertices {
                required: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn test_vertex_out_of_range_rejected() {
        let err = MeshTopology::with_vertex_count(vec![[0, 1, 2], [1, 2, 3]], 3).unwrap_err();
        assert_eq!(
            err,
            TopologyError::VertexOutOfRange {
                triangle: 1,
                vertex: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn test_frame_queue_yields_newest_frame() {
        let mut queue = BakedFrameQueue::new();
        queue.push(vec![Vector3::new(1.0, 0.0, 0.0)]);
        queue.push(vec![Vector3::new(2.0, 0.0, 0.0)]);

        assert_eq!(queue.latest_vertices().unwrap()[0].x, 2.0);
        assert_eq!(queue.pending(), 0);
        assert!(queue.latest_vertices().is_none());

        queue.push(vec![Vector3::new(3.0, 0.0, 0.0)]);
        assert_eq!(queue.latest_vertices().unwrap()[0].x, 3.0);
    }
}
