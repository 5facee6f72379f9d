//! SMPL-X pose files.
//!
//! One JSON file per frame:
//!
//! ```json
//! { "body_pose": [[x, y, z], ...], "root_pose": [x, y, z] }
//! ```
//!
//! Every entry is a rotation vector (axis × angle in radians). A directory of
//! such files is played back in numeric file-stem order (`0.json`,
//! `1.json`, ..., `10.json`); stems that are not integers sort last.

use crate::avatar::{JointError, JointTable};
use crate::core::AxisConvention;
use crate::io::haha::ImportError;
use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct PoseFile {
    body_pose: Vec<Vec<f32>>,
    root_pose: Vec<f32>,
}

/// One frame of joint rotations.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseFrame {
    pub root: UnitQuaternion<f32>,

    /// Local rotation per body joint, in pose-file order
    pub body: Vec<UnitQuaternion<f32>>,
}

impl PoseFrame {
    /// The rest pose for `joint_count` body joints.
    pub fn rest(joint_count: usize) -> Self {
        Self {
            root: UnitQuaternion::identity(),
            body: vec![UnitQuaternion::identity(); joint_count],
        }
    }

    pub fn from_rotation_vectors(
        root: &Vector3<f32>,
        body: &[Vector3<f32>],
        convention: AxisConvention,
    ) -> Self {
        Self {
            root: convention.rotation_from_vector(root),
            body: body
                .iter()
                .map(|v| convention.rotation_from_vector(v))
                .collect(),
        }
    }

    /// Pair each body rotation with its joint name.
    ///
    /// A pose one shorter than the table omits the root joint (which is
    /// driven by `root`), so it is matched against the table from index 1.
    pub fn named_rotations<'a>(
        &self,
        joints: &'a JointTable,
    ) -> Result<Vec<(&'a str, UnitQuaternion<f32>)>, JointError> {
        let skip = match self.body.len() {
            n if n == joints.len() => 0,
            n if n + 1 == joints.len() => 1,
            n if n > joints.len() => {
                return Err(JointError::TooManyJoints {
                    actual: n,
                    max: joints.len(),
                })
            }
            _ => 0,
        };

        Ok(self
            .body
            .iter()
            .enumerate()
            .filter_map(|(i, q)| joints.name(i + skip).map(|name| (name, *q)))
            .collect())
    }
}

fn vector3(field: &'static str, values: &[f32]) -> Result<Vector3<f32>, ImportError> {
    match values {
        [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => Ok(Vector3::new(*x, *y, *z)),
        [_, _, _] => Err(ImportError::Malformed {
            field,
            reason: "non-finite rotation vector".to_string(),
        }),
        _ => Err(ImportError::Malformed {
            field,
            reason: format!("expected [x, y, z], got {} values", values.len()),
        }),
    }
}

/// Parse one pose frame from JSON.
pub fn parse_pose_frame(json: &str, convention: AxisConvention) -> Result<PoseFrame, ImportError> {
    let file: PoseFile = serde_json::from_str(json)?;
    pose_from_file(file, convention)
}

fn pose_from_file(file: PoseFile, convention: AxisConvention) -> Result<PoseFrame, ImportError> {
    let root = vector3("root_pose", &file.root_pose)?;
    let body = file
        .body_pose
        .iter()
        .map(|row| vector3("body_pose", row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PoseFrame::from_rotation_vectors(&root, &body, convention))
}

/// Load one pose frame from disk.
pub fn load_pose_frame<P: AsRef<Path>>(
    path: P,
    convention: AxisConvention,
) -> Result<PoseFrame, ImportError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let file: PoseFile = serde_json::from_reader(reader)?;
    pose_from_file(file, convention)
}

fn numeric_stem(path: &Path) -> Option<i64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// List `*.json` files in playback order.
pub fn pose_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, ImportError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }

    // Numeric stems first in numeric order, the rest by name
    files.sort_by(|a, b| match (numeric_stem(a), numeric_stem(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    Ok(files)
}

/// Load every pose file in a directory, in playback order.
pub fn load_pose_sequence<P: AsRef<Path>>(
    dir: P,
    convention: AxisConvention,
) -> Result<Vec<PoseFrame>, ImportError> {
    let dir = dir.as_ref();
    let files = pose_files(dir)?;
    if files.is_empty() {
        return Err(ImportError::NoPoseFiles(dir.to_path_buf()));
    }

    let frames = files
        .iter()
        .map(|f| load_pose_frame(f, convention))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Loaded {} pose frames from {}", frames.len(), dir.display());
    Ok(frames)
}
