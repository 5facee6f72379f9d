//! Body joint names resolved once at load time.
//!
//! Pose files address joints by position. The rig addresses them by name.
//! [`JointTable`] maps between the two and rejects unknown names up front,
//! so driving a pose never does a string lookup that can fail.

use std::collections::HashMap;
use thiserror::Error;

/// SMPL-X body joints in pose-file order (root first).
pub const SMPLX_BODY_JOINTS: [&str; 22] = [
    "pelvis",
    "left_hip",
    "right_hip",
    "spine1",
    "left_knee",
    "right_knee",
    "spine2",
    "left_ankle",
    "right_ankle",
    "spine3",
    "left_foot",
    "right_foot",
    "neck",
    "left_collar",
    "right_collar",
    "head",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
];

#[derive(Debug, Error, PartialEq)]
pub enum JointError {
    #[error("unknown joint name '{0}'")]
    Unknown(String),

    #[error("joint '{0}' appears more than once")]
    Duplicate(String),

    #[error("pose has {actual} joints but the table only knows {max}")]
    TooManyJoints { actual: usize, max: usize },
}

/// Ordered joint names with a name → index lookup.
#[derive(Clone, Debug)]
pub struct JointTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl JointTable {
    pub fn new<I, S>(names: I) -> Result<Self, JointError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self {
            names: Vec::new(),
            index: HashMap::new(),
        };
        for name in names {
            let name = name.into();
            if table.index.contains_key(&name) {
                return Err(JointError::Duplicate(name));
            }
            table.index.insert(name.clone(), table.names.len());
            table.names.push(name);
        }
        Ok(table)
    }

    /// The SMPL-X body joint table.
    pub fn smplx_body() -> Self {
        Self {
            names: SMPLX_BODY_JOINTS.iter().map(|s| s.to_string()).collect(),
            index: SMPLX_BODY_JOINTS
                .iter()
                .enumerate()
                .map(|(i, s)| (s.to_string(), i))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Result<usize, JointError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| JointError::Unknown(name.to_string()))
    }

    /// Resolve a list of rig joint names to table indices.
    pub fn resolve(&self, names: &[&str]) -> Result<Vec<usize>, JointError> {
        names.iter().map(|n| self.index_of(n)).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smplx_order() {
        let table = JointTable::smplx_body();
        assert_eq!(table.len(), 22);
        assert_eq!(table.name(0), Some("pelvis"));
        assert_eq!(table.index_of("right_wrist").unwrap(), 21);
    }

    #[test]
    fn test_unknown_name() {
        let table = JointTable::smplx_body();
        assert_eq!(
            table.resolve(&["head", "tail"]).unwrap_err(),
            JointError::Unknown("tail".into())
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        assert_eq!(
            JointTable::new(["a", "b", "a"]).unwrap_err(),
            JointError::Duplicate("a".into())
        );
    }
}
