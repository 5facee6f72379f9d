//! Plain-text mesh dumps.
//!
//! ```text
//! vertices.txt    faces.txt
//! x y z           i j k
//! x y z           i j k
//! ...             ...
//! ```
//!
//! One whitespace-separated record per line. Blank lines and lines starting
//! with `#` are skipped.

use crate::core::Triangle;
use crate::io::haha::ImportError;
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

fn parse_records<T: FromStr, const K: usize>(
    reader: impl BufRead,
    field: &'static str,
) -> Result<Vec<[T; K]>, ImportError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values = line
            .split_whitespace()
            .map(|tok| tok.parse::<T>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ImportError::Malformed {
                field,
                reason: format!("line {}: cannot parse '{line}'", line_no + 1),
            })?;

        let record = <[T; K]>::try_from(values).map_err(|v| ImportError::Malformed {
            field,
            reason: format!("line {}: expected {K} values, got {}", line_no + 1, v.len()),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Load `x y z` vertex lines.
pub fn load_vertices<P: AsRef<Path>>(path: P) -> Result<Vec<Vector3<f32>>, ImportError> {
    let reader = BufReader::new(File::open(path)?);
    let records = parse_records::<f32, 3>(reader, "vertices")?;
    Ok(records.into_iter().map(Vector3::from).collect())
}

/// Load `i j k` face lines.
pub fn load_faces<P: AsRef<Path>>(path: P) -> Result<Vec<Triangle>, ImportError> {
    let reader = BufReader::new(File::open(path)?);
    parse_records::<u32, 3>(reader, "faces")
}

pub fn save_vertices<P: AsRef<Path>>(vertices: &[Vector3<f32>], path: P) -> Result<(), ImportError> {
    let mut w = BufWriter::new(File::create(path)?);
    for v in vertices {
        writeln!(w, "{} {} {}", v.x, v.y, v.z)?;
    }
    w.flush()?;
    Ok(())
}

pub fn save_faces<P: AsRef<Path>>(faces: &[Triangle], path: P) -> Result<(), ImportError> {
    let mut w = BufWriter::new(File::create(path)?);
    for [a, b, c] in faces {
        writeln!(w, "{a} {b} {c}")?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertices_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vertices.txt");
        let verts = vec![Vector3::new(0.5, -1.25, 3.0), Vector3::new(1e-3, 0.0, -7.5)];

        save_vertices(&verts, &path).unwrap();
        assert_eq!(load_vertices(&path).unwrap(), verts);
    }

    #[test]
    fn test_faces_skip_comments() {
        let records = parse_records::<u32, 3>("# header\n0 1 2\n\n2 1 3\n".as_bytes(), "faces").unwrap();
        assert_eq!(records, vec![[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn test_wrong_arity_reports_line() {
        let err = parse_records::<u32, 3>("0 1 2\n0 1\n".as_bytes(), "faces").unwrap_err();
        match err {
            ImportError::Malformed { field, reason } => {
                assert_eq!(field, "faces");
                assert!(reason.starts_with("line 2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_negative_face_index_rejected() {
        assert!(parse_records::<u32, 3>("0 -1 2\n".as_bytes(), "faces").is_err());
    }
}
