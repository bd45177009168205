use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use log::{info, warn};
use thiserror::Error;

use crate::mesh::{CpuMeshData, Vertex};

const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
const DEFAULT_NORMAL: Vec3 = Vec3::Z;

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("failed to read OBJ file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed face token {token:?} on line {line}")]
    MalformedFace { line: usize, token: String },
}

/// Something the parser skipped or patched while reading a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjDiagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A face reference that is not a number; the rest of the face is kept.
    MalformedFaceToken(String),
    /// A `v`/`vt`/`vn` record with a missing or non-numeric component, read as zero.
    MalformedComponent(&'static str),
}

impl fmt::Display for ObjDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::MalformedFaceToken(token) => {
                write!(f, "line {}: skipped face token {token:?}", self.line)
            }
            DiagnosticKind::MalformedComponent(tag) => {
                write!(f, "line {}: malformed `{tag}` record", self.line)
            }
        }
    }
}

/// Result of parsing an OBJ document: the welded mesh plus anything that was skipped.
#[derive(Debug, Clone, Default)]
pub struct ObjImport {
    pub mesh: CpuMeshData,
    pub diagnostics: Vec<ObjDiagnostic>,
}

/// Loads an OBJ file, degrading to an empty mesh when the file cannot be read.
pub fn load_obj(path: impl AsRef<Path>) -> CpuMeshData {
    let path = path.as_ref();
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            warn!("OBJ open failed: {}: {err}", path.display());
            return CpuMeshData::default();
        }
    };
    let import = parse_obj(&source);
    for diagnostic in &import.diagnostics {
        warn!("{}: {diagnostic}", path.display());
    }
    info!(
        "OBJ loaded: {} ({} floats, {} indices)",
        path.display(),
        import.mesh.vertices.len(),
        import.mesh.indices.len()
    );
    import.mesh
}

/// Strict variant of [`load_obj`]: unreadable files and malformed faces are errors.
pub fn try_load_obj(path: impl AsRef<Path>) -> Result<CpuMeshData, ObjError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ObjError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let import = parse_obj(&source);
    let malformed = import
        .diagnostics
        .into_iter()
        .find_map(|diagnostic| match diagnostic.kind {
            DiagnosticKind::MalformedFaceToken(token) => Some((diagnostic.line, token)),
            DiagnosticKind::MalformedComponent(_) => None,
        });
    match malformed {
        Some((line, token)) => Err(ObjError::MalformedFace { line, token }),
        None => Ok(import.mesh),
    }
}

/// Parses an OBJ document from memory into a welded, fan-triangulated mesh.
///
/// Vertices use the shared 11-float layout with white color. References are
/// resolved against the records declared so far, so negative indices count
/// back from the most recent `v`/`vt`/`vn` line.
pub fn parse_obj(source: &str) -> ObjImport {
    let mut builder = MeshBuilder::default();
    let mut diagnostics = Vec::new();

    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => {
                let (p, ok) = parse_components::<3>(parts);
                if !ok {
                    diagnostics.push(ObjDiagnostic {
                        line: line_no,
                        kind: DiagnosticKind::MalformedComponent("v"),
                    });
                }
                builder.positions.push(Vec3::from_array(p));
            }
            "vt" => {
                // A trailing w component is left unread.
                let (uv, ok) = parse_components::<2>(parts);
                if !ok {
                    diagnostics.push(ObjDiagnostic {
                        line: line_no,
                        kind: DiagnosticKind::MalformedComponent("vt"),
                    });
                }
                builder.texcoords.push(Vec2::from_array(uv));
            }
            "vn" => {
                let (n, ok) = parse_components::<3>(parts);
                if !ok {
                    diagnostics.push(ObjDiagnostic {
                        line: line_no,
                        kind: DiagnosticKind::MalformedComponent("vn"),
                    });
                }
                builder.normals.push(Vec3::from_array(n));
            }
            "f" => {
                let mut polygon = Vec::new();
                for token in parts {
                    match parse_face_token(token) {
                        Some(reference) => polygon.push(builder.vertex_index(reference)),
                        None => diagnostics.push(ObjDiagnostic {
                            line: line_no,
                            kind: DiagnosticKind::MalformedFaceToken(token.to_string()),
                        }),
                    }
                }
                triangulate_face(&polygon, &mut builder.mesh.indices);
            }
            _ => {}
        }
    }

    ObjImport {
        mesh: builder.mesh,
        diagnostics,
    }
}

/// Reads up to `N` floats; missing or non-numeric components become zero.
fn parse_components<'a, const N: usize>(
    mut parts: impl Iterator<Item = &'a str>,
) -> ([f32; N], bool) {
    let mut out = [0.0; N];
    let mut ok = true;
    for slot in out.iter_mut() {
        match parts.next().map(str::parse::<f32>) {
            Some(Ok(value)) => *slot = value,
            _ => {
                ok = false;
                break;
            }
        }
    }
    (out, ok)
}

/// One face reference as written: zero means "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceRef {
    v: i64,
    vt: i64,
    vn: i64,
}

/// Parses `v`, `v/vt`, `v//vn` or `v/vt/vn`. Segments past the third are
/// ignored.
fn parse_face_token(token: &str) -> Option<FaceRef> {
    let mut segments = token.split('/');
    let v = parse_segment(segments.next())?;
    let vt = parse_segment(segments.next())?;
    let vn = parse_segment(segments.next())?;
    Some(FaceRef { v, vt, vn })
}

fn parse_segment(segment: Option<&str>) -> Option<i64> {
    match segment {
        None | Some("") => Some(0),
        Some(text) => text.parse::<i64>().ok(),
    }
}

fn triangulate_face(polygon: &[u32], indices: &mut Vec<u32>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        indices.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Resolved (position, texcoord, normal) triple identifying one output vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: i64,
    texcoord: i64,
    normal: i64,
}

#[derive(Default)]
struct MeshBuilder {
    positions: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    normals: Vec<Vec3>,
    lookup: HashMap<Key, u32>,
    mesh: CpuMeshData,
}

impl MeshBuilder {
    fn vertex_index(&mut self, reference: FaceRef) -> u32 {
        let key = Key {
            position: resolve_index(reference.v, self.positions.len()),
            texcoord: resolve_index(reference.vt, self.texcoords.len()),
            normal: resolve_index(reference.vn, self.normals.len()),
        };
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }

        let position = fetch(&self.positions, key.position).unwrap_or(Vec3::ZERO);
        let uv = fetch(&self.texcoords, key.texcoord).unwrap_or(Vec2::ZERO);
        let normal = fetch(&self.normals, key.normal).unwrap_or(DEFAULT_NORMAL);
        let index = self.mesh.push_vertex(Vertex::new(
            position.to_array(),
            DEFAULT_COLOR,
            uv.to_array(),
            normal.to_array(),
        ));
        self.lookup.insert(key, index);
        index
    }
}

/// Turns a negative reference into its 1-based equivalent for a sequence of `len` items.
fn resolve_index(index: i64, len: usize) -> i64 {
    if index < 0 {
        len as i64 + 1 + index
    } else {
        index
    }
}

fn fetch<T: Copy>(items: &[T], one_based: i64) -> Option<T> {
    if one_based < 1 {
        return None;
    }
    items.get(one_based as usize - 1).copied()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Write;

    use super::*;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1

f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn parses_simple_triangle() {
        let import = parse_obj("\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        assert_eq!(import.mesh.indices, vec![0, 1, 2]);
        assert_eq!(import.mesh.vertices.len(), 33);
        assert!(import.diagnostics.is_empty());
    }

    #[test]
    fn fan_triangulates_from_first_reference() {
        let mesh = parse_obj(QUAD).mesh;
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);

        let pentagon = parse_obj("v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n").mesh;
        assert_eq!(pentagon.triangle_count(), 3);
        for triangle in pentagon.indices.chunks_exact(3) {
            assert_eq!(triangle[0], 0);
        }
    }

    #[test]
    fn welds_repeated_triples_across_faces() {
        let source = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vn 0 0 1
f 1/1/1 2/1/1 3/1/1
f 1/1/1 3/1/1 4/1/1
f 1 3 4
";
        let mesh = parse_obj(source).mesh;
        let distinct: HashSet<_> = [(1, 1, 1), (2, 1, 1), (3, 1, 1), (4, 1, 1), (1, 0, 0), (3, 0, 0), (4, 0, 0)]
            .into_iter()
            .collect();
        assert_eq!(mesh.vertex_count(), distinct.len());
        assert_eq!(mesh.indices.len(), 9);
        assert_eq!(&mesh.indices[0..6], &[0, 1, 2, 0, 2, 3]);
        mesh.validate().unwrap();
    }

    #[test]
    fn negative_index_uses_count_at_parse_time() {
        let source = "v 1 0 0\nv 2 0 0\nf -1 -1 -1\nv 3 0 0\nf -1 1 2\n";
        let mesh = parse_obj(source).mesh;
        assert_eq!(mesh.vertex(0).unwrap().position, [2.0, 0.0, 0.0]);
        // The second face's -1 refers to the third position, added after the first face.
        let second = mesh.indices[3] as usize;
        assert_eq!(mesh.vertex(second).unwrap().position, [3.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_and_positive_references_weld_together() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nf -3 -2 -1\n").mesh;
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn extra_face_segments_are_ignored() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//1/9 2//1/9 3//1/9\n").mesh;
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertex(0).unwrap().normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_attributes_use_defaults() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1 2//1 3\n").mesh;
        let bare = mesh.vertex(0).unwrap();
        assert_eq!(bare.color, [1.0, 1.0, 1.0]);
        assert_eq!(bare.uv, [0.0, 0.0]);
        assert_eq!(bare.normal, [0.0, 0.0, 1.0]);
        let with_normal = mesh.vertex(1).unwrap();
        assert_eq!(with_normal.normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn texcoord_w_component_is_discarded() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25 0.75 0.5\nf 1/1 2/1 3/1\n").mesh;
        assert_eq!(mesh.vertex(0).unwrap().uv, [0.25, 0.75]);
    }

    #[test]
    fn malformed_face_tokens_are_skipped_individually() {
        let import = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 x/2 2 3\n");
        assert_eq!(import.mesh.indices, vec![0, 1, 2]);
        assert_eq!(
            import.diagnostics,
            vec![ObjDiagnostic {
                line: 4,
                kind: DiagnosticKind::MalformedFaceToken("x/2".to_string()),
            }]
        );
    }

    #[test]
    fn degenerate_faces_emit_nothing() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n").mesh;
        assert_eq!(mesh.vertex_count(), 2);
        assert!(mesh.indices.is_empty());
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let mesh = parse_obj("o thing\ns off\nusemtl red\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").mesh;
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn unreadable_path_degrades_to_empty_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = load_obj(dir.path().join("missing.obj"));
        assert!(mesh.is_empty());
        assert!(matches!(
            try_load_obj(dir.path().join("missing.obj")),
            Err(ObjError::Io { .. })
        ));
    }

    #[test]
    fn strict_loader_reports_malformed_faces() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 three\n").unwrap();
        match try_load_obj(file.path()) {
            Err(ObjError::MalformedFace { line, token }) => {
                assert_eq!(line, 4);
                assert_eq!(token, "three");
            }
            other => panic!("expected malformed face, got {other:?}"),
        }
        let lenient = load_obj(file.path());
        assert_eq!(lenient.vertex_count(), 2);
        assert!(lenient.indices.is_empty());
    }
}
