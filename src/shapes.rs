//! Built-in primitive geometry in the shared vertex layout.

use std::f32::consts::TAU;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::mesh::{CpuMeshData, Vertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Triangle,
    Cube,
    Circle,
    Square,
    Rectangle,
}

impl FromStr for ShapeType {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "triangle" => Self::Triangle,
            "cube" => Self::Cube,
            "circle" | "disc" => Self::Circle,
            "square" => Self::Square,
            "rectangle" | "rect" => Self::Rectangle,
            other => return Err(anyhow!("unknown shape {other:?}")),
        })
    }
}

/// Plane a disc is laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscPlane {
    Xy,
    Xz,
}

/// Returns the canonical geometry for a primitive.
pub fn generate(shape: ShapeType) -> CpuMeshData {
    match shape {
        ShapeType::Triangle => triangle(),
        ShapeType::Cube => cube(),
        ShapeType::Circle => disc(0.8, 60, DiscPlane::Xy),
        ShapeType::Square => square(1.0),
        ShapeType::Rectangle => rectangle(1.2, 0.6),
    }
}

// x y z  r g b  u v  nx ny nz
fn push(mesh: &mut CpuMeshData, p: [f32; 3], c: [f32; 3], uv: [f32; 2], n: [f32; 3]) {
    mesh.push_vertex(Vertex::new(p, c, uv, n));
}

pub fn triangle() -> CpuMeshData {
    let mut m = CpuMeshData::with_capacity(3, 3);
    let n = [0.0, 0.0, 1.0];
    push(&mut m, [-0.5, -0.5, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0], n);
    push(&mut m, [0.5, -0.5, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0], n);
    push(&mut m, [0.0, 0.5, 0.0], [0.0, 0.0, 1.0], [0.5, 1.0], n);
    m.indices = vec![0, 1, 2];
    m
}

/// Unit cube with 24 unwelded vertices so every face carries its own normal.
pub fn cube() -> CpuMeshData {
    const FACE_COLORS: [[[f32; 3]; 4]; 2] = [
        [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0, 0.0]],
        [[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [0.2, 0.2, 0.2]],
    ];
    const UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    // (corners, normal) per face, counter-clockwise seen from outside.
    const FACES: [([[f32; 3]; 4], [f32; 3]); 6] = [
        (
            [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]],
            [0.0, 0.0, 1.0],
        ),
        (
            [[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]],
            [0.0, 0.0, -1.0],
        ),
        (
            [[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5]],
            [-1.0, 0.0, 0.0],
        ),
        (
            [[0.5, -0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]],
            [1.0, 0.0, 0.0],
        ),
        (
            [[-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]],
            [0.0, 1.0, 0.0],
        ),
        (
            [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]],
            [0.0, -1.0, 0.0],
        ),
    ];

    let mut m = CpuMeshData::with_capacity(24, 36);
    for (face, (corners, normal)) in FACES.iter().enumerate() {
        let colors = &FACE_COLORS[face % 2];
        for corner in 0..4 {
            push(&mut m, corners[corner], colors[corner], UVS[corner], *normal);
        }
        let base = (face * 4) as u32;
        m.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    m
}

/// Flat N-gon: one center vertex plus `segments` rim vertices, fan-indexed.
pub fn disc(radius: f32, segments: u32, plane: DiscPlane) -> CpuMeshData {
    let segments = segments.max(3);
    let normal = match plane {
        DiscPlane::Xy => [0.0, 0.0, 1.0],
        DiscPlane::Xz => [0.0, 1.0, 0.0],
    };

    let mut m = CpuMeshData::with_capacity(segments as usize + 1, segments as usize * 3);
    push(&mut m, [0.0; 3], [1.0, 1.0, 1.0], [0.5, 0.5], normal);

    for i in 0..segments {
        let angle = TAU * (i as f32 / segments as f32);
        let a = radius * angle.cos();
        let b = radius * angle.sin();
        let position = match plane {
            DiscPlane::Xy => [a, b, 0.0],
            DiscPlane::Xz => [a, 0.0, b],
        };
        let color = [0.6 + 0.4 * angle.cos(), 0.6 + 0.4 * angle.sin(), 0.8];
        let uv = [0.5 + a / (2.0 * radius), 0.5 + b / (2.0 * radius)];
        push(&mut m, position, color, uv, normal);
    }

    for i in 0..segments {
        let current = 1 + i;
        let next = 1 + (i + 1) % segments;
        m.indices.extend_from_slice(&[0, current, next]);
    }
    m
}

pub fn square(size: f32) -> CpuMeshData {
    let h = size * 0.5;
    quad(
        h,
        h,
        [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0, 0.0]],
    )
}

pub fn rectangle(width: f32, height: f32) -> CpuMeshData {
    quad(
        width * 0.5,
        height * 0.5,
        [[0.7, 0.2, 0.2], [0.2, 0.7, 0.2], [0.2, 0.2, 0.7], [0.7, 0.7, 0.2]],
    )
}

fn quad(hw: f32, hh: f32, colors: [[f32; 3]; 4]) -> CpuMeshData {
    let mut m = CpuMeshData::with_capacity(4, 6);
    let n = [0.0, 0.0, 1.0];
    push(&mut m, [-hw, -hh, 0.0], colors[0], [0.0, 0.0], n);
    push(&mut m, [hw, -hh, 0.0], colors[1], [1.0, 0.0], n);
    push(&mut m, [hw, hh, 0.0], colors[2], [1.0, 1.0], n);
    push(&mut m, [-hw, hh, 0.0], colors[3], [0.0, 1.0], n);
    m.indices = vec![0, 1, 2, 2, 3, 0];
    m
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn every_primitive_is_well_formed() {
        for shape in [
            ShapeType::Triangle,
            ShapeType::Cube,
            ShapeType::Circle,
            ShapeType::Square,
            ShapeType::Rectangle,
        ] {
            generate(shape).validate().unwrap();
        }
    }

    #[test]
    fn cube_faces_are_unwelded() {
        let cube = cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);
        for face in 0..6 {
            let normals: Vec<_> = (0..4)
                .map(|corner| cube.vertex(face * 4 + corner).unwrap().normal)
                .collect();
            assert!(normals.windows(2).all(|pair| pair[0] == pair[1]));
        }
    }

    #[test]
    fn cube_winding_faces_outward() {
        let cube = cube();
        for triangle in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| cube.vertex(triangle[k] as usize).unwrap());
            let edge_normal = (Vec3::from(b.position) - Vec3::from(a.position))
                .cross(Vec3::from(c.position) - Vec3::from(a.position));
            assert!(edge_normal.dot(Vec3::from(a.normal)) > 0.0);
        }
    }

    #[test]
    fn disc_clamps_segments_and_fans_from_center() {
        let disc = disc(1.0, 1, DiscPlane::Xy);
        assert_eq!(disc.vertex_count(), 4);
        assert_eq!(disc.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 1]);
    }

    #[test]
    fn disc_maps_texture_coordinates_into_unit_square() {
        let disc = disc(2.0, 8, DiscPlane::Xz);
        let first_rim = disc.vertex(1).unwrap();
        assert_eq!(first_rim.position, [2.0, 0.0, 0.0]);
        assert_eq!(first_rim.normal, [0.0, 1.0, 0.0]);
        assert_eq!(first_rim.uv, [1.0, 0.5]);
        for vertex in disc.iter_vertices() {
            assert!((0.0..=1.0).contains(&vertex.uv[0]));
            assert!((0.0..=1.0).contains(&vertex.uv[1]));
        }
    }

    #[test]
    fn shape_names_parse() {
        assert_eq!("Cube".parse::<ShapeType>().unwrap(), ShapeType::Cube);
        assert_eq!("circle".parse::<ShapeType>().unwrap(), ShapeType::Circle);
        assert!("sphere".parse::<ShapeType>().is_err());
    }
}
