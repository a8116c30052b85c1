//! Mesh data model
//!
//! A mesh is a list of vertices, an insertion-ordered set of triangles and a
//! small insertion-ordered map from texture stage to texture. Meshes are
//! shared between the outgoing queue and the sessions as `Arc<Mesh>`;
//! identity is pointer identity.

pub mod codec;

use crate::tex::{Texture, TextureStage};
use std::sync::Arc;

/// One vertex: a 3D position plus optional normal and optional texture
/// coordinates.
///
/// A mesh is homogeneous: either all of its vertices carry normals or none
/// do, and either all carry UV or none do. The shape of the first vertex
/// decides the mesh's wire layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub uv: Option<[f32; 2]>,
}

impl Vertex {
    /// Position-only vertex.
    pub fn at(x: f32, y: f32, z: f32) -> Vertex {
        Vertex {
            position: [x, y, z],
            normal: None,
            uv: None,
        }
    }

    pub fn with_normal(mut self, x: f32, y: f32, z: f32) -> Vertex {
        self.normal = Some([x, y, z]);
        self
    }

    /// Texture coordinates: factor from the left border of the image by
    /// factor from the upper border of the image.
    pub fn with_uv(mut self, u: f32, v: f32) -> Vertex {
        self.uv = Some([u, v]);
        self
    }
}

/// Three distinct vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

/// A renderable mesh with its bound textures.
#[derive(Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
    textures: Vec<(TextureStage, Arc<Texture>)>,
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh::default()
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, vertex: Vertex) -> i32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as i32
    }

    /// Append a triangle. Indices must be distinct and in range; duplicate
    /// triangles are ignored (the triangle collection is a set).
    pub fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        debug_assert!(a != b && b != c && a != c, "triangle indices must be distinct");
        debug_assert!(
            (a.max(b).max(c) as usize) < self.vertices.len(),
            "triangle index out of range"
        );
        let triangle = Triangle { a, b, c };
        if !self.triangles.contains(&triangle) {
            self.triangles.push(triangle);
        }
    }

    /// Bind a texture to a stage. Re-binding a stage replaces the texture in
    /// place, keeping its position in the transmission order.
    pub fn set_texture(&mut self, stage: TextureStage, texture: Arc<Texture>) {
        if let Some(slot) = self.textures.iter_mut().find(|(s, _)| *s == stage) {
            slot.1 = texture;
        } else {
            self.textures.push((stage, texture));
        }
    }

    /// The texture bound to a stage, if any.
    pub fn texture(&self, stage: TextureStage) -> Option<&Arc<Texture>> {
        self.textures
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, t)| t)
    }

    /// Bound stages in insertion order.
    pub fn textures(&self) -> &[(TextureStage, Arc<Texture>)] {
        &self.textures
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of wire indices: three per triangle.
    pub fn index_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// True when every vertex provides all three normal components. The
    /// encoding of normals is all-or-nothing per mesh.
    pub fn has_normals(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.normal.is_some())
    }

    /// True when the mesh's vertices are of the UV-carrying kind.
    pub fn has_uv(&self) -> bool {
        self.vertices.first().is_some_and(|v| v.uv.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_indices_count_up() {
        let mut mesh = Mesh::new();
        assert_eq!(mesh.add_vertex(Vertex::at(0.0, 0.0, 0.0)), 0);
        assert_eq!(mesh.add_vertex(Vertex::at(1.0, 0.0, 0.0)), 1);
        assert_eq!(mesh.vertex_count(), 2);
    }

    #[test]
    fn duplicate_triangles_collapse() {
        let mut mesh = Mesh::new();
        for _ in 0..3 {
            mesh.add_vertex(Vertex::at(0.0, 0.0, 0.0));
        }
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(2, 1, 0);
        assert_eq!(mesh.triangles().len(), 2);
        assert_eq!(mesh.index_count(), 6);
    }

    #[test]
    fn normals_are_all_or_nothing() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Vertex::at(0.0, 0.0, 0.0).with_normal(0.0, 1.0, 0.0));
        assert!(mesh.has_normals());
        mesh.add_vertex(Vertex::at(1.0, 0.0, 0.0));
        assert!(!mesh.has_normals());
        assert!(!Mesh::new().has_normals());
    }

    #[test]
    fn rebinding_a_stage_keeps_its_slot() {
        let mut mesh = Mesh::new();
        let a = Arc::new(Texture::solid(1, 1, [0, 0, 0, 255]).unwrap());
        let b = Arc::new(Texture::solid(1, 1, [255, 255, 255, 255]).unwrap());
        let c = Arc::new(Texture::solid(1, 1, [9, 9, 9, 255]).unwrap());
        mesh.set_texture(TextureStage::Diffuse, a);
        mesh.set_texture(TextureStage::Light, b);
        mesh.set_texture(TextureStage::Diffuse, Arc::clone(&c));
        assert_eq!(mesh.textures().len(), 2);
        assert_eq!(mesh.textures()[0].0, TextureStage::Diffuse);
        assert!(Arc::ptr_eq(mesh.texture(TextureStage::Diffuse).unwrap(), &c));
    }
}
