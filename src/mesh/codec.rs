//! Mesh wire codec
//!
//! Payload layout, every multi-byte field little-endian:
//!
//! ```text
//! [vertex count]        i32
//! [index count]         i32  triangles * 3
//! [attribute count]     i32  2 without normals, 3 with
//! [vertex size]         i32  bytes per interleaved vertex
//! [vertex data offset]  i32  from start of payload
//! [index data offset]   i32  from start of payload
//! [attribute table]     per attribute: type, components, normalize,
//!                       length-prefixed NUL-padded name
//! [vertex data]         position[3], then normal[3] and uv[2] if present
//! [index data]          i32 triples, one per triangle, insertion order
//! ```
//!
//! Two quirks of the deployed client are load-bearing and reproduced here:
//! the attribute count ignores UV presence, and the offset fields do not
//! account for the normals descriptor in the attribute table.

use crate::error::Result;
use crate::mesh::Mesh;
use crate::wire;
use std::io::{Cursor, Write};

/// Attribute data-type byte for 32-bit floats
const TYPE_FLOAT: u8 = 0;
/// Attribute normalize-flag byte, always set
const MUST_NORMALIZE: u8 = 1;
const TWO_COMPONENTS: u8 = 2;
const THREE_COMPONENTS: u8 = 3;

/// Attribute names, NUL-padded to a four-byte boundary
const ATTR_NAME_POSITION: &[u8] = b"position\0\0\0\0";
const ATTR_NAME_NORMALS: &[u8] = b"normals\0";
const ATTR_NAME_UV: &[u8] = b"uv\0\0";

/// Byte size of the six-field header
const HEADER_SIZE: i32 = 24;
/// Descriptor sizes as the deployed offset arithmetic counts them
const POSITION_ATTR_SIZE: i32 = 16;
const UV_ATTR_SIZE: i32 = 8;

/// Encode a mesh into a standalone payload buffer.
pub fn encode(mesh: &Mesh) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_mesh(&mut buf, mesh)?;
    Ok(buf)
}

/// Write a mesh payload.
pub fn write_mesh<W: Write>(w: &mut W, mesh: &Mesh) -> Result<()> {
    let has_normals = mesh.has_normals();
    let has_uv = mesh.has_uv();
    let vertex_size = vertex_size(has_uv, has_normals);
    let vertex_data_offset = vertex_data_offset(has_uv);

    log::trace!(
        "encoding mesh: {} vertices, {} indices, normals={}, uv={}",
        mesh.vertex_count(),
        mesh.index_count(),
        has_normals,
        has_uv
    );

    wire::write_i32(w, mesh.vertex_count() as i32)?;
    wire::write_i32(w, mesh.index_count() as i32)?;
    wire::write_i32(w, if has_normals { 3 } else { 2 })?;
    wire::write_i32(w, vertex_size)?;
    wire::write_i32(w, vertex_data_offset)?;
    wire::write_i32(
        w,
        vertex_data_offset + mesh.vertex_count() as i32 * vertex_size,
    )?;

    write_attribute(w, THREE_COMPONENTS, ATTR_NAME_POSITION)?;
    if has_normals {
        write_attribute(w, THREE_COMPONENTS, ATTR_NAME_NORMALS)?;
    }
    if has_uv {
        write_attribute(w, TWO_COMPONENTS, ATTR_NAME_UV)?;
    }

    for vertex in mesh.vertices() {
        let [x, y, z] = vertex.position;
        wire::write_f32(w, x)?;
        wire::write_f32(w, y)?;
        wire::write_f32(w, z)?;
        if has_normals {
            let [nx, ny, nz] = vertex.normal.unwrap_or([0.0; 3]);
            wire::write_f32(w, nx)?;
            wire::write_f32(w, ny)?;
            wire::write_f32(w, nz)?;
        }
        if has_uv {
            let [u, v] = vertex.uv.unwrap_or([0.0; 2]);
            wire::write_f32(w, u)?;
            wire::write_f32(w, v)?;
        }
    }

    for triangle in mesh.triangles() {
        wire::write_i32(w, triangle.a)?;
        wire::write_i32(w, triangle.b)?;
        wire::write_i32(w, triangle.c)?;
    }

    w.flush()?;
    Ok(())
}

fn write_attribute<W: Write>(w: &mut W, components: u8, name: &[u8]) -> Result<()> {
    w.write_all(&[TYPE_FLOAT, components, MUST_NORMALIZE, name.len() as u8])?;
    w.write_all(name)?;
    Ok(())
}

fn vertex_size(has_uv: bool, has_normals: bool) -> i32 {
    let position = 3 * 4;
    let uv = if has_uv { 2 * 4 } else { 0 };
    let normals = if has_normals { 3 * 4 } else { 0 };
    position + uv + normals
}

fn vertex_data_offset(has_uv: bool) -> i32 {
    // The deployed arithmetic counts the position descriptor and, for UV
    // meshes, the uv descriptor, but never the normals descriptor.
    HEADER_SIZE + POSITION_ATTR_SIZE + if has_uv { UV_ATTR_SIZE } else { 0 }
}

/// The six fixed header fields of an encoded mesh payload.
///
/// Decoding exists for tests and wire inspection; the server itself only
/// ever produces mesh payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHeader {
    pub vertex_count: i32,
    pub index_count: i32,
    pub attribute_count: i32,
    pub vertex_size: i32,
    pub vertex_data_offset: i32,
    pub index_data_offset: i32,
}

impl MeshHeader {
    pub fn parse(payload: &[u8]) -> Result<MeshHeader> {
        let mut r = Cursor::new(payload);
        Ok(MeshHeader {
            vertex_count: wire::read_i32(&mut r)?,
            index_count: wire::read_i32(&mut r)?,
            attribute_count: wire::read_i32(&mut r)?,
            vertex_size: wire::read_i32(&mut r)?,
            vertex_data_offset: wire::read_i32(&mut r)?,
            index_data_offset: wire::read_i32(&mut r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Vertex;

    fn quad(with_normals: bool, with_uv: bool) -> Mesh {
        let mut mesh = Mesh::new();
        let corners = [
            (0.0, 0.0, [0.0, 1.0]),
            (1.0, 0.0, [0.0, 0.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (0.0, 1.0, [1.0, 1.0]),
        ];
        for (x, y, uv) in corners {
            let mut v = Vertex::at(x, y, -1.0);
            if with_normals {
                v = v.with_normal(0.0, 0.0, 1.0);
            }
            if with_uv {
                v = v.with_uv(uv[0], uv[1]);
            }
            mesh.add_vertex(v);
        }
        mesh.add_triangle(0, 2, 1);
        mesh.add_triangle(0, 3, 2);
        mesh
    }

    #[test]
    fn header_for_plain_positions() {
        let payload = encode(&quad(false, false)).unwrap();
        let header = MeshHeader::parse(&payload).unwrap();
        assert_eq!(header.vertex_count, 4);
        assert_eq!(header.index_count, 6);
        assert_eq!(header.attribute_count, 2);
        assert_eq!(header.vertex_size, 12);
        assert_eq!(header.vertex_data_offset, 40);
        assert_eq!(header.index_data_offset, 40 + 4 * 12);
        // header + position descriptor + vertex floats + indices
        assert_eq!(payload.len(), 24 + 16 + 4 * 12 + 6 * 4);
    }

    #[test]
    fn header_with_normals_and_uv() {
        let payload = encode(&quad(true, true)).unwrap();
        let header = MeshHeader::parse(&payload).unwrap();
        assert_eq!(header.attribute_count, 3);
        assert_eq!(header.vertex_size, 32);
        // Offsets ignore the normals descriptor on purpose.
        assert_eq!(header.vertex_data_offset, 48);
        assert_eq!(header.index_data_offset, 48 + 4 * 32);
        // The real table is position(16) + normals(12) + uv(8).
        assert_eq!(payload.len(), 24 + 36 + 4 * 32 + 6 * 4);
    }

    #[test]
    fn uv_does_not_count_as_an_attribute() {
        let payload = encode(&quad(false, true)).unwrap();
        let header = MeshHeader::parse(&payload).unwrap();
        assert_eq!(header.attribute_count, 2);
        assert_eq!(header.vertex_size, 20);
        assert_eq!(header.vertex_data_offset, 48);
    }

    #[test]
    fn attribute_table_bytes() {
        let payload = encode(&quad(false, true)).unwrap();
        // Position descriptor directly after the header.
        assert_eq!(&payload[24..28], &[0, 3, 1, 12]);
        assert_eq!(&payload[28..40], b"position\0\0\0\0");
        // UV descriptor follows.
        assert_eq!(&payload[40..44], &[0, 2, 1, 4]);
        assert_eq!(&payload[44..48], b"uv\0\0");
    }

    #[test]
    fn indices_preserve_insertion_order() {
        let payload = encode(&quad(false, false)).unwrap();
        let index_area = &payload[40 + 4 * 12..];
        let mut r = Cursor::new(index_area);
        let indices: Vec<i32> = (0..6).map(|_| wire::read_i32(&mut r).unwrap()).collect();
        assert_eq!(indices, [0, 2, 1, 0, 3, 2]);
    }

    #[test]
    fn vertex_floats_are_interleaved() {
        let payload = encode(&quad(true, true)).unwrap();
        // First vertex starts right after the real attribute table (60).
        let mut r = Cursor::new(&payload[60..]);
        let first: Vec<f32> = (0..8).map(|_| wire::read_f32(&mut r).unwrap()).collect();
        assert_eq!(first, [0.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
    }
}
