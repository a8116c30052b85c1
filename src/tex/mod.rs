//! Textures and texture stages

pub mod sync;

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::{Cursor, Read};

/// A named texture role a mesh can bind a texture to.
///
/// The ordinal of each stage is part of the wire protocol; the order of the
/// variants must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureStage {
    /// The natural appearance of the surface.
    Diffuse,
    /// The normals appearance.
    Normals,
    /// The lightmap. Does not affect the color of a mesh; it marks what part
    /// of the mesh is in shadow and what part is lit up by light sources.
    Light,
    ShaderCustom3,
    ShaderCustom4,
    ShaderCustom5,
    ShaderCustom6,
    ShaderCustom7,
}

impl TextureStage {
    /// Every stage, in wire ordinal order.
    pub const ALL: [TextureStage; 8] = [
        TextureStage::Diffuse,
        TextureStage::Normals,
        TextureStage::Light,
        TextureStage::ShaderCustom3,
        TextureStage::ShaderCustom4,
        TextureStage::ShaderCustom5,
        TextureStage::ShaderCustom6,
        TextureStage::ShaderCustom7,
    ];

    /// Wire ordinal of this stage.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Stage for a wire ordinal, if in range.
    pub fn from_index(index: u8) -> Option<TextureStage> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Producer of a texture's raw pixel bytes.
///
/// The stream carries exactly `4 * width * height` interleaved RGBA bytes,
/// row-major, no padding. It is opened lazily, once per transmission.
pub trait PixelSource: Send + Sync {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send + '_>>;
}

/// In-memory RGBA pixel buffer.
struct RgbaPixels {
    bytes: Vec<u8>,
}

impl PixelSource for RgbaPixels {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }
}

/// A texture as the VR client sees it.
///
/// The client-assigned handle is shared by every session: once any client
/// has uploaded the texture and reported a handle, all later transmissions
/// take the exists path with that handle. Known first-client quirk of the
/// protocol, kept for compatibility.
pub struct Texture {
    width: u32,
    height: u32,
    source: Box<dyn PixelSource>,
    handle: Mutex<Option<i32>>,
}

impl Texture {
    /// Wrap a pixel source. Width and height must both be non-zero.
    pub fn new(width: u32, height: u32, source: Box<dyn PixelSource>) -> Result<Texture> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidTexture(format!(
                "dimensions {width}x{height} must both be non-zero"
            )));
        }
        Ok(Texture {
            width,
            height,
            source,
            handle: Mutex::new(None),
        })
    }

    /// Texture over an in-memory RGBA buffer of exactly `4 * width * height`
    /// bytes.
    pub fn from_rgba(width: u32, height: u32, bytes: Vec<u8>) -> Result<Texture> {
        let expected = (width as usize) * (height as usize) * 4;
        if bytes.len() != expected {
            return Err(Error::InvalidTexture(format!(
                "{width}x{height} RGBA needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Texture::new(width, height, Box::new(RgbaPixels { bytes }))
    }

    /// Single-color texture, mostly useful for tests and demos.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Texture> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((width as usize) * (height as usize) * 4)
            .collect();
        Texture::from_rgba(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total pixel payload size in bytes.
    pub fn byte_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    /// The client's handle for this texture, if the client has it.
    pub fn handle(&self) -> Option<i32> {
        *self.handle.lock()
    }

    /// Record the handle the client assigned after uploading.
    pub fn set_handle(&self, handle: i32) {
        *self.handle.lock() = Some(handle);
    }

    /// Open the RGBA byte stream.
    pub fn data_stream(&self) -> std::io::Result<Box<dyn Read + Send + '_>> {
        self.source.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ordinals_are_stable() {
        assert_eq!(TextureStage::Diffuse.index(), 0);
        assert_eq!(TextureStage::Normals.index(), 1);
        assert_eq!(TextureStage::Light.index(), 2);
        assert_eq!(TextureStage::ShaderCustom7.index(), 7);
        for (i, stage) in TextureStage::ALL.iter().enumerate() {
            assert_eq!(TextureStage::from_index(i as u8), Some(*stage));
        }
        assert_eq!(TextureStage::from_index(8), None);
    }

    #[test]
    fn rgba_buffer_size_is_validated() {
        assert!(Texture::from_rgba(8, 8, vec![0u8; 256]).is_ok());
        assert!(Texture::from_rgba(8, 8, vec![0u8; 255]).is_err());
        assert!(Texture::from_rgba(0, 8, vec![]).is_err());
    }

    #[test]
    fn handle_starts_absent() {
        let tex = Texture::solid(2, 2, [255, 0, 0, 255]).unwrap();
        assert_eq!(tex.handle(), None);
        tex.set_handle(17);
        assert_eq!(tex.handle(), Some(17));
    }

    #[test]
    fn data_stream_yields_every_byte() {
        let tex = Texture::solid(3, 2, [1, 2, 3, 4]).unwrap();
        let mut bytes = Vec::new();
        tex.data_stream().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes.len(), tex.byte_len());
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
    }
}
