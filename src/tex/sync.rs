//! Texture sync codec
//!
//! Sending walks a mesh's bound stages and either streams the pixel payload
//! (texture unknown to the client) or references the client's handle
//! (texture already uploaded). Receiving then collects, for every defined
//! stage, the handle the client assigned, tolerating the client's
//! asynchronous upload with a bounded retry poll.
//!
//! # Send wire format, per mesh
//!
//! ```text
//! no bound stages:  [0xFF]
//! otherwise:        [stage count]
//!   per bound stage, texture unknown:
//!     [0x00] [stage ordinal] [width] [height] [width] [height] [32]
//!     [pixel bytes in chunks of <= 1024]
//!   per bound stage, texture known:
//!     [0x01] [stage ordinal] [handle]
//! ```
//!
//! Width and height appear twice; the deployed client expects the
//! duplicated header and it must not be collapsed.
//!
//! # Receive, per mesh
//!
//! One 4-byte handle slot for every stage of [`TextureStage::ALL`], in
//! ordinal order. -1 means the stage holds no texture on the client.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::session::Session;
use crate::tex::TextureStage;
use crate::transport::Transport;
use crate::wire;
use log::{debug, trace, warn};
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

/// Tag for a texture the client must upload
pub const TAG_ADD: u8 = 0;
/// Tag for a texture the client already holds
pub const TAG_EXISTS: u8 = 1;
/// Sentinel for a mesh without bound textures (-1 as a signed byte)
pub const NO_TEXTURES: u8 = 0xFF;
/// Handle slot value for "stage has no texture on the client"
pub const NO_TEXTURE_HANDLE: i32 = -1;

const BITS_PER_PIXEL: i32 = 32;
/// Upper bound for one pixel write
const PIXEL_CHUNK: usize = 1024;
/// Availability checks before the handle read gives up
const MAX_HANDLE_POLLS: i32 = 30;

/// Write the texture section for one mesh.
pub fn write_textures<W: Write>(w: &mut W, mesh: &Mesh) -> Result<()> {
    let bound = mesh.textures();
    if bound.is_empty() {
        trace!("mesh has no textures, sending sentinel");
        w.write_all(&[NO_TEXTURES])?;
        w.flush()?;
        return Ok(());
    }

    w.write_all(&[bound.len() as u8])?;
    w.flush()?;

    for (stage, texture) in bound {
        match texture.handle() {
            None => {
                debug!(
                    "streaming {}x{} texture for stage {:?}",
                    texture.width(),
                    texture.height(),
                    stage
                );
                w.write_all(&[TAG_ADD, stage.index()])?;
                let width = texture.width() as i32;
                let height = texture.height() as i32;
                wire::write_i32(w, width)?;
                wire::write_i32(w, height)?;
                // Duplicated on purpose, see the module docs.
                wire::write_i32(w, width)?;
                wire::write_i32(w, height)?;
                wire::write_i32(w, BITS_PER_PIXEL)?;

                let mut stream = texture.data_stream()?;
                let mut bytes_left = texture.byte_len();
                let mut chunk = [0u8; PIXEL_CHUNK];
                while bytes_left > 0 {
                    let want = bytes_left.min(PIXEL_CHUNK);
                    let have = stream.read(&mut chunk[..want])?;
                    if have == 0 {
                        return Err(Error::StreamClosed {
                            field: "texture pixel data",
                        });
                    }
                    w.write_all(&chunk[..have])?;
                    bytes_left -= have;
                    w.flush()?;
                }
            }
            Some(handle) => {
                debug!("client already holds stage {:?} as handle {}", stage, handle);
                w.write_all(&[TAG_EXISTS, stage.index()])?;
                wire::write_i32(w, handle)?;
            }
        }
        w.flush()?;
    }
    Ok(())
}

/// Read the client-assigned texture handles for one mesh.
///
/// The client uploads textures asynchronously relative to the wire
/// exchange, so each stage slot may lag. Polls the transport for at least
/// four readable bytes, sleeping `max(10, tries_left) * 10` ms after each
/// failed check; once every try is used up the connection cycle aborts with
/// [`Error::Timeout`].
pub fn read_texture_handles<T: Transport>(
    transport: &mut T,
    mesh: &Mesh,
    session: &Session,
) -> Result<()> {
    for stage in TextureStage::ALL {
        let mut tries_left = MAX_HANDLE_POLLS;
        loop {
            if transport.available()? >= 4 {
                break;
            }
            tries_left -= 1;
            if tries_left <= 0 {
                return Err(Error::Timeout);
            }
            let wait_ms = tries_left.max(10) as u64 * 10;
            trace!("handle for stage {stage:?} not ready, waiting {wait_ms} ms");
            thread::sleep(Duration::from_millis(wait_ms));
        }

        let handle = wire::read_i32(transport)?;
        if handle == NO_TEXTURE_HANDLE {
            trace!("stage {stage:?} has no texture on the client");
            continue;
        }
        match mesh.texture(stage) {
            Some(texture) => {
                texture.set_handle(handle);
                session.record_texture(texture);
                debug!("stage {stage:?} acknowledged as handle {handle}");
            }
            None => {
                warn!("client assigned handle {handle} to unbound stage {stage:?}");
            }
        }
    }
    Ok(())
}
