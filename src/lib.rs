//! VRLink - scene streaming server for VR clients
//!
//! This library implements the server side of a private,
//! connection-per-command binary protocol: a VR client opens one short TCP
//! connection per command, and the server streams it meshes and textures it
//! does not yet have, collects the handles the client assigns, and forwards
//! pose and keyboard input to registered listeners.
//!
//! Producers hand the server pre-built [`mesh::Mesh`] and [`tex::Texture`]
//! values via [`server::VrServer::publish_mesh`]; per-client knowledge is
//! tracked in [`session`] so nothing is transmitted twice.

pub mod config;
pub mod error;
pub mod interaction;
pub mod listeners;
pub mod mesh;
pub mod queue;
pub mod session;
pub mod server;
pub mod tex;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use interaction::{KeyboardDelta, PoseSnapshot};
pub use mesh::{Mesh, Triangle, Vertex};
pub use server::VrServer;
pub use tex::{Texture, TextureStage};
