//! Command dispatcher and connection acceptor
//!
//! One short-lived TCP connection per command: the client connects, sends a
//! one-byte opcode plus a fixed binary body, reads the response where the
//! command has one, and the connection closes. A single dedicated thread
//! accepts and services connections; accepting is polled in short bounds
//! purely so a stop request is observed promptly.
//!
//! # Connection lifecycle
//!
//! ```text
//! 1. Client connects
//! 2. Dispatcher reads one opcode byte (clean EOF here is a benign poll)
//! 3. Command body is decoded and handled on the accept thread
//! 4. The connection is closed, success or fault
//! ```
//!
//! No fault raised while servicing one connection may stop the accept loop
//! or corrupt state shared with other connections. The only fatal error is
//! failing to bind the listening port.
//!
//! Keyboard deltas are the one exception to same-thread handling: they are
//! decoded synchronously, then notified from a dedicated worker fed by a
//! bounded queue, so slow listener code cannot stall the accept loop.
//! Receipt order is preserved by the single consumer.

use crate::error::{Error, Result};
use crate::interaction::{KeyboardDelta, PoseSnapshot};
use crate::listeners::VrListeners;
use crate::mesh::{Mesh, codec};
use crate::queue::{DELIVERY_BATCH, MeshQueue};
use crate::session::{Session, SessionRegistry};
use crate::tex::sync;
use crate::transport::Transport;
use crate::wire;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// One-byte command selector at the start of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Client asks for the title and a fresh session id.
    CreateSession = 0,
    /// Client polls for meshes it does not have yet.
    FetchMeshes = 1,
    /// Client polls for mesh handles it must delete.
    FetchRemovals = 2,
    /// Client reports helmet and controller state.
    PoseUpdate = 3,
    /// Client reports keyboard changes.
    KeyboardUpdate = 4,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        match byte {
            0 => Some(Opcode::CreateSession),
            1 => Some(Opcode::FetchMeshes),
            2 => Some(Opcode::FetchRemovals),
            3 => Some(Opcode::PoseUpdate),
            4 => Some(Opcode::KeyboardUpdate),
            _ => None,
        }
    }
}

/// How long the accept loop sleeps when no connection is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Capacity of the keyboard notification queue.
const KEYBOARD_QUEUE_DEPTH: usize = 64;
/// Most removal handles one response can carry (count is one byte).
const REMOVAL_BATCH: usize = 255;

/// The VR protocol server.
///
/// Stopping is final: a stopped server never accepts again, construct a new
/// one instead.
pub struct VrServer {
    inner: Arc<ServerInner>,
    acceptor: Option<JoinHandle<()>>,
    keyboard_worker: Option<JoinHandle<()>>,
    keyboard_tx: Option<Sender<KeyboardDelta>>,
    stopped: bool,
}

struct ServerInner {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: SessionRegistry,
    outbox: MeshQueue,
    listeners: VrListeners,
    running: AtomicBool,
}

impl VrServer {
    /// Bind the listening socket. This is the server's only fatal fault: if
    /// the port cannot be bound there is nothing to run.
    pub fn bind(bind_address: &str) -> Result<VrServer> {
        let listener = TcpListener::bind(bind_address)?;
        let local_addr = listener.local_addr()?;
        // Non-blocking accept lets the loop observe a stop request between
        // polls.
        listener.set_nonblocking(true)?;
        log::info!("VR server listening on {local_addr}");

        Ok(VrServer {
            inner: Arc::new(ServerInner {
                listener,
                local_addr,
                registry: SessionRegistry::new(),
                outbox: MeshQueue::new(),
                listeners: VrListeners::new(),
                running: AtomicBool::new(false),
            }),
            acceptor: None,
            keyboard_worker: None,
            keyboard_tx: None,
            stopped: false,
        })
    }

    /// Address the server actually listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// The listener registry; register callbacks before `start`.
    pub fn listeners(&self) -> &VrListeners {
        &self.inner.listeners
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Queue a mesh for delivery to whichever session fetches first.
    /// Returns false if the mesh is already queued.
    pub fn publish_mesh(&self, mesh: Arc<Mesh>) -> bool {
        self.inner.outbox.publish(mesh)
    }

    /// Number of meshes still waiting for delivery.
    pub fn pending_meshes(&self) -> usize {
        self.inner.outbox.len()
    }

    /// Withdraw a mesh from the scene: every session that knows it is told
    /// to delete it on its next removal poll, and an undelivered copy is
    /// dropped from the queue.
    pub fn withdraw_mesh(&self, mesh: &Arc<Mesh>) {
        if self.inner.outbox.discard(mesh) {
            log::debug!("withdrew a mesh that was still queued");
        }
        self.inner.registry.mark_for_removal_everywhere(mesh);
    }

    /// Start accepting connections. A second call is a no-op while running;
    /// a call after `stop` is refused.
    pub fn start(&mut self) -> Result<()> {
        if self.stopped {
            log::warn!("a stopped server cannot accept again, construct a new one");
            return Ok(());
        }
        if self.acceptor.is_some() {
            return Ok(());
        }
        self.inner.running.store(true, Ordering::Relaxed);

        let (tx, rx) = crossbeam_channel::bounded(KEYBOARD_QUEUE_DEPTH);
        let worker_inner = Arc::clone(&self.inner);
        self.keyboard_worker = Some(
            thread::Builder::new()
                .name("keyboard-notify".to_string())
                .spawn(move || keyboard_loop(&worker_inner, rx))?,
        );

        let accept_inner = Arc::clone(&self.inner);
        let accept_tx = tx.clone();
        self.acceptor = Some(
            thread::Builder::new()
                .name("vr-acceptor".to_string())
                .spawn(move || accept_loop(&accept_inner, &accept_tx))?,
        );
        self.keyboard_tx = Some(tx);
        Ok(())
    }

    /// True while the accept loop takes new connections.
    pub fn is_accepting(&self) -> bool {
        self.acceptor.is_some() && self.inner.running.load(Ordering::Relaxed)
    }

    /// Stop accepting. The connection in flight, if any, finishes first;
    /// this call blocks until both worker threads are down.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        log::info!("stopping VR server");
        self.inner.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.acceptor.take() {
            let _ = worker.join();
        }
        // Closing the channel lets the notification worker drain and exit.
        self.keyboard_tx = None;
        if let Some(worker) = self.keyboard_worker.take() {
            let _ = worker.join();
        }
        log::info!("VR server stopped");
    }
}

impl Drop for VrServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(inner: &ServerInner, keyboard_tx: &Sender<KeyboardDelta>) {
    log::debug!("accept loop running");
    while inner.running.load(Ordering::Relaxed) {
        match inner.listener.accept() {
            Ok((mut stream, addr)) => {
                // The accepted stream may inherit the listener's
                // non-blocking mode; command handling is blocking.
                if let Err(e) = stream.set_nonblocking(false) {
                    log::error!("failed to switch {addr} to blocking mode: {e}");
                    continue;
                }
                if let Err(fault) = handle_connection(inner, &mut stream, addr, keyboard_tx) {
                    if !inner.listeners.handle_fault(&fault) {
                        log::error!("unhandled fault while servicing {addr}: {fault}");
                    }
                }
                // Dropping the stream closes the connection, handled or not.
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("accept error: {e}");
            }
        }
    }
    log::debug!("accept loop stopped");
}

fn keyboard_loop(inner: &ServerInner, rx: Receiver<KeyboardDelta>) {
    for delta in rx.iter() {
        inner.listeners.notify_keyboard(&delta);
    }
    log::debug!("keyboard notification worker stopped");
}

/// Service exactly one command on an accepted connection.
fn handle_connection<T: Transport>(
    inner: &ServerInner,
    transport: &mut T,
    addr: SocketAddr,
    keyboard_tx: &Sender<KeyboardDelta>,
) -> Result<()> {
    let mut opcode = [0u8; 1];
    let read = transport.read(&mut opcode)?;
    if read == 0 {
        // Client connected and went away without a command.
        log::trace!("empty poll from {addr}");
        return Ok(());
    }
    let Some(command) = Opcode::from_byte(opcode[0]) else {
        log::warn!("unknown opcode {} from {addr}, dropping connection", opcode[0]);
        return Ok(());
    };
    log::debug!("{addr} -> {command:?}");
    match command {
        Opcode::CreateSession => create_session(inner, transport, addr),
        Opcode::FetchMeshes => fetch_meshes(inner, transport, addr),
        Opcode::FetchRemovals => fetch_removals(inner, transport, addr),
        Opcode::PoseUpdate => receive_pose(inner, transport),
        Opcode::KeyboardUpdate => receive_keyboard(inner, transport, addr, keyboard_tx),
    }
}

fn create_session<T: Transport>(
    inner: &ServerInner,
    transport: &mut T,
    addr: SocketAddr,
) -> Result<()> {
    wire::write_len_string(transport, &inner.listeners.title())?;
    let session = inner.registry.register_session(addr.ip());
    wire::write_len_string(transport, &session.id().to_string())?;
    inner.listeners.notify_status(true);
    Ok(())
}

/// Read the session id field and resolve it. A malformed id is a protocol
/// fault; a well-formed id nobody holds is merely an unknown session.
fn lookup_session<T: Transport>(
    inner: &ServerInner,
    transport: &mut T,
    addr: SocketAddr,
) -> Result<Option<Arc<Session>>> {
    let raw = wire::read_len_string(transport, "session id")?;
    let id = Uuid::parse_str(&raw).map_err(|_| Error::InvalidSessionId(raw))?;
    Ok(inner.registry.lookup(addr.ip(), id))
}

fn fetch_meshes<T: Transport>(
    inner: &ServerInner,
    transport: &mut T,
    addr: SocketAddr,
) -> Result<()> {
    let Some(session) = lookup_session(inner, transport, addr)? else {
        log::warn!("incoming-mesh request from {addr} with unknown session");
        transport.write_all(&[0])?;
        transport.flush()?;
        return Ok(());
    };

    let batch = inner.outbox.drain(DELIVERY_BATCH);
    transport.write_all(&[batch.len() as u8])?;
    transport.flush()?;

    for mesh in batch {
        let payload = codec::encode(&mesh)?;
        // The payload size travels as a length-prefixed decimal string.
        wire::write_len_string(transport, &payload.len().to_string())?;
        transport.write_all(&payload)?;
        transport.flush()?;

        sync::write_textures(transport, &mesh)?;
        sync::read_texture_handles(transport, &mesh, &session)?;

        let handle = session.record_mesh(&mesh);
        log::debug!(
            "delivered mesh as handle {handle} to session {}",
            session.id()
        );
    }
    Ok(())
}

fn fetch_removals<T: Transport>(
    inner: &ServerInner,
    transport: &mut T,
    addr: SocketAddr,
) -> Result<()> {
    let Some(session) = lookup_session(inner, transport, addr)? else {
        log::warn!("removal request from {addr} with unknown session");
        transport.write_all(&[0])?;
        transport.flush()?;
        return Ok(());
    };

    let handles = session.drain_pending_removal(REMOVAL_BATCH);
    transport.write_all(&[handles.len() as u8])?;
    for handle in &handles {
        wire::write_i32(transport, *handle)?;
    }
    transport.flush()?;
    if !handles.is_empty() {
        log::debug!(
            "session {} told to remove {} meshes",
            session.id(),
            handles.len()
        );
    }
    Ok(())
}

fn receive_pose<T: Transport>(inner: &ServerInner, transport: &mut T) -> Result<()> {
    let helmet_position = read_vec3(transport)?;
    let helmet_rotation = read_vec3(transport)?;
    let left_hand_position = read_vec3(transport)?;
    let left_hand_rotation = read_vec3(transport)?;
    let right_hand_position = read_vec3(transport)?;
    let right_hand_rotation = read_vec3(transport)?;
    let left_buttons = wire::read_u8(transport, "left controller buttons")?;
    let right_buttons = wire::read_u8(transport, "right controller buttons")?;
    let left_touch = [wire::read_f32(transport)?, wire::read_f32(transport)?];
    let right_touch = [wire::read_f32(transport)?, wire::read_f32(transport)?];

    let pose = PoseSnapshot {
        helmet_position,
        helmet_rotation,
        left_hand_position,
        left_hand_rotation,
        right_hand_position,
        right_hand_rotation,
        left_buttons,
        right_buttons,
        left_touch,
        right_touch,
    };
    inner.listeners.notify_interaction(&pose);
    Ok(())
}

fn read_vec3<T: Transport>(transport: &mut T) -> Result<[f32; 3]> {
    Ok([
        wire::read_f32(transport)?,
        wire::read_f32(transport)?,
        wire::read_f32(transport)?,
    ])
}

fn receive_keyboard<T: Transport>(
    inner: &ServerInner,
    transport: &mut T,
    addr: SocketAddr,
    keyboard_tx: &Sender<KeyboardDelta>,
) -> Result<()> {
    // The delta is decoded even when the session is unknown; key state is
    // scene-global, the id only attributes the sender.
    if lookup_session(inner, transport, addr)?.is_none() {
        log::warn!("keyboard delta from {addr} with unknown session");
    }
    let pressed = read_scan_codes(transport, "keyboard down-count", "keyboard down scan codes")?;
    let released = read_scan_codes(transport, "keyboard up-count", "keyboard up scan codes")?;
    if pressed.is_empty() && released.is_empty() {
        // Contract violation: a delta must change something.
        log::debug!("keyboard delta without changes from {addr}");
        return Ok(());
    }

    let delta = KeyboardDelta {
        pressed,
        released,
        received_at: SystemTime::now(),
    };
    match keyboard_tx.try_send(delta) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            log::warn!("keyboard notification queue full, dropping delta from {addr}");
        }
        Err(TrySendError::Disconnected(_)) => {
            // Server shutting down.
        }
    }
    Ok(())
}

fn read_scan_codes<T: Transport>(
    transport: &mut T,
    count_field: &'static str,
    codes_field: &'static str,
) -> Result<Vec<u8>> {
    let count = wire::read_u8(transport, count_field)? as usize;
    let mut codes = vec![0u8; count];
    wire::read_exact(transport, &mut codes, codes_field)?;
    Ok(codes)
}
