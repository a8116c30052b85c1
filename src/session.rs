//! Sessions and the session registry
//!
//! A session records what one connected VR client already knows: the meshes
//! and textures it has received, keyed by server-local integer handles, and
//! the handles it still has to delete. The registry holds every live
//! session; sessions die only with the process, there is no per-session
//! teardown in the protocol.

use crate::mesh::Mesh;
use crate::tex::Texture;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

/// One connected client's identity and knowledge.
pub struct Session {
    id: Uuid,
    remote_addr: IpAddr,
    /// Knowledge and pending-removal bookkeeping under one lock: removal
    /// needs a consistent view of both maps.
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    known_meshes: HashMap<i32, Arc<Mesh>>,
    known_textures: HashMap<i32, Arc<Texture>>,
    /// Handles the client must delete, in marking order.
    pending_removal: Vec<i32>,
    next_handle: i32,
}

impl SessionState {
    fn take_handle(&mut self) -> i32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Session {
    fn new(id: Uuid, remote_addr: IpAddr) -> Session {
        Session {
            id,
            remote_addr,
            state: Mutex::new(SessionState {
                next_handle: 1,
                ..SessionState::default()
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn remote_addr(&self) -> IpAddr {
        self.remote_addr
    }

    /// True when this session is addressed by the given source address and
    /// id. Both must match.
    pub fn matches(&self, remote_addr: IpAddr, id: Uuid) -> bool {
        self.id == id && self.remote_addr == remote_addr
    }

    /// Record a delivered mesh under a fresh handle and return the handle.
    ///
    /// Handles are stable for the life of the session and never reused.
    pub fn record_mesh(&self, mesh: &Arc<Mesh>) -> i32 {
        let mut state = self.state.lock();
        let handle = state.take_handle();
        state.known_meshes.insert(handle, Arc::clone(mesh));
        handle
    }

    /// Record an acknowledged texture under a fresh handle, unless the
    /// session already knows it.
    pub fn record_texture(&self, texture: &Arc<Texture>) -> i32 {
        let mut state = self.state.lock();
        if let Some(known) = state
            .known_textures
            .iter()
            .find(|(_, t)| Arc::ptr_eq(t, texture))
        {
            return *known.0;
        }
        let handle = state.take_handle();
        state.known_textures.insert(handle, Arc::clone(texture));
        handle
    }

    pub fn knows_mesh(&self, mesh: &Arc<Mesh>) -> bool {
        self.state
            .lock()
            .known_meshes
            .values()
            .any(|m| Arc::ptr_eq(m, mesh))
    }

    pub fn knows_texture(&self, texture: &Arc<Texture>) -> bool {
        self.state
            .lock()
            .known_textures
            .values()
            .any(|t| Arc::ptr_eq(t, texture))
    }

    /// Queue every handle this session knows `mesh` under for deletion on
    /// the client.
    pub fn mark_for_removal(&self, mesh: &Arc<Mesh>) {
        let mut state = self.state.lock();
        let handles: Vec<i32> = state
            .known_meshes
            .iter()
            .filter(|(_, m)| Arc::ptr_eq(m, mesh))
            .map(|(h, _)| *h)
            .collect();
        for handle in handles {
            if !state.pending_removal.contains(&handle) {
                state.pending_removal.push(handle);
            }
        }
    }

    /// Atomically take up to `max` pending-removal handles, forgetting the
    /// meshes behind them in the same critical section. A drained handle is
    /// reported exactly once; surplus handles stay pending.
    pub fn drain_pending_removal(&self, max: usize) -> Vec<i32> {
        let mut state = self.state.lock();
        let take = state.pending_removal.len().min(max);
        let drained: Vec<i32> = state.pending_removal.drain(..take).collect();
        for handle in &drained {
            state.known_meshes.remove(handle);
        }
        drained
    }
}

struct RegistryState {
    sessions: Vec<Arc<Session>>,
    issued: HashSet<Uuid>,
}

/// All live sessions plus every identifier ever issued.
///
/// One lock covers both: identifier generation, registration and lookup are
/// a single mutual-exclusion domain.
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry {
            state: Mutex::new(RegistryState {
                sessions: Vec::new(),
                issued: HashSet::new(),
            }),
        }
    }

    /// Generate a random identifier no session of this registry has ever
    /// used, and reserve it.
    pub fn new_identifier(&self) -> Uuid {
        let mut state = self.state.lock();
        loop {
            let candidate = Uuid::new_v4();
            if state.issued.insert(candidate) {
                return candidate;
            }
        }
    }

    /// Create and register a session for a client address.
    pub fn register_session(&self, remote_addr: IpAddr) -> Arc<Session> {
        let id = self.new_identifier();
        let session = Arc::new(Session::new(id, remote_addr));
        self.state.lock().sessions.push(Arc::clone(&session));
        log::info!("registered session {} for {}", id, remote_addr);
        session
    }

    /// Find the session addressed by `(remote_addr, id)`. Absence means an
    /// unknown or expired session, not a fault.
    pub fn lookup(&self, remote_addr: IpAddr, id: Uuid) -> Option<Arc<Session>> {
        self.state
            .lock()
            .sessions
            .iter()
            .find(|s| s.matches(remote_addr, id))
            .cloned()
    }

    /// Snapshot of every live session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.state.lock().sessions.clone()
    }

    /// Mark a mesh for removal in every live session that knows it.
    pub fn mark_for_removal_everywhere(&self, mesh: &Arc<Mesh>) {
        for session in self.sessions() {
            session.mark_for_removal(mesh);
        }
    }
}
