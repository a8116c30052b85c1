//! Outgoing mesh queue
//!
//! Meshes a producer has published but no client has fetched yet. Draining
//! is destructive: an entry handed out is never offered again, so with more
//! than one concurrent client each mesh reaches whichever session asks
//! first. That first-come-first-served ambiguity is inherited protocol
//! behavior and deliberately not papered over here.

use crate::mesh::Mesh;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Most meshes one incoming-mesh request may drain.
pub const DELIVERY_BATCH: usize = 100;

/// Insertion-ordered set of meshes awaiting delivery.
#[derive(Default)]
pub struct MeshQueue {
    queued: Mutex<VecDeque<Arc<Mesh>>>,
}

impl MeshQueue {
    pub fn new() -> MeshQueue {
        MeshQueue::default()
    }

    /// Queue a mesh for delivery. Returns false if the same mesh (by
    /// identity) is already waiting.
    pub fn publish(&self, mesh: Arc<Mesh>) -> bool {
        let mut queued = self.queued.lock();
        if queued.iter().any(|m| Arc::ptr_eq(m, &mesh)) {
            return false;
        }
        queued.push_back(mesh);
        true
    }

    /// Remove and return up to `max` meshes in insertion order.
    pub fn drain(&self, max: usize) -> Vec<Arc<Mesh>> {
        let mut queued = self.queued.lock();
        let take = queued.len().min(max);
        queued.drain(..take).collect()
    }

    /// Drop a not-yet-delivered mesh. Returns true if it was still queued.
    pub fn discard(&self, mesh: &Arc<Mesh>) -> bool {
        let mut queued = self.queued.lock();
        let before = queued.len();
        queued.retain(|m| !Arc::ptr_eq(m, mesh));
        queued.len() != before
    }

    pub fn len(&self) -> usize {
        self.queued.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Vertex;

    fn mesh() -> Arc<Mesh> {
        let mut m = Mesh::new();
        m.add_vertex(Vertex::at(0.0, 0.0, 0.0));
        Arc::new(m)
    }

    #[test]
    fn drain_is_destructive_and_bounded() {
        let queue = MeshQueue::new();
        let meshes: Vec<_> = (0..150).map(|_| mesh()).collect();
        for m in &meshes {
            assert!(queue.publish(Arc::clone(m)));
        }

        let first = queue.drain(DELIVERY_BATCH);
        assert_eq!(first.len(), 100);
        let second = queue.drain(DELIVERY_BATCH);
        assert_eq!(second.len(), 50);
        assert!(queue.is_empty());

        // Each mesh appears exactly once across both drains, in order.
        let drained: Vec<_> = first.iter().chain(second.iter()).collect();
        for (drained, published) in drained.iter().zip(meshes.iter()) {
            assert!(Arc::ptr_eq(drained, published));
        }
    }

    #[test]
    fn publishing_the_same_mesh_twice_is_a_no_op() {
        let queue = MeshQueue::new();
        let m = mesh();
        assert!(queue.publish(Arc::clone(&m)));
        assert!(!queue.publish(Arc::clone(&m)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn discard_removes_only_queued_meshes() {
        let queue = MeshQueue::new();
        let kept = mesh();
        let dropped = mesh();
        queue.publish(Arc::clone(&kept));
        queue.publish(Arc::clone(&dropped));

        assert!(queue.discard(&dropped));
        assert!(!queue.discard(&dropped));
        let remaining = queue.drain(DELIVERY_BATCH);
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &kept));
    }
}
