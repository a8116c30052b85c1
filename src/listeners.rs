//! Listener callbacks
//!
//! The core hands decoded pose and keyboard events, connection status
//! changes and per-connection faults to registered listeners, and asks them
//! for the window title shown by the VR client. Closures register directly
//! through blanket impls.

use crate::error::Error;
use crate::interaction::{KeyboardDelta, PoseSnapshot};
use parking_lot::RwLock;

/// Supplies the client-visible application title.
pub trait AppInfoListener: Send + Sync {
    /// Title text; transported as Latin-1.
    fn latin1_title(&self) -> String;
}

/// Told when a client creates a session.
pub trait StatusListener: Send + Sync {
    fn notify_status(&self, connected: bool);
}

/// Receives helmet and controller snapshots.
///
/// Invoked synchronously on the dispatcher thread; a slow listener delays
/// the next connection.
pub trait InteractionListener: Send + Sync {
    fn interaction(&self, pose: &PoseSnapshot);
}

/// Receives keyboard deltas, in receipt order, from the notification
/// worker.
pub trait KeyboardListener: Send + Sync {
    fn keyboard_event(&self, delta: &KeyboardDelta);
}

/// Offered every fault raised while servicing a connection.
pub trait FaultListener: Send + Sync {
    fn handle(&self, fault: &Error);
}

impl<F: Fn() -> String + Send + Sync> AppInfoListener for F {
    fn latin1_title(&self) -> String {
        self()
    }
}

impl<F: Fn(bool) + Send + Sync> StatusListener for F {
    fn notify_status(&self, connected: bool) {
        self(connected)
    }
}

impl<F: Fn(&PoseSnapshot) + Send + Sync> InteractionListener for F {
    fn interaction(&self, pose: &PoseSnapshot) {
        self(pose)
    }
}

impl<F: Fn(&KeyboardDelta) + Send + Sync> KeyboardListener for F {
    fn keyboard_event(&self, delta: &KeyboardDelta) {
        self(delta)
    }
}

impl<F: Fn(&Error) + Send + Sync> FaultListener for F {
    fn handle(&self, fault: &Error) {
        self(fault)
    }
}

/// Registry of everything listening to the server.
#[derive(Default)]
pub struct VrListeners {
    info: RwLock<Vec<Box<dyn AppInfoListener>>>,
    status: RwLock<Vec<Box<dyn StatusListener>>>,
    interaction: RwLock<Vec<Box<dyn InteractionListener>>>,
    keyboard: RwLock<Vec<Box<dyn KeyboardListener>>>,
    faults: RwLock<Vec<Box<dyn FaultListener>>>,
}

impl VrListeners {
    pub fn new() -> VrListeners {
        VrListeners::default()
    }

    pub fn add_info<L: AppInfoListener + 'static>(&self, listener: L) {
        self.info.write().push(Box::new(listener));
    }

    pub fn add_status<L: StatusListener + 'static>(&self, listener: L) {
        self.status.write().push(Box::new(listener));
    }

    pub fn add_interaction<L: InteractionListener + 'static>(&self, listener: L) {
        self.interaction.write().push(Box::new(listener));
    }

    pub fn add_keyboard<L: KeyboardListener + 'static>(&self, listener: L) {
        self.keyboard.write().push(Box::new(listener));
    }

    pub fn add_fault<L: FaultListener + 'static>(&self, listener: L) {
        self.faults.write().push(Box::new(listener));
    }

    /// Window title: the concatenation of every info listener's text.
    pub fn title(&self) -> String {
        let mut title = String::new();
        for listener in self.info.read().iter() {
            title.push_str(&listener.latin1_title());
        }
        title
    }

    pub fn notify_status(&self, connected: bool) {
        for listener in self.status.read().iter() {
            listener.notify_status(connected);
        }
    }

    pub fn notify_interaction(&self, pose: &PoseSnapshot) {
        for listener in self.interaction.read().iter() {
            listener.interaction(pose);
        }
    }

    pub fn notify_keyboard(&self, delta: &KeyboardDelta) {
        for listener in self.keyboard.read().iter() {
            listener.keyboard_event(delta);
        }
    }

    /// Offer a fault to the registered handlers. Returns false when nobody
    /// was there to claim it; the caller then logs it.
    pub fn handle_fault(&self, fault: &Error) -> bool {
        let handlers = self.faults.read();
        for handler in handlers.iter() {
            handler.handle(fault);
        }
        !handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn title_concatenates_info_listeners() {
        let listeners = VrListeners::new();
        assert_eq!(listeners.title(), "");
        listeners.add_info(|| "Test ".to_string());
        listeners.add_info(|| "App".to_string());
        assert_eq!(listeners.title(), "Test App");
    }

    #[test]
    fn faults_report_whether_anyone_listened() {
        let listeners = VrListeners::new();
        let fault = Error::Timeout;
        assert!(!listeners.handle_fault(&fault));

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        listeners.add_fault(move |_: &Error| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(listeners.handle_fault(&fault));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_reaches_every_listener() {
        let listeners = VrListeners::new();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let counter = Arc::clone(&seen);
            listeners.add_status(move |connected: bool| {
                if connected {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        listeners.notify_status(true);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
