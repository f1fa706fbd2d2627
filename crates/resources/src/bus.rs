//! Shader hot-reload notifications.
//!
//! The resource system emits the path of every successfully injected shader.
//! Subscribers receive it on their own channel and poll it from the update
//! loop; dropping a [`Subscription`] unsubscribes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    senders: BTreeMap<u64, Sender<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderInjectedBus {
    subscribers: Rc<RefCell<Subscribers>>,
}

impl ShaderInjectedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let mut subscribers = self.subscribers.borrow_mut();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.insert(id, sender);
        Subscription {
            id,
            receiver,
            bus: Rc::downgrade(&self.subscribers),
        }
    }

    /// Notify every live subscriber. Returns how many received the path.
    pub fn emit(&self, path: &str) -> usize {
        let subscribers = self.subscribers.borrow();
        let delivered = subscribers
            .senders
            .values()
            .filter(|sender| sender.send(path.to_string()).is_ok())
            .count();
        tracing::debug!(path, delivered, "shader injected");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().senders.len()
    }
}

/// A live subscription. Unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<String>,
    bus: Weak<RefCell<Subscribers>>,
}

impl Subscription {
    /// Paths emitted since the last poll, oldest first.
    pub fn poll(&self) -> Vec<String> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.borrow_mut().senders.remove(&self.id);
        }
    }
}
