//! Change notifications with connect/disconnect subscriptions.

use crate::core::{DataChange, SharedData};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::rc::Rc;

new_key_type! {
    /// Identifies one listener connected to a [`Signal`].
    ///
    /// Keys are never reused by the signal that issued them, so a stale
    /// connection cannot disconnect a newer listener.
    pub struct Connection;
}

/// Fired after every completed state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    pub new_state: String,
    pub previous_state: String,
}

/// Fired after every notifying data change.
#[derive(Clone, Debug)]
pub struct DataChanged {
    /// The machine's store, after the change.
    pub data: SharedData,
    pub change: DataChange,
}

type Listener<E> = Rc<dyn Fn(&E)>;

/// A list of listeners notified synchronously, in connection order.
pub struct Signal<E> {
    listeners: RefCell<SlotMap<Connection, Listener<E>>>,
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(SlotMap::with_key()),
        }
    }
}

impl<E> Signal<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a listener.
    pub fn connect<F>(&self, listener: F) -> Connection
    where
        F: Fn(&E) + 'static,
    {
        self.listeners.borrow_mut().insert(Rc::new(listener))
    }

    /// Disconnect a listener. Returns `false` if it was not connected.
    pub fn disconnect(&self, connection: Connection) -> bool {
        self.listeners.borrow_mut().remove(connection).is_some()
    }

    pub fn disconnect_all(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn is_connected(&self, connection: Connection) -> bool {
        self.listeners.borrow().contains_key(connection)
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Notify every listener connected when the call starts.
    ///
    /// Listeners may connect or disconnect while being notified.
    pub(crate) fn fire(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }
}
