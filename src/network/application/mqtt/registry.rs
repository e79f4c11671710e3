//! Ownership of transport sessions.
//!
//! A transport with a single global message handler can only feed one client.
//! The [`SessionRegistry`] records which client currently owns each session:
//! a client binds its transport's session when it is created (taking it over
//! from any previous owner) and releases it when dropped. The registry also
//! hands out the request identifiers returned by publish, subscribe and
//! unsubscribe, shared by every client that uses it.

use super::error::Error;
use super::transport::SessionId;
use core::cell::{Cell, RefCell};
use heapless::FnvIndexMap;

/// Identifies one [`MqttClient`](super::MqttClient) within a registry.
pub type InstanceId = u32;

/// Identifier of an accepted publish, subscribe or unsubscribe request.
///
/// Strictly increasing per registry. It carries no meaning beyond "accepted"
/// and is unrelated to MQTT packet identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u32);

impl RequestId {
    /// The numeric value, always at least 1.
    pub fn get(self) -> u32 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RequestId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "RequestId({})", self.0)
    }
}

/// Maps sessions to the client that receives their messages.
///
/// `N` bounds the number of concurrently bound sessions and must be a power
/// of two.
///
/// # Examples
///
/// ```rust
/// use minimqtt::network::application::mqtt::SessionRegistry;
///
/// let registry: SessionRegistry<4> = SessionRegistry::new();
/// assert_eq!(registry.bind(0, 1), Ok(None));
/// assert_eq!(registry.bind(0, 2), Ok(Some(1)));
/// assert!(!registry.release(0, 1));
/// assert_eq!(registry.owner(0), Some(2));
/// ```
#[derive(Debug)]
pub struct SessionRegistry<const N: usize = 4> {
    bindings: RefCell<FnvIndexMap<SessionId, InstanceId, N>>,
    next_instance: Cell<InstanceId>,
    next_request: Cell<u32>,
}

impl<const N: usize> SessionRegistry<N> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            bindings: RefCell::new(FnvIndexMap::new()),
            next_instance: Cell::new(1),
            next_request: Cell::new(1),
        }
    }

    /// Make `instance` the owner of `session`.
    ///
    /// Returns the previous owner, if a different instance held the session.
    pub fn bind(&self, session: SessionId, instance: InstanceId) -> Result<Option<InstanceId>, Error> {
        let previous = self
            .bindings
            .borrow_mut()
            .insert(session, instance)
            .map_err(|_| Error::RegistryFull)?;
        Ok(previous.filter(|owner| *owner != instance))
    }

    /// Remove the binding of `session` if `instance` still owns it.
    pub fn release(&self, session: SessionId, instance: InstanceId) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.get(&session) == Some(&instance) {
            bindings.remove(&session);
            true
        } else {
            false
        }
    }

    /// The instance currently owning `session`.
    pub fn owner(&self, session: SessionId) -> Option<InstanceId> {
        self.bindings.borrow().get(&session).copied()
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Whether no session is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }

    pub(crate) fn allocate_instance(&self) -> InstanceId {
        let id = self.next_instance.get();
        self.next_instance.set(id.wrapping_add(1).max(1));
        id
    }

    pub(crate) fn next_request_id(&self) -> RequestId {
        let id = self.next_request.get();
        self.next_request.set(id.wrapping_add(1).max(1));
        RequestId(id)
    }
}

impl<const N: usize> Default for SessionRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
