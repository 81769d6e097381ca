//! Per-node logging context
//!
//! Many nodes share one process in a simulation, so every span needs to say
//! which node it belongs to. A [`PeerContextGuard`] sets that node for the
//! current thread until it is dropped; [`crate::layers::PeerContextLayer`]
//! copies it onto spans as they open.

use std::cell::RefCell;

use ferry_core::PeerIdentity;
use uuid::Uuid;

/// Node context stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerContextData {
    /// The node's short identity
    pub peer_id: String,
    /// Unique ID for this node instance
    pub instance_id: Uuid,
    /// Scheduling tick being processed, when known
    pub tick: Option<u64>,
}

thread_local! {
    static PEER_CONTEXT: RefCell<Option<PeerContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Sets the node context for the current thread and restores the previous
/// one when dropped, so guards nest.
///
/// ```ignore
/// let node = SimulationIdentity::new('A').unwrap();
/// let _guard = PeerContextGuard::new(&node);
/// tracing::info!("Forwarding");
/// ```
pub struct PeerContextGuard {
    previous: Option<PeerContextData>,
}

impl PeerContextGuard {
    /// Set the context to `identity` with a fresh instance ID
    pub fn new<I: PeerIdentity>(identity: &I) -> Self {
        Self::install(PeerContextData {
            peer_id: identity.short_id(),
            instance_id: Uuid::new_v4(),
            tick: None,
        })
    }

    /// Set the context to `identity` with a fixed instance ID
    pub fn with_instance_id<I: PeerIdentity>(identity: &I, instance_id: Uuid) -> Self {
        Self::install(PeerContextData {
            peer_id: identity.short_id(),
            instance_id,
            tick: None,
        })
    }

    /// Set the context for one scheduling tick of a node
    pub fn for_tick<I: PeerIdentity>(identity: &I, instance_id: Uuid, tick: u64) -> Self {
        Self::install(PeerContextData {
            peer_id: identity.short_id(),
            instance_id,
            tick: Some(tick),
        })
    }

    fn install(data: PeerContextData) -> Self {
        let previous = PEER_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// Get the current context (if any)
    pub fn current() -> Option<PeerContextData> {
        PEER_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current node ID (if set)
    pub fn current_peer_id() -> Option<String> {
        Self::current().map(|ctx| ctx.peer_id)
    }
}

impl Drop for PeerContextGuard {
    fn drop(&mut self) {
        PEER_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a node context set
///
/// ```ignore
/// with_peer_context!(&node, {
///     tracing::info!("Forwarding");
/// });
/// ```
#[macro_export]
macro_rules! with_peer_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::PeerContextGuard::new($identity);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::SimulationIdentity;

    #[test]
    fn test_peer_context_guard() {
        assert!(PeerContextGuard::current().is_none());

        let node = SimulationIdentity::new('A').unwrap();
        {
            let _guard = PeerContextGuard::new(&node);
            let ctx = PeerContextGuard::current().unwrap();
            assert_eq!(ctx.peer_id, "A");
            assert_eq!(ctx.tick, None);
        }

        assert!(PeerContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        let a = SimulationIdentity::new('A').unwrap();
        let b = SimulationIdentity::new('B').unwrap();

        {
            let _guard_a = PeerContextGuard::new(&a);
            {
                let _guard_b = PeerContextGuard::for_tick(&b, Uuid::new_v4(), 7);
                let ctx = PeerContextGuard::current().unwrap();
                assert_eq!(ctx.peer_id, "B");
                assert_eq!(ctx.tick, Some(7));
            }
            assert_eq!(PeerContextGuard::current_peer_id(), Some("A".to_string()));
        }

        assert!(PeerContextGuard::current_peer_id().is_none());
    }

    #[test]
    fn test_macro_scopes_context() {
        let node = SimulationIdentity::new('M').unwrap();
        let seen = with_peer_context!(&node, { PeerContextGuard::current_peer_id() });
        assert_eq!(seen, Some("M".to_string()));
        assert!(PeerContextGuard::current().is_none());
    }

    #[test]
    fn test_fixed_instance_id() {
        let node = SimulationIdentity::new('X').unwrap();
        let instance_id = Uuid::new_v4();
        let _guard = PeerContextGuard::with_instance_id(&node, instance_id);
        assert_eq!(PeerContextGuard::current().unwrap().instance_id, instance_id);
    }
}
