//! Application filter hook
//!
//! Applications see every ordinary message this node receives and may
//! rewrite it or drop it. A dropped message is remembered so the node will
//! not accept it again.

use ferry_core::{Message, PeerIdentity};

/// An application layer sitting on top of a forwarding node
pub trait ApplicationFilter<I: PeerIdentity>: Send + Sync {
    /// Messages this filter handles; `None` means all of them
    fn app_id(&self) -> Option<&str>;

    /// Inspect a received message, returning `None` to discard it
    fn handle(&self, message: Message<I>, local: &I) -> Option<Message<I>>;
}

/// Ordered set of filters
pub struct FilterChain<I: PeerIdentity> {
    filters: Vec<Box<dyn ApplicationFilter<I>>>,
}

impl<I: PeerIdentity> FilterChain<I> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Append a filter; filters run in registration order
    pub fn push(&mut self, filter: Box<dyn ApplicationFilter<I>>) {
        self.filters.push(filter);
    }

    /// Run every matching filter over `message`
    pub fn apply(&self, message: Message<I>, local: &I) -> Option<Message<I>> {
        let mut message = message;
        for filter in &self.filters {
            let applies = match filter.app_id() {
                None => true,
                Some(app_id) => message.app_id.as_deref() == Some(app_id),
            };
            if applies {
                message = filter.handle(message, local)?;
            }
        }
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<I: PeerIdentity> Default for FilterChain<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ferry_core::SimulationIdentity;

    fn make_id(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    struct Uppercase;

    impl ApplicationFilter<SimulationIdentity> for Uppercase {
        fn app_id(&self) -> Option<&str> {
            Some("shout")
        }

        fn handle(
            &self,
            mut message: Message<SimulationIdentity>,
            _local: &SimulationIdentity,
        ) -> Option<Message<SimulationIdentity>> {
            message.payload.make_ascii_uppercase();
            Some(message)
        }
    }

    struct DropAll;

    impl ApplicationFilter<SimulationIdentity> for DropAll {
        fn app_id(&self) -> Option<&str> {
            None
        }

        fn handle(
            &self,
            _message: Message<SimulationIdentity>,
            _local: &SimulationIdentity,
        ) -> Option<Message<SimulationIdentity>> {
            None
        }
    }

    fn message(app: Option<&str>) -> Message<SimulationIdentity> {
        let msg = Message::new("m1", make_id('A'), make_id('B'), b"hey".to_vec(), Utc::now());
        match app {
            Some(app) => msg.with_app_id(app),
            None => msg,
        }
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let chain = FilterChain::new();
        assert!(chain.apply(message(None), &make_id('B')).is_some());
    }

    #[test]
    fn test_filter_only_sees_its_app() {
        let mut chain = FilterChain::new();
        chain.push(Box::new(Uppercase));

        let tagged = chain.apply(message(Some("shout")), &make_id('B')).unwrap();
        assert_eq!(tagged.payload, b"HEY".to_vec());

        let other = chain.apply(message(Some("chat")), &make_id('B')).unwrap();
        assert_eq!(other.payload, b"hey".to_vec());
    }

    #[test]
    fn test_untagged_filter_can_discard() {
        let mut chain = FilterChain::new();
        chain.push(Box::new(Uppercase));
        chain.push(Box::new(DropAll));

        assert!(chain.apply(message(Some("shout")), &make_id('B')).is_none());
        assert_eq!(chain.len(), 2);
    }
}
