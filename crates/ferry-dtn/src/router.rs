//! Forwarding node facade
//!
//! [`DtnRouter`] owns one node's routing state (hop history, replication
//! records, delivery bookkeeping) and exposes the entry points a host calls:
//!
//! - [`DtnRouter::on_tick`] once per scheduling step
//! - [`DtnRouter::on_receive_header`] before an inbound transfer starts
//! - [`DtnRouter::on_receive_complete`] / [`DtnRouter::on_receive_aborted`]
//!   when it ends
//! - [`DtnRouter::on_send_complete`] when an outbound transfer ends
//!
//! The buffer itself stays with the host and is reached through
//! [`BufferHost`] / [`ContactHost`].

use dashmap::DashSet;
use tracing::{debug, info, instrument, trace, warn};

use ferry_core::{BufferHost, ContactHost, Message, MessageId, PeerIdentity, TransferOutcome};

use crate::DtnConfig;
use crate::app::{ApplicationFilter, FilterChain};
use crate::error::{DtnError, DtnResult};
use crate::eviction::select_victim;
use crate::forwarding::{ForwardingEngine, TickOutcome};
use crate::guard::{DuplicateGuard, ReceiveVerdict, RejectReason};
use crate::history::HopHistory;
use crate::replication::ReplicationTracker;
use crate::response::build_response;

/// What happened to a message whose transfer into this node completed
#[derive(Debug, Clone)]
pub enum ReceiveOutcome<I: PeerIdentity> {
    /// Buffered for further forwarding
    Stored(Message<I>),
    /// This node is the destination
    Delivered {
        message: Message<I>,
        /// False when the same message was delivered here before
        first_delivery: bool,
        /// ID of the reply queued in response, if one was
        response: Option<MessageId>,
    },
    /// A reply made it back to the node that sent the original
    ResponseDelivered(Message<I>),
    /// An application filter discarded the message
    Discarded(MessageId),
    /// No room could be made to buffer the message
    Dropped(MessageId),
}

impl<I: PeerIdentity> ReceiveOutcome<I> {
    /// The (possibly application-transformed) message, unless it was discarded
    pub fn message(&self) -> Option<&Message<I>> {
        match self {
            ReceiveOutcome::Stored(message)
            | ReceiveOutcome::Delivered { message, .. }
            | ReceiveOutcome::ResponseDelivered(message) => Some(message),
            ReceiveOutcome::Discarded(_) | ReceiveOutcome::Dropped(_) => None,
        }
    }

    /// Check if the message reached its destination here
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            ReceiveOutcome::Delivered { .. } | ReceiveOutcome::ResponseDelivered(_)
        )
    }

    /// The reply queued by this delivery, if any
    pub fn response(&self) -> Option<&MessageId> {
        match self {
            ReceiveOutcome::Delivered { response, .. } => response.as_ref(),
            _ => None,
        }
    }
}

/// One node's forwarding logic
pub struct DtnRouter<I: PeerIdentity> {
    local: I,
    config: DtnConfig,
    history: HopHistory<I>,
    tracker: ReplicationTracker<I>,
    guard: DuplicateGuard<I>,
    engine: ForwardingEngine,
    filters: FilterChain<I>,
    /// Accepted inbound transfers, keyed by message and sender
    incoming: DashSet<(MessageId, I)>,
}

impl<I: PeerIdentity> DtnRouter<I> {
    /// Create a router for `local`
    pub fn new(local: I, config: DtnConfig) -> Self {
        for warning in config.validate() {
            warn!(node = %local, warning = %warning, "Questionable DTN configuration");
        }

        Self {
            history: HopHistory::from_config(&config.history),
            tracker: ReplicationTracker::new(config.replication.clone()),
            guard: DuplicateGuard::new(local.clone()),
            engine: ForwardingEngine::new(config.forwarding.clone()),
            filters: FilterChain::new(),
            incoming: DashSet::new(),
            local,
            config,
        }
    }

    /// Register an application filter
    pub fn with_filter(mut self, filter: impl ApplicationFilter<I> + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// This node's identity
    pub fn local(&self) -> &I {
        &self.local
    }

    pub fn config(&self) -> &DtnConfig {
        &self.config
    }

    /// Learned relays
    pub fn history(&self) -> &HopHistory<I> {
        &self.history
    }

    /// Per-message send records
    pub fn tracker(&self) -> &ReplicationTracker<I> {
        &self.tracker
    }

    /// Delivery bookkeeping
    pub fn guard(&self) -> &DuplicateGuard<I> {
        &self.guard
    }

    /// Number of accepted inbound transfers not yet finished
    pub fn pending_incoming(&self) -> usize {
        self.incoming.len()
    }

    /// Run one scheduling step
    #[instrument(skip_all, fields(node = %self.local))]
    pub fn on_tick<H: ContactHost<I>>(&self, host: &mut H) -> TickOutcome<I> {
        self.engine.run_tick(host, &self.history, &self.tracker)
    }

    /// Decide whether an inbound transfer of `message` from `from` may start
    #[instrument(skip_all, fields(node = %self.local, message_id = %message.id, from = %from))]
    pub fn on_receive_header<H: BufferHost<I>>(
        &self,
        message: &Message<I>,
        from: &I,
        host: &mut H,
    ) -> ReceiveVerdict {
        let verdict = self.guard.check(message, from);
        if !verdict.is_accept() {
            return verdict;
        }

        if host.contains_message(&message.id) {
            debug!("Copy already buffered");
            return ReceiveVerdict::reject(RejectReason::AlreadyHeld);
        }

        // Messages delivered here never occupy the buffer
        if message.destination != self.local && !self.make_room_for(host, message.size) {
            debug!(size = message.size, "No room for inbound message");
            return ReceiveVerdict::reject(RejectReason::NoSpace);
        }

        self.incoming.insert((message.id.clone(), from.clone()));
        trace!("Accepted inbound transfer");
        ReceiveVerdict::Accept
    }

    /// Handle a finished inbound transfer
    ///
    /// Fails with [`DtnError::Desynchronized`] when no matching transfer was
    /// accepted by [`DtnRouter::on_receive_header`].
    #[instrument(skip_all, fields(node = %self.local, message_id = %message.id, from = %from))]
    pub fn on_receive_complete<H: BufferHost<I>>(
        &self,
        mut message: Message<I>,
        from: &I,
        host: &mut H,
    ) -> DtnResult<ReceiveOutcome<I>> {
        self.take_incoming(&message.id, from)?;
        message.mark_received(host.now());

        if message.is_response_routed() {
            return Ok(self.receive_response(message, from, host));
        }

        self.history.record_observation(message.travel.nodes(), from);

        let id = message.id.clone();
        let Some(message) = self.filters.apply(message, &self.local) else {
            debug!("Discarded by application filter");
            self.guard.blacklist(&id);
            return Ok(ReceiveOutcome::Discarded(id));
        };

        if message.destination != self.local {
            return Ok(self.store_received(message, host));
        }

        let first_delivery = self.guard.record_delivery(&message.id);
        let response = if first_delivery && self.config.response.enabled {
            self.send_response(&message, host)
        } else {
            None
        };

        info!(first_delivery, hops = message.hop_count(), "Message delivered");
        Ok(ReceiveOutcome::Delivered {
            message,
            first_delivery,
            response,
        })
    }

    /// Forget an inbound transfer that was cut off
    pub fn on_receive_aborted(&self, message_id: &MessageId, from: &I) -> DtnResult<()> {
        self.take_incoming(message_id, from)?;
        debug!(node = %self.local, message_id = %message_id, from = %from, "Inbound transfer aborted");
        Ok(())
    }

    /// Handle a finished outbound transfer
    ///
    /// Returns true if the message was removed from the buffer.
    #[instrument(skip_all, fields(node = %self.local, message_id = %message.id, to = %to))]
    pub fn on_send_complete<H: BufferHost<I>>(
        &self,
        message: &Message<I>,
        to: &I,
        outcome: TransferOutcome,
        host: &mut H,
    ) -> bool {
        if !outcome.is_completed() {
            debug!("Outbound transfer aborted, keeping message");
            return false;
        }

        self.tracker.record_send(&message.id, to);
        let reached_destination = &message.destination == to;

        let remove = message.is_response_routed()
            || reached_destination
            || (self.config.replication.drop_when_exhausted
                && self.tracker.is_exhausted(&message.id));

        if remove {
            self.delete_message(host, &message.id);
            debug!(reached_destination, "Removed message after send");
        }
        remove
    }

    /// Add a locally originated message to the buffer
    pub fn create_message<H: BufferHost<I>>(
        &self,
        host: &mut H,
        message: Message<I>,
    ) -> DtnResult<MessageId> {
        if !self.make_room_for(host, message.size) {
            return Err(DtnError::NoSpace {
                message_id: message.id,
                size: message.size,
            });
        }

        let id = message.id.clone();
        debug!(node = %self.local, message_id = %id, destination = %message.destination, "Created message");
        host.insert_message(message);
        Ok(id)
    }

    /// Remove a message from the buffer and forget its send record
    pub fn delete_message<H: BufferHost<I>>(
        &self,
        host: &mut H,
        message_id: &MessageId,
    ) -> Option<Message<I>> {
        self.tracker.clear(message_id);
        host.remove_message(message_id)
    }

    /// The host dropped a message on its own (e.g. expiry)
    pub fn on_message_removed(&self, message_id: &MessageId) {
        self.tracker.clear(message_id);
    }

    /// Evict until `size` bytes are free
    ///
    /// Messages being sent are never evicted. Returns false when the space
    /// cannot be found, including when `size` exceeds the whole buffer.
    pub fn make_room_for<H: BufferHost<I>>(&self, host: &mut H, size: usize) -> bool {
        if size > host.buffer_capacity() {
            return false;
        }

        while host.free_buffer_space() < size {
            let Some(victim) = self.next_message_to_remove(host, true) else {
                return false;
            };
            if self.delete_message(host, &victim).is_none() {
                return false;
            }
            debug!(node = %self.local, message_id = %victim, "Evicted message");
        }
        true
    }

    /// The message the eviction policy would sacrifice next
    pub fn next_message_to_remove<H: BufferHost<I>>(
        &self,
        host: &H,
        exclude_sending: bool,
    ) -> Option<MessageId> {
        let messages = host.buffer_contents();
        select_victim(&messages, self.config.eviction.order, |id| {
            exclude_sending && host.is_sending(id)
        })
    }

    fn take_incoming(&self, message_id: &MessageId, from: &I) -> DtnResult<()> {
        if self
            .incoming
            .remove(&(message_id.clone(), from.clone()))
            .is_some()
        {
            return Ok(());
        }

        warn!(
            node = %self.local,
            message_id = %message_id,
            from = %from,
            "Transfer ended that was never accepted"
        );
        Err(DtnError::Desynchronized {
            message_id: message_id.clone(),
            peer: from.to_string(),
        })
    }

    fn receive_response<H: BufferHost<I>>(
        &self,
        mut message: Message<I>,
        from: &I,
        host: &mut H,
    ) -> ReceiveOutcome<I> {
        if let Some(path) = message.return_path.as_mut()
            && !path.advance_past(&self.local)
        {
            trace!(next_hop = ?path.next_hop(), "Reply arrived off its return path");
        }

        self.history.record_observation(message.travel.nodes(), from);

        if message.destination == self.local {
            self.guard.record_delivery(&message.id);
            info!(hops = message.hop_count(), "Reply returned to sender");
            return ReceiveOutcome::ResponseDelivered(message);
        }

        self.store_received(message, host)
    }

    fn store_received<H: BufferHost<I>>(&self, message: Message<I>, host: &mut H) -> ReceiveOutcome<I> {
        if !self.make_room_for(host, message.size) {
            debug!(size = message.size, "Dropped received message, no room");
            return ReceiveOutcome::Dropped(message.id);
        }

        trace!("Buffered received message");
        host.insert_message(message.clone());
        ReceiveOutcome::Stored(message)
    }

    fn send_response<H: BufferHost<I>>(&self, delivered: &Message<I>, host: &mut H) -> Option<MessageId> {
        let reply = build_response(delivered, &self.local, &self.config.response, host.now());
        match self.create_message(host, reply) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "Could not queue reply");
                None
            }
        }
    }
}
