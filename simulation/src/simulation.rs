//! Simulation engine
//!
//! Drives a mesh of Ferry nodes in discrete ticks. Each tick:
//! 1. Potential links come up or go down
//! 2. Transfers whose link dropped are aborted on both sides
//! 3. Running transfers advance; finished ones are handed to the receiver
//! 4. Messages past their TTL are dropped from buffers
//! 5. Every node runs one forwarding step, in identity order
//!
//! A node takes part in at most one transfer at a time, sending or
//! receiving.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use uuid::Uuid;

use ferry_core::{
    BufferHost, ConnectionId, Contact, ContactHost, Message, MessageId, TransferError,
    TransferOutcome,
};
use ferry_dtn::{
    DtnConfig, DtnRouter, ForwardReason, ReceiveOutcome, ReceiveVerdict, RejectReason,
};
use ferry_logging::PeerContextGuard;

use crate::buffer::MessageBuffer;
use crate::error::{SimError, SimResult};
use crate::topology::{Mesh, link_key};
use crate::types::{PeerId, SimEvent, SimStats};

/// Configuration for the simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Probability each potential link is up on a tick (1.0 = always)
    pub link_probability: f64,
    /// Ticks a transfer needs to complete
    pub transfer_ticks: u64,
    /// Buffer capacity per node, in bytes
    pub buffer_capacity: usize,
    /// Accounted size of a created message, in bytes
    pub message_size: usize,
    /// Ticks after creation at which buffered copies are dropped
    pub message_ttl: Option<u64>,
    /// Seed for link flapping; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Ticks run by [`Simulation::run`]
    pub max_ticks: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            link_probability: 1.0,
            transfer_ticks: 1,
            buffer_capacity: 10_000,
            message_size: 100,
            message_ttl: None,
            seed: None,
            max_ticks: 200,
        }
    }
}

/// One simulated node
pub struct SimNode {
    pub router: DtnRouter<PeerId>,
    pub buffer: MessageBuffer,
    instance_id: Uuid,
}

impl SimNode {
    fn new(id: PeerId, config: DtnConfig, capacity: usize) -> Self {
        Self {
            router: DtnRouter::new(id, config),
            buffer: MessageBuffer::new(capacity),
            instance_id: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveTransfer {
    message: Message<PeerId>,
    from: PeerId,
    to: PeerId,
    connection: ConnectionId,
    remaining: u64,
}

impl ActiveTransfer {
    fn involves(&self, peer: PeerId) -> bool {
        self.from == peer || self.to == peer
    }
}

fn is_sending(transfers: &[ActiveTransfer], node: PeerId, id: &MessageId) -> bool {
    transfers.iter().any(|t| t.from == node && &t.message.id == id)
}

/// The simulation state
pub struct Simulation {
    /// Potential links
    pub mesh: Mesh,
    /// Current simulation tick
    pub tick: u64,
    pub config: SimConfig,
    pub stats: SimStats,
    /// Everything that happened, in order
    pub event_log: Vec<SimEvent>,
    nodes: BTreeMap<PeerId, SimNode>,
    /// Links up this tick and the connection carried on each
    links: BTreeMap<(PeerId, PeerId), ConnectionId>,
    /// Links pinned up (`true`) or down (`false`)
    forced: BTreeMap<(PeerId, PeerId), bool>,
    transfers: Vec<ActiveTransfer>,
    created_ticks: HashMap<MessageId, u64>,
    next_connection: u64,
    next_message: u64,
    rng: StdRng,
}

impl Simulation {
    /// Create a simulation where every node runs `dtn`
    pub fn new(mesh: Mesh, config: SimConfig, dtn: DtnConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let nodes = mesh
            .peer_ids()
            .into_iter()
            .map(|id| (id, SimNode::new(id, dtn.clone(), config.buffer_capacity)))
            .collect();

        Self {
            mesh,
            tick: 0,
            config,
            stats: SimStats::default(),
            event_log: Vec::new(),
            nodes,
            links: BTreeMap::new(),
            forced: BTreeMap::new(),
            transfers: Vec::new(),
            created_ticks: HashMap::new(),
            next_connection: 0,
            next_message: 0,
            rng,
        }
    }

    /// Simulated wall clock: one second per tick
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(self.tick as i64)
    }

    /// Get a node's router and buffer
    pub fn node(&self, id: PeerId) -> Option<&SimNode> {
        self.nodes.get(&id)
    }

    /// Check if a node currently holds a message
    pub fn holds(&self, id: PeerId, message_id: &MessageId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node| node.buffer.contains(message_id))
    }

    /// Check if a link is up this tick
    pub fn is_link_up(&self, a: PeerId, b: PeerId) -> bool {
        self.links.contains_key(&link_key(a, b))
    }

    /// Transfers started for `message_id`, in order, with the rule that
    /// picked each one
    pub fn forwards_of(&self, message_id: &MessageId) -> Vec<(PeerId, PeerId, ForwardReason)> {
        self.event_log
            .iter()
            .filter_map(|event| match event {
                SimEvent::TransferStarted {
                    message_id: id,
                    from,
                    to,
                    via,
                    ..
                } if id == message_id => Some((*from, *to, *via)),
                _ => None,
            })
            .collect()
    }

    /// Number of transfers in flight
    pub fn active_transfers(&self) -> usize {
        self.transfers.len()
    }

    /// Pin a potential link up from the next tick on
    pub fn force_link_up(&mut self, a: PeerId, b: PeerId) {
        self.forced.insert(link_key(a, b), true);
    }

    /// Pin a potential link down from the next tick on
    pub fn force_link_down(&mut self, a: PeerId, b: PeerId) {
        self.forced.insert(link_key(a, b), false);
    }

    /// Return a link to random flapping
    pub fn release_link(&mut self, a: PeerId, b: PeerId) {
        self.forced.remove(&link_key(a, b));
    }

    /// Create a message at `from` addressed to `to`
    pub fn send_message(
        &mut self,
        from: PeerId,
        to: PeerId,
        payload: Vec<u8>,
    ) -> SimResult<MessageId> {
        let now = self.now();
        let message_id = MessageId::new(format!("M{}", self.next_message));
        let message = Message::new(message_id.clone(), from, to, payload, now)
            .with_size(self.config.message_size);

        let node = self.nodes.get_mut(&from).ok_or(SimError::UnknownPeer(from))?;
        let mut view = BufferView::new(from, &mut node.buffer, &self.transfers, now);
        let created = node.router.create_message(&mut view, message);
        self.stats.messages_evicted += view.removed as u64;
        created?;

        self.next_message += 1;
        self.stats.messages_created += 1;
        self.created_ticks.insert(message_id.clone(), self.tick);
        self.event_log.push(SimEvent::Created {
            message_id: message_id.clone(),
            source: from,
            destination: to,
            tick: self.tick,
        });
        debug!(message_id = %message_id, from = %from, to = %to, "Message created");
        Ok(message_id)
    }

    /// Run a single simulation tick
    pub fn step(&mut self) -> SimResult<()> {
        self.tick += 1;
        trace!(tick = self.tick, "Tick");

        self.update_links();
        self.abort_broken_transfers()?;
        self.progress_transfers()?;
        self.expire_messages();
        self.run_nodes();
        Ok(())
    }

    /// Run for a specific number of ticks
    pub fn run_ticks(&mut self, ticks: u64) -> SimResult<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Run until `done` holds or `max_ticks` more ticks have passed
    ///
    /// Returns whether `done` was reached.
    pub fn run_until<F>(&mut self, max_ticks: u64, done: F) -> SimResult<bool>
    where
        F: Fn(&Simulation) -> bool,
    {
        for _ in 0..max_ticks {
            if done(self) {
                return Ok(true);
            }
            self.step()?;
        }
        Ok(done(self))
    }

    /// Run up to the configured tick limit
    pub fn run(&mut self) -> SimResult<()> {
        while self.tick < self.config.max_ticks {
            self.step()?;
        }
        info!(tick = self.tick, delivered = self.stats.messages_delivered, "Simulation complete");
        Ok(())
    }

    /// Get a summary of the current state
    pub fn state_summary(&self) -> String {
        let buffered: usize = self.nodes.values().map(|n| n.buffer.len()).sum();
        format!(
            "Tick {}: {} links up, {} transfers, {} messages buffered, {} delivered",
            self.tick,
            self.links.len(),
            self.transfers.len(),
            buffered,
            self.stats.messages_delivered
        )
    }

    fn update_links(&mut self) {
        let edges: Vec<_> = self.mesh.edges().collect();
        for key in edges {
            let up = match self.forced.get(&key) {
                Some(&pinned) => pinned,
                None => {
                    self.config.link_probability >= 1.0
                        || self.rng.random::<f64>() < self.config.link_probability
                }
            };
            let was_up = self.links.contains_key(&key);

            if up && !was_up {
                self.links.insert(key, ConnectionId(self.next_connection));
                self.next_connection += 1;
                self.event_log.push(SimEvent::LinkUp {
                    a: key.0,
                    b: key.1,
                    tick: self.tick,
                });
            } else if !up && was_up {
                self.links.remove(&key);
                self.event_log.push(SimEvent::LinkDown {
                    a: key.0,
                    b: key.1,
                    tick: self.tick,
                });
            }
        }
    }

    fn contacts_of(&self, id: PeerId) -> Vec<Contact<PeerId>> {
        self.links
            .iter()
            .filter_map(|(&(a, b), &connection)| {
                if a == id {
                    Some(Contact::new(b, connection))
                } else if b == id {
                    Some(Contact::new(a, connection))
                } else {
                    None
                }
            })
            .collect()
    }

    fn abort_broken_transfers(&mut self) -> SimResult<()> {
        let (broken, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut self.transfers)
            .into_iter()
            .partition(|t| self.links.get(&link_key(t.from, t.to)) != Some(&t.connection));
        self.transfers = alive;

        for transfer in broken {
            let now = self.now();
            if let Some(receiver) = self.nodes.get(&transfer.to) {
                receiver
                    .router
                    .on_receive_aborted(&transfer.message.id, &transfer.from)?;
            }
            if let Some(sender) = self.nodes.get_mut(&transfer.from) {
                let mut view = BufferView::new(transfer.from, &mut sender.buffer, &self.transfers, now);
                sender.router.on_send_complete(
                    &transfer.message,
                    &transfer.to,
                    TransferOutcome::Aborted,
                    &mut view,
                );
            }

            debug!(
                message_id = %transfer.message.id,
                from = %transfer.from,
                to = %transfer.to,
                "Transfer aborted, link down"
            );
            self.stats.transfers_aborted += 1;
            self.event_log.push(SimEvent::TransferAborted {
                message_id: transfer.message.id,
                from: transfer.from,
                to: transfer.to,
                tick: self.tick,
            });
        }
        Ok(())
    }

    fn progress_transfers(&mut self) -> SimResult<()> {
        for transfer in &mut self.transfers {
            transfer.remaining = transfer.remaining.saturating_sub(1);
        }
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.transfers)
            .into_iter()
            .partition(|t| t.remaining == 0);
        self.transfers = pending;

        for transfer in done {
            self.complete_transfer(transfer)?;
        }
        Ok(())
    }

    fn complete_transfer(&mut self, transfer: ActiveTransfer) -> SimResult<()> {
        let now = self.now();
        let ActiveTransfer {
            message, from, to, ..
        } = transfer;

        if let Some(receiver) = self.nodes.get_mut(&to) {
            let mut copy = message.clone();
            copy.record_hop(to);
            let mut view = BufferView::new(to, &mut receiver.buffer, &self.transfers, now);
            let received = receiver.router.on_receive_complete(copy, &from, &mut view);
            self.stats.messages_evicted += view.removed as u64;
            self.record_receipt(received?, to);
        }

        if let Some(sender) = self.nodes.get_mut(&from) {
            let mut view = BufferView::new(from, &mut sender.buffer, &self.transfers, now);
            sender
                .router
                .on_send_complete(&message, &to, TransferOutcome::Completed, &mut view);
        }

        self.stats.transfers_completed += 1;
        self.event_log.push(SimEvent::TransferCompleted {
            message_id: message.id,
            from,
            to,
            tick: self.tick,
        });
        Ok(())
    }

    fn record_receipt(&mut self, outcome: ReceiveOutcome<PeerId>, node: PeerId) {
        let tick = self.tick;
        match outcome {
            ReceiveOutcome::Stored(_) => {}
            ReceiveOutcome::Delivered {
                message,
                first_delivery,
                response,
            } => {
                if first_delivery {
                    self.stats.messages_delivered += 1;
                    self.stats.total_hops += message.hop_count() as u64;
                    if let Some(created) = self.created_ticks.get(&message.id) {
                        self.stats.total_delivery_latency += tick.saturating_sub(*created);
                    }
                } else {
                    self.stats.duplicate_deliveries += 1;
                }
                if response.is_some() {
                    self.stats.responses_created += 1;
                }
                self.event_log.push(SimEvent::Delivered {
                    message_id: message.id,
                    to: node,
                    travel: message.travel.nodes().to_vec(),
                    first_delivery,
                    tick,
                });
            }
            ReceiveOutcome::ResponseDelivered(message) => {
                self.stats.responses_delivered += 1;
                self.event_log.push(SimEvent::ResponseDelivered {
                    message_id: message.id,
                    to: node,
                    travel: message.travel.nodes().to_vec(),
                    tick,
                });
            }
            ReceiveOutcome::Discarded(message_id) => {
                self.stats.messages_discarded += 1;
                self.event_log.push(SimEvent::Discarded {
                    message_id,
                    node,
                    tick,
                });
            }
            // Arrived but could not be buffered
            ReceiveOutcome::Dropped(_) => {
                self.stats.messages_evicted += 1;
            }
        }
    }

    fn expire_messages(&mut self) {
        let Some(ttl) = self.config.message_ttl else {
            return;
        };
        let now = self.now();
        let lifetime = Duration::seconds(ttl as i64);

        for (id, node) in &mut self.nodes {
            let expired: Vec<MessageId> = node
                .buffer
                .messages()
                .iter()
                .filter(|m| now - m.created_at >= lifetime)
                .filter(|m| !is_sending(&self.transfers, *id, &m.id))
                .map(|m| m.id.clone())
                .collect();

            for message_id in expired {
                node.buffer.remove(&message_id);
                node.router.on_message_removed(&message_id);
                trace!(node = %id, message_id = %message_id, "Message expired");
                self.stats.messages_expired += 1;
                self.event_log.push(SimEvent::Expired {
                    message_id,
                    node: *id,
                    tick: self.tick,
                });
            }
        }
    }

    fn run_nodes(&mut self) {
        let now = self.now();
        let tick = self.tick;
        let transfer_ticks = self.config.transfer_ticks.max(1);
        let ids: Vec<PeerId> = self.nodes.keys().copied().collect();

        for id in ids {
            let contacts = self.contacts_of(id);
            // Taken out of the map so its host view can reach the other nodes
            let Some(mut node) = self.nodes.remove(&id) else {
                continue;
            };

            let mut host = TickHost {
                id,
                buffer: &mut node.buffer,
                contacts,
                peers: &mut self.nodes,
                transfers: &mut self.transfers,
                now,
                transfer_ticks,
                evicted: 0,
                refusals: Vec::new(),
            };
            let outcome = {
                let _ctx = PeerContextGuard::for_tick(&id, node.instance_id, tick);
                node.router.on_tick(&mut host)
            };
            let evicted = host.evicted;
            let refusals = std::mem::take(&mut host.refusals);
            self.nodes.insert(id, node);

            self.stats.messages_evicted += evicted as u64;
            for (message_id, to, reason) in refusals {
                self.stats.transfers_refused += 1;
                self.event_log.push(SimEvent::TransferRefused {
                    message_id,
                    from: id,
                    to,
                    reason,
                    tick,
                });
            }
            for forward in outcome.forwards() {
                self.stats.record_forward(forward.via);
                self.event_log.push(SimEvent::TransferStarted {
                    message_id: forward.message_id.clone(),
                    from: id,
                    to: forward.peer,
                    via: forward.via,
                    tick,
                });
            }
        }
    }
}

// ============================================================================
// Host views
// ============================================================================

/// One node's buffer, seen from its router outside of a tick
struct BufferView<'a> {
    id: PeerId,
    buffer: &'a mut MessageBuffer,
    transfers: &'a [ActiveTransfer],
    now: DateTime<Utc>,
    /// Messages the router removed through this view
    removed: usize,
}

impl<'a> BufferView<'a> {
    fn new(
        id: PeerId,
        buffer: &'a mut MessageBuffer,
        transfers: &'a [ActiveTransfer],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            buffer,
            transfers,
            now,
            removed: 0,
        }
    }
}

impl BufferHost<PeerId> for BufferView<'_> {
    fn buffer_contents(&self) -> Vec<Message<PeerId>> {
        self.buffer.messages().to_vec()
    }

    fn contains_message(&self, id: &MessageId) -> bool {
        self.buffer.contains(id)
    }

    fn insert_message(&mut self, message: Message<PeerId>) {
        self.buffer.insert(message);
    }

    fn remove_message(&mut self, id: &MessageId) -> Option<Message<PeerId>> {
        let removed = self.buffer.remove(id);
        if removed.is_some() {
            self.removed += 1;
        }
        removed
    }

    fn free_buffer_space(&self) -> usize {
        self.buffer.free_space()
    }

    fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn is_sending(&self, id: &MessageId) -> bool {
        is_sending(self.transfers, self.id, id)
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// The ticking node's view: its buffer, its live links and the other nodes
struct TickHost<'a> {
    id: PeerId,
    buffer: &'a mut MessageBuffer,
    contacts: Vec<Contact<PeerId>>,
    peers: &'a mut BTreeMap<PeerId, SimNode>,
    transfers: &'a mut Vec<ActiveTransfer>,
    now: DateTime<Utc>,
    transfer_ticks: u64,
    /// Messages receivers evicted to accept a header
    evicted: usize,
    refusals: Vec<(MessageId, PeerId, RejectReason)>,
}

impl BufferHost<PeerId> for TickHost<'_> {
    fn buffer_contents(&self) -> Vec<Message<PeerId>> {
        self.buffer.messages().to_vec()
    }

    fn contains_message(&self, id: &MessageId) -> bool {
        self.buffer.contains(id)
    }

    fn insert_message(&mut self, message: Message<PeerId>) {
        self.buffer.insert(message);
    }

    fn remove_message(&mut self, id: &MessageId) -> Option<Message<PeerId>> {
        self.buffer.remove(id)
    }

    fn free_buffer_space(&self) -> usize {
        self.buffer.free_space()
    }

    fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn is_sending(&self, id: &MessageId) -> bool {
        is_sending(self.transfers, self.id, id)
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl ContactHost<PeerId> for TickHost<'_> {
    fn current_contacts(&self) -> Vec<Contact<PeerId>> {
        self.contacts.clone()
    }

    /// Offer the header to the receiver; start the transfer if it accepts
    fn attempt_transfer(
        &mut self,
        message: &Message<PeerId>,
        contact: &Contact<PeerId>,
    ) -> Result<(), TransferError> {
        if self.is_transfer_in_progress() {
            return Err(TransferError::Busy);
        }
        if self.transfers.iter().any(|t| t.involves(contact.peer)) {
            return Err(TransferError::PeerBusy(contact.peer.to_string()));
        }
        let Some(receiver) = self.peers.get_mut(&contact.peer) else {
            return Err(TransferError::NotConnected(contact.peer.to_string()));
        };

        let mut view = BufferView::new(
            contact.peer,
            &mut receiver.buffer,
            self.transfers.as_slice(),
            self.now,
        );
        let verdict = receiver.router.on_receive_header(message, &self.id, &mut view);
        self.evicted += view.removed;

        if let ReceiveVerdict::Reject { reason } = verdict {
            self.refusals.push((message.id.clone(), contact.peer, reason));
            return Err(TransferError::Refused(reason.to_string()));
        }

        self.transfers.push(ActiveTransfer {
            message: message.clone(),
            from: self.id,
            to: contact.peer,
            connection: contact.connection,
            remaining: self.transfer_ticks,
        });
        Ok(())
    }

    fn is_transfer_in_progress(&self) -> bool {
        self.transfers.iter().any(|t| t.involves(self.id))
    }

    fn can_start_transfer(&self) -> bool {
        !self.is_transfer_in_progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{MeshBuilder, from_edges};

    fn make_id(c: char) -> PeerId {
        PeerId::new(c).unwrap()
    }

    fn always_up(mesh: Mesh) -> Simulation {
        Simulation::new(
            mesh,
            SimConfig {
                seed: Some(1),
                ..Default::default()
            },
            DtnConfig::default(),
        )
    }

    #[test]
    fn test_direct_delivery_and_reply() {
        let mut sim = always_up(from_edges(&[('A', 'B')]).unwrap());
        sim.send_message(make_id('A'), make_id('B'), b"hi".to_vec())
            .unwrap();

        // Tick 1: A starts the transfer. Tick 2: B receives and replies.
        // Tick 3: the reply is carried back.
        sim.run_ticks(4).unwrap();

        assert_eq!(sim.stats.messages_delivered, 1);
        assert_eq!(sim.stats.direct_forwards, 1);
        assert_eq!(sim.stats.responses_created, 1);
        assert_eq!(sim.stats.responses_delivered, 1);
        assert!(!sim.holds(make_id('A'), &MessageId::new("M0")));
    }

    #[test]
    fn test_transfer_takes_configured_ticks() {
        let mut sim = Simulation::new(
            from_edges(&[('A', 'B')]).unwrap(),
            SimConfig {
                transfer_ticks: 3,
                ..Default::default()
            },
            DtnConfig::default(),
        );
        sim.send_message(make_id('A'), make_id('B'), Vec::new())
            .unwrap();

        sim.run_ticks(3).unwrap();
        assert_eq!(sim.stats.messages_delivered, 0);
        assert_eq!(sim.active_transfers(), 1);

        sim.step().unwrap();
        assert_eq!(sim.stats.messages_delivered, 1);
    }

    #[test]
    fn test_link_drop_aborts_transfer() {
        let mut sim = Simulation::new(
            from_edges(&[('A', 'B')]).unwrap(),
            SimConfig {
                transfer_ticks: 5,
                ..Default::default()
            },
            DtnConfig::default(),
        );
        let id = sim
            .send_message(make_id('A'), make_id('B'), Vec::new())
            .unwrap();
        sim.step().unwrap();
        assert_eq!(sim.active_transfers(), 1);

        sim.force_link_down(make_id('A'), make_id('B'));
        sim.step().unwrap();

        assert_eq!(sim.stats.transfers_aborted, 1);
        assert_eq!(sim.active_transfers(), 0);
        assert!(sim.holds(make_id('A'), &id));
        let receiver = sim.node(make_id('B')).unwrap();
        assert_eq!(receiver.router.pending_incoming(), 0);
    }

    #[test]
    fn test_no_links_no_progress() {
        let mut sim = Simulation::new(
            MeshBuilder::new(3).line(),
            SimConfig {
                link_probability: 0.0,
                seed: Some(3),
                ..Default::default()
            },
            DtnConfig::default(),
        );
        sim.send_message(make_id('A'), make_id('C'), Vec::new())
            .unwrap();
        sim.run_ticks(10).unwrap();

        assert_eq!(sim.stats.transfers_started, 0);
        assert_eq!(sim.stats.messages_delivered, 0);
    }

    #[test]
    fn test_ttl_expires_buffered_copies() {
        let mut sim = Simulation::new(
            MeshBuilder::new(2).line(),
            SimConfig {
                message_ttl: Some(3),
                ..Default::default()
            },
            DtnConfig::default(),
        );
        sim.force_link_down(make_id('A'), make_id('B'));
        let id = sim
            .send_message(make_id('A'), make_id('B'), Vec::new())
            .unwrap();

        sim.run_ticks(3).unwrap();
        assert!(!sim.holds(make_id('A'), &id));
        assert_eq!(sim.stats.messages_expired, 1);
    }

    #[test]
    fn test_unknown_sender() {
        let mut sim = always_up(MeshBuilder::new(2).line());
        let result = sim.send_message(make_id('Z'), make_id('A'), Vec::new());
        assert!(matches!(result, Err(SimError::UnknownPeer(_))));
    }

    #[test]
    fn test_message_larger_than_buffer_refused() {
        let mut sim = Simulation::new(
            MeshBuilder::new(2).line(),
            SimConfig {
                buffer_capacity: 50,
                message_size: 100,
                ..Default::default()
            },
            DtnConfig::default(),
        );
        let result = sim.send_message(make_id('A'), make_id('B'), Vec::new());
        assert!(matches!(result, Err(SimError::Dtn(_))));
        assert_eq!(sim.stats.messages_created, 0);
    }

    #[test]
    fn test_one_transfer_per_node() {
        let mut sim = always_up(MeshBuilder::new(3).star());
        sim.send_message(make_id('A'), make_id('B'), Vec::new())
            .unwrap();
        sim.send_message(make_id('A'), make_id('C'), Vec::new())
            .unwrap();

        sim.step().unwrap();
        assert_eq!(sim.active_transfers(), 1);
    }
}
