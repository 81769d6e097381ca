//! Forwarding decision engine
//!
//! Runs once per tick and picks which buffered message goes over which
//! contact. Rules are tried in a fixed order and the first transfer that
//! starts ends the tick (unless flooding is configured to try every peer):
//!
//! 1. **Direct**: an ordinary message whose destination is in contact
//! 2. **Response path**: a reply whose next return hop is in contact
//! 3. **Learned route**: a relay the hop history knows for the destination,
//!    most recently confirmed first, that the message has not visited
//! 4. **Flood**: any contact the message has not been sent to yet, within
//!    the replication budget

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use ferry_core::{Contact, ContactHost, Message, MessageId, PeerIdentity, TransferError};

use crate::history::HopHistory;
use crate::replication::ReplicationTracker;

/// What flooding does after the first transfer starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FloodPolicy {
    /// End the tick on the first transfer that starts
    #[default]
    StopAtFirstSuccess,
    /// Keep offering to further peers while the host can start transfers
    TryAllPeers,
}

/// Configuration for the forwarding engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Hand messages straight to a destination that is in contact
    pub direct_delivery: bool,
    /// Flooding behaviour
    pub flood: FloodPolicy,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            direct_delivery: true,
            flood: FloodPolicy::StopAtFirstSuccess,
        }
    }
}

/// The rule that picked a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardReason {
    /// The peer is the message's destination
    Direct,
    /// The peer is the next hop on a reply's return path
    ResponsePath,
    /// The hop history names the peer as a relay towards the destination
    LearnedRoute,
    /// No better choice; the peer simply has not had a copy yet
    Flood,
}

/// A transfer started during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward<I: PeerIdentity> {
    pub message_id: MessageId,
    pub peer: I,
    pub via: ForwardReason,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome<I: PeerIdentity> {
    /// A transfer was already running or none could start
    Busy,
    /// Nothing could be sent this tick
    Idle,
    /// One or more transfers started
    Sent(Vec<Forward<I>>),
}

impl<I: PeerIdentity> TickOutcome<I> {
    /// Check if any transfer started
    pub fn is_sent(&self) -> bool {
        matches!(self, TickOutcome::Sent(_))
    }

    /// Transfers started this tick
    pub fn forwards(&self) -> &[Forward<I>] {
        match self {
            TickOutcome::Sent(forwards) => forwards,
            TickOutcome::Busy | TickOutcome::Idle => &[],
        }
    }

    /// The first transfer started this tick
    pub fn first(&self) -> Option<&Forward<I>> {
        self.forwards().first()
    }

    fn from_forwards(forwards: Vec<Forward<I>>) -> Self {
        if forwards.is_empty() {
            TickOutcome::Idle
        } else {
            TickOutcome::Sent(forwards)
        }
    }
}

/// Per-tick forwarding decisions for one node
pub struct ForwardingEngine {
    config: ForwardingConfig,
}

impl ForwardingEngine {
    pub fn new(config: ForwardingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForwardingConfig {
        &self.config
    }

    /// Run one tick against `host`
    pub fn run_tick<I, H>(
        &self,
        host: &mut H,
        history: &HopHistory<I>,
        tracker: &ReplicationTracker<I>,
    ) -> TickOutcome<I>
    where
        I: PeerIdentity,
        H: ContactHost<I>,
    {
        if host.is_transfer_in_progress() || !host.can_start_transfer() {
            trace!("Transfer gate closed, skipping tick");
            return TickOutcome::Busy;
        }

        let messages = host.buffer_contents();
        if messages.is_empty() {
            return TickOutcome::Idle;
        }
        let contacts = host.current_contacts();
        if contacts.is_empty() {
            return TickOutcome::Idle;
        }

        if self.config.direct_delivery
            && let Some(forward) = self.try_direct(host, &messages, &contacts)
        {
            return TickOutcome::Sent(vec![forward]);
        }

        if let Some(forward) = self.try_response_paths(host, &messages, &contacts) {
            return TickOutcome::Sent(vec![forward]);
        }

        if let Some(forward) = self.try_learned(host, &messages, &contacts, history, tracker) {
            return TickOutcome::Sent(vec![forward]);
        }

        TickOutcome::from_forwards(self.flood(host, &messages, &contacts, tracker))
    }

    fn try_direct<I, H>(
        &self,
        host: &mut H,
        messages: &[Message<I>],
        contacts: &[Contact<I>],
    ) -> Option<Forward<I>>
    where
        I: PeerIdentity,
        H: ContactHost<I>,
    {
        for message in messages.iter().filter(|m| !m.is_response_routed()) {
            let Some(contact) = find_contact(contacts, &message.destination) else {
                continue;
            };
            match attempt(host, message, contact, ForwardReason::Direct) {
                Ok(forward) => return Some(forward),
                Err(TransferError::Busy) => return None,
                Err(_) => continue,
            }
        }
        None
    }

    fn try_response_paths<I, H>(
        &self,
        host: &mut H,
        messages: &[Message<I>],
        contacts: &[Contact<I>],
    ) -> Option<Forward<I>>
    where
        I: PeerIdentity,
        H: ContactHost<I>,
    {
        for message in messages {
            let Some(path) = &message.return_path else {
                continue;
            };
            let Some(next_hop) = path.next_hop() else {
                trace!(message_id = %message.id, "Return path exhausted, holding");
                continue;
            };
            let Some(contact) = find_contact(contacts, next_hop) else {
                trace!(message_id = %message.id, next_hop = %next_hop, "Return hop not in contact");
                continue;
            };
            match attempt(host, message, contact, ForwardReason::ResponsePath) {
                Ok(forward) => return Some(forward),
                Err(TransferError::Busy) => return None,
                Err(_) => continue,
            }
        }
        None
    }

    fn try_learned<I, H>(
        &self,
        host: &mut H,
        messages: &[Message<I>],
        contacts: &[Contact<I>],
        history: &HopHistory<I>,
        tracker: &ReplicationTracker<I>,
    ) -> Option<Forward<I>>
    where
        I: PeerIdentity,
        H: ContactHost<I>,
    {
        for message in messages.iter().filter(|m| !m.is_response_routed()) {
            if tracker.is_exhausted(&message.id) {
                continue;
            }
            for candidate in history.candidates_for(&message.destination).iter().rev() {
                let Some(contact) = find_contact(contacts, candidate) else {
                    continue;
                };
                if message.has_visited(candidate) {
                    trace!(
                        message_id = %message.id,
                        candidate = %candidate,
                        "Candidate already visited, skipping"
                    );
                    continue;
                }
                match attempt(host, message, contact, ForwardReason::LearnedRoute) {
                    Ok(forward) => return Some(forward),
                    Err(TransferError::Busy) => return None,
                    Err(_) => continue,
                }
            }
        }
        None
    }

    fn flood<I, H>(
        &self,
        host: &mut H,
        messages: &[Message<I>],
        contacts: &[Contact<I>],
        tracker: &ReplicationTracker<I>,
    ) -> Vec<Forward<I>>
    where
        I: PeerIdentity,
        H: ContactHost<I>,
    {
        let bound = tracker.config().bound;
        let mut forwards = Vec::new();

        for message in messages.iter().filter(|m| !m.is_response_routed()) {
            let mut budget = bound.saturating_sub(tracker.sent_count(&message.id));
            if budget == 0 || tracker.is_exhausted(&message.id) {
                continue;
            }

            for contact in contacts {
                if budget == 0 {
                    break;
                }
                if tracker.has_sent_to(&message.id, &contact.peer) {
                    continue;
                }
                match attempt(host, message, contact, ForwardReason::Flood) {
                    Ok(forward) => {
                        forwards.push(forward);
                        budget -= 1;
                        if self.config.flood == FloodPolicy::StopAtFirstSuccess
                            || !host.can_start_transfer()
                        {
                            return forwards;
                        }
                    }
                    Err(TransferError::Busy) => return forwards,
                    Err(_) => continue,
                }
            }
        }

        forwards
    }
}

impl Default for ForwardingEngine {
    fn default() -> Self {
        Self::new(ForwardingConfig::default())
    }
}

fn find_contact<'a, I: PeerIdentity>(contacts: &'a [Contact<I>], peer: &I) -> Option<&'a Contact<I>> {
    contacts.iter().find(|contact| &contact.peer == peer)
}

fn attempt<I, H>(
    host: &mut H,
    message: &Message<I>,
    contact: &Contact<I>,
    via: ForwardReason,
) -> Result<Forward<I>, TransferError>
where
    I: PeerIdentity,
    H: ContactHost<I>,
{
    match host.attempt_transfer(message, contact) {
        Ok(()) => {
            debug!(
                message_id = %message.id,
                peer = %contact.peer,
                via = ?via,
                "Started transfer"
            );
            Ok(Forward {
                message_id: message.id.clone(),
                peer: contact.peer.clone(),
                via,
            })
        }
        Err(e) => {
            trace!(
                message_id = %message.id,
                peer = %contact.peer,
                error = %e,
                "Transfer not started"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use ferry_core::{BufferHost, ConnectionId, ReturnPath, SimulationIdentity};

    use crate::replication::ReplicationConfig;

    fn make_id(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    /// Host that accepts every transfer to a peer not listed in `refusing`
    #[derive(Default)]
    struct TestHost {
        buffer: Vec<Message<SimulationIdentity>>,
        contacts: Vec<Contact<SimulationIdentity>>,
        refusing: Vec<SimulationIdentity>,
        started: Vec<(MessageId, SimulationIdentity)>,
        busy: bool,
        single_transfer: bool,
    }

    impl TestHost {
        fn with_contacts(peers: &str) -> Self {
            Self {
                contacts: peers
                    .chars()
                    .enumerate()
                    .map(|(i, c)| Contact::new(make_id(c), ConnectionId(i as u64)))
                    .collect(),
                ..Default::default()
            }
        }

        fn hold(&mut self, message: Message<SimulationIdentity>) {
            self.buffer.push(message);
        }
    }

    impl BufferHost<SimulationIdentity> for TestHost {
        fn buffer_contents(&self) -> Vec<Message<SimulationIdentity>> {
            self.buffer.clone()
        }
        fn contains_message(&self, id: &MessageId) -> bool {
            self.buffer.iter().any(|m| &m.id == id)
        }
        fn insert_message(&mut self, message: Message<SimulationIdentity>) {
            self.buffer.push(message);
        }
        fn remove_message(&mut self, id: &MessageId) -> Option<Message<SimulationIdentity>> {
            let index = self.buffer.iter().position(|m| &m.id == id)?;
            Some(self.buffer.remove(index))
        }
        fn free_buffer_space(&self) -> usize {
            usize::MAX
        }
        fn buffer_capacity(&self) -> usize {
            usize::MAX
        }
        fn is_sending(&self, _id: &MessageId) -> bool {
            false
        }
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    impl ContactHost<SimulationIdentity> for TestHost {
        fn current_contacts(&self) -> Vec<Contact<SimulationIdentity>> {
            self.contacts.clone()
        }
        fn attempt_transfer(
            &mut self,
            message: &Message<SimulationIdentity>,
            contact: &Contact<SimulationIdentity>,
        ) -> Result<(), TransferError> {
            if self.refusing.contains(&contact.peer) {
                return Err(TransferError::Refused(contact.peer.to_string()));
            }
            self.started.push((message.id.clone(), contact.peer));
            Ok(())
        }
        fn is_transfer_in_progress(&self) -> bool {
            self.busy
        }
        fn can_start_transfer(&self) -> bool {
            !(self.single_transfer && !self.started.is_empty())
        }
    }

    fn message(id: &str, hops: &str, dest: char) -> Message<SimulationIdentity> {
        let mut chars = hops.chars();
        let mut msg = Message::new(
            id,
            make_id(chars.next().unwrap()),
            make_id(dest),
            vec![0; 16],
            Utc::now(),
        );
        for c in chars {
            msg.record_hop(make_id(c));
        }
        msg
    }

    fn run(
        engine: &ForwardingEngine,
        host: &mut TestHost,
        history: &HopHistory<SimulationIdentity>,
        tracker: &ReplicationTracker<SimulationIdentity>,
    ) -> TickOutcome<SimulationIdentity> {
        engine.run_tick(host, history, tracker)
    }

    #[test]
    fn test_busy_host_skips_tick() {
        let mut host = TestHost::with_contacts("D");
        host.hold(message("m1", "A", 'D'));
        host.busy = true;

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &ReplicationTracker::default(),
        );
        assert_eq!(outcome, TickOutcome::Busy);
        assert!(host.started.is_empty());
    }

    #[test]
    fn test_direct_delivery_wins() {
        let mut host = TestHost::with_contacts("BD");
        host.hold(message("m1", "A", 'D'));

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &ReplicationTracker::default(),
        );
        let forward = outcome.first().unwrap();
        assert_eq!(forward.peer, make_id('D'));
        assert_eq!(forward.via, ForwardReason::Direct);
        assert_eq!(outcome.forwards().len(), 1);
    }

    #[test]
    fn test_reply_follows_return_path_only() {
        let mut host = TestHost::with_contacts("SXY");
        let reply = message("R_m1", "D", 'S')
            .with_return_path(ReturnPath::from_nodes(vec![make_id('S'), make_id('X')]));
        host.hold(reply);

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &ReplicationTracker::default(),
        );
        let forward = outcome.first().unwrap();
        assert_eq!(forward.peer, make_id('X'));
        assert_eq!(forward.via, ForwardReason::ResponsePath);
    }

    #[test]
    fn test_reply_without_next_hop_contact_waits() {
        let mut host = TestHost::with_contacts("SY");
        let reply = message("R_m1", "D", 'S')
            .with_return_path(ReturnPath::from_nodes(vec![make_id('S'), make_id('X')]));
        host.hold(reply);

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &ReplicationTracker::default(),
        );
        assert_eq!(outcome, TickOutcome::Idle);
    }

    #[test]
    fn test_learned_route_most_recent_first() {
        let mut host = TestHost::with_contacts("PQ");
        host.hold(message("m1", "A", 'D'));
        let history = HopHistory::new(3);
        history.record_observation(&[make_id('D')], &make_id('P'));
        history.record_observation(&[make_id('D')], &make_id('Q'));

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &history,
            &ReplicationTracker::default(),
        );
        let forward = outcome.first().unwrap();
        assert_eq!(forward.peer, make_id('Q'));
        assert_eq!(forward.via, ForwardReason::LearnedRoute);
    }

    #[test]
    fn test_learned_candidate_already_visited_is_skipped() {
        let mut host = TestHost::with_contacts("PQ");
        host.hold(message("m1", "AQ", 'D'));
        let history = HopHistory::new(3);
        history.record_observation(&[make_id('D')], &make_id('P'));
        history.record_observation(&[make_id('D')], &make_id('Q'));

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &history,
            &ReplicationTracker::default(),
        );
        assert_eq!(outcome.first().unwrap().peer, make_id('P'));
    }

    #[test]
    fn test_flood_skips_peers_already_sent_to() {
        let mut host = TestHost::with_contacts("BC");
        host.hold(message("m1", "A", 'D'));
        let tracker = ReplicationTracker::default();
        tracker.record_send(&MessageId::new("m1"), &make_id('B'));

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &tracker,
        );
        let forward = outcome.first().unwrap();
        assert_eq!(forward.peer, make_id('C'));
        assert_eq!(forward.via, ForwardReason::Flood);
    }

    #[test]
    fn test_flood_continues_past_refusal() {
        let mut host = TestHost::with_contacts("BC");
        host.refusing.push(make_id('B'));
        host.hold(message("m1", "A", 'D'));

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &ReplicationTracker::default(),
        );
        assert_eq!(outcome.first().unwrap().peer, make_id('C'));
    }

    #[test]
    fn test_exhausted_message_is_not_flooded() {
        let mut host = TestHost::with_contacts("E");
        host.hold(message("m1", "A", 'D'));
        let tracker = ReplicationTracker::default();
        for peer in ['B', 'C', 'F'] {
            tracker.record_send(&MessageId::new("m1"), &make_id(peer));
        }

        let outcome = run(
            &ForwardingEngine::default(),
            &mut host,
            &HopHistory::default(),
            &tracker,
        );
        assert_eq!(outcome, TickOutcome::Idle);
    }

    #[test]
    fn test_try_all_peers_respects_budget() {
        let mut host = TestHost::with_contacts("BCEF");
        host.hold(message("m1", "A", 'D'));
        let engine = ForwardingEngine::new(ForwardingConfig {
            flood: FloodPolicy::TryAllPeers,
            ..Default::default()
        });
        let tracker = ReplicationTracker::new(ReplicationConfig {
            bound: 2,
            ..Default::default()
        });

        let outcome = run(&engine, &mut host, &HopHistory::default(), &tracker);
        let peers: Vec<_> = outcome.forwards().iter().map(|f| f.peer).collect();
        assert_eq!(peers, vec![make_id('B'), make_id('C')]);
    }

    #[test]
    fn test_try_all_peers_stops_when_host_cannot_start() {
        let mut host = TestHost::with_contacts("BCE");
        host.single_transfer = true;
        host.hold(message("m1", "A", 'D'));
        let engine = ForwardingEngine::new(ForwardingConfig {
            flood: FloodPolicy::TryAllPeers,
            ..Default::default()
        });

        let outcome = run(
            &engine,
            &mut host,
            &HopHistory::default(),
            &ReplicationTracker::default(),
        );
        assert_eq!(outcome.forwards().len(), 1);
    }
}
