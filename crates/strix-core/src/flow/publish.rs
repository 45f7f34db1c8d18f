//! Publish exchanges, outgoing and incoming.
//!
//! QoS 0 has no acknowledgment at all. QoS 1 is a single round trip
//! (PUBLISH → PUBACK). QoS 2 is a two-phase commit style handshake
//! (PUBLISH → PUBREC → PUBREL → PUBCOMP) so a message is applied exactly
//! once even across redeliveries.

use crate::flow::{Flow, FlowState};
use crate::packet::{
    Packet, PubAckPacket, PubCompPacket, PubRecPacket, PubRelPacket, PublishPacket, QoS,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutgoingState {
    /// Not started
    Pending,
    /// QoS 1: PUBLISH sent, awaiting PUBACK
    AwaitingAck,
    /// QoS 2: PUBLISH sent, awaiting PUBREC
    AwaitingReceived,
    /// QoS 2: PUBREL sent, awaiting PUBCOMP
    AwaitingCompleted,
    /// Terminal
    Done,
}

/// Publishing side of the exchange.
///
/// The successful result is the packet identifier the exchange was
/// correlated by, `None` for QoS 0.
#[derive(Debug)]
pub struct OutgoingPublishFlow {
    message: PublishPacket,
    machine: OutgoingState,
    state: FlowState<Option<u16>>,
    id: Option<u16>,
}

impl OutgoingPublishFlow {
    /// Create a flow publishing the given message
    #[must_use]
    pub fn new(message: PublishPacket) -> Self {
        Self {
            message,
            machine: OutgoingState::Pending,
            state: FlowState::new(),
            id: None,
        }
    }

    /// The message being published
    #[must_use]
    pub fn message(&self) -> &PublishPacket {
        &self.message
    }

    fn matches(&self, id: Option<u16>) -> bool {
        self.id.is_some() && self.id == id
    }
}

impl Flow for OutgoingPublishFlow {
    type Output = Option<u16>;

    fn code(&self) -> &'static str {
        "publish"
    }

    fn start(&mut self) -> Option<Packet> {
        self.machine = match self.message.qos() {
            QoS::AtMostOnce => {
                self.state.succeed(None);
                OutgoingState::Done
            }
            QoS::AtLeastOnce => {
                self.id = Some(self.message.generate_packet_id());
                OutgoingState::AwaitingAck
            }
            QoS::ExactlyOnce => {
                self.id = Some(self.message.generate_packet_id());
                OutgoingState::AwaitingReceived
            }
        };
        Some(self.message.clone().into())
    }

    fn accept(&self, packet: &Packet) -> bool {
        match self.machine {
            OutgoingState::AwaitingAck => {
                matches!(packet, Packet::PubAck(ack) if self.matches(ack.packet_id()))
            }
            OutgoingState::AwaitingReceived => {
                matches!(packet, Packet::PubRec(rec) if self.matches(rec.packet_id()))
            }
            OutgoingState::AwaitingCompleted => {
                matches!(packet, Packet::PubComp(comp) if self.matches(comp.packet_id()))
            }
            OutgoingState::Pending | OutgoingState::Done => false,
        }
    }

    fn next(&mut self, packet: &Packet) -> Option<Packet> {
        match (self.machine, packet) {
            (OutgoingState::AwaitingAck, Packet::PubAck(_)) => {
                self.machine = OutgoingState::Done;
                debug!(id = ?self.id, "publish acknowledged");
                self.state.succeed(self.id);
                None
            }
            (OutgoingState::AwaitingReceived, Packet::PubRec(_)) => {
                self.machine = OutgoingState::AwaitingCompleted;
                let release = PubRelPacket::with_packet_id(self.id?).ok()?;
                Some(release.into())
            }
            (OutgoingState::AwaitingCompleted, Packet::PubComp(_)) => {
                self.machine = OutgoingState::Done;
                debug!(id = ?self.id, "publish completed");
                self.state.succeed(self.id);
                None
            }
            _ => None,
        }
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn is_success(&self) -> bool {
        self.state.is_success()
    }

    fn result(&self) -> Option<&Option<u16>> {
        self.state.result()
    }

    fn error_message(&self) -> &str {
        self.state.error_message()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncomingState {
    Pending,
    /// QoS 2: PUBREC sent, awaiting PUBREL
    AwaitingRelease,
    Done,
}

/// Receiving side of the exchange, reacting to a parsed PUBLISH.
///
/// QoS 0 requires no response. QoS 1 answers with a PUBACK immediately.
/// QoS 2 answers with a PUBREC, withholds the message until the matching
/// PUBREL arrives, then answers with a PUBCOMP. The successful result is
/// the delivered message.
#[derive(Debug)]
pub struct IncomingPublishFlow {
    message: PublishPacket,
    machine: IncomingState,
    state: FlowState<PublishPacket>,
    id: Option<u16>,
}

impl IncomingPublishFlow {
    /// Create a flow answering the given received message
    #[must_use]
    pub fn new(message: PublishPacket) -> Self {
        let id = message.packet_id();
        Self {
            message,
            machine: IncomingState::Pending,
            state: FlowState::new(),
            id,
        }
    }
}

impl Flow for IncomingPublishFlow {
    type Output = PublishPacket;

    fn code(&self) -> &'static str {
        "message"
    }

    fn start(&mut self) -> Option<Packet> {
        match self.message.qos() {
            QoS::AtMostOnce => {
                self.machine = IncomingState::Done;
                self.state.succeed(self.message.clone());
                None
            }
            QoS::AtLeastOnce => {
                let Some(id) = self.id else {
                    self.state.fail("received publish carries no identifier");
                    return None;
                };
                self.machine = IncomingState::Done;
                self.state.succeed(self.message.clone());
                let ack = PubAckPacket::with_packet_id(id).ok()?;
                Some(ack.into())
            }
            QoS::ExactlyOnce => {
                let Some(id) = self.id else {
                    self.state.fail("received publish carries no identifier");
                    return None;
                };
                self.machine = IncomingState::AwaitingRelease;
                let received = PubRecPacket::with_packet_id(id).ok()?;
                Some(received.into())
            }
        }
    }

    fn accept(&self, packet: &Packet) -> bool {
        self.machine == IncomingState::AwaitingRelease
            && matches!(packet, Packet::PubRel(rel) if self.id.is_some() && rel.packet_id() == self.id)
    }

    fn next(&mut self, packet: &Packet) -> Option<Packet> {
        if self.machine != IncomingState::AwaitingRelease {
            return None;
        }
        let Packet::PubRel(_) = packet else {
            return None;
        };
        self.machine = IncomingState::Done;
        self.state.succeed(self.message.clone());
        let complete = PubCompPacket::with_packet_id(self.id?).ok()?;
        Some(complete.into())
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn is_success(&self) -> bool {
        self.state.is_success()
    }

    fn result(&self) -> Option<&PublishPacket> {
        self.state.result()
    }

    fn error_message(&self) -> &str {
        self.state.error_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(qos: QoS) -> PublishPacket {
        let mut packet = PublishPacket::new();
        packet.set_topic("alerts/door").unwrap();
        packet.set_payload(&b"open"[..]);
        packet.set_qos(qos);
        packet
    }

    #[test]
    fn test_qos0_succeeds_at_start() {
        let mut flow = OutgoingPublishFlow::new(message(QoS::AtMostOnce));
        let first = flow.start().unwrap();
        assert!(matches!(first, Packet::Publish(_)));
        assert!(flow.is_finished());
        assert!(flow.is_success());
        assert_eq!(flow.result(), Some(&None));
    }

    #[test]
    fn test_qos1_lifecycle() {
        let mut flow = OutgoingPublishFlow::new(message(QoS::AtLeastOnce));
        let first = flow.start().unwrap();
        let id = first.packet_id().unwrap();
        assert!(!flow.is_finished());

        // Non-matching identifier is not accepted and changes nothing.
        let wrong: Packet = PubAckPacket::with_packet_id(id.wrapping_add(1).max(1))
            .unwrap()
            .into();
        assert!(!flow.accept(&wrong));
        assert!(!flow.is_finished());

        let ack: Packet = PubAckPacket::with_packet_id(id).unwrap().into();
        assert!(flow.accept(&ack));
        assert_eq!(flow.next(&ack), None);
        assert!(flow.is_finished());
        assert!(flow.is_success());
        assert_eq!(flow.result(), Some(&Some(id)));
    }

    #[test]
    fn test_qos2_two_phase_handshake() {
        let mut flow = OutgoingPublishFlow::new(message(QoS::ExactlyOnce));
        let first = flow.start().unwrap();
        let id = first.packet_id().unwrap();

        // PUBCOMP before PUBREC is not accepted.
        let early: Packet = PubCompPacket::with_packet_id(id).unwrap().into();
        assert!(!flow.accept(&early));

        let received: Packet = PubRecPacket::with_packet_id(id).unwrap().into();
        assert!(flow.accept(&received));
        let release = flow.next(&received).unwrap();
        assert!(matches!(release, Packet::PubRel(_)));
        assert_eq!(release.packet_id(), Some(id));
        assert!(!flow.is_finished());

        let complete: Packet = PubCompPacket::with_packet_id(id).unwrap().into();
        assert!(flow.accept(&complete));
        assert_eq!(flow.next(&complete), None);
        assert!(flow.is_success());
    }

    #[test]
    fn test_incoming_qos0_no_response() {
        let mut flow = IncomingPublishFlow::new(message(QoS::AtMostOnce));
        assert_eq!(flow.start(), None);
        assert!(flow.is_success());
        assert_eq!(flow.result().unwrap().topic(), "alerts/door");
    }

    #[test]
    fn test_incoming_qos1_acknowledges() {
        let mut received = message(QoS::AtLeastOnce);
        received.set_packet_id(11).unwrap();
        let mut flow = IncomingPublishFlow::new(received);
        let ack = flow.start().unwrap();
        assert!(matches!(ack, Packet::PubAck(_)));
        assert_eq!(ack.packet_id(), Some(11));
        assert!(flow.is_success());
    }

    #[test]
    fn test_incoming_qos2_releases_after_pubrel() {
        let mut received = message(QoS::ExactlyOnce);
        received.set_packet_id(12).unwrap();
        let mut flow = IncomingPublishFlow::new(received);

        let rec = flow.start().unwrap();
        assert!(matches!(rec, Packet::PubRec(_)));
        assert!(!flow.is_finished());
        assert_eq!(flow.result(), None);

        let release: Packet = PubRelPacket::with_packet_id(12).unwrap().into();
        assert!(flow.accept(&release));
        let complete = flow.next(&release).unwrap();
        assert!(matches!(complete, Packet::PubComp(_)));
        assert!(flow.is_success());
        assert_eq!(flow.result().unwrap().payload(), b"open");
    }

    #[test]
    fn test_incoming_qos2_rejects_wrong_identifier() {
        let mut received = message(QoS::ExactlyOnce);
        received.set_packet_id(12).unwrap();
        let mut flow = IncomingPublishFlow::new(received);
        flow.start();

        let wrong: Packet = PubRelPacket::with_packet_id(13).unwrap().into();
        assert!(!flow.accept(&wrong));
    }
}
