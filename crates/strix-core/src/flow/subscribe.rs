//! Subscription management exchanges.

use crate::flow::{Flow, FlowState};
use crate::packet::{Packet, QoS, SubackCode, SubscribePacket, UnsubscribePacket};
use tracing::debug;

/// SUBSCRIBE → SUBACK exchange.
///
/// Succeeds with the QoS level the broker granted, which may be lower than
/// the requested one. A failure return code fails the flow; the broker
/// rejecting a subscription is a normal outcome, not an error.
#[derive(Debug)]
pub struct SubscribeFlow {
    request: SubscribePacket,
    state: FlowState<QoS>,
    id: Option<u16>,
}

impl SubscribeFlow {
    /// Create a flow subscribing to the given request's topic filter
    #[must_use]
    pub fn new(request: SubscribePacket) -> Self {
        Self {
            request,
            state: FlowState::new(),
            id: None,
        }
    }

    /// The topic filter being subscribed to
    #[must_use]
    pub fn topic(&self) -> &str {
        self.request.topic()
    }
}

impl Flow for SubscribeFlow {
    type Output = QoS;

    fn code(&self) -> &'static str {
        "subscribe"
    }

    fn start(&mut self) -> Option<Packet> {
        self.id = Some(self.request.generate_packet_id());
        Some(self.request.clone().into())
    }

    fn accept(&self, packet: &Packet) -> bool {
        self.id.is_some()
            && !self.state.is_finished()
            && matches!(packet, Packet::SubAck(ack) if ack.packet_id() == self.id)
    }

    fn next(&mut self, packet: &Packet) -> Option<Packet> {
        let Packet::SubAck(ack) = packet else {
            return None;
        };
        match ack.codes().first() {
            Some(SubackCode::Granted(qos)) => {
                debug!(topic = self.request.topic(), granted = ?qos, "subscribed");
                self.state.succeed(*qos);
            }
            Some(SubackCode::Failure) | None => {
                self.state
                    .fail(format!("broker rejected subscription to {:?}", self.topic()));
            }
        }
        None
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn is_success(&self) -> bool {
        self.state.is_success()
    }

    fn result(&self) -> Option<&QoS> {
        self.state.result()
    }

    fn error_message(&self) -> &str {
        self.state.error_message()
    }
}

/// UNSUBSCRIBE → UNSUBACK exchange.
///
/// Succeeds with the topic filter that was dropped.
#[derive(Debug)]
pub struct UnsubscribeFlow {
    request: UnsubscribePacket,
    state: FlowState<String>,
    id: Option<u16>,
}

impl UnsubscribeFlow {
    /// Create a flow dropping the given request's topic filter
    #[must_use]
    pub fn new(request: UnsubscribePacket) -> Self {
        Self {
            request,
            state: FlowState::new(),
            id: None,
        }
    }
}

impl Flow for UnsubscribeFlow {
    type Output = String;

    fn code(&self) -> &'static str {
        "unsubscribe"
    }

    fn start(&mut self) -> Option<Packet> {
        self.id = Some(self.request.generate_packet_id());
        Some(self.request.clone().into())
    }

    fn accept(&self, packet: &Packet) -> bool {
        self.id.is_some()
            && !self.state.is_finished()
            && matches!(packet, Packet::UnsubAck(ack) if ack.packet_id() == self.id)
    }

    fn next(&mut self, packet: &Packet) -> Option<Packet> {
        if matches!(packet, Packet::UnsubAck(_)) {
            self.state.succeed(self.request.topic().to_string());
        }
        None
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn is_success(&self) -> bool {
        self.state.is_success()
    }

    fn result(&self) -> Option<&String> {
        self.state.result()
    }

    fn error_message(&self) -> &str {
        self.state.error_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{SubAckPacket, UnsubAckPacket};

    #[test]
    fn test_subscription_granted() {
        let request = SubscribePacket::new("metrics/#", QoS::AtLeastOnce).unwrap();
        let mut flow = SubscribeFlow::new(request);
        let first = flow.start().unwrap();
        let id = first.packet_id().unwrap();
        assert!(!flow.is_finished());

        let ack: Packet = SubAckPacket::new(id, vec![SubackCode::Granted(QoS::AtMostOnce)])
            .unwrap()
            .into();
        assert!(flow.accept(&ack));
        assert_eq!(flow.next(&ack), None);
        assert!(flow.is_success());
        // Broker downgraded the requested QoS 1 to QoS 0.
        assert_eq!(flow.result(), Some(&QoS::AtMostOnce));
    }

    #[test]
    fn test_subscription_rejected() {
        let request = SubscribePacket::new("forbidden/#", QoS::AtMostOnce).unwrap();
        let mut flow = SubscribeFlow::new(request);
        let id = flow.start().unwrap().packet_id().unwrap();

        let ack: Packet = SubAckPacket::new(id, vec![SubackCode::Failure]).unwrap().into();
        assert!(flow.accept(&ack));
        flow.next(&ack);
        assert!(flow.is_finished());
        assert!(!flow.is_success());
        assert!(flow.error_message().contains("rejected"));
    }

    #[test]
    fn test_mismatched_identifier_not_accepted() {
        let request = SubscribePacket::new("metrics/#", QoS::AtMostOnce).unwrap();
        let mut flow = SubscribeFlow::new(request);
        let id = flow.start().unwrap().packet_id().unwrap();

        let other = if id == 1 { 2 } else { 1 };
        let ack: Packet = SubAckPacket::new(other, vec![SubackCode::Granted(QoS::AtMostOnce)])
            .unwrap()
            .into();
        assert!(!flow.accept(&ack));
        assert!(!flow.is_finished());
    }

    #[test]
    fn test_unsubscribe_lifecycle() {
        let request = UnsubscribePacket::new("metrics/#").unwrap();
        let mut flow = UnsubscribeFlow::new(request);
        let first = flow.start().unwrap();
        assert!(matches!(first, Packet::Unsubscribe(_)));
        let id = first.packet_id().unwrap();

        let ack: Packet = UnsubAckPacket::with_packet_id(id).unwrap().into();
        assert!(flow.accept(&ack));
        assert_eq!(flow.next(&ack), None);
        assert!(flow.is_success());
        assert_eq!(flow.result().map(String::as_str), Some("metrics/#"));
    }
}
