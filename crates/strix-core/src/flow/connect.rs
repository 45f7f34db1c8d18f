//! Connection establishment exchange.

use crate::flow::{Flow, FlowState};
use crate::packet::{ConnAckPacket, ConnectPacket, Packet};
use tracing::debug;

/// CONNECT → CONNACK exchange.
///
/// Succeeds with the broker's acknowledgment when the return code is
/// `Accepted`; any other return code fails the flow with the code's
/// description.
#[derive(Debug)]
pub struct ConnectFlow {
    request: ConnectPacket,
    state: FlowState<ConnAckPacket>,
    started: bool,
}

impl ConnectFlow {
    /// Create a flow sending the given connect request
    #[must_use]
    pub fn new(request: ConnectPacket) -> Self {
        Self {
            request,
            state: FlowState::new(),
            started: false,
        }
    }
}

impl Flow for ConnectFlow {
    type Output = ConnAckPacket;

    fn code(&self) -> &'static str {
        "connect"
    }

    fn start(&mut self) -> Option<Packet> {
        self.started = true;
        Some(self.request.clone().into())
    }

    fn accept(&self, packet: &Packet) -> bool {
        self.started && !self.state.is_finished() && matches!(packet, Packet::ConnAck(_))
    }

    fn next(&mut self, packet: &Packet) -> Option<Packet> {
        let Packet::ConnAck(ack) = packet else {
            return None;
        };
        let return_code = ack.return_code();
        if return_code.is_accepted() {
            debug!(session_present = ack.session_present(), "connection accepted");
            self.state.succeed(ack.clone());
        } else {
            self.state.fail(return_code.to_string());
        }
        None
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn is_success(&self) -> bool {
        self.state.is_success()
    }

    fn result(&self) -> Option<&ConnAckPacket> {
        self.state.result()
    }

    fn error_message(&self) -> &str {
        self.state.error_message()
    }
}
