//! Keepalive exchange.

use crate::flow::{Flow, FlowState};
use crate::packet::{Packet, PingReqPacket};

/// PINGREQ → PINGRESP exchange.
#[derive(Debug, Default)]
pub struct PingFlow {
    state: FlowState<()>,
    started: bool,
}

impl PingFlow {
    /// Create a keepalive flow
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Flow for PingFlow {
    type Output = ();

    fn code(&self) -> &'static str {
        "pong"
    }

    fn start(&mut self) -> Option<Packet> {
        self.started = true;
        Some(PingReqPacket::new().into())
    }

    fn accept(&self, packet: &Packet) -> bool {
        self.started && !self.state.is_finished() && matches!(packet, Packet::PingResp(_))
    }

    fn next(&mut self, packet: &Packet) -> Option<Packet> {
        if matches!(packet, Packet::PingResp(_)) {
            self.state.succeed(());
        }
        None
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn is_success(&self) -> bool {
        self.state.is_success()
    }

    fn result(&self) -> Option<&()> {
        self.state.result()
    }

    fn error_message(&self) -> &str {
        self.state.error_message()
    }
}
