//! Flow state machines for multi-packet protocol exchanges.
//!
//! A [`Flow`] models one bounded exchange - a publish handshake, a
//! subscription confirmation - as an explicit state machine: an initial
//! packet to send, a predicate for which inbound packets it claims, a
//! transition step producing the next outbound packet, and terminal
//! success or failure.
//!
//! Flows are independent of each other and of the stream parser. A
//! connection manager owns the pending set, routes each parsed inbound
//! packet to the flow whose [`accept`](Flow::accept) claims it, and decides
//! when to time out or cancel a flow; the engine provides no internal timer.

use crate::packet::Packet;

mod connect;
mod ping;
mod publish;
mod subscribe;

pub use connect::ConnectFlow;
pub use ping::PingFlow;
pub use publish::{IncomingPublishFlow, OutgoingPublishFlow};
pub use subscribe::{SubscribeFlow, UnsubscribeFlow};

/// One in-progress protocol exchange.
///
/// Call order: [`start`](Self::start) exactly once, then for each inbound
/// packet the manager routes here, [`accept`](Self::accept) followed - only
/// on a `true` - by [`next`](Self::next). Once
/// [`is_finished`](Self::is_finished) reports `true` the flow is terminal
/// and immutable; the manager removes it from the pending set.
pub trait Flow {
    /// Result type of a successful exchange, opaque to the engine
    type Output;

    /// Stable code identifying the exchange type, e.g. `"publish"`
    fn code(&self) -> &'static str;

    /// Produce the first outbound packet, or `None` for flows that only
    /// react to inbound traffic. Called exactly once, before any inbound
    /// packet is offered.
    fn start(&mut self) -> Option<Packet>;

    /// Whether this flow claims responsibility for the given inbound
    /// packet. Pure predicate; must not mutate state.
    fn accept(&self, packet: &Packet) -> bool;

    /// Advance the state machine with an accepted inbound packet and return
    /// the next outbound packet, or `None` when no further outbound traffic
    /// is required.
    ///
    /// Only called after [`accept`](Self::accept) returned `true` for
    /// `packet`.
    fn next(&mut self, packet: &Packet) -> Option<Packet>;

    /// Whether the flow reached a terminal state
    fn is_finished(&self) -> bool;

    /// Whether the flow finished successfully. Meaningful only once
    /// [`is_finished`](Self::is_finished) reports `true`.
    fn is_success(&self) -> bool;

    /// The result of a successful exchange
    fn result(&self) -> Option<&Self::Output>;

    /// A descriptive message when the exchange failed, empty otherwise
    fn error_message(&self) -> &str;
}

/// Shared terminal-state bookkeeping, embedded by value in every concrete
/// flow.
///
/// The terminal fields are set exactly once: whichever of
/// [`succeed`](Self::succeed) or [`fail`](Self::fail) is invoked first
/// wins, and later invocations are ignored.
#[derive(Debug, Clone, Default)]
pub struct FlowState<T> {
    finished: bool,
    success: bool,
    result: Option<T>,
    error: String,
}

impl<T> FlowState<T> {
    /// Create a pending, unfinished state
    #[must_use]
    pub fn new() -> Self {
        Self {
            finished: false,
            success: false,
            result: None,
            error: String::new(),
        }
    }

    /// Whether a terminal state was reached
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the terminal state is success
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.finished && self.success
    }

    /// The stored result, if the flow succeeded
    #[must_use]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// The stored error message, empty unless the flow failed
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error
    }

    /// Mark the flow successful with the given result. Ignored if the flow
    /// already reached a terminal state.
    pub fn succeed(&mut self, result: T) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.success = true;
        self.result = Some(result);
    }

    /// Mark the flow failed with a descriptive message. Ignored if the flow
    /// already reached a terminal state.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.success = false;
        self.error = error.into();
    }
}
