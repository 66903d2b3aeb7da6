//! Acknowledgment policy: what happens to a message once it has been handled.

use crate::forwarder::ForwardError;

/// Result of running one message through decode and forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded and accepted by the API.
    Forwarded,
    /// The body is not a weather record.
    DecodeFailed,
    /// Decoded, but the API was unreachable or asked for a retry.
    TransientFailure,
    /// Decoded, but the API will never accept it.
    PermanentFailure,
}

impl From<&Result<(), ForwardError>> for Outcome {
    fn from(result: &Result<(), ForwardError>) -> Self {
        match result {
            Ok(()) => Outcome::Forwarded,
            Err(ForwardError::Transient(_)) => Outcome::TransientFailure,
            Err(ForwardError::Permanent(_)) => Outcome::PermanentFailure,
        }
    }
}

/// Terminal broker action for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge; the broker drops the message.
    Ack,
    /// Pause locally, then reject with requeue so the broker redelivers.
    RequeueWithDelay,
    /// Reject without requeue.
    DiscardNoRequeue,
}

/// Decide the disposition for an outcome.
pub fn decide(outcome: Outcome) -> Disposition {
    match outcome {
        Outcome::Forwarded => Disposition::Ack,
        Outcome::TransientFailure => Disposition::RequeueWithDelay,
        Outcome::DecodeFailed | Outcome::PermanentFailure => Disposition::DiscardNoRequeue,
    }
}
