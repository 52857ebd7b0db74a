//! Terminal stream condition classification.
//!
//! A status stream can end because the server closed it, because the
//! caller gave up, or because the transport broke. Only the last one is a
//! fault, and the transport renders a caller-side cancel in several ways,
//! so the decision looks at the local context, the status code, and the
//! exact message.

use crate::api::{Code, Status};

/// Terminal condition observed while reading a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The peer ended the stream.
    Eof,
    /// The stream failed with a status.
    Status(Status),
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTermination {
    /// The caller cancelled or ran out of time. Not a fault.
    CallerCancelled,
    /// The server closed the stream. The expected shutdown path.
    CleanEof,
    /// The transport failed.
    TransportFailure(Status),
}

impl StreamTermination {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TransportFailure(_))
    }
}

const CLIENT_DISCONNECTED: &str = "client disconnected";
const STREAM_ERROR_PREFIX: &str = "stream error: ";
const CANCEL_SUFFIX: &str = "; CANCEL";

/// Classify a terminal stream condition.
///
/// `ctx_done` is whether the local reading context was already cancelled
/// or past its deadline when the condition was observed; it takes
/// precedence over everything else.
#[must_use]
pub fn classify(ctx_done: bool, err: &StreamError) -> StreamTermination {
    if ctx_done {
        return StreamTermination::CallerCancelled;
    }
    let status = match err {
        StreamError::Eof => return StreamTermination::CleanEof,
        StreamError::Status(status) => status,
    };
    match status.code {
        Code::Canceled | Code::DeadlineExceeded => StreamTermination::CallerCancelled,
        Code::Unavailable if is_cancel_message(&status.message) => {
            StreamTermination::CallerCancelled
        }
        _ => StreamTermination::TransportFailure(status.clone()),
    }
}

fn is_cancel_message(message: &str) -> bool {
    message == CLIENT_DISCONNECTED
        || (message.len() >= STREAM_ERROR_PREFIX.len() + CANCEL_SUFFIX.len()
            && message.starts_with(STREAM_ERROR_PREFIX)
            && message.ends_with(CANCEL_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: Code, message: &str) -> StreamError {
        StreamError::Status(Status::new(code, message))
    }

    #[test]
    fn done_context_wins_over_everything() {
        assert_eq!(classify(true, &StreamError::Eof), StreamTermination::CallerCancelled);
        assert_eq!(
            classify(true, &status(Code::Internal, "boom")),
            StreamTermination::CallerCancelled
        );
    }

    #[test]
    fn eof_is_clean() {
        assert_eq!(classify(false, &StreamError::Eof), StreamTermination::CleanEof);
    }

    #[test]
    fn cancel_codes_are_caller_cancelled() {
        for code in [Code::Canceled, Code::DeadlineExceeded] {
            assert_eq!(
                classify(false, &status(code, "anything")),
                StreamTermination::CallerCancelled
            );
        }
    }

    #[test]
    fn transport_cancel_renderings_are_caller_cancelled() {
        for message in [
            "client disconnected",
            "stream error: stream ID 7; CANCEL",
            "stream error: ; CANCEL",
        ] {
            assert_eq!(
                classify(false, &status(Code::Unavailable, message)),
                StreamTermination::CallerCancelled,
                "{message}"
            );
        }
    }

    #[test]
    fn other_unavailable_messages_are_failures() {
        for message in [
            "connection refused",
            "client disconnected ",
            "stream error: stream ID 7; INTERNAL_ERROR",
            "transport: stream error: x; CANCEL",
        ] {
            assert!(
                classify(false, &status(Code::Unavailable, message)).is_failure(),
                "{message}"
            );
        }
    }

    #[test]
    fn other_codes_are_failures() {
        let term = classify(false, &status(Code::Internal, "broken pipe"));
        assert_eq!(
            term,
            StreamTermination::TransportFailure(Status::internal("broken pipe"))
        );
    }
}
