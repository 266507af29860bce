use thiserror::Error;

use crate::span::{ChannelAddress, SpanIndex};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoopError {
    #[error("too many loops/taps defined: {requested} spans requested, total spans can not exceed {max}")]
    CapacityExceeded { requested: usize, max: usize },

    #[error("unable to register span {}", .0 + 1)]
    RegistrationFailed(SpanIndex),

    #[error("unable to allocate spans")]
    AllocationFailed,

    #[error("span {} is not registered", .0 + 1)]
    NotRegistered(SpanIndex),

    #[error("no span {}", .0 + 1)]
    NoSuchSpan(SpanIndex),

    #[error("no channel {0}")]
    NoSuchChannel(ChannelAddress),

    #[error("inappropriate ioctl {0:#x} for device")]
    UnsupportedIoctl(u32),

    #[error("tick period must be non-zero")]
    ZeroPeriod,

    #[error("tick already started")]
    AlreadyStarted,

    #[error("unable to start tick thread: {0}")]
    TimerStart(String),

    #[error("tick thread panicked")]
    TimerPanicked,
}

pub type Result<T> = std::result::Result<T, LoopError>;

/// Failures reported by the host bus framework.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("host rejected span {}", .0 + 1)]
    Rejected(SpanIndex),

    #[error("{hook} hook failed on span {}: {reason}", .span + 1)]
    Hook {
        hook: &'static str,
        span: SpanIndex,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_use_one_based_span_numbers() {
        assert_eq!(LoopError::RegistrationFailed(0).to_string(), "unable to register span 1");
        assert_eq!(HostError::Rejected(3).to_string(), "host rejected span 4");
    }

    #[test]
    fn capacity_message_names_limit() {
        let e = LoopError::CapacityExceeded { requested: 18, max: 16 };
        assert!(e.to_string().ends_with("can not exceed 16"));
    }
}
