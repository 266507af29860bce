//! A bank of simulated T1/E1 spans for exercising a telephony bus without a
//! line card.
//!
//! Loop spans come in pairs wired back to back: whatever one transmits, the
//! other receives. Tap spans watch the transmit side of a loop span. A 1 ms
//! tick pulls every span through transmit, then every span through receive,
//! and robbed-bit signaling is forwarded between partners as it changes.

use chunk::Chunk;
use span::ChannelAddress;

pub mod chunk;
pub mod config;
pub mod dump;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod line;
pub mod ops;
pub mod scheduler;
pub mod signaling;
pub mod sim;
pub mod span;
pub mod system;
pub mod topology;

mod clock;

pub use config::LoopConfig;
pub use error::{HostError, LoopError, Result};
pub use host::Host;
pub use signaling::{Delivery, Router};
pub use sim::SimHost;
pub use span::{Channel, Role, Span, SpanBank, SpanIndex};
pub use system::System;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BusEvent {
    /// Signaling bits delivered to a channel.
    RobbedBitState(ChannelAddress, u8),

    /// The tick thread woke up late and dropped this many ticks.
    TickOverrun { skipped: u64 },

    /// A channel received a non-idle chunk.
    Received(ChannelAddress, Chunk),
}
