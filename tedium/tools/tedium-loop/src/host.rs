use crate::chunk::{RxChunks, TxChunks};
use crate::error::HostError;
use crate::span::Span;

/// The telephony bus framework the spans are registered with.
///
/// Registration happens once per span while the bank is built, and
/// unregistration once per span at teardown (after the tick has stopped).
/// `transmit` and `receive` are called from the tick thread for every span,
/// all transmits before any receive.
///
pub trait Host: Send {
    /// Take the span into the bus. A host that accepts the span's channels
    /// straight away calls `Span::accept_channels` here.
    fn register_span(&mut self, span: &Span) -> Result<(), HostError>;

    fn unregister_span(&mut self, span: &Span);

    /// Fill the span's write chunks with this tick's outgoing samples.
    fn transmit(&mut self, span: &Span, chunks: TxChunks<'_>) -> Result<(), HostError>;

    /// Collect this tick's incoming samples for the span.
    fn receive(&mut self, span: &Span, chunks: RxChunks<'_>) -> Result<(), HostError>;
}
