//! Builds the span bank and wires every channel to the write chunk it reads.
//!
//! For `L` loop pairs and `T` tap pairs the bank holds `2L + 2T` spans:
//!
//! ```text
//!   0 <-> 1    2 <-> 3   ...   2L-2 <-> 2L-1      loop pairs
//!   2L -> watches 0    2L+1 -> watches 1   ...    taps
//! ```

use tracing::{info, warn};

use crate::config::LoopConfig;
use crate::error::{LoopError, Result};
use crate::host::Host;
use crate::span::{Channel, ChannelAddress, Role, Span, SpanBank, SpanIndex, CHANNELS_PER_SPAN, MAX_SPANS};

/// Lay out the bank and register every span with the host.
///
/// If the host rejects a span, the spans it already took are unregistered
/// again before the error is returned.
pub fn build<H: Host>(config: &LoopConfig, host: &mut H) -> Result<SpanBank> {
    let bank = layout(config.loop_pairs, config.taps)?;
    register_all(&bank, host)?;
    Ok(bank)
}

/// Allocate and wire the spans without involving a host.
pub fn layout(loop_pairs: usize, taps: usize) -> Result<SpanBank> {
    let requested = LoopConfig::new(loop_pairs, taps)
        .span_count()
        .unwrap_or(usize::MAX);
    if requested > MAX_SPANS {
        return Err(LoopError::CapacityExceeded { requested, max: MAX_SPANS });
    }

    let loop_spans = loop_pairs * 2;

    let mut spans = Vec::new();
    spans.try_reserve_exact(requested).map_err(|_| LoopError::AllocationFailed)?;

    for s in 0..loop_spans {
        let partner = loop_partner(s);
        let name = format!("dahdi_loop/{}", s + 1);
        let description = format!("Loop device span {} looped with span {}.", s + 1, partner + 1);
        let channels = channels(s, "dahdi_loop", Some(partner))?;
        spans.push(Span::new(s, Role::Loop { partner }, name, description, channels));
    }

    for s in loop_spans..requested {
        let k = s - loop_spans;
        let observed = (k < loop_spans).then_some(k);
        if observed.is_none() {
            warn!(span = s + 1, "no loop span {} to tap, tap will receive idle", k + 1);
        }
        let name = format!("dahdi_tap/{}", s + 1);
        let description = format!("Tap device span {} - tap on tx of span {}.", s + 1, k + 1);
        let channels = channels(s, "zttap", observed)?;
        spans.push(Span::new(s, Role::Tap { observed }, name, description, channels));
    }

    Ok(SpanBank::new(loop_pairs, taps, spans))
}

/// Loop spans pair up even with odd: 0 with 1, 2 with 3, and so on.
pub fn loop_partner(index: SpanIndex) -> SpanIndex {
    index ^ 1
}

fn channels(span: SpanIndex, prefix: &str, source_span: Option<SpanIndex>) -> Result<Vec<Channel>> {
    let mut channels = Vec::new();
    channels.try_reserve_exact(CHANNELS_PER_SPAN).map_err(|_| LoopError::AllocationFailed)?;

    for position in 1..=CHANNELS_PER_SPAN {
        let address = ChannelAddress::new(span, position);
        let source = source_span.map(|s| address.on_span(s));
        let name = format!("{prefix}/{}/{position}", span + 1);
        channels.push(Channel::new(address, name, source));
    }

    Ok(channels)
}

fn register_all<H: Host>(bank: &SpanBank, host: &mut H) -> Result<()> {
    for span in bank.spans() {
        if let Err(e) = host.register_span(span) {
            warn!(span = span.index() + 1, error = %e, "unable to register span");
            unregister_all(&bank.spans()[..span.index()], host);
            return Err(LoopError::RegistrationFailed(span.index()));
        }

        span.mark_registered();
        let kind = if span.is_tap() { "tap" } else { "loop" };
        info!(span = span.index() + 1, "registered {kind} device {}", span.device_name());
    }

    Ok(())
}

/// Hand spans back to the host, last registered first.
pub(crate) fn unregister_all<H: Host>(spans: &[Span], host: &mut H) {
    for span in spans.iter().rev() {
        if span.state().is_registered() {
            host.unregister_span(span);
            span.mark_unregistered();
        }
    }
}
