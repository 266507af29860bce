//! Robbed-bit signaling between partner channels.
//!
//! Bits a loop channel transmits arrive, unchanged, at the same position on
//! its partner span, and are mirrored to the tap watching the transmitting
//! span. Delivery only records the bits as received on the destination; it
//! never runs the destination's own transmit path, so two partners can't
//! bounce an update back and forth.

use std::sync::Arc;

use crossbeam::channel::Sender;
use tracing::{debug, info};

use crate::error::{LoopError, Result};
use crate::span::{Channel, ChannelAddress, Role, SpanBank};
use crate::BusEvent;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Delivery {
    /// The transmitting channel hasn't been accepted by the host yet. Idle
    /// bits show up this way during startup.
    Discarded,

    /// Taps don't transmit signaling.
    FromTap,

    /// `partner` is where the bits were looped to, `tap` where they were
    /// mirrored. Either is `None` if that channel doesn't exist or isn't
    /// registered yet.
    Routed {
        partner: Option<ChannelAddress>,
        tap: Option<ChannelAddress>,
    },
}

#[derive(Clone)]
pub struct Router {
    bank: Arc<SpanBank>,
    events: Option<Sender<BusEvent>>,
}

impl Router {
    pub fn new(bank: Arc<SpanBank>, events: Option<Sender<BusEvent>>) -> Self {
        Self {
            bank,
            events,
        }
    }

    /// `channel` transmitted `bits`.
    pub fn on_signaling_update(&self, address: ChannelAddress, bits: u8) -> Result<Delivery> {
        let span = self.bank.span(address.span).ok_or(LoopError::NoSuchSpan(address.span))?;
        let channel = span.channel(address.position).ok_or(LoopError::NoSuchChannel(address))?;

        if !channel.is_registered() {
            info!("ignoring transmission of bits {bits:#X} on chan {address} (chan not registered)");
            return Ok(Delivery::Discarded);
        }

        let partner = match span.role() {
            Role::Tap { .. } => return Ok(Delivery::FromTap),
            Role::Loop { partner } => partner,
        };

        debug!("transmitting bits {bits:#X} on chan {address}");
        channel.record_tx(bits);

        let looped = self.bank.channel(address.on_span(partner));
        let partner = self.deliver(looped, bits, "looping");

        let tapping = self.bank.tap_of(address.span)
            .and_then(|tap| tap.channel(address.position));
        let tap = self.deliver(tapping, bits, "tapping");

        Ok(Delivery::Routed { partner, tap })
    }

    fn deliver(&self, destination: Option<&Channel>, bits: u8, what: &str) -> Option<ChannelAddress> {
        let destination = destination?;

        // Registration can land while this update is in flight; check at the
        // point of delivery.
        if !destination.is_registered() {
            return None;
        }

        let address = destination.address();
        debug!("{what} bits {bits:#X} on chan {address}");
        destination.deliver(bits);

        if let Some(events) = &self.events {
            let _ = events.send(BusEvent::RobbedBitState(address, bits));
        }

        Some(address)
    }
}
