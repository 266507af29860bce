use std::collections::{HashMap, VecDeque};

use crossbeam::channel::{Receiver, Sender};

use crate::chunk::{Chunk, RxChunks, TxChunks, IDLE_CHUNK};
use crate::error::HostError;
use crate::host::Host;
use crate::span::{ChannelAddress, Span, SpanIndex};
use crate::BusEvent;

/// Messages for a running `SimHost`, from outside the tick thread.
#[derive(Copy, Clone, Debug)]
pub enum HostMessage {
    /// Queue a chunk for transmission on a channel.
    Write(ChannelAddress, Chunk),
}

/// In-process stand-in for the bus framework.
///
/// Accepts every span and its channels on registration. Each tick it
/// transmits one queued chunk per channel (idle if nothing is queued) and
/// keeps the last chunk each channel received.
pub struct SimHost {
    pending: HashMap<ChannelAddress, VecDeque<Chunk>>,
    received: HashMap<ChannelAddress, Chunk>,
    commands: Option<Receiver<HostMessage>>,
    events: Option<Sender<BusEvent>>,
    reject: Option<SpanIndex>,
    accept_channels: bool,
    registered: Vec<SpanIndex>,
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            received: HashMap::new(),
            commands: None,
            events: None,
            reject: None,
            accept_channels: true,
            registered: Vec::new(),
        }
    }

    pub fn with_commands(mut self, commands: Receiver<HostMessage>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Report every non-idle chunk received.
    pub fn with_events(mut self, events: Sender<BusEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Refuse to register `span`.
    pub fn rejecting(mut self, span: SpanIndex) -> Self {
        self.reject = Some(span);
        self
    }

    /// Register spans but leave their channels for the caller to accept.
    pub fn deferring_channels(mut self) -> Self {
        self.accept_channels = false;
        self
    }

    pub fn write(&mut self, address: ChannelAddress, chunk: Chunk) {
        self.pending.entry(address).or_default().push_back(chunk);
    }

    /// Last chunk `address` received, if any tick has run.
    pub fn received(&self, address: ChannelAddress) -> Option<&Chunk> {
        self.received.get(&address)
    }

    /// Spans currently registered, in registration order.
    pub fn registered(&self) -> &[SpanIndex] {
        &self.registered
    }

    fn drain_commands(&mut self) {
        let messages: Vec<HostMessage> = match &self.commands {
            Some(commands) => commands.try_iter().collect(),
            None => return,
        };

        for message in messages {
            match message {
                HostMessage::Write(address, chunk) => self.write(address, chunk),
            }
        }
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimHost {
    fn register_span(&mut self, span: &Span) -> Result<(), HostError> {
        if self.reject == Some(span.index()) {
            return Err(HostError::Rejected(span.index()));
        }

        if self.accept_channels {
            span.accept_channels();
        }
        self.registered.push(span.index());

        Ok(())
    }

    fn unregister_span(&mut self, span: &Span) {
        self.registered.retain(|&s| s != span.index());
    }

    fn transmit(&mut self, span: &Span, mut chunks: TxChunks<'_>) -> Result<(), HostError> {
        self.drain_commands();

        for channel in span.channels() {
            let chunk = self.pending.get_mut(&channel.address())
                .and_then(|queue| queue.pop_front())
                .unwrap_or(IDLE_CHUNK);
            *chunks.write_chunk(channel.position()) = chunk;
        }

        Ok(())
    }

    fn receive(&mut self, span: &Span, chunks: RxChunks<'_>) -> Result<(), HostError> {
        for channel in span.channels() {
            let address = channel.address();
            let chunk = *chunks.read_chunk(channel.position()).ok_or_else(|| HostError::Hook {
                hook: "receive",
                span: span.index(),
                reason: format!("no chunk for chan {address}"),
            })?;

            if chunk != IDLE_CHUNK {
                if let Some(events) = &self.events {
                    let _ = events.send(BusEvent::Received(address, chunk));
                }
            }

            self.received.insert(address, chunk);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DebugFlags;
    use crate::scheduler::Ticker;
    use crate::topology::layout;
    use crossbeam::channel::unbounded;
    use std::sync::Arc;

    #[test]
    fn registration_accepts_channels() {
        let bank = layout(1, 0).unwrap();
        let mut host = SimHost::new();
        host.register_span(bank.span(0).unwrap()).unwrap();
        assert!(bank.span(0).unwrap().channels().iter().all(|c| c.is_registered()));
        assert_eq!(host.registered(), &[0]);
    }

    #[test]
    fn deferred_channels_stay_unregistered() {
        let bank = layout(1, 0).unwrap();
        let mut host = SimHost::new().deferring_channels();
        host.register_span(bank.span(0).unwrap()).unwrap();
        assert!(bank.span(0).unwrap().channels().iter().all(|c| !c.is_registered()));
    }

    #[test]
    fn queued_chunks_go_out_one_per_tick() {
        let bank = Arc::new(layout(1, 0).unwrap());
        let mut ticker = Ticker::new(bank, SimHost::new(), DebugFlags::default());
        let a = ChannelAddress::new(0, 2);
        let b = ChannelAddress::new(1, 2);

        ticker.host_mut().write(a, [1; 8]);
        ticker.host_mut().write(a, [2; 8]);

        ticker.tick();
        assert_eq!(ticker.host().received(b), Some(&[1; 8]));
        ticker.tick();
        assert_eq!(ticker.host().received(b), Some(&[2; 8]));
        ticker.tick();
        assert_eq!(ticker.host().received(b), Some(&IDLE_CHUNK));
    }

    #[test]
    fn commands_and_events() {
        let bank = Arc::new(layout(1, 0).unwrap());
        let (command_sender, command_receiver) = unbounded();
        let (event_sender, event_receiver) = unbounded();
        let host = SimHost::new()
            .with_commands(command_receiver)
            .with_events(event_sender);
        let mut ticker = Ticker::new(bank, host, DebugFlags::default());

        let a = ChannelAddress::new(1, 30);
        command_sender.send(HostMessage::Write(a, [0x42; 8])).unwrap();
        ticker.tick();
        ticker.tick();

        let events: Vec<_> = event_receiver.try_iter().collect();
        assert_eq!(events, vec![BusEvent::Received(ChannelAddress::new(0, 30), [0x42; 8])]);
    }
}
