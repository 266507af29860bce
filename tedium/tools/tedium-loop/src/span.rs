use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::lifecycle::SpanState;
use crate::line::{Law, LineConfig, SigCap};

pub type SpanIndex = usize;

/// Maximum number of spans a bank can hold, loops and taps together.
pub const MAX_SPANS: usize = 16;

/// Channels (timeslots) carried by every span, E1 style.
pub const CHANNELS_PER_SPAN: usize = 31;

pub const MANUFACTURER: &str = "ZFormant Technologies";
pub const DEVICE_TYPE: &str = "T1/E1 Loop";
pub const LOCATION: &str = "n/a";

/// A channel is identified by its span index (0-based) and its position
/// within the span (1-based, as the host framework numbers them).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ChannelAddress {
    pub span: SpanIndex,
    pub position: usize,
}

impl ChannelAddress {
    pub fn new(span: SpanIndex, position: usize) -> Self {
        assert!(position >= 1 && position <= CHANNELS_PER_SPAN);

        Self {
            span,
            position,
        }
    }

    /// Same position on another span.
    pub fn on_span(&self, span: SpanIndex) -> Self {
        Self::new(span, self.position)
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.span + 1, self.position)
    }
}

/// What a span does with its partner.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Role {
    /// Receives what the partner transmits, and the partner receives what
    /// this span transmits.
    Loop { partner: SpanIndex },

    /// Receives what the observed loop span transmits. Never transmits
    /// anything the observed span can see. `None` when there is no loop span
    /// at the matching index to observe.
    Tap { observed: Option<SpanIndex> },
}

///////////////////////////////////////////////////////////////////////
// Channel

pub struct Channel {
    address: ChannelAddress,
    name: String,
    source: Option<ChannelAddress>,
    sigcap: SigCap,
    registered: AtomicBool,
    sigtype: AtomicU32,
    tx_bits: AtomicU8,
    rx_bits: AtomicU8,
    rx_updates: AtomicU64,
}

impl Channel {
    pub(crate) fn new(address: ChannelAddress, name: String, source: Option<ChannelAddress>) -> Self {
        Self {
            address,
            name,
            source,
            sigcap: SigCap::default(),
            registered: AtomicBool::new(false),
            sigtype: AtomicU32::new(0),
            tx_bits: AtomicU8::new(0),
            rx_bits: AtomicU8::new(0),
            rx_updates: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> ChannelAddress {
        self.address
    }

    pub fn position(&self) -> usize {
        self.address.position
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel whose write chunk this channel reads. Fixed at build time.
    pub fn source(&self) -> Option<ChannelAddress> {
        self.source
    }

    pub fn sigcap(&self) -> SigCap {
        self.sigcap
    }

    pub fn sigtype(&self) -> u32 {
        self.sigtype.load(Ordering::Relaxed)
    }

    pub(crate) fn set_sigtype(&self, sigtype: u32) {
        self.sigtype.store(sigtype, Ordering::Relaxed);
    }

    /// Set by the host once it has taken the channel into its active line.
    /// Never reverts.
    pub fn accept(&self) {
        self.registered.store(true, Ordering::Release);
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Last signaling bits this channel transmitted.
    pub fn tx_bits(&self) -> u8 {
        self.tx_bits.load(Ordering::Acquire)
    }

    /// Last signaling bits delivered to this channel.
    pub fn rx_bits(&self) -> u8 {
        self.rx_bits.load(Ordering::Acquire)
    }

    /// Number of signaling updates delivered to this channel.
    pub fn rx_updates(&self) -> u64 {
        self.rx_updates.load(Ordering::Acquire)
    }

    pub(crate) fn record_tx(&self, bits: u8) {
        self.tx_bits.store(bits, Ordering::Release);
    }

    pub(crate) fn deliver(&self, bits: u8) {
        self.rx_bits.store(bits, Ordering::Release);
        self.rx_updates.fetch_add(1, Ordering::AcqRel);
    }
}

///////////////////////////////////////////////////////////////////////
// Span

pub struct Span {
    index: SpanIndex,
    role: Role,
    name: String,
    description: String,
    state: AtomicU8,
    lineconfig: AtomicU16,
    linecompat: LineConfig,
    deflaw: Law,
    channels: Vec<Channel>,
}

impl Span {
    pub(crate) fn new(index: SpanIndex, role: Role, name: String, description: String, channels: Vec<Channel>) -> Self {
        assert!(index < MAX_SPANS);
        assert_eq!(channels.len(), CHANNELS_PER_SPAN);

        let linecompat = match role {
            Role::Loop { .. } => LineConfig::loop_compat(),
            Role::Tap { .. }  => LineConfig::tap_compat(),
        };

        Self {
            index,
            role,
            name,
            description,
            state: AtomicU8::new(SpanState::Unregistered as u8),
            lineconfig: AtomicU16::new(0),
            linecompat,
            deflaw: Law::ALaw,
            channels,
        }
    }

    pub fn index(&self) -> SpanIndex {
        self.index
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_tap(&self) -> bool {
        matches!(self.role, Role::Tap { .. })
    }

    /// Loop partner, or the loop span a tap observes.
    pub fn partner(&self) -> Option<SpanIndex> {
        match self.role {
            Role::Loop { partner } => Some(partner),
            Role::Tap { observed } => observed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Name of the device the span would be registered under.
    pub fn device_name(&self) -> String {
        match self.role {
            Role::Loop { .. } => format!("dahdi_loop:{}", self.index + 1),
            Role::Tap { .. }  => format!("dahdi_tap:{}", self.index + 1),
        }
    }

    pub(crate) fn state_cell(&self) -> &AtomicU8 {
        &self.state
    }

    pub fn lineconfig(&self) -> LineConfig {
        LineConfig::from(self.lineconfig.load(Ordering::Relaxed))
    }

    pub(crate) fn set_lineconfig(&self, lineconfig: LineConfig) {
        self.lineconfig.store(lineconfig.into(), Ordering::Relaxed);
    }

    pub fn linecompat(&self) -> LineConfig {
        self.linecompat
    }

    pub fn deflaw(&self) -> Law {
        self.deflaw
    }

    /// Every span carries robbed-bit signaling.
    pub fn rbs(&self) -> bool {
        true
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, position: usize) -> Option<&Channel> {
        position.checked_sub(1).and_then(|i| self.channels.get(i))
    }

    /// Host convenience: accept every channel on the span.
    pub fn accept_channels(&self) {
        for channel in &self.channels {
            channel.accept();
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("index", &self.index)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

///////////////////////////////////////////////////////////////////////
// SpanBank

/// The fixed set of spans built at startup. Never grows or shrinks.
pub struct SpanBank {
    loop_pairs: usize,
    taps: usize,
    spans: Vec<Span>,
    users: AtomicUsize,
}

impl SpanBank {
    pub(crate) fn new(loop_pairs: usize, taps: usize, spans: Vec<Span>) -> Self {
        assert!(spans.len() <= MAX_SPANS);

        Self {
            loop_pairs,
            taps,
            spans,
            users: AtomicUsize::new(0),
        }
    }

    pub fn loop_pairs(&self) -> usize {
        self.loop_pairs
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Spans in ascending index order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span(&self, index: SpanIndex) -> Option<&Span> {
        self.spans.get(index)
    }

    pub fn channel(&self, address: ChannelAddress) -> Option<&Channel> {
        self.span(address.span).and_then(|span| span.channel(address.position))
    }

    /// The tap span watching the transmit side of `index`, if one was built.
    pub fn tap_of(&self, index: SpanIndex) -> Option<&Span> {
        self.spans.iter()
            .find(|span| span.role() == Role::Tap { observed: Some(index) })
    }

    pub(crate) fn users(&self) -> &AtomicUsize {
        &self.users
    }

    /// Channels currently held open by the host.
    pub fn open_count(&self) -> usize {
        self.users.load(Ordering::Acquire)
    }
}
