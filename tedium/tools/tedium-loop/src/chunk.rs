//! Per-channel sample chunks.
//!
//! Each channel owns exactly one write chunk. Reads go through the channel's
//! source address, which is how loopback and tapping happen: nothing is
//! copied between spans, a reader simply looks at another channel's write
//! chunk. `TxChunks` only hands out the write chunks of a single span, and
//! `RxChunks` only hands out shared references, so a channel can never write
//! through its alias.

use crate::span::{Channel, Span, SpanIndex, CHANNELS_PER_SPAN};

pub type Sample = u8;

/// Samples moved per channel per tick (1 ms at 8 kHz).
pub const CHUNK_SIZE: usize = 8;

pub type Chunk = [Sample; CHUNK_SIZE];

/// A-law idle code.
pub const IDLE_SAMPLE: Sample = 0xd5;

pub const IDLE_CHUNK: Chunk = [IDLE_SAMPLE; CHUNK_SIZE];

pub struct ChunkPlane {
    chunks: Vec<Chunk>,
}

impl ChunkPlane {
    pub fn new(spans: usize) -> Self {
        Self {
            chunks: vec![IDLE_CHUNK; spans * CHANNELS_PER_SPAN],
        }
    }

    fn span_range(&self, span: SpanIndex) -> std::ops::Range<usize> {
        let start = span * CHANNELS_PER_SPAN;
        assert!(start + CHANNELS_PER_SPAN <= self.chunks.len());
        start..start + CHANNELS_PER_SPAN
    }

    fn slot(span: SpanIndex, position: usize) -> usize {
        assert!(position >= 1 && position <= CHANNELS_PER_SPAN);
        span * CHANNELS_PER_SPAN + (position - 1)
    }

    /// Write chunks of one span, for its transmit hook.
    pub fn tx<'a>(&'a mut self, span: &Span) -> TxChunks<'a> {
        let range = self.span_range(span.index());
        TxChunks {
            chunks: &mut self.chunks[range],
        }
    }

    /// Read view for one span's receive hook.
    pub fn rx<'a>(&'a self, span: &'a Span) -> RxChunks<'a> {
        RxChunks {
            plane: self,
            span,
        }
    }

    /// What `channel` receives: its source's write chunk, or idle if it has
    /// no source.
    pub fn read_chunk(&self, channel: &Channel) -> &Chunk {
        match channel.source() {
            Some(source) => self.chunks.get(Self::slot(source.span, source.position)).unwrap_or(&IDLE_CHUNK),
            None => &IDLE_CHUNK,
        }
    }
}

pub struct TxChunks<'a> {
    chunks: &'a mut [Chunk],
}

impl TxChunks<'_> {
    pub fn write_chunk(&mut self, position: usize) -> &mut Chunk {
        assert!(position >= 1 && position <= CHANNELS_PER_SPAN);
        &mut self.chunks[position - 1]
    }
}

pub struct RxChunks<'a> {
    plane: &'a ChunkPlane,
    span: &'a Span,
}

impl<'a> RxChunks<'a> {
    /// Chunk received by the channel at `position`, or `None` for a position
    /// the span doesn't have.
    pub fn read_chunk(&self, position: usize) -> Option<&'a Chunk> {
        let plane = self.plane;
        self.span.channel(position).map(|channel| plane.read_chunk(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{ChannelAddress, Role};

    fn span(index: SpanIndex, partner: SpanIndex) -> Span {
        let channels = (1..=CHANNELS_PER_SPAN)
            .map(|p| {
                let address = ChannelAddress::new(index, p);
                Channel::new(address, String::new(), Some(address.on_span(partner)))
            })
            .collect();
        Span::new(index, Role::Loop { partner }, String::new(), String::new(), channels)
    }

    #[test]
    fn starts_idle() {
        let plane = ChunkPlane::new(2);
        let a = span(0, 1);
        assert_eq!(plane.rx(&a).read_chunk(1), Some(&IDLE_CHUNK));
    }

    #[test]
    fn reads_follow_the_source() {
        let mut plane = ChunkPlane::new(2);
        let a = span(0, 1);
        let b = span(1, 0);

        *plane.tx(&a).write_chunk(5) = [0xaa; CHUNK_SIZE];

        assert_eq!(plane.rx(&b).read_chunk(5), Some(&[0xaa; CHUNK_SIZE]));
        assert_eq!(plane.rx(&b).read_chunk(4), Some(&IDLE_CHUNK));
        assert_eq!(plane.rx(&a).read_chunk(5), Some(&IDLE_CHUNK));
        assert_eq!(plane.read_chunk(&b.channels()[4]), &[0xaa; CHUNK_SIZE]);
    }

    #[test]
    fn missing_position_reads_nothing() {
        let plane = ChunkPlane::new(1);
        let a = span(0, 0);
        assert_eq!(plane.rx(&a).read_chunk(0), None);
        assert_eq!(plane.rx(&a).read_chunk(32), None);
    }

    #[test]
    #[should_panic(expected="position >= 1 && position <= CHANNELS_PER_SPAN")]
    fn tx_position_out_of_range() {
        let mut plane = ChunkPlane::new(1);
        let a = span(0, 0);
        let _ = plane.tx(&a).write_chunk(32);
    }
}
