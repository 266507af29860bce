//! The remaining span operations a host may call. None of them affect
//! routing.

use std::sync::atomic::Ordering;

use tracing::debug;

use crate::error::{LoopError, Result};
use crate::line::LineConfig;
use crate::span::{Channel, ChannelAddress, Span, SpanBank};

impl Span {
    /// Store the host's line configuration as given.
    pub fn spanconfig(&self, lineconfig: LineConfig) {
        self.set_lineconfig(lineconfig);
    }
}

impl Channel {
    /// Any signaling type is accepted.
    pub fn chanconfig(&self, sigtype: u32) {
        self.set_sigtype(sigtype);
    }
}

impl SpanBank {
    fn existing(&self, address: ChannelAddress) -> Result<&Channel> {
        self.channel(address).ok_or(LoopError::NoSuchChannel(address))
    }

    pub fn open(&self, address: ChannelAddress) -> Result<()> {
        self.existing(address)?;
        let users = self.users().fetch_add(1, Ordering::AcqRel) + 1;
        debug!("open chan {address}, {users} in use");
        Ok(())
    }

    pub fn close(&self, address: ChannelAddress) -> Result<()> {
        self.existing(address)?;
        let _ = self.users().fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        debug!("close chan {address}");
        Ok(())
    }

    /// No channel commands are implemented.
    pub fn ioctl(&self, address: ChannelAddress, cmd: u32, _data: usize) -> Result<()> {
        self.existing(address)?;
        Err(LoopError::UnsupportedIoctl(cmd))
    }
}
