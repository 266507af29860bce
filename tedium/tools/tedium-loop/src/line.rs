//! Line-coding and signaling-capability words.
//!
//! None of these are interpreted by the routing engine. They are carried on
//! each span and channel so a host framework sees what a real E1 card would
//! advertise, and `spanconfig` stores whatever the host asks for unchanged.

#![allow(clippy::upper_case_acronyms)]

use modular_bitfield_msb::prelude::*;

/// Companding law used by default on a span.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Law {
    MuLaw = 1,
    ALaw = 2,
}

/// Line configuration / compatibility word (framing and line coding).
///
/// Bit positions match the host framework's `CONFIG_*` values:
/// D4 = bit 1, ESF = bit 2, AMI = bit 4, B8ZS = bit 5, HDB3 = bit 6,
/// CCS = bit 8, CRC4 = bit 9.
///
#[bitfield(bits=16)]
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct LineConfig {
    #[skip] __: B6,
    pub crc4: bool,
    pub ccs: bool,
    #[skip] __: B1,
    pub hdb3: bool,
    pub b8zs: bool,
    pub ami: bool,
    #[skip] __: B1,
    pub esf: bool,
    pub d4: bool,
    #[skip] __: B1,
}

impl LineConfig {
    /// What a loop span claims to support.
    pub fn loop_compat() -> Self {
        Self::new()
            .with_ami(true)
            .with_hdb3(true)
            .with_ccs(true)
            .with_crc4(true)
    }

    /// Taps do not advertise CRC4.
    pub fn tap_compat() -> Self {
        Self::new()
            .with_ami(true)
            .with_hdb3(true)
            .with_ccs(true)
    }
}

/// Channel signaling capability word.
///
/// CLEAR = bit 7, CAS = bit 15.
///
#[bitfield(bits=16)]
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SigCap {
    pub cas: bool,
    #[skip] __: B7,
    pub clear: bool,
    #[skip] __: B7,
}

impl Default for SigCap {
    fn default() -> Self {
        Self::new()
            .with_clear(true)
            .with_cas(true)
    }
}

/// Robbed-bit signaling nibble, as carried in the low four bits of an update.
///
/// A = bit 3, B = bit 2, C = bit 1, D = bit 0.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Abcd {
    #[skip] __: B4,
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub d: bool,
}
