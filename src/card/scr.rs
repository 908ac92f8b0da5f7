//! SD card configuration register, read via ACMD51.

use crate::card::reg_bits;
use crate::err::{SdmmcError, SdmmcResult};

/// Decoded SCR. The raw register is 64 bits, transferred MSB first as
/// an 8-byte data block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Scr {
    pub scr_structure: u8,
    /// Physical layer spec version code (0 = 1.0, 1 = 1.10, 2 = 2.00+).
    pub sd_spec: u8,
    pub data_stat_after_erase: bool,
    pub sd_security: u8,
    /// Supported bus widths: bit 0 = 1-bit, bit 2 = 4-bit.
    pub sd_bus_widths: u8,
    pub sd_spec3: bool,
    pub ex_security: u8,
    pub sd_spec4: bool,
    pub sd_specx: u8,
    pub cmd_support: u8,
}

impl Scr {
    pub fn parse(raw: &[u8; 8]) -> SdmmcResult<Scr> {
        let scr = Scr {
            scr_structure: reg_bits(raw, 63, 60) as u8,
            sd_spec: reg_bits(raw, 59, 56) as u8,
            data_stat_after_erase: reg_bits(raw, 55, 55) != 0,
            sd_security: reg_bits(raw, 54, 52) as u8,
            sd_bus_widths: reg_bits(raw, 51, 48) as u8,
            sd_spec3: reg_bits(raw, 47, 47) != 0,
            ex_security: reg_bits(raw, 46, 43) as u8,
            sd_spec4: reg_bits(raw, 42, 42) != 0,
            sd_specx: reg_bits(raw, 41, 38) as u8,
            cmd_support: reg_bits(raw, 35, 32) as u8,
        };
        if scr.scr_structure != 0 {
            return Err(SdmmcError::NotSupported);
        }
        Ok(scr)
    }

    /// Card implements physical layer 1.10 or later, the baseline for
    /// the CMD6 function switch.
    pub fn supports_switch(&self) -> bool {
        self.sd_spec >= 1
    }

    pub fn supports_4bit(&self) -> bool {
        self.sd_bus_widths & (1 << 2) != 0
    }
}
