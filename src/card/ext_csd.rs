//! MMC extended CSD, read as a 512-byte data block via CMD8.

/// Byte indices of the EXT_CSD fields the engine uses.
pub mod index {
    pub const BUS_WIDTH: u8 = 183;
    pub const HS_TIMING: u8 = 185;
    pub const CSD_STRUCTURE: u8 = 194;
    pub const CARD_TYPE: u8 = 196;
    pub const SEC_COUNT: usize = 212;
}

/// CARD_TYPE bits.
pub const CARD_TYPE_HS_26: u8 = 1 << 0;
pub const CARD_TYPE_HS_52: u8 = 1 << 1;

/// BUS_WIDTH codes.
pub const BUS_WIDTH_1BIT: u8 = 0;
pub const BUS_WIDTH_4BIT: u8 = 1;
pub const BUS_WIDTH_8BIT: u8 = 2;

/// The EXT_CSD fields the engine keeps after decoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtCsd {
    /// Device capacity in 512-byte sectors, authoritative for >2 GB
    /// cards.
    pub sec_count: u32,
    pub csd_structure: u8,
    /// Supported speed grades, CARD_TYPE_HS_* bits.
    pub card_type: u8,
    pub bus_width: u8,
    pub hs_timing: u8,
}

impl ExtCsd {
    pub fn parse(raw: &[u8; 512]) -> ExtCsd {
        ExtCsd {
            sec_count: u32::from_le_bytes([
                raw[index::SEC_COUNT],
                raw[index::SEC_COUNT + 1],
                raw[index::SEC_COUNT + 2],
                raw[index::SEC_COUNT + 3],
            ]),
            csd_structure: raw[index::CSD_STRUCTURE as usize],
            card_type: raw[index::CARD_TYPE as usize],
            bus_width: raw[index::BUS_WIDTH as usize],
            hs_timing: raw[index::HS_TIMING as usize],
        }
    }

    pub fn supports_hs52(&self) -> bool {
        self.card_type & CARD_TYPE_HS_52 != 0
    }
}
