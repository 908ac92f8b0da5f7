//! Card register model: typed decoders for the registers a card
//! exposes during and after identification.

mod cid;
mod csd;
pub mod ext_csd;
mod scr;
mod status;

pub use cid::{Cid, MmcCid, SdCid};
pub use csd::{Csd, CsdFlags, CsdMmc, CsdV1, CsdV2};
pub use ext_csd::ExtCsd;
pub use scr::Scr;
pub use status::{CardState, CardStatus, SdStatus};

use bitflags::bitflags;

bitflags! {
    /// Card class, kept as a flag set so class groups can be tested
    /// with a single mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CardType: u8 {
        const SDSC_V1 = 0x01;
        const SDSC_V2_V3 = 0x02;
        const SDHC_SDXC = 0x04;
        const SDIO = 0x40;
        const MMC = 0x80;
    }
}

impl CardType {
    pub const UNKNOWN: CardType = CardType::empty();
    const SD_ANY: CardType = CardType::SDSC_V1
        .union(CardType::SDSC_V2_V3)
        .union(CardType::SDHC_SDXC);

    pub fn is_sd(self) -> bool {
        self.intersects(Self::SD_ANY)
    }

    pub fn is_mmc(self) -> bool {
        self.contains(CardType::MMC)
    }

    /// Card addresses data by 512-byte block number rather than by byte.
    /// MMC cards switch to block addressing above 2 GB, signalled by a
    /// saturated C_SIZE; callers resolve that from the CSD.
    pub fn is_block_addressed(self) -> bool {
        self.contains(CardType::SDHC_SDXC)
    }
}

bitflags! {
    /// Operation conditions register, returned in R3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ocr: u32 {
        const V_18 = 1 << 7;
        const V_27_28 = 1 << 15;
        const V_28_29 = 1 << 16;
        const V_29_30 = 1 << 17;
        const V_30_31 = 1 << 18;
        const V_31_32 = 1 << 19;
        const V_32_33 = 1 << 20;
        const V_33_34 = 1 << 21;
        const V_34_35 = 1 << 22;
        const V_35_36 = 1 << 23;
        const S18A = 1 << 24;
        const OVER_2TB = 1 << 27;
        const UHS_II = 1 << 29;
        const CCS = 1 << 30;
        const POWER_UP = 1 << 31;
    }
}

impl Ocr {
    /// Full 2.7-3.6 V window the engine advertises.
    pub const ALL_VOLTAGES: Ocr = Ocr::V_27_28
        .union(Ocr::V_28_29)
        .union(Ocr::V_29_30)
        .union(Ocr::V_30_31)
        .union(Ocr::V_31_32)
        .union(Ocr::V_32_33)
        .union(Ocr::V_33_34)
        .union(Ocr::V_34_35)
        .union(Ocr::V_35_36);
}

/// Extract bits `[hi:lo]` of a big-endian register image, numbered so
/// that bit `8 * raw.len() - 1` is the MSB of `raw[0]`. This matches
/// the bit positions the card specifications use for CID/CSD/SCR
/// layouts.
pub(crate) fn reg_bits(raw: &[u8], hi: u32, lo: u32) -> u32 {
    debug_assert!(hi >= lo && hi < 8 * raw.len() as u32 && hi - lo < 32);
    let top = 8 * raw.len() as u32 - 1;
    let mut out: u32 = 0;
    for bit in (lo..=hi).rev() {
        let byte = raw[(top - bit) as usize / 8];
        let val = (byte >> (bit % 8)) & 1;
        out = (out << 1) | val as u32;
    }
    out
}
