//! Card identification register.

use crate::card::reg_bits;
use crate::crc::crc7;
use crate::err::{SdmmcError, SdmmcResult};

/// CID fields in the SD layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SdCid {
    pub mid: u8,
    /// OEM/application id, two ASCII characters.
    pub oid: [u8; 2],
    /// Product name, five ASCII characters.
    pub pnm: [u8; 5],
    /// Product revision, BCD major.minor.
    pub prv: u8,
    pub psn: u32,
    /// Manufacturing date: year offset from 2000 in bits \[11:4\],
    /// month in \[3:0\].
    pub mdt: u16,
}

/// CID fields in the MMC layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MmcCid {
    pub mid: u8,
    pub oid: u16,
    /// Product name, six ASCII characters.
    pub pnm: [u8; 6],
    pub prv: u8,
    pub psn: u32,
    /// Manufacturing date: month in bits \[7:4\], year in \[3:0\].
    pub mdt: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cid {
    Sd(SdCid),
    Mmc(MmcCid),
}

impl Cid {
    /// Decode a 16-byte SD CID image, verifying the trailing CRC7.
    pub fn parse_sd(raw: &[u8; 16]) -> SdmmcResult<Cid> {
        check_crc(raw)?;
        Ok(Cid::Sd(SdCid {
            mid: raw[0],
            oid: [raw[1], raw[2]],
            pnm: [raw[3], raw[4], raw[5], raw[6], raw[7]],
            prv: raw[8],
            psn: u32::from_be_bytes([raw[9], raw[10], raw[11], raw[12]]),
            mdt: reg_bits(raw, 19, 8) as u16,
        }))
    }

    /// Decode a 16-byte MMC CID image, verifying the trailing CRC7.
    pub fn parse_mmc(raw: &[u8; 16]) -> SdmmcResult<Cid> {
        check_crc(raw)?;
        Ok(Cid::Mmc(MmcCid {
            mid: raw[0],
            oid: u16::from_be_bytes([raw[1], raw[2]]),
            pnm: [raw[3], raw[4], raw[5], raw[6], raw[7], raw[8]],
            prv: raw[9],
            psn: u32::from_be_bytes([raw[10], raw[11], raw[12], raw[13]]),
            mdt: raw[14],
        }))
    }

    pub fn as_sd(&self) -> Option<&SdCid> {
        if let Cid::Sd(cid) = self { Some(cid) } else { None }
    }

    pub fn as_mmc(&self) -> Option<&MmcCid> {
        if let Cid::Mmc(cid) = self { Some(cid) } else { None }
    }
}

/// The last CID/CSD byte carries CRC7 over the first 15 bytes in bits
/// \[7:1\] with the end bit at \[0\].
fn check_crc(raw: &[u8; 16]) -> SdmmcResult {
    if crc7(&raw[..15]) != raw[15] >> 1 {
        return Err(SdmmcError::BadMessage);
    }
    Ok(())
}
