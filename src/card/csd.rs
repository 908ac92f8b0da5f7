//! Card-specific data register, all three layouts.

use bitflags::bitflags;

use crate::card::reg_bits;
use crate::crc::crc7;
use crate::err::{SdmmcError, SdmmcResult};

bitflags! {
    /// Static CSD flag bits shared by all layouts.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct CsdFlags: u16 {
        /// Partial block reads allowed \[79\].
        const READ_BL_PARTIAL = 1 << 0;
        /// Write block misalignment allowed \[78\].
        const WRITE_BLK_MISALIGN = 1 << 1;
        /// Read block misalignment allowed \[77\].
        const READ_BLK_MISALIGN = 1 << 2;
        /// DSR implemented \[76\].
        const DSR_IMP = 1 << 3;
        /// Single-block erase enabled \[46\].
        const ERASE_BLK_EN = 1 << 4;
        /// Write protect group enabled \[31\].
        const WP_GRP_ENABLE = 1 << 5;
        /// Partial block writes allowed \[21\].
        const WRITE_BL_PARTIAL = 1 << 6;
        /// Copy flag \[14\].
        const COPY = 1 << 7;
        /// Permanent write protection \[13\].
        const PERM_WRITE_PROTECT = 1 << 8;
        /// Temporary write protection \[12\].
        const TMP_WRITE_PROTECT = 1 << 9;
    }
}

/// CSD version 1.0 layout (SDSC).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CsdV1 {
    pub taac: u8,
    pub nsac: u8,
    pub tran_speed: u8,
    pub ccc: u16,
    pub read_bl_len: u8,
    pub c_size: u16,
    pub c_size_mult: u8,
    pub sector_size: u8,
    pub r2w_factor: u8,
    pub write_bl_len: u8,
    pub flags: CsdFlags,
}

/// CSD version 2.0 layout (SDHC/SDXC).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CsdV2 {
    pub taac: u8,
    pub nsac: u8,
    pub tran_speed: u8,
    pub ccc: u16,
    pub read_bl_len: u8,
    pub c_size: u32,
    pub sector_size: u8,
    pub write_bl_len: u8,
    pub flags: CsdFlags,
}

/// MMC CSD layout, the v1 field set plus the specification version.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CsdMmc {
    pub spec_vers: u8,
    pub taac: u8,
    pub nsac: u8,
    pub tran_speed: u8,
    pub ccc: u16,
    pub read_bl_len: u8,
    pub c_size: u16,
    pub c_size_mult: u8,
    pub sector_size: u8,
    pub r2w_factor: u8,
    pub write_bl_len: u8,
    pub flags: CsdFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Csd {
    V1(CsdV1),
    V2(CsdV2),
    Mmc(CsdMmc),
}

impl Csd {
    /// Decode a 16-byte SD CSD image, discriminating on CSD_STRUCTURE
    /// and verifying the trailing CRC7.
    pub fn parse_sd(raw: &[u8; 16]) -> SdmmcResult<Csd> {
        check_crc(raw)?;
        match reg_bits(raw, 127, 126) {
            0 => Ok(Csd::V1(CsdV1 {
                taac: raw[1],
                nsac: raw[2],
                tran_speed: raw[3],
                ccc: reg_bits(raw, 95, 84) as u16,
                read_bl_len: reg_bits(raw, 83, 80) as u8,
                c_size: reg_bits(raw, 73, 62) as u16,
                c_size_mult: reg_bits(raw, 49, 47) as u8,
                sector_size: reg_bits(raw, 45, 39) as u8,
                r2w_factor: reg_bits(raw, 28, 26) as u8,
                write_bl_len: reg_bits(raw, 25, 22) as u8,
                flags: parse_flags(raw),
            })),
            1 => Ok(Csd::V2(CsdV2 {
                taac: raw[1],
                nsac: raw[2],
                tran_speed: raw[3],
                ccc: reg_bits(raw, 95, 84) as u16,
                read_bl_len: reg_bits(raw, 83, 80) as u8,
                c_size: reg_bits(raw, 69, 48),
                sector_size: reg_bits(raw, 45, 39) as u8,
                write_bl_len: reg_bits(raw, 25, 22) as u8,
                flags: parse_flags(raw),
            })),
            _ => Err(SdmmcError::NotSupported),
        }
    }

    /// Decode a 16-byte MMC CSD image.
    pub fn parse_mmc(raw: &[u8; 16]) -> SdmmcResult<Csd> {
        check_crc(raw)?;
        Ok(Csd::Mmc(CsdMmc {
            spec_vers: reg_bits(raw, 125, 122) as u8,
            taac: raw[1],
            nsac: raw[2],
            tran_speed: raw[3],
            ccc: reg_bits(raw, 95, 84) as u16,
            read_bl_len: reg_bits(raw, 83, 80) as u8,
            c_size: reg_bits(raw, 73, 62) as u16,
            c_size_mult: reg_bits(raw, 49, 47) as u8,
            sector_size: reg_bits(raw, 45, 39) as u8,
            r2w_factor: reg_bits(raw, 28, 26) as u8,
            write_bl_len: reg_bits(raw, 25, 22) as u8,
            flags: parse_flags(raw),
        }))
    }

    /// Capacity in bytes straight from the CSD. Widened before the
    /// multiply: a maximal v2 C_SIZE describes a 2 TB SDXC card.
    ///
    /// An MMC CSD with a saturated C_SIZE describes a >2 GB card whose
    /// real capacity lives in EXT_CSD.SEC_COUNT; this returns `None`
    /// for that case.
    pub fn capacity(&self) -> Option<u64> {
        match self {
            Csd::V1(csd) => {
                Some(((csd.c_size as u64 + 1) << (csd.c_size_mult + 2)) << csd.read_bl_len)
            }
            Csd::V2(csd) => Some((csd.c_size as u64 + 1) * (512 * 1024)),
            Csd::Mmc(csd) => {
                if csd.c_size == 0xFFF {
                    None
                } else {
                    Some(((csd.c_size as u64 + 1) << (csd.c_size_mult + 2)) << csd.read_bl_len)
                }
            }
        }
    }

    pub fn as_mmc(&self) -> Option<&CsdMmc> {
        if let Csd::Mmc(csd) = self { Some(csd) } else { None }
    }
}

fn parse_flags(raw: &[u8; 16]) -> CsdFlags {
    let mut flags = CsdFlags::empty();
    for (bit, flag) in [
        (79, CsdFlags::READ_BL_PARTIAL),
        (78, CsdFlags::WRITE_BLK_MISALIGN),
        (77, CsdFlags::READ_BLK_MISALIGN),
        (76, CsdFlags::DSR_IMP),
        (46, CsdFlags::ERASE_BLK_EN),
        (31, CsdFlags::WP_GRP_ENABLE),
        (21, CsdFlags::WRITE_BL_PARTIAL),
        (14, CsdFlags::COPY),
        (13, CsdFlags::PERM_WRITE_PROTECT),
        (12, CsdFlags::TMP_WRITE_PROTECT),
    ] {
        if reg_bits(raw, bit, bit) != 0 {
            flags |= flag;
        }
    }
    flags
}

fn check_crc(raw: &[u8; 16]) -> SdmmcResult {
    if crc7(&raw[..15]) != raw[15] >> 1 {
        return Err(SdmmcError::BadMessage);
    }
    Ok(())
}
