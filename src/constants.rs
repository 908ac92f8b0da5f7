//! Command indices, argument layouts and protocol timeouts.

/// Flag marking an application-specific command index. The engine sends
/// CMD55 first and strips the flag before it reaches the driver.
pub const ACMD_PREFIX: u8 = 1 << 7;

pub const CMD0_GO_IDLE_STATE: u8 = 0;
pub const CMD1_SEND_OP_COND: u8 = 1;
pub const CMD2_ALL_SEND_CID: u8 = 2;
pub const CMD3_SEND_RELATIVE_ADDR: u8 = 3;
pub const CMD5_IO_SEND_OP_COND: u8 = 5;
pub const CMD6_SWITCH: u8 = 6;
pub const CMD7_SELECT_DESELECT: u8 = 7;
pub const CMD8_SEND_IF_COND: u8 = 8;
pub const CMD9_SEND_CSD: u8 = 9;
pub const CMD10_SEND_CID: u8 = 10;
pub const CMD12_STOP_TRANSMISSION: u8 = 12;
pub const CMD13_SEND_STATUS: u8 = 13;
pub const CMD16_SET_BLOCKLEN: u8 = 16;
pub const CMD17_READ_SINGLE_BLOCK: u8 = 17;
pub const CMD18_READ_MULTIPLE_BLOCK: u8 = 18;
pub const CMD24_WRITE_BLOCK: u8 = 24;
pub const CMD25_WRITE_MULTIPLE_BLOCK: u8 = 25;
pub const CMD32_ERASE_WR_BLK_START: u8 = 32;
pub const CMD33_ERASE_WR_BLK_END: u8 = 33;
pub const CMD38_ERASE: u8 = 38;
pub const CMD55_APP_CMD: u8 = 55;
pub const CMD58_READ_OCR: u8 = 58;

pub const ACMD6_SET_BUS_WIDTH: u8 = 6 | ACMD_PREFIX;
pub const ACMD13_SD_STATUS: u8 = 13 | ACMD_PREFIX;
pub const ACMD41_SD_SEND_OP_COND: u8 = 41 | ACMD_PREFIX;
pub const ACMD51_SEND_SCR: u8 = 51 | ACMD_PREFIX;

/// CMD8 argument: VHS 2.7-3.6 V plus the 0xAA check pattern the card
/// must echo back in R7.
pub const CMD8_CHECK_PATTERN: u32 = (0x1 << 8) | 0xAA;

/// ACMD6 argument codes.
pub const ACMD6_BUS_WIDTH_1BIT: u32 = 0;
pub const ACMD6_BUS_WIDTH_4BIT: u32 = 2;

/// CMD6 mode 1 (switch), group 1 set to high-speed, all other groups
/// left as-is.
pub const CMD6_SWITCH_HS: u32 = 0x80FF_FFF1;
/// Length of the CMD6 switch status block.
pub const SWITCH_STATUS_SIZE: u16 = 64;

/// EXT_CSD access mode 0b11: write the byte at `index` with `value`.
pub const fn ext_csd_write_byte(index: u8, value: u8) -> u32 {
    (0b11 << 24) | ((index as u32) << 16) | ((value as u32) << 8)
}

pub const SDMMC_BLOCK_SIZE: u16 = 512;
pub const SD_STATUS_SIZE: u16 = 64;
pub const SCR_SIZE: u16 = 8;
pub const EXT_CSD_SIZE: u16 = 512;

/// Overall identification timeout, measured from the first power-up poll.
pub const INIT_TIMEOUT_MS: u32 = 1000;
/// Interval between ACMD41/CMD1 power-up polls.
pub const POWER_UP_POLL_MS: u32 = 10;
/// Data read timeout.
pub const DATA_READ_TIMEOUT_MS: u32 = 100;
/// Data write timeout, including the programming wait.
pub const DATA_WRITE_TIMEOUT_MS: u32 = 500;
/// Erase timeout per block.
pub const ERASE_TIMEOUT_PER_BLOCK_MS: u32 = 250;
/// Ready-for-data wait before a transfer.
pub const READY_TIMEOUT_MS: u32 = 250;
/// Interval between CMD13 ready polls.
pub const READY_POLL_MS: u32 = 10;
/// Card-detect transitions closer together than this are ignored.
pub const CARD_DETECT_DEBOUNCE_MS: u32 = 100;
