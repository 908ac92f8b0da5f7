//! Command descriptors exchanged between the engine and a host driver.

use crate::constants::ACMD_PREFIX;

/// Expected response shape for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// No response expected (CMD0, CMD15).
    None,
    /// Normal 48-bit response carrying the Card Status.
    R1,
    /// R1 with a busy signal on DAT0 afterwards.
    R1b,
    /// 136-bit response carrying a register image (CID/CSD).
    R2,
    /// 48-bit OCR response. Its CRC field is fixed to 0b1111111 and is
    /// not checked.
    R3,
    /// SDIO operation conditions response, likewise unprotected.
    R4,
    /// SDIO register response.
    R5,
    /// Published RCA response.
    R6,
    /// Interface condition echo.
    R7,
}

impl ResponseType {
    /// Whether the response carries a CRC7 the driver must verify.
    pub fn has_crc(self) -> bool {
        !matches!(self, ResponseType::None | ResponseType::R3 | ResponseType::R4)
    }

    /// Whether the response is the long 136-bit format.
    pub fn is_long(self) -> bool {
        matches!(self, ResponseType::R2)
    }

    /// Whether the card signals busy on DAT0 after the response.
    pub fn has_busy(self) -> bool {
        matches!(self, ResponseType::R1b)
    }
}

/// One command as handed to [`HostOps::send_cmd`](crate::HostOps::send_cmd).
///
/// The driver fills `response` on success: short responses occupy
/// `response[0]`, R2 fills all four words with `response[0]` holding
/// register bits \[127:96\].
#[derive(Debug, Clone)]
pub struct Command {
    pub idx: u8,
    pub arg: u32,
    pub resp_type: ResponseType,
    pub response: [u32; 4],
}

impl Command {
    pub fn new(idx: u8, arg: u32, resp_type: ResponseType) -> Self {
        debug_assert_eq!(idx & ACMD_PREFIX, 0, "ACMD prefix must not reach the wire");
        Command { idx, arg, resp_type, response: [0; 4] }
    }

    /// Short response word (R1/R1b/R3/R6/R7).
    pub fn r1(&self) -> u32 {
        self.response[0]
    }

    /// Long response as the 16-byte big-endian register image it carries.
    pub fn long_response_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, word) in self.response.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}

/// Data transfer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XferKind {
    /// Fixed-size blocks, the usual case.
    Block,
    /// SDIO multi-byte access. Never emitted by this engine.
    Multibyte,
    /// Open-ended MMC stream transfer. Never emitted by this engine;
    /// every transfer it issues is block mode.
    Stream,
}

/// Descriptor handed through the three transfer phases
/// (`xfer_prepare`, `xfer_execute`, `xfer_finish`).
#[derive(Debug, Clone)]
pub struct XferDesc {
    pub kind: XferKind,
    pub write: bool,
    pub cmd_idx: u8,
    pub resp_type: ResponseType,
    pub arg: u32,
    pub block_size: u16,
    pub block_num: u16,
}
