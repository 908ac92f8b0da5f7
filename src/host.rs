//! Contract between the protocol engine and a concrete host peripheral.

use core::fmt::Debug;

use crate::cmd::{Command, XferDesc};
use crate::device::SdmmcDevice;
use crate::err::SdmmcResult;

/// Data bus width in DAT lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BusWidth {
    Bit1 = 1,
    Bit4 = 4,
    Bit8 = 8,
}

impl BusWidth {
    pub fn lanes(self) -> u8 {
        self as u8
    }

    /// Width to use given the host side and the SD_BUS_WIDTHS mask the
    /// card advertised in its SCR (bit 0 = 1-bit, bit 2 = 4-bit).
    pub fn negotiate(host: BusWidth, scr_widths: u8) -> BusWidth {
        let card = if scr_widths & (1 << 2) != 0 { BusWidth::Bit4 } else { BusWidth::Bit1 };
        host.min(card)
    }
}

/// Bus clock rates used by the engine. Identification always starts at
/// 400 kHz; the rate is raised once the card class is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClockRate {
    Identify = 400_000,
    Mmc20M = 20_000_000,
    Sd25M = 25_000_000,
    MmcHs26M = 26_000_000,
    SdHs50M = 50_000_000,
    MmcHs52M = 52_000_000,
}

impl ClockRate {
    pub fn hz(self) -> u32 {
        self as u32
    }

    /// The lower of `self` and `max`.
    pub fn capped(self, max: ClockRate) -> ClockRate {
        if self.hz() > max.hz() { max } else { self }
    }
}

/// Host capabilities and state reported by [`HostOps::init`].
#[derive(Debug, Clone, Copy)]
pub struct HostInfo {
    /// Widest bus the host wiring supports.
    pub bus_width: BusWidth,
    /// Whether a card is present at init time (true when the slot has
    /// no detect line).
    pub present: bool,
    /// The transport is SPI rather than the native SD bus.
    pub spi_mode: bool,
    /// Host supports 1.8 V signaling (advertised as S18R in ACMD41).
    pub s18v_support: bool,
}

/// Operations a host peripheral driver provides to the engine.
///
/// All methods take `&self`; drivers keep their mutable state behind
/// interior mutability so a device descriptor can hold a shared
/// reference. Blocking waits inside the driver follow the
/// armed-interrupt-plus-[`Completion`](crate::osa::Completion) pattern:
/// the command path blocks on a completion the ISR signals exactly once
/// after latching the peripheral status.
pub trait HostOps: Debug + Send + Sync {
    /// One-time peripheral bring-up.
    fn init(&self) -> SdmmcResult<HostInfo>;

    /// Transmit one command and capture its response into
    /// `cmd.response`.
    ///
    /// The index never carries the ACMD prefix. The driver verifies
    /// the response CRC for every type whose
    /// [`has_crc`](crate::ResponseType::has_crc) holds and maps wire
    /// failures to [`Timeout`](crate::SdmmcError::Timeout) and
    /// [`BadMessage`](crate::SdmmcError::BadMessage).
    fn send_cmd(&self, cmd: &mut Command) -> SdmmcResult;

    /// Full replacement for the standard identification procedure.
    /// `None` (the default) selects the engine's own FSM.
    fn card_init(&self, dev: &mut SdmmcDevice<'_>) -> Option<SdmmcResult> {
        let _ = dev;
        None
    }

    /// Apply a negotiated bus width to the peripheral.
    fn set_bus_width(&self, width: BusWidth) -> SdmmcResult;

    /// Apply a bus clock rate to the peripheral.
    fn set_clock_rate(&self, rate: ClockRate) -> SdmmcResult;

    /// Gate the bus clock between operations. Default no-op for hosts
    /// with a free-running clock.
    fn enable_clock(&self, enable: bool) -> SdmmcResult {
        let _ = enable;
        Ok(())
    }

    /// Program lengths, timeouts and DMA for an upcoming transfer.
    fn xfer_prepare(&self, xfer: &mut XferDesc) -> SdmmcResult;

    /// Move the data. Returns the number of blocks completed, which may
    /// be fewer than requested; partial completion is not an error.
    /// Maps data-phase failures: timeout to `Timeout`, CRC to
    /// `BadMessage`, FIFO under/overrun to `NoMemory`, start-bit and
    /// other transport faults to `Io`.
    fn xfer_execute(
        &self,
        xfer: &mut XferDesc,
        data_wr: Option<&[u8]>,
        data_rd: Option<&mut [u8]>,
    ) -> SdmmcResult<u16>;

    /// Release per-transfer resources. Called exactly once for every
    /// prepared transfer, whether the execute phase succeeded or not.
    fn xfer_finish(&self, xfer: &mut XferDesc) -> SdmmcResult;

    /// Monotonic millisecond clock for bounded waits.
    fn now_ms(&self) -> u32;

    /// Delay for at least `ms` milliseconds.
    fn sleep_ms(&self, ms: u32);
}
