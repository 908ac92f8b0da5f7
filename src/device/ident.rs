//! Card identification and bring-up sequence.

use log::{debug, error, info};
use spin::Mutex;

use crate::card::ext_csd::{self, index as ecsd};
use crate::card::{CardType, Cid, Csd, ExtCsd, Ocr, Scr};
use crate::cmd::ResponseType;
use crate::constants::*;
use crate::device::{Retry, SdmmcDevice};
use crate::err::{SdmmcError, SdmmcResult};
use crate::host::{BusWidth, ClockRate};

/// IO OCR fields from the CMD5 response.
const IO_OCR_NUM_FUNCTIONS: u32 = 0x7 << 28;
const IO_OCR_MEM_PRESENT: u32 = 1 << 27;

/// Shared scratch for the 512-byte EXT_CSD image; one identification
/// runs at a time per buffer.
static EXT_CSD_SCRATCH: Mutex<[u8; 512]> = Mutex::new([0u8; 512]);

impl SdmmcDevice<'_> {
    /// Run the full identification sequence. Idempotent once
    /// successful; call again after a failure or a card-detect event.
    ///
    /// Any failure leaves the card type unknown, the device
    /// not-identified and the bus clock gated off.
    pub fn card_init(&mut self) -> SdmmcResult {
        if self.init_done {
            return Ok(());
        }
        if !self.present {
            return Err(SdmmcError::NoCard);
        }
        let drv = self.drv;
        if let Some(res) = drv.card_init(self) {
            // Driver-specific identification replaces the whole FSM.
            self.init_done = res.is_ok();
            return res;
        }
        match self.identify() {
            Ok(()) => {
                self.init_done = true;
                let _ = self.drv.enable_clock(false);
                info!(
                    "sdmmc: card up, type {:?}, rca {:#06x}",
                    self.card_type, self.rca
                );
                Ok(())
            }
            Err(e) => {
                self.card_type = CardType::UNKNOWN;
                self.init_done = false;
                let _ = self.drv.enable_clock(false);
                error!("sdmmc: identification failed: {:?}", e);
                Err(e)
            }
        }
    }

    fn identify(&mut self) -> SdmmcResult {
        // Identification always starts narrow and slow.
        self.drv.set_bus_width(BusWidth::Bit1)?;
        self.drv.set_clock_rate(ClockRate::Identify)?;
        self.drv.enable_clock(true)?;

        debug!("sdmmc: reset, CMD0");
        self.send_cmd_raw(CMD0_GO_IDLE_STATE, 0, ResponseType::None)?;
        self.drv.sleep_ms(1);
        self.clear_card_state();

        // CMD8: v2.00+ cards echo the check pattern; older cards let
        // it time out. Any other failure means the card is unusable.
        let flag_f8 = match self.send_cmd_raw(CMD8_SEND_IF_COND, CMD8_CHECK_PATTERN, ResponseType::R7)
        {
            Ok(cmd) => {
                if cmd.r1() & 0xFFF != CMD8_CHECK_PATTERN {
                    error!("sdmmc: CMD8 echo mismatch {:#05x}", cmd.r1() & 0xFFF);
                    return Err(SdmmcError::NoCard);
                }
                true
            }
            Err(SdmmcError::Timeout) => false,
            Err(_) => return Err(SdmmcError::NoCard),
        };
        debug!("sdmmc: CMD8 {}", if flag_f8 { "answered" } else { "timed out" });

        // CMD5 probe: only combo cards continue as memory cards.
        if let Ok(cmd) = self.send_cmd_raw(CMD5_IO_SEND_OP_COND, 0, ResponseType::R4) {
            let io_ocr = cmd.r1();
            if io_ocr & IO_OCR_NUM_FUNCTIONS != 0 {
                self.card_type |= CardType::SDIO;
                if io_ocr & IO_OCR_MEM_PRESENT == 0 {
                    error!("sdmmc: SDIO-only card, no memory portion");
                    return Err(SdmmcError::NotSupported);
                }
            }
        }

        // A card that answers the ACMD41 probe is SD; otherwise it can
        // only be MMC.
        let is_mmc = self
            .send_acmd_raw(ACMD41_SD_SEND_OP_COND, 0, ResponseType::R3)
            .is_err();
        if is_mmc && self.spi_mode {
            return Err(SdmmcError::NotSupported);
        }

        let mut ocr = self.power_up_loop(is_mmc, flag_f8)?;
        if self.spi_mode {
            // The R3 payload is not available over SPI until the card
            // leaves idle; read the OCR explicitly.
            let cmd = self.send_cmd_raw(CMD58_READ_OCR, 0, ResponseType::R3)?;
            ocr = Ocr::from_bits_retain(cmd.r1());
        }
        self.s18v_allowed = self.s18v_support && ocr.contains(Ocr::S18A);

        self.card_type |= if is_mmc {
            CardType::MMC
        } else if !flag_f8 {
            CardType::SDSC_V1
        } else if ocr.contains(Ocr::CCS) {
            CardType::SDHC_SDXC
        } else {
            CardType::SDSC_V2_V3
        };
        debug!("sdmmc: powered up, type {:?}, ocr {:#010x}", self.card_type, ocr.bits());

        self.read_cid(is_mmc)?;

        if !self.spi_mode {
            if is_mmc {
                // MMC cards take the address from the host.
                self.rca = 1;
                self.send_cmd_raw(
                    CMD3_SEND_RELATIVE_ADDR,
                    (self.rca as u32) << 16,
                    ResponseType::R1,
                )?;
            } else {
                let cmd = self.send_cmd_raw(CMD3_SEND_RELATIVE_ADDR, 0, ResponseType::R6)?;
                self.rca = (cmd.r1() >> 16) as u16;
            }
            debug!("sdmmc: rca {:#06x}", self.rca);
        }

        self.read_csd(is_mmc)?;

        if !self.spi_mode {
            self.select_card()?;
        }

        if is_mmc { self.init_mmc() } else { self.init_sd() }
    }

    /// ACMD41 (SD) or CMD1 (MMC) until the card reports power-up.
    /// A `Retry::Count` budget is additionally bounded by the overall
    /// init timeout; `Retry::Forever` polls until the card answers.
    fn power_up_loop(&mut self, is_mmc: bool, flag_f8: bool) -> SdmmcResult<Ocr> {
        let mut arg = Ocr::ALL_VOLTAGES;
        if is_mmc {
            // Voltage window plus 1.8 V and sector-mode support.
            arg |= Ocr::V_18 | Ocr::CCS;
        } else {
            if flag_f8 {
                arg |= Ocr::CCS; // HCS: host handles high capacity
            }
            if self.s18v_support {
                arg |= Ocr::S18A; // S18R request
            }
        }
        let start = self.drv.now_ms();
        let mut polls = 0u32;
        loop {
            self.drv.sleep_ms(POWER_UP_POLL_MS);
            let cmd = if is_mmc {
                self.send_cmd_raw(CMD1_SEND_OP_COND, arg.bits(), ResponseType::R3)?
            } else {
                self.send_acmd_raw(ACMD41_SD_SEND_OP_COND, arg.bits(), ResponseType::R3)?
            };
            let ocr = Ocr::from_bits_retain(cmd.r1());
            if ocr.contains(Ocr::POWER_UP) {
                return Ok(ocr);
            }
            polls += 1;
            let timed_out = matches!(self.config.power_up_retry, Retry::Count(_))
                && self.drv.now_ms().wrapping_sub(start) > INIT_TIMEOUT_MS;
            if self.config.power_up_retry.exhausted(polls) || timed_out {
                error!("sdmmc: card never left power-up");
                return Err(SdmmcError::NoCard);
            }
        }
    }

    fn read_cid(&mut self, is_mmc: bool) -> SdmmcResult {
        let raw: [u8; 16] = if self.spi_mode {
            let mut buf = [0u8; 16];
            self.xfer(CMD10_SEND_CID, 0, 16, 1, None, Some(&mut buf[..]))?;
            buf
        } else {
            self.send_cmd_raw(CMD2_ALL_SEND_CID, 0, ResponseType::R2)?
                .long_response_bytes()
        };
        self.cid = Some(if is_mmc { Cid::parse_mmc(&raw)? } else { Cid::parse_sd(&raw)? });
        Ok(())
    }

    fn read_csd(&mut self, is_mmc: bool) -> SdmmcResult {
        let raw: [u8; 16] = if self.spi_mode {
            let mut buf = [0u8; 16];
            self.xfer(CMD9_SEND_CSD, 0, 16, 1, None, Some(&mut buf[..]))?;
            buf
        } else {
            self.send_cmd_raw(CMD9_SEND_CSD, (self.rca as u32) << 16, ResponseType::R2)?
                .long_response_bytes()
        };
        self.csd = Some(if is_mmc { Csd::parse_mmc(&raw)? } else { Csd::parse_sd(&raw)? });
        Ok(())
    }

    /// SD tail: SCR, block length, bus width, clock.
    fn init_sd(&mut self) -> SdmmcResult {
        let mut raw = [0u8; 8];
        self.xfer(ACMD51_SEND_SCR, 0, SCR_SIZE, 1, None, Some(&mut raw[..]))?;
        let scr = Scr::parse(&raw)?;
        self.scr = Some(scr);

        self.set_block_len(SDMMC_BLOCK_SIZE as u32)?;

        if !self.spi_mode && self.bus_width > BusWidth::Bit1 {
            let width = BusWidth::negotiate(self.bus_width, scr.sd_bus_widths);
            let code = if width == BusWidth::Bit4 { ACMD6_BUS_WIDTH_4BIT } else { ACMD6_BUS_WIDTH_1BIT };
            self.send_acmd_raw(ACMD6_SET_BUS_WIDTH, code, ResponseType::R1)?;
            self.drv.set_bus_width(width)?;
            debug!("sdmmc: bus width {:?}", width);
        }

        self.drv
            .set_clock_rate(ClockRate::Sd25M.capped(self.config.max_clock))?;

        if self.config.high_speed && !self.spi_mode && scr.supports_switch()
            && self.switch_high_speed()?
        {
            self.drv
                .set_clock_rate(ClockRate::SdHs50M.capped(self.config.max_clock))?;
            debug!("sdmmc: high-speed enabled");
        }
        Ok(())
    }

    /// CMD6 mode 1: request high-speed in function group 1 and check
    /// the switch status block confirms it.
    fn switch_high_speed(&mut self) -> SdmmcResult<bool> {
        let mut status = [0u8; SWITCH_STATUS_SIZE as usize];
        self.xfer(CMD6_SWITCH, CMD6_SWITCH_HS, SWITCH_STATUS_SIZE, 1, None, Some(&mut status[..]))?;
        // Function group 1 selection lives in bits [379:376].
        Ok(status[16] & 0xF == 1)
    }

    /// MMC tail: EXT_CSD, bus width via CMD6, timing and clock.
    fn init_mmc(&mut self) -> SdmmcResult {
        // All cards reach backwards-compatible 20 MHz once identified;
        // high-speed timing needs the EXT_CSD read first.
        self.drv
            .set_clock_rate(ClockRate::Mmc20M.capped(self.config.max_clock))?;

        let ext = self.read_ext_csd()?;
        self.ext_csd = Some(ext);

        if self.bus_width > BusWidth::Bit1 {
            let code = match self.bus_width {
                BusWidth::Bit8 => ext_csd::BUS_WIDTH_8BIT,
                BusWidth::Bit4 => ext_csd::BUS_WIDTH_4BIT,
                BusWidth::Bit1 => ext_csd::BUS_WIDTH_1BIT,
            };
            self.write_ext_csd(ecsd::BUS_WIDTH, code)?;
            self.drv.set_bus_width(self.bus_width)?;
            debug!("sdmmc: bus width {:?}", self.bus_width);
        }

        let spec_vers = self
            .csd
            .as_ref()
            .and_then(|csd| csd.as_mmc())
            .map(|mmc| mmc.spec_vers)
            .unwrap_or(0);
        let rate = if spec_vers >= 4 && ext.supports_hs52() {
            self.write_ext_csd(ecsd::HS_TIMING, 1)?;
            ClockRate::MmcHs52M
        } else {
            ClockRate::MmcHs26M
        };
        self.drv.set_clock_rate(rate.capped(self.config.max_clock))?;
        Ok(())
    }

    fn read_ext_csd(&mut self) -> SdmmcResult<ExtCsd> {
        let mut buf = EXT_CSD_SCRATCH.lock();
        self.xfer(CMD8_SEND_IF_COND, 0, EXT_CSD_SIZE, 1, None, Some(&mut buf[..]))?;
        Ok(ExtCsd::parse(&*buf))
    }

    /// Write one EXT_CSD byte and wait out the programming phase.
    pub(crate) fn write_ext_csd(&mut self, index: u8, value: u8) -> SdmmcResult {
        self.send_cmd_raw(CMD6_SWITCH, ext_csd_write_byte(index, value), ResponseType::R1b)?;
        self.wait_while_prg(DATA_WRITE_TIMEOUT_MS)
    }
}
