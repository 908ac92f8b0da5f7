//! Command/response engine: the raw send path, ACMD wrapping and the
//! polled status waits.

use log::{error, trace};

use crate::card::{CardState, CardStatus};
use crate::cmd::{Command, ResponseType};
use crate::constants::*;
use crate::device::SdmmcDevice;
use crate::err::{SdmmcError, SdmmcResult};

impl SdmmcDevice<'_> {
    /// Send a single command, identifying the card first if needed.
    /// Returns the raw response words.
    pub fn send_cmd(&mut self, idx: u8, arg: u32, resp_type: ResponseType) -> SdmmcResult<[u32; 4]> {
        self.assert_card()?;
        Ok(self.send_cmd_raw(idx, arg, resp_type)?.response)
    }

    /// Send an application-specific command (index carries the ACMD
    /// prefix), identifying the card first if needed.
    pub fn send_acmd(&mut self, idx: u8, arg: u32, resp_type: ResponseType) -> SdmmcResult<[u32; 4]> {
        self.assert_card()?;
        Ok(self.send_acmd_raw(idx, arg, resp_type)?.response)
    }

    /// Transmit one bare command through the driver. For R1/R1b the
    /// returned Card Status is cached and card-reported error bits
    /// fail the call; on a driver error the cached status stays
    /// untouched.
    pub(crate) fn send_cmd_raw(
        &mut self,
        idx: u8,
        arg: u32,
        resp_type: ResponseType,
    ) -> SdmmcResult<Command> {
        debug_assert_eq!(idx & ACMD_PREFIX, 0, "ACMDs go through send_acmd_raw");
        let mut cmd = Command::new(idx, arg, resp_type);
        trace!("sdmmc: CMD{} arg {:#010x} {:?}", idx, arg, resp_type);
        self.drv.send_cmd(&mut cmd)?;
        if matches!(resp_type, ResponseType::R1 | ResponseType::R1b) {
            self.status = CardStatus::from_bits_retain(cmd.r1());
            if self.status.has_error() {
                error!("sdmmc: CMD{} card error, status {:#010x}", idx, cmd.r1());
                return Err(SdmmcError::CardFault);
            }
        }
        Ok(cmd)
    }

    /// CMD55 then the bare command. ACMD41 is special: it is polled
    /// before the card has an address, so its CMD55 argument is 0.
    pub(crate) fn send_acmd_raw(
        &mut self,
        idx: u8,
        arg: u32,
        resp_type: ResponseType,
    ) -> SdmmcResult<Command> {
        debug_assert_ne!(idx & ACMD_PREFIX, 0, "not an application command");
        let sel = if idx == ACMD41_SD_SEND_OP_COND { 0 } else { (self.rca as u32) << 16 };
        self.send_cmd_raw(CMD55_APP_CMD, sel, ResponseType::R1)?;
        if !self.status.contains(CardStatus::APP_CMD) {
            error!("sdmmc: card did not accept CMD55");
            return Err(SdmmcError::NotSupported);
        }
        self.send_cmd_raw(idx & !ACMD_PREFIX, arg, resp_type)
    }

    /// CMD13, refreshing the cached Card Status.
    pub(crate) fn read_status(&mut self) -> SdmmcResult<CardStatus> {
        self.send_cmd_raw(CMD13_SEND_STATUS, (self.rca as u32) << 16, ResponseType::R1)?;
        Ok(self.status)
    }

    /// CMD7 with our RCA, moving the card stby -> tran.
    pub(crate) fn select_card(&mut self) -> SdmmcResult {
        self.send_cmd_raw(CMD7_SELECT_DESELECT, (self.rca as u32) << 16, ResponseType::R1b)?;
        Ok(())
    }

    /// CMD16.
    pub(crate) fn set_block_len(&mut self, len: u32) -> SdmmcResult {
        self.send_cmd_raw(CMD16_SET_BLOCKLEN, len, ResponseType::R1)?;
        Ok(())
    }

    /// Poll CMD13 until the card reports READY_FOR_DATA, bounded by the
    /// configured retry budget. Exhaustion marks the card
    /// not-identified and returns `Busy`.
    pub(crate) fn wait_for_ready(&mut self) -> SdmmcResult {
        let retry = self.config.ready_retry;
        let mut polls = 0u32;
        loop {
            match self.read_status() {
                Ok(status) if status.contains(CardStatus::READY_FOR_DATA) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    self.init_done = false;
                    return Err(e);
                }
            }
            polls += 1;
            if retry.exhausted(polls) {
                error!("sdmmc: card not ready after {} polls", polls);
                self.init_done = false;
                return Err(SdmmcError::Busy);
            }
            self.drv.sleep_ms(READY_POLL_MS);
        }
    }

    /// Poll CMD13 every millisecond until CURRENT_STATE leaves `prg`.
    /// A `timeout_ms` of 0 waits forever.
    pub(crate) fn wait_while_prg(&mut self, timeout_ms: u32) -> SdmmcResult {
        let start = self.drv.now_ms();
        loop {
            let status = self.read_status()?;
            if status.current_state() != CardState::Prg {
                return Ok(());
            }
            if timeout_ms != 0 && self.drv.now_ms().wrapping_sub(start) > timeout_ms {
                error!("sdmmc: card stuck in programming state");
                self.init_done = false;
                return Err(SdmmcError::Timeout);
            }
            self.drv.sleep_ms(1);
        }
    }
}
