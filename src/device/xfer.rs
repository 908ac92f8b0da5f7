//! Block transfer engine and the block-device-facing API.

use log::{debug, error, trace};

use crate::card::{CardType, SdStatus};
use crate::cmd::{ResponseType, XferDesc, XferKind};
use crate::constants::*;
use crate::device::SdmmcDevice;
use crate::err::{SdmmcError, SdmmcResult};

impl SdmmcDevice<'_> {
    /// Read whole blocks starting at `block_addr`. The buffer length
    /// selects the block count and must be a non-zero multiple of 512.
    /// Returns the number of blocks actually read.
    pub fn read_blocks(&mut self, block_addr: u32, data: &mut [u8]) -> SdmmcResult<u16> {
        self.assert_card()?;
        let block_num = block_count_for(data.len())?;
        let cmd = if block_num > 1 { CMD18_READ_MULTIPLE_BLOCK } else { CMD17_READ_SINGLE_BLOCK };
        let arg = self.phys_addr(block_addr);
        self.xfer(cmd, arg, SDMMC_BLOCK_SIZE, block_num, None, Some(data))
    }

    /// Write whole blocks starting at `block_addr`. Same contract as
    /// [`read_blocks`](Self::read_blocks).
    pub fn write_blocks(&mut self, block_addr: u32, data: &[u8]) -> SdmmcResult<u16> {
        self.assert_card()?;
        let block_num = block_count_for(data.len())?;
        let cmd = if block_num > 1 { CMD25_WRITE_MULTIPLE_BLOCK } else { CMD24_WRITE_BLOCK };
        let arg = self.phys_addr(block_addr);
        self.xfer(cmd, arg, SDMMC_BLOCK_SIZE, block_num, Some(data), None)
    }

    /// Erase `block_num` blocks starting at `block_addr`. SD memory
    /// cards only.
    pub fn erase_blocks(&mut self, block_addr: u32, block_num: u16) -> SdmmcResult {
        self.assert_card()?;
        if !self.card_type.is_sd() {
            return Err(SdmmcError::NotSupported);
        }
        if block_num == 0 {
            return Err(SdmmcError::InvalidArg);
        }
        debug!("sdmmc: erase {} blocks at {}", block_num, block_addr);
        self.drv.enable_clock(true)?;
        let res = self.erase_inner(block_addr, block_num);
        let clk = self.drv.enable_clock(false);
        res?;
        clk
    }

    fn erase_inner(&mut self, block_addr: u32, block_num: u16) -> SdmmcResult {
        self.wait_for_ready()?;
        let start = self.phys_addr(block_addr);
        let end = self.phys_addr(block_addr + block_num as u32 - 1);
        self.send_cmd_raw(CMD32_ERASE_WR_BLK_START, start, ResponseType::R1)?;
        self.send_cmd_raw(CMD33_ERASE_WR_BLK_END, end, ResponseType::R1)?;
        self.send_cmd_raw(CMD38_ERASE, 0, ResponseType::R1b)?;
        self.wait_while_prg(block_num as u32 * ERASE_TIMEOUT_PER_BLOCK_MS)
    }

    /// Capacity in bytes from the identified card's CSD, falling back
    /// to EXT_CSD.SEC_COUNT for sector-mode MMC.
    pub fn get_capacity(&mut self) -> SdmmcResult<u64> {
        self.assert_card()?;
        let csd = self.csd.as_ref().ok_or(SdmmcError::NoCard)?;
        match csd.capacity() {
            Some(bytes) => Ok(bytes),
            None => {
                let ext = self.ext_csd.as_ref().ok_or(SdmmcError::NotSupported)?;
                Ok(ext.sec_count as u64 * SDMMC_BLOCK_SIZE as u64)
            }
        }
    }

    /// Fetch and decode the 64-byte SD Status (ACMD13).
    pub fn read_sd_status(&mut self) -> SdmmcResult<SdStatus> {
        self.assert_card()?;
        if !self.card_type.is_sd() {
            return Err(SdmmcError::NotSupported);
        }
        let mut raw = [0u8; SD_STATUS_SIZE as usize];
        self.xfer(ACMD13_SD_STATUS, 0, SD_STATUS_SIZE, 1, None, Some(&mut raw[..]))?;
        Ok(SdStatus::parse(&raw))
    }

    /// One complete data transfer: ready wait, CMD55 for ACMDs, the
    /// three driver phases, the stop command for multi-block transfers
    /// and the programming wait for writes. Returns blocks completed.
    pub(crate) fn xfer(
        &mut self,
        cmd_idx: u8,
        arg: u32,
        block_size: u16,
        block_num: u16,
        data_wr: Option<&[u8]>,
        data_rd: Option<&mut [u8]>,
    ) -> SdmmcResult<u16> {
        debug_assert!(
            matches!(
                cmd_idx,
                CMD6_SWITCH
                    | CMD8_SEND_IF_COND
                    | CMD9_SEND_CSD
                    | CMD10_SEND_CID
                    | CMD17_READ_SINGLE_BLOCK
                    | CMD18_READ_MULTIPLE_BLOCK
                    | CMD24_WRITE_BLOCK
                    | CMD25_WRITE_MULTIPLE_BLOCK
                    | ACMD13_SD_STATUS
                    | ACMD51_SEND_SCR
            ),
            "CMD{} is not a data transfer command",
            cmd_idx & !ACMD_PREFIX
        );
        debug_assert!(block_num > 0, "a transfer moves at least one block");
        debug_assert!(
            block_num == 1
                || matches!(cmd_idx, CMD18_READ_MULTIPLE_BLOCK | CMD25_WRITE_MULTIPLE_BLOCK),
            "multi-block transfers need CMD18/CMD25"
        );
        if block_size == 0 || block_size % 4 != 0 {
            return Err(SdmmcError::InvalidArg);
        }

        self.drv.enable_clock(true)?;
        let res = self.xfer_inner(cmd_idx, arg, block_size, block_num, data_wr, data_rd);
        let clk = self.drv.enable_clock(false);
        let done = res?;
        clk?;
        Ok(done)
    }

    fn xfer_inner(
        &mut self,
        cmd_idx: u8,
        arg: u32,
        block_size: u16,
        block_num: u16,
        data_wr: Option<&[u8]>,
        data_rd: Option<&mut [u8]>,
    ) -> SdmmcResult<u16> {
        let write = data_wr.is_some();
        self.wait_for_ready()?;

        if cmd_idx & ACMD_PREFIX != 0 {
            let sel = (self.rca as u32) << 16;
            self.send_cmd_raw(CMD55_APP_CMD, sel, ResponseType::R1)?;
            if !self.status.contains(crate::card::CardStatus::APP_CMD) {
                return Err(SdmmcError::NotSupported);
            }
        }

        let mut xfer = XferDesc {
            kind: XferKind::Block,
            write,
            cmd_idx: cmd_idx & !ACMD_PREFIX,
            resp_type: ResponseType::R1,
            arg,
            block_size,
            block_num,
        };
        trace!(
            "sdmmc: xfer CMD{} {} {}x{}",
            xfer.cmd_idx,
            if write { "write" } else { "read" },
            block_num,
            block_size
        );

        // Drivers reject layouts they cannot move; that is a caller
        // problem, not a bus problem.
        if self.drv.xfer_prepare(&mut xfer).is_err() {
            return Err(SdmmcError::InvalidArg);
        }

        let res = match self.send_cmd_raw(xfer.cmd_idx, arg, ResponseType::R1) {
            Ok(_) => self.drv.xfer_execute(&mut xfer, data_wr, data_rd),
            Err(e) => Err(e),
        };

        // The stop command must go out even after a failed transfer so
        // the card leaves the data state.
        let stop = if block_num > 1 {
            let resp = if self.card_type.is_mmc() && !write {
                ResponseType::R1
            } else {
                ResponseType::R1b
            };
            self.send_cmd_raw(CMD12_STOP_TRANSMISSION, 0, resp).map(|_| ())
        } else {
            Ok(())
        };

        let finish = self.drv.xfer_finish(&mut xfer);

        let done = res.inspect_err(|e| error!("sdmmc: data phase failed: {:?}", e))?;
        stop?;
        finish?;

        if write && done > 0 {
            self.wait_while_prg(DATA_WRITE_TIMEOUT_MS)?;
        }
        Ok(done)
    }

    /// Byte address on the wire for byte-addressed card classes, the
    /// block number for block-addressed ones.
    fn phys_addr(&self, block_addr: u32) -> u32 {
        if self.is_block_addressed() {
            block_addr
        } else {
            block_addr * SDMMC_BLOCK_SIZE as u32
        }
    }

    fn is_block_addressed(&self) -> bool {
        if self.card_type.contains(CardType::MMC) {
            // Sector-mode MMC has a saturated C_SIZE.
            return self.csd.as_ref().and_then(|csd| csd.capacity()).is_none();
        }
        self.card_type.is_block_addressed()
    }
}

fn block_count_for(len: usize) -> SdmmcResult<u16> {
    if len == 0 || len % SDMMC_BLOCK_SIZE as usize != 0 {
        return Err(SdmmcError::InvalidArg);
    }
    u16::try_from(len / SDMMC_BLOCK_SIZE as usize).map_err(|_| SdmmcError::InvalidArg)
}
