//! A scripted card-plus-controller model implementing `HostOps`.
//!
//! It behaves like a small slot with one card soldered in: commands run
//! a card state machine, data commands arm an internal transfer that
//! the three-phase calls move, and recorders keep everything the tests
//! assert on. Transfers complete through the same completion-signal
//! handshake a real ISR-driven driver uses.

// Each test binary exercises a different subset of the model.
#![allow(dead_code)]

use std::sync::Mutex;

use sdmmc_host::constants::*;
use sdmmc_host::crc::crc7;
use sdmmc_host::osa::Completion;
use sdmmc_host::{
    BusWidth, ClockRate, Command, HostInfo, HostOps, SdmmcError, SdmmcResult, XferDesc,
};

pub const BLOCK_COUNT: usize = 64;
pub const BLOCK_SIZE: usize = 512;

/// Card personality the model presents during identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// CMD8 answered, CCS set: SDHC, block addressed.
    Sdhc,
    /// CMD8 answered, CCS clear: SDSC v2, byte addressed.
    SdscV2,
    /// CMD8 times out: SDSC v1, byte addressed.
    SdscV1,
    /// No response to CMD55: MMC v4, sector mode (C_SIZE saturated).
    Mmc,
}

impl Profile {
    fn answers_cmd8(self) -> bool {
        matches!(self, Profile::Sdhc | Profile::SdscV2)
    }

    fn is_mmc(self) -> bool {
        self == Profile::Mmc
    }

    /// Transfer commands carry byte addresses on SDSC.
    fn byte_addressed(self) -> bool {
        matches!(self, Profile::SdscV1 | Profile::SdscV2)
    }
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Read { block: usize },
    Write { block: usize },
    Cid,
    Csd,
    Scr,
    SdStatus,
    ExtCsd,
    SwitchStatus,
}

#[derive(Debug)]
pub struct SimState {
    profile: Profile,
    host_width: BusWidth,
    spi: bool,
    // card model
    idle: bool,
    app_cmd: bool,
    pub acmd41_polls_left: u32,
    /// Polls a fresh card needs after CMD0 before reporting power-up.
    pub acmd41_reset_polls: u32,
    rca: u16,
    selected: bool,
    erase_start: Option<u32>,
    erase_end: Option<u32>,
    blocks: Vec<u8>,
    ext_csd: Vec<u8>,
    pending: Option<Pending>,
    prepared: Option<XferDesc>,
    clock_ms: u64,
    clock_enabled: bool,
    // fault injection
    pub busy_polls: u32,
    pub inject_resp_crc_err: bool,
    pub fail_execute: Option<SdmmcError>,
    pub partial_blocks: Option<u16>,
    // recorders
    pub cmd_log: Vec<(u8, u32)>,
    pub stop_count: u32,
    pub cmd16_args: Vec<u32>,
    pub acmd6_args: Vec<u32>,
    pub set_widths: Vec<BusWidth>,
    pub set_clocks: Vec<ClockRate>,
    pub prepare_calls: u32,
    pub execute_calls: u32,
    pub finish_calls: u32,
}

#[derive(Debug)]
pub struct SimHost {
    pub state: Mutex<SimState>,
    done: Completion,
}

impl SimHost {
    pub fn new(profile: Profile) -> Self {
        SimHost::with_width(profile, BusWidth::Bit4)
    }

    /// A slot wired over SPI instead of the native bus. SPI transports
    /// are single lane.
    pub fn spi(profile: Profile) -> Self {
        let host = SimHost::with_width(profile, BusWidth::Bit1);
        host.state.lock().unwrap().spi = true;
        host
    }

    pub fn with_width(profile: Profile, host_width: BusWidth) -> Self {
        let mut ext_csd = vec![0u8; 512];
        // 4 GB in 512-byte sectors, MMC v4, HS52 capable.
        ext_csd[212..216].copy_from_slice(&0x0080_0000u32.to_le_bytes());
        ext_csd[194] = 2;
        ext_csd[196] = 0x03;
        SimHost {
            state: Mutex::new(SimState {
                profile,
                host_width,
                spi: false,
                idle: true,
                app_cmd: false,
                acmd41_polls_left: 2,
                acmd41_reset_polls: 2,
                rca: 0,
                selected: false,
                erase_start: None,
                erase_end: None,
                blocks: vec![0xA5u8; BLOCK_COUNT * BLOCK_SIZE],
                ext_csd,
                pending: None,
                prepared: None,
                clock_ms: 0,
                clock_enabled: false,
                busy_polls: 0,
                inject_resp_crc_err: false,
                fail_execute: None,
                partial_blocks: None,
                cmd_log: Vec::new(),
                stop_count: 0,
                cmd16_args: Vec::new(),
                acmd6_args: Vec::new(),
                set_widths: Vec::new(),
                set_clocks: Vec::new(),
                prepare_calls: 0,
                execute_calls: 0,
                finish_calls: 0,
            }),
            done: Completion::new(),
        }
    }

    /// Move the model clock forward, e.g. past the detect debounce.
    pub fn advance_ms(&self, ms: u64) {
        self.state.lock().unwrap().clock_ms += ms;
    }

    pub fn commands_sent(&self) -> usize {
        self.state.lock().unwrap().cmd_log.len()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.lock().unwrap().clock_ms
    }
}

fn seal16(mut raw: [u8; 16]) -> [u8; 16] {
    raw[15] = (crc7(&raw[..15]) << 1) | 1;
    raw
}

fn put_bits(raw: &mut [u8; 16], hi: u32, lo: u32, value: u32) {
    for bit in lo..=hi {
        let byte = (127 - bit) as usize / 8;
        let mask = 1u8 << (bit % 8);
        if (value >> (bit - lo)) & 1 != 0 {
            raw[byte] |= mask;
        } else {
            raw[byte] &= !mask;
        }
    }
}

fn cid_image(profile: Profile) -> [u8; 16] {
    if profile.is_mmc() {
        seal16([
            0x11, 0x01, 0x00, b'S', b'I', b'M', b'M', b'C', b'1', 0x10, 0x00, 0x00, 0x00, 0x2A,
            0x97, 0x00,
        ])
    } else {
        seal16([
            0x1B, b'S', b'M', b'S', b'I', b'M', b'C', b'D', 0x10, 0x00, 0x00, 0x00, 0x2A, 0x01,
            0x59, 0x00,
        ])
    }
}

fn csd_image(profile: Profile) -> [u8; 16] {
    let mut raw = [0u8; 16];
    match profile {
        Profile::Sdhc => {
            put_bits(&mut raw, 127, 126, 1);
            raw[1] = 0x0E;
            raw[3] = 0x32;
            put_bits(&mut raw, 83, 80, 9);
            put_bits(&mut raw, 69, 48, 100); // 101 * 1024 blocks
        }
        Profile::SdscV2 | Profile::SdscV1 => {
            put_bits(&mut raw, 127, 126, 0);
            raw[1] = 0x26;
            raw[3] = 0x32;
            put_bits(&mut raw, 83, 80, 9);
            put_bits(&mut raw, 73, 62, 100); // 101 << 5 blocks
            put_bits(&mut raw, 49, 47, 3);
            put_bits(&mut raw, 46, 46, 1);
        }
        Profile::Mmc => {
            put_bits(&mut raw, 127, 126, 3);
            put_bits(&mut raw, 125, 122, 4); // SPEC_VERS 4
            raw[3] = 0x32;
            put_bits(&mut raw, 83, 80, 9);
            put_bits(&mut raw, 73, 62, 0xFFF); // sector mode
        }
    }
    seal16(raw)
}

fn scr_image(profile: Profile) -> [u8; 8] {
    match profile {
        // Spec 2.00+, spec3, erased-state 1, 1-bit and 4-bit.
        Profile::Sdhc | Profile::SdscV2 => [0x02, 0x85, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00],
        // Plain 1.0 card, still 4-bit capable.
        Profile::SdscV1 => [0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        Profile::Mmc => unreachable!("MMC has no SCR"),
    }
}

fn pack16(raw: &[u8; 16]) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (i, word) in words.iter_mut().enumerate() {
        *word = u32::from_be_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
    }
    words
}

impl SimState {
    /// Card Status for the current model state.
    fn status(&self) -> u32 {
        let mut status = 0u32;
        if self.idle {
            // CURRENT_STATE idle is 0.
        } else if self.busy_polls > 0 {
            status |= 4 << 9; // tran, but not ready
        } else {
            status |= (4 << 9) | (1 << 8);
        }
        if self.app_cmd {
            status |= 1 << 5;
        }
        status
    }

    fn data_block_of(&self, arg: u32) -> usize {
        if self.profile.byte_addressed() {
            assert!(
                arg % BLOCK_SIZE as u32 == 0,
                "byte-addressed card got unaligned address {arg:#x}"
            );
            arg as usize / BLOCK_SIZE
        } else {
            arg as usize
        }
    }

    fn ocr_ready(&self) -> u32 {
        let mut ocr = (1 << 31) | (0x1FF << 15);
        if self.profile == Profile::Sdhc {
            ocr |= 1 << 30;
        }
        ocr
    }
}

impl HostOps for SimHost {
    fn init(&self) -> SdmmcResult<HostInfo> {
        let st = self.state.lock().unwrap();
        Ok(HostInfo {
            bus_width: st.host_width,
            present: true,
            spi_mode: st.spi,
            s18v_support: false,
        })
    }

    fn send_cmd(&self, cmd: &mut Command) -> SdmmcResult {
        let mut st = self.state.lock().unwrap();
        st.cmd_log.push((cmd.idx, cmd.arg));
        if st.inject_resp_crc_err && cmd.resp_type.has_crc() {
            st.inject_resp_crc_err = false;
            return Err(SdmmcError::BadMessage);
        }
        let app_cmd = std::mem::replace(&mut st.app_cmd, false);
        match (cmd.idx, app_cmd) {
            (CMD0_GO_IDLE_STATE, _) => {
                st.idle = true;
                st.rca = 0;
                st.selected = false;
                st.acmd41_polls_left = st.acmd41_reset_polls;
            }
            (CMD8_SEND_IF_COND, _) => {
                if st.prepared.is_some() && st.profile.is_mmc() {
                    st.pending = Some(Pending::ExtCsd);
                    cmd.response[0] = st.status();
                } else if st.profile.answers_cmd8() {
                    cmd.response[0] = cmd.arg & 0xFFF;
                } else {
                    return Err(SdmmcError::Timeout);
                }
            }
            (CMD5_IO_SEND_OP_COND, _) => return Err(SdmmcError::Timeout),
            (CMD55_APP_CMD, _) => {
                if st.profile.is_mmc() {
                    return Err(SdmmcError::Timeout);
                }
                st.app_cmd = true;
                // Report the flag in the response that announces it.
                cmd.response[0] = st.status() | (1 << 5);
            }
            (41, true) => {
                if st.acmd41_polls_left > 0 {
                    st.acmd41_polls_left -= 1;
                    cmd.response[0] = 0x1FF << 15;
                } else {
                    st.idle = false;
                    cmd.response[0] = st.ocr_ready();
                }
            }
            (CMD1_SEND_OP_COND, _) => {
                if !st.profile.is_mmc() {
                    return Err(SdmmcError::Timeout);
                }
                if st.acmd41_polls_left > 0 {
                    st.acmd41_polls_left -= 1;
                    cmd.response[0] = 0x1FF << 15;
                } else {
                    st.idle = false;
                    cmd.response[0] = st.ocr_ready();
                }
            }
            (CMD2_ALL_SEND_CID, _) => {
                assert!(!st.spi, "CMD2 does not exist on the SPI bus");
                cmd.response = pack16(&cid_image(st.profile));
            }
            (CMD10_SEND_CID, _) => {
                assert!(st.prepared.is_some(), "CMD10 is a data command over SPI");
                st.pending = Some(Pending::Cid);
                cmd.response[0] = st.status();
            }
            (CMD58_READ_OCR, _) => {
                cmd.response[0] = st.ocr_ready();
            }
            (CMD3_SEND_RELATIVE_ADDR, _) => {
                assert!(!st.spi, "CMD3 does not exist on the SPI bus");
                if st.profile.is_mmc() {
                    st.rca = (cmd.arg >> 16) as u16;
                    cmd.response[0] = st.status();
                } else {
                    st.rca = 0x1234;
                    cmd.response[0] = (st.rca as u32) << 16;
                }
            }
            (CMD9_SEND_CSD, _) => {
                if st.prepared.is_some() {
                    // Over SPI the CSD arrives as a 16-byte data block.
                    st.pending = Some(Pending::Csd);
                    cmd.response[0] = st.status();
                } else {
                    cmd.response = pack16(&csd_image(st.profile));
                }
            }
            (CMD7_SELECT_DESELECT, _) => {
                assert!(!st.spi, "CMD7 does not exist on the SPI bus");
                st.selected = (cmd.arg >> 16) as u16 == st.rca;
                cmd.response[0] = st.status();
            }
            (CMD13_SEND_STATUS, false) => {
                if st.busy_polls > 0 {
                    st.busy_polls -= 1;
                }
                cmd.response[0] = st.status();
            }
            (13, true) => {
                assert!(st.prepared.is_some(), "ACMD13 without a prepared transfer");
                st.pending = Some(Pending::SdStatus);
                cmd.response[0] = st.status();
            }
            (CMD16_SET_BLOCKLEN, _) => {
                let arg = cmd.arg;
                st.cmd16_args.push(arg);
                cmd.response[0] = st.status();
            }
            (6, true) => {
                let arg = cmd.arg;
                st.acmd6_args.push(arg);
                cmd.response[0] = st.status();
            }
            (CMD6_SWITCH, false) => {
                if st.profile.is_mmc() {
                    // Write-byte access into EXT_CSD.
                    assert_eq!(cmd.arg >> 24, 0b11, "only write-byte access is modeled");
                    let index = ((cmd.arg >> 16) & 0xFF) as usize;
                    let value = ((cmd.arg >> 8) & 0xFF) as u8;
                    st.ext_csd[index] = value;
                    cmd.response[0] = st.status();
                } else {
                    assert!(st.prepared.is_some(), "SD CMD6 is a data command");
                    st.pending = Some(Pending::SwitchStatus);
                    cmd.response[0] = st.status();
                }
            }
            (51, true) => {
                assert!(st.prepared.is_some(), "ACMD51 without a prepared transfer");
                st.pending = Some(Pending::Scr);
                cmd.response[0] = st.status();
            }
            (CMD17_READ_SINGLE_BLOCK | CMD18_READ_MULTIPLE_BLOCK, _) => {
                let block = st.data_block_of(cmd.arg);
                st.pending = Some(Pending::Read { block });
                cmd.response[0] = st.status();
            }
            (CMD24_WRITE_BLOCK | CMD25_WRITE_MULTIPLE_BLOCK, _) => {
                let block = st.data_block_of(cmd.arg);
                st.pending = Some(Pending::Write { block });
                cmd.response[0] = st.status();
            }
            (CMD12_STOP_TRANSMISSION, _) => {
                st.stop_count += 1;
                cmd.response[0] = st.status();
            }
            (CMD32_ERASE_WR_BLK_START, _) => {
                st.erase_start = Some(cmd.arg);
                cmd.response[0] = st.status();
            }
            (CMD33_ERASE_WR_BLK_END, _) => {
                st.erase_end = Some(cmd.arg);
                cmd.response[0] = st.status();
            }
            (CMD38_ERASE, _) => {
                let start = st.data_block_of(st.erase_start.expect("CMD38 without CMD32"));
                let end = st.data_block_of(st.erase_end.expect("CMD38 without CMD33"));
                st.blocks[start * BLOCK_SIZE..(end + 1) * BLOCK_SIZE].fill(0);
                cmd.response[0] = st.status();
            }
            (idx, _) => unimplemented!("CMD{idx} not modeled"),
        }
        Ok(())
    }

    fn set_bus_width(&self, width: BusWidth) -> SdmmcResult {
        self.state.lock().unwrap().set_widths.push(width);
        Ok(())
    }

    fn set_clock_rate(&self, rate: ClockRate) -> SdmmcResult {
        self.state.lock().unwrap().set_clocks.push(rate);
        Ok(())
    }

    fn enable_clock(&self, enable: bool) -> SdmmcResult {
        self.state.lock().unwrap().clock_enabled = enable;
        Ok(())
    }

    fn xfer_prepare(&self, xfer: &mut XferDesc) -> SdmmcResult {
        let mut st = self.state.lock().unwrap();
        st.prepare_calls += 1;
        if xfer.block_size % 4 != 0 {
            return Err(SdmmcError::InvalidArg);
        }
        st.prepared = Some(xfer.clone());
        Ok(())
    }

    fn xfer_execute(
        &self,
        xfer: &mut XferDesc,
        data_wr: Option<&[u8]>,
        data_rd: Option<&mut [u8]>,
    ) -> SdmmcResult<u16> {
        let mut st = self.state.lock().unwrap();
        st.execute_calls += 1;
        if let Some(e) = st.fail_execute.take() {
            return Err(e);
        }
        let pending = st.pending.take().expect("execute without an armed data command");
        let done = st.partial_blocks.take().map_or(xfer.block_num, |p| p.min(xfer.block_num));
        match pending {
            Pending::Read { block } => {
                let data = data_rd.expect("read transfer without a buffer");
                let n = done as usize * xfer.block_size as usize;
                let off = block * BLOCK_SIZE;
                data[..n].copy_from_slice(&st.blocks[off..off + n]);
            }
            Pending::Write { block } => {
                let data = data_wr.expect("write transfer without a buffer");
                let n = done as usize * xfer.block_size as usize;
                let off = block * BLOCK_SIZE;
                st.blocks[off..off + n].copy_from_slice(&data[..n]);
            }
            Pending::Cid => {
                let data = data_rd.expect("CID read without a buffer");
                data[..16].copy_from_slice(&cid_image(st.profile));
            }
            Pending::Csd => {
                let data = data_rd.expect("CSD read without a buffer");
                data[..16].copy_from_slice(&csd_image(st.profile));
            }
            Pending::Scr => {
                let data = data_rd.expect("SCR read without a buffer");
                data[..8].copy_from_slice(&scr_image(st.profile));
            }
            Pending::SdStatus => {
                let data = data_rd.expect("SD Status read without a buffer");
                data[..64].fill(0);
                data[0] = 0b1000_0000; // 4-bit bus
                data[8] = 4; // speed class
                data[10] = 0x90; // AU 512 KiB
            }
            Pending::ExtCsd => {
                let data = data_rd.expect("EXT_CSD read without a buffer");
                data[..512].copy_from_slice(&st.ext_csd);
            }
            Pending::SwitchStatus => {
                let data = data_rd.expect("switch status read without a buffer");
                data[..64].fill(0);
                data[16] = 0x01; // group 1 switched to high-speed
            }
        }
        drop(st);
        // The model finishes instantly; hand the result over the same
        // signal a transfer-done ISR would fire.
        self.done.signal();
        self.done.wait();
        Ok(done)
    }

    fn xfer_finish(&self, _xfer: &mut XferDesc) -> SdmmcResult {
        let mut st = self.state.lock().unwrap();
        st.finish_calls += 1;
        assert!(st.prepared.take().is_some(), "finish without prepare");
        Ok(())
    }

    fn now_ms(&self) -> u32 {
        let mut st = self.state.lock().unwrap();
        st.clock_ms += 1;
        st.clock_ms as u32
    }

    fn sleep_ms(&self, ms: u32) {
        self.state.lock().unwrap().clock_ms += ms as u64;
    }
}
