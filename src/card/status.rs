//! Card Status word (R1) and the 64-byte SD Status block.

use bitflags::bitflags;

bitflags! {
    /// 32-bit Card Status as carried in R1/R1b responses.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct CardStatus: u32 {
        const OUT_OF_RANGE = 1 << 31;
        const ADDRESS_ERROR = 1 << 30;
        const BLOCK_LEN_ERROR = 1 << 29;
        const ERASE_SEQ_ERROR = 1 << 28;
        const ERASE_PARAM = 1 << 27;
        const WP_VIOLATION = 1 << 26;
        const CARD_IS_LOCKED = 1 << 25;
        const LOCK_UNLOCK_FAILED = 1 << 24;
        const COM_CRC_ERROR = 1 << 23;
        const ILLEGAL_COMMAND = 1 << 22;
        const CARD_ECC_FAILED = 1 << 21;
        const CC_ERROR = 1 << 20;
        const ERROR = 1 << 19;
        const CSD_OVERWRITE = 1 << 16;
        const WP_ERASE_SKIP = 1 << 15;
        const CARD_ECC_DISABLED = 1 << 14;
        const ERASE_RESET = 1 << 13;
        const READY_FOR_DATA = 1 << 8;
        const FX_EVENT = 1 << 6;
        const APP_CMD = 1 << 5;
        const AKE_SEQ_ERROR = 1 << 3;
        // CURRENT_STATE occupies bits [12:9].
        const _ = !0;
    }
}

impl CardStatus {
    /// All bits the card uses to report an error condition.
    pub const ERRORS: CardStatus = CardStatus::OUT_OF_RANGE
        .union(CardStatus::ADDRESS_ERROR)
        .union(CardStatus::BLOCK_LEN_ERROR)
        .union(CardStatus::ERASE_SEQ_ERROR)
        .union(CardStatus::ERASE_PARAM)
        .union(CardStatus::WP_VIOLATION)
        .union(CardStatus::LOCK_UNLOCK_FAILED)
        .union(CardStatus::COM_CRC_ERROR)
        .union(CardStatus::ILLEGAL_COMMAND)
        .union(CardStatus::CARD_ECC_FAILED)
        .union(CardStatus::CC_ERROR)
        .union(CardStatus::ERROR)
        .union(CardStatus::CSD_OVERWRITE)
        .union(CardStatus::WP_ERASE_SKIP)
        .union(CardStatus::ERASE_RESET)
        .union(CardStatus::AKE_SEQ_ERROR);

    pub fn has_error(self) -> bool {
        self.intersects(Self::ERRORS)
    }

    pub fn current_state(self) -> CardState {
        CardState::from_code(((self.bits() >> 9) & 0xF) as u8)
    }
}

/// CURRENT_STATE field of the Card Status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Idle,
    Ready,
    Ident,
    Stby,
    Tran,
    Data,
    Rcv,
    Prg,
    Dis,
    Reserved(u8),
}

impl CardState {
    pub fn from_code(code: u8) -> CardState {
        match code {
            0 => CardState::Idle,
            1 => CardState::Ready,
            2 => CardState::Ident,
            3 => CardState::Stby,
            4 => CardState::Tran,
            5 => CardState::Data,
            6 => CardState::Rcv,
            7 => CardState::Prg,
            8 => CardState::Dis,
            other => CardState::Reserved(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CardState::Idle => 0,
            CardState::Ready => 1,
            CardState::Ident => 2,
            CardState::Stby => 3,
            CardState::Tran => 4,
            CardState::Data => 5,
            CardState::Rcv => 6,
            CardState::Prg => 7,
            CardState::Dis => 8,
            CardState::Reserved(code) => code,
        }
    }
}

/// Decoded SD Status, read with ACMD13 as a 64-byte block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SdStatus {
    pub dat_bus_width: u8,
    pub secured_mode: bool,
    pub sd_card_type: u16,
    pub size_of_protected_area: u32,
    pub speed_class: u8,
    pub performance_move: u8,
    pub au_size: u8,
    pub erase_size: u16,
    pub erase_timeout: u8,
    pub erase_offset: u8,
    pub uhs_speed_grade: u8,
    pub uhs_au_size: u8,
    pub video_speed_class: u8,
    pub vsc_au_size: u16,
    pub sus_addr: u32,
}

impl SdStatus {
    pub fn parse(raw: &[u8; 64]) -> SdStatus {
        SdStatus {
            dat_bus_width: raw[0] >> 6,
            secured_mode: raw[0] & (1 << 5) != 0,
            sd_card_type: u16::from_be_bytes([raw[2], raw[3]]),
            size_of_protected_area: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
            speed_class: raw[8],
            performance_move: raw[9],
            au_size: raw[10] >> 4,
            erase_size: u16::from_be_bytes([raw[11], raw[12]]),
            erase_timeout: raw[13] >> 2,
            erase_offset: raw[13] & 0x3,
            uhs_speed_grade: raw[14] >> 4,
            uhs_au_size: raw[14] & 0xF,
            video_speed_class: raw[15],
            vsc_au_size: (((raw[16] & 0x3) as u16) << 8) | raw[17] as u16,
            sus_addr: ((raw[18] as u32) << 14) | ((raw[19] as u32) << 6) | (raw[20] as u32 >> 2),
        }
    }
}
