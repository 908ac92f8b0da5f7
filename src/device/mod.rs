//! Device descriptor: one slot/card pair and everything the engine
//! caches about it.

mod cmd;
mod ident;
mod xfer;

use log::debug;

use crate::card::{CardStatus, CardType, Cid, Csd, ExtCsd, Scr};
use crate::constants::CARD_DETECT_DEBOUNCE_MS;
use crate::err::{SdmmcError, SdmmcResult};
use crate::host::{BusWidth, ClockRate, HostOps};

/// Retry policy for polled waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Poll until the condition holds, however long that takes.
    Forever,
    /// Give up after this many polls.
    Count(u32),
}

impl Retry {
    pub(crate) fn exhausted(self, polls: u32) -> bool {
        match self {
            Retry::Forever => false,
            Retry::Count(n) => polls >= n,
        }
    }
}

/// Engine tuning knobs. The defaults match the usual card timing
/// budget: 1 s for power-up, 250 ms for the ready wait.
#[derive(Debug, Clone, Copy)]
pub struct SdmmcConfig {
    /// Upper bound for every negotiated clock rate.
    pub max_clock: ClockRate,
    /// ACMD41/CMD1 power-up poll budget (one poll every 10 ms).
    pub power_up_retry: Retry,
    /// Ready-for-data poll budget before a transfer (every 10 ms).
    pub ready_retry: Retry,
    /// Attempt the CMD6 high-speed switch on capable SD cards.
    pub high_speed: bool,
}

impl Default for SdmmcConfig {
    fn default() -> Self {
        SdmmcConfig {
            max_clock: ClockRate::MmcHs52M,
            power_up_retry: Retry::Count(
                crate::constants::INIT_TIMEOUT_MS / crate::constants::POWER_UP_POLL_MS,
            ),
            ready_retry: Retry::Count(
                crate::constants::READY_TIMEOUT_MS / crate::constants::READY_POLL_MS,
            ),
            high_speed: false,
        }
    }
}

/// Card-detect transition delivered to the event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEvent {
    Inserted,
    Removed,
}

/// Event callback, invoked after the descriptor has been updated.
pub type EventCallback = fn(&SdmmcDevice<'_>, CardEvent);

/// One card slot: the driver handle plus all cached card state.
///
/// Everything that can fail returns [`SdmmcResult`]; consumer-facing
/// operations re-identify the card transparently when needed.
#[derive(Debug)]
pub struct SdmmcDevice<'a> {
    pub(crate) drv: &'a dyn HostOps,
    pub(crate) config: SdmmcConfig,
    event_cb: Option<EventCallback>,
    pub(crate) cid: Option<Cid>,
    pub(crate) csd: Option<Csd>,
    pub(crate) scr: Option<Scr>,
    pub(crate) ext_csd: Option<ExtCsd>,
    pub(crate) status: CardStatus,
    pub(crate) rca: u16,
    pub(crate) card_type: CardType,
    /// Widest bus the host side supports, captured at `init`.
    pub(crate) bus_width: BusWidth,
    pub(crate) present: bool,
    pub(crate) init_done: bool,
    pub(crate) spi_mode: bool,
    pub(crate) s18v_support: bool,
    pub(crate) s18v_allowed: bool,
    last_cd_ms: Option<u32>,
}

impl<'a> SdmmcDevice<'a> {
    pub fn new(drv: &'a dyn HostOps, config: SdmmcConfig) -> Self {
        SdmmcDevice {
            drv,
            config,
            event_cb: None,
            cid: None,
            csd: None,
            scr: None,
            ext_csd: None,
            status: CardStatus::empty(),
            rca: 0,
            card_type: CardType::UNKNOWN,
            bus_width: BusWidth::Bit1,
            present: false,
            init_done: false,
            spi_mode: false,
            s18v_support: false,
            s18v_allowed: false,
            last_cd_ms: None,
        }
    }

    /// Bring up the host peripheral and capture its capabilities.
    pub fn init(&mut self) -> SdmmcResult {
        let info = self.drv.init()?;
        self.bus_width = info.bus_width;
        self.present = info.present;
        self.spi_mode = info.spi_mode;
        self.s18v_support = info.s18v_support;
        debug!(
            "sdmmc: host up, bus {:?}, spi {}, card present {}",
            info.bus_width, info.spi_mode, info.present
        );
        Ok(())
    }

    pub fn set_event_callback(&mut self, cb: Option<EventCallback>) {
        self.event_cb = cb;
    }

    /// Feed a card-detect transition, typically from the detect-pin
    /// ISR or a poller. Transitions within the debounce interval of
    /// the previous accepted one are dropped.
    pub fn card_detect(&mut self, present: bool) {
        if present == self.present {
            return;
        }
        let now = self.drv.now_ms();
        if let Some(last) = self.last_cd_ms
            && now.wrapping_sub(last) < CARD_DETECT_DEBOUNCE_MS
        {
            return;
        }
        self.last_cd_ms = Some(now);
        self.present = present;
        // Cached registers are stale the moment the card leaves, and
        // meaningless for a freshly inserted one.
        self.clear_card_state();
        debug!("sdmmc: card {}", if present { "inserted" } else { "removed" });
        if let Some(cb) = self.event_cb {
            cb(self, if present { CardEvent::Inserted } else { CardEvent::Removed });
        }
    }

    pub fn cid(&self) -> Option<&Cid> {
        self.cid.as_ref()
    }

    pub fn csd(&self) -> Option<&Csd> {
        self.csd.as_ref()
    }

    pub fn scr(&self) -> Option<&Scr> {
        self.scr.as_ref()
    }

    pub fn ext_csd(&self) -> Option<&ExtCsd> {
        self.ext_csd.as_ref()
    }

    /// Last Card Status captured from an R1/R1b response.
    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn rca(&self) -> u16 {
        self.rca
    }

    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    pub fn bus_width(&self) -> BusWidth {
        self.bus_width
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn is_identified(&self) -> bool {
        self.init_done
    }

    pub fn is_spi_mode(&self) -> bool {
        self.spi_mode
    }

    /// 1.8 V signaling was offered by the host and accepted by the card.
    pub fn s18v_allowed(&self) -> bool {
        self.s18v_allowed
    }

    pub(crate) fn clear_card_state(&mut self) {
        self.cid = None;
        self.csd = None;
        self.scr = None;
        self.ext_csd = None;
        self.status = CardStatus::empty();
        self.rca = 0;
        self.card_type = CardType::UNKNOWN;
        self.init_done = false;
        self.s18v_allowed = false;
    }

    /// Presence and identification gate in front of every consumer
    /// operation; runs the identification sequence when needed.
    pub(crate) fn assert_card(&mut self) -> SdmmcResult {
        if !self.present {
            return Err(SdmmcError::NoCard);
        }
        if self.init_done {
            return Ok(());
        }
        self.card_init()
    }
}
