//! Hardware-independent SD/MMC protocol engine.
//!
//! The crate splits the stack at the classic line: everything protocol
//! (identification, command/response handling, block transfers, the
//! card register model) lives here, while the handful of operations
//! that touch a real peripheral sit behind the [`HostOps`] trait. A
//! board port implements that trait once and gets SD memory cards,
//! SDHC/SDXC and MMC/eMMC as block devices, over the native bus or an
//! SPI transport.
//!
//! ```ignore
//! let mut dev = SdmmcDevice::new(&my_host, SdmmcConfig::default());
//! dev.init()?;
//! dev.card_init()?;
//! let bytes = dev.get_capacity()?;
//! dev.read_blocks(0, &mut buf)?;
//! ```

#![cfg_attr(not(test), no_std)]

pub mod card;
pub mod cmd;
pub mod constants;
pub mod crc;
pub mod device;
pub mod err;
pub mod host;
pub mod osa;
pub mod registry;

pub use card::{
    CardState, CardStatus, CardType, Cid, Csd, CsdFlags, CsdMmc, CsdV1, CsdV2, ExtCsd, MmcCid,
    Ocr, Scr, SdCid, SdStatus,
};
pub use cmd::{Command, ResponseType, XferDesc, XferKind};
pub use device::{CardEvent, EventCallback, Retry, SdmmcConfig, SdmmcDevice};
pub use err::{SdmmcError, SdmmcResult};
pub use host::{BusWidth, ClockRate, HostInfo, HostOps};
pub use registry::DeviceRegistry;
