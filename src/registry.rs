//! Explicit device table, populated once at startup.

use crate::device::SdmmcDevice;
use crate::err::{SdmmcError, SdmmcResult};

/// Fixed-capacity, owned table of device descriptors. Lookups are
/// bounds-checked; there is no global instance, callers thread a
/// registry through to where it is needed.
#[derive(Debug)]
pub struct DeviceRegistry<'d, const N: usize> {
    slots: [Option<SdmmcDevice<'d>>; N],
    used: usize,
}

impl<'d, const N: usize> DeviceRegistry<'d, N> {
    pub const fn new() -> Self {
        DeviceRegistry { slots: [const { None }; N], used: 0 }
    }

    /// Add a device, returning its index. Fails with `NoMemory` once
    /// all slots are taken.
    pub fn add(&mut self, dev: SdmmcDevice<'d>) -> SdmmcResult<usize> {
        if self.used == N {
            return Err(SdmmcError::NoMemory);
        }
        let idx = self.used;
        self.slots[idx] = Some(dev);
        self.used += 1;
        Ok(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&SdmmcDevice<'d>> {
        self.slots.get(idx).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut SdmmcDevice<'d>> {
        self.slots.get_mut(idx).and_then(|slot| slot.as_mut())
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &SdmmcDevice<'d>> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SdmmcDevice<'d>> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }
}

impl<'d, const N: usize> Default for DeviceRegistry<'d, N> {
    fn default() -> Self {
        DeviceRegistry::new()
    }
}
