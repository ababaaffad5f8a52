// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::BusSample;
use crate::peripherals::gpio::{GpioBank, GPIO_BANK_SIZE};
use crate::peripherals::pads::PadRing;
use crate::peripherals::WishbonePeripheral;
use vgpio_config::TestbenchConfig;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub dev: Box<dyn WishbonePeripheral>,
    ack: bool,
    dat_r: u32,
}

impl std::fmt::Debug for PeripheralEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralEntry")
            .field("name", &self.name)
            .field("base", &format_args!("{:#010x}", self.base))
            .field("size", &self.size)
            .finish()
    }
}

impl PeripheralEntry {
    pub fn new(name: impl Into<String>, base: u32, size: u32, dev: Box<dyn WishbonePeripheral>) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            dev,
            ack: false,
            dat_r: 0,
        }
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    /// Single-cycle responder: decode in cycle N, ack visible to the master
    /// from cycle N+1, released in cycle N+1.
    fn tick(&mut self, sample: &BusSample) {
        if self.ack {
            self.ack = false;
            self.dat_r = 0;
            return;
        }
        let BusSample::Request(req) = sample else {
            return;
        };
        if !self.contains(req.addr) {
            return;
        }

        let offset = req.addr - self.base;
        if req.write {
            match req.dat_w.to_u32() {
                Some(value) => self.dev.write(offset, value),
                None => tracing::debug!(
                    "{}: ignoring undefined write data {} at {:#x}",
                    self.name,
                    req.dat_w,
                    offset
                ),
            }
        } else {
            self.dat_r = self.dev.read(offset);
        }
        self.ack = true;
    }
}

/// Slaves on the user-project port other than the register bridge. Their
/// responses are OR-ed onto the shared return path, so an idle slave must
/// drive 0.
#[derive(Debug, Default)]
pub struct UserBus {
    pub peripherals: Vec<PeripheralEntry>,
}

impl UserBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TestbenchConfig) -> Self {
        let mut bus = Self::new();
        for bank in &config.gpio_banks {
            tracing::debug!(
                "Mapping GPIO bank {} at {:#010x} on pads {}..{}",
                bank.id,
                bank.base_address,
                bank.pad_lsb,
                bank.pad_lsb + 7
            );
            bus.peripherals.push(PeripheralEntry::new(
                bank.id.clone(),
                bank.base_address,
                GPIO_BANK_SIZE,
                Box::new(GpioBank::new(bank.pad_lsb)),
            ));
        }
        bus
    }

    pub fn tick(&mut self, sample: &BusSample) {
        for p in &mut self.peripherals {
            p.tick(sample);
        }
    }

    pub fn ack(&self) -> bool {
        self.peripherals.iter().any(|p| p.ack)
    }

    pub fn dat_r(&self) -> u32 {
        self.peripherals.iter().fold(0, |acc, p| acc | p.dat_r)
    }

    pub fn update_pads(&mut self, pads: &mut PadRing) {
        for p in &mut self.peripherals {
            p.dev.update_pads(pads);
        }
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }
}
