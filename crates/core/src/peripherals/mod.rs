// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod gpio;
pub mod pads;

use pads::PadRing;

/// A register block on the user-project Wishbone port, addressed by offset
/// from its base. Accesses are whole 32-bit words.
pub trait WishbonePeripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, value: u32);

    /// Exchanges pin state with the pad ring once per cycle.
    fn update_pads(&mut self, _pads: &mut PadRing) {}

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
