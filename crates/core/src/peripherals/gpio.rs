// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::pads::PadRing;
use super::WishbonePeripheral;

pub const GPIO_DATAI: u32 = 0x0000;
pub const GPIO_DATAO: u32 = 0x0004;
pub const GPIO_DIR: u32 = 0x0008;
pub const GPIO_IM: u32 = 0xFF00;
pub const GPIO_MIS: u32 = 0xFF04;
pub const GPIO_RIS: u32 = 0xFF08;
pub const GPIO_IC: u32 = 0xFF0C;

pub const GPIO0_BASE: u32 = 0x3000_0000;
pub const GPIO1_BASE: u32 = 0x3001_0000;
pub const GPIO_BANK_SIZE: u32 = 0x1_0000;

/// 8-bit GPIO bank wired to eight consecutive pads.
///
/// Raw interrupt status layout: [7:0] pin high, [15:8] pin low,
/// [23:16] rising edge, [31:24] falling edge.
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioBank {
    pad_lsb: u8,
    datai: u8, // 0x0000: input data (pad levels)
    datao: u8, // 0x0004: output data
    dir: u8,   // 0x0008: 1 = output
    im: u32,   // 0xFF00: interrupt mask
    ris: u32,  // 0xFF08: raw interrupt status
}

impl GpioBank {
    pub fn new(pad_lsb: u8) -> Self {
        Self {
            pad_lsb,
            ..Default::default()
        }
    }

    fn latch_inputs(&mut self, sampled: u8) {
        let rising = sampled & !self.datai;
        let falling = !sampled & self.datai;
        self.datai = sampled;

        self.ris |= sampled as u32;
        self.ris |= (!sampled as u32 & 0xFF) << 8;
        self.ris |= (rising as u32) << 16;
        self.ris |= (falling as u32) << 24;
    }
}

impl WishbonePeripheral for GpioBank {
    fn read(&self, offset: u32) -> u32 {
        match offset {
            GPIO_DATAI => self.datai as u32,
            GPIO_DATAO => self.datao as u32,
            GPIO_DIR => self.dir as u32,
            GPIO_IM => self.im,
            GPIO_MIS => self.ris & self.im,
            GPIO_RIS => self.ris,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            GPIO_DATAO => self.datao = value as u8,
            GPIO_DIR => self.dir = value as u8,
            GPIO_IM => self.im = value,
            GPIO_IC => self.ris &= !value,
            _ => {}
        }
    }

    fn update_pads(&mut self, pads: &mut PadRing) {
        pads.set_outputs(self.pad_lsb, self.datao, self.dir);
        let sampled = pads.input_byte(self.pad_lsb);
        self.latch_inputs(sampled);
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
