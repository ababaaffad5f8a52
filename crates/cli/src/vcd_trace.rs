// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Mutex;
use vcd::{IdCode, TimescaleUnit, Value, Writer};
use vgpio_core::signals::{LogicLevel, LogicVector};
use vgpio_core::{CycleRecord, TestbenchObserver};

/// Clock period of the user-project clock, in nanoseconds.
const CLOCK_PERIOD_NS: u64 = 25;

/// Dumps the Wishbone handshake and the bridge registers once per edge.
/// Only changed signals are written.
pub struct VcdObserver {
    state: Mutex<VcdState>,
    ids: VcdIds,
}

struct VcdIds {
    cyc: IdCode,
    stb: IdCode,
    we: IdCode,
    adr: IdCode,
    dat_w: IdCode,
    ack: IdCode,
    dat_r: IdCode,
    output: IdCode,
    input: IdCode,
}

struct VcdState {
    writer: Writer<BufWriter<File>>,
    last: Option<CycleRecord>,
}

impl VcdObserver {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let mut writer = Writer::new(BufWriter::new(file));

        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("top")?;

        writer.add_module("wishbone")?;
        let cyc = writer.add_wire(1, "cyc")?;
        let stb = writer.add_wire(1, "stb")?;
        let we = writer.add_wire(1, "we")?;
        let adr = writer.add_wire(32, "adr")?;
        let dat_w = writer.add_wire(32, "dat_w")?;
        let ack = writer.add_wire(1, "ack")?;
        let dat_r = writer.add_wire(32, "dat_r")?;
        writer.upscope()?; // wishbone

        writer.add_module("vgpio")?;
        let output = writer.add_wire(16, "output")?;
        let input = writer.add_wire(16, "input")?;
        writer.upscope()?; // vgpio

        writer.upscope()?; // top
        writer.enddefinitions()?;

        Ok(Self {
            state: Mutex::new(VcdState { writer, last: None }),
            ids: VcdIds {
                cyc,
                stb,
                we,
                adr,
                dat_w,
                ack,
                dat_r,
                output,
                input,
            },
        })
    }

    fn write_record(&self, state: &mut VcdState, r: &CycleRecord) -> std::io::Result<()> {
        let prev = state.last;
        let changed = |f: fn(&CycleRecord) -> u64| prev.map_or(true, |p| f(&p) != f(r));
        let w = &mut state.writer;

        w.timestamp(r.cycle * CLOCK_PERIOD_NS)?;
        if prev.map_or(true, |p| p.cyc != r.cyc) {
            w.change_scalar(self.ids.cyc, level(r.cyc))?;
        }
        if prev.map_or(true, |p| p.stb != r.stb) {
            w.change_scalar(self.ids.stb, level(r.stb))?;
        }
        if prev.map_or(true, |p| p.we != r.we) {
            w.change_scalar(self.ids.we, level(r.we))?;
        }
        if prev.map_or(true, |p| p.adr != r.adr) {
            w.change_vector(self.ids.adr, vector(&r.adr))?;
        }
        if prev.map_or(true, |p| p.dat_w != r.dat_w) {
            w.change_vector(self.ids.dat_w, vector(&r.dat_w))?;
        }
        if changed(|c| c.ack as u64) {
            w.change_scalar(self.ids.ack, if r.ack { Value::V1 } else { Value::V0 })?;
        }
        if changed(|c| c.dat_r as u64) {
            w.change_vector(self.ids.dat_r, u64_to_vec(r.dat_r as u64, 32))?;
        }
        if changed(|c| c.output as u64) {
            w.change_vector(self.ids.output, u64_to_vec(r.output as u64, 16))?;
        }
        if changed(|c| c.input as u64) {
            w.change_vector(self.ids.input, u64_to_vec(r.input as u64, 16))?;
        }
        Ok(())
    }
}

fn level(l: LogicLevel) -> Value {
    match l {
        LogicLevel::Low => Value::V0,
        LogicLevel::High => Value::V1,
        LogicLevel::Unknown => Value::X,
        LogicLevel::HighZ => Value::Z,
    }
}

// MSB first
fn vector(v: &LogicVector) -> Vec<Value> {
    (0..v.width()).rev().map(|i| level(v.bit(i))).collect()
}

fn u64_to_vec(val: u64, width: u32) -> Vec<Value> {
    (0..width)
        .rev()
        .map(|i| if (val >> i) & 1 == 1 { Value::V1 } else { Value::V0 })
        .collect()
}

impl std::fmt::Debug for VcdObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VcdObserver")
    }
}

impl TestbenchObserver for VcdObserver {
    fn on_cycle(&self, record: &CycleRecord) {
        if let Ok(mut state) = self.state.lock() {
            if let Err(e) = self.write_record(&mut state, record) {
                tracing::warn!("VCD write failed at cycle {}: {}", record.cycle, e);
            }
            state.last = Some(*record);
        }
    }
}
