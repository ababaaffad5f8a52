// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt;
use std::str::FromStr;

/// Represents a four-state digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicLevel {
    #[default]
    Low,
    High,
    /// Undefined (`x`).
    Unknown,
    /// Undriven (`z`).
    HighZ,
}

impl LogicLevel {
    pub fn is_known(self) -> bool {
        matches!(self, LogicLevel::Low | LogicLevel::High)
    }

    /// Resolves the level to a boolean, or `None` for X/Z.
    pub fn to_bool(self) -> Option<bool> {
        match self {
            LogicLevel::Low => Some(false),
            LogicLevel::High => Some(true),
            LogicLevel::Unknown | LogicLevel::HighZ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            LogicLevel::Low => '0',
            LogicLevel::High => '1',
            LogicLevel::Unknown => 'x',
            LogicLevel::HighZ => 'z',
        }
    }
}

impl From<bool> for LogicLevel {
    fn from(b: bool) -> Self {
        if b {
            LogicLevel::High
        } else {
            LogicLevel::Low
        }
    }
}

impl TryFrom<char> for LogicLevel {
    type Error = String;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '0' => Ok(LogicLevel::Low),
            '1' => Ok(LogicLevel::High),
            'x' | 'X' | 'u' | 'U' => Ok(LogicLevel::Unknown),
            'z' | 'Z' => Ok(LogicLevel::HighZ),
            other => Err(format!("invalid logic character '{}'", other)),
        }
    }
}

pub const MAX_VECTOR_WIDTH: u8 = 64;

/// A fixed-width bus value where every bit may be 0, 1, X or Z.
///
/// Bits are stored as three masks: `value` holds the 0/1 state of known bits,
/// `x_mask` and `z_mask` flag bits that are undefined or undriven. A bit is
/// never set in both `x_mask` and `z_mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicVector {
    width: u8,
    value: u64,
    x_mask: u64,
    z_mask: u64,
}

fn width_mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl LogicVector {
    /// Creates a fully resolved vector. Bits above `width` are discarded.
    pub fn new(width: u8, value: u64) -> Self {
        let width = width.clamp(1, MAX_VECTOR_WIDTH);
        Self {
            width,
            value: value & width_mask(width),
            x_mask: 0,
            z_mask: 0,
        }
    }

    pub fn unknown(width: u8) -> Self {
        let width = width.clamp(1, MAX_VECTOR_WIDTH);
        Self {
            width,
            value: 0,
            x_mask: width_mask(width),
            z_mask: 0,
        }
    }

    pub fn high_z(width: u8) -> Self {
        let width = width.clamp(1, MAX_VECTOR_WIDTH);
        Self {
            width,
            value: 0,
            x_mask: 0,
            z_mask: width_mask(width),
        }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn is_resolvable(&self) -> bool {
        (self.x_mask | self.z_mask) == 0
    }

    /// Returns the integer value, or `None` if any bit is X or Z.
    pub fn to_u64(&self) -> Option<u64> {
        self.is_resolvable().then_some(self.value)
    }

    pub fn to_u32(&self) -> Option<u32> {
        self.to_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// Integer value of the known bits; X and Z bits read as 0.
    pub fn known_bits(&self) -> u64 {
        self.value & !(self.x_mask | self.z_mask)
    }

    /// Returns the `n` least-significant bits as an integer.
    ///
    /// Fails if the vector is narrower than `n` bits or if any of those bits
    /// is X or Z. Bits above `n` are not inspected.
    pub fn low_bits(&self, n: u8) -> Option<u64> {
        if n == 0 || n > self.width {
            return None;
        }
        let mask = width_mask(n);
        if (self.x_mask | self.z_mask) & mask != 0 {
            return None;
        }
        Some(self.value & mask)
    }

    pub fn bit(&self, index: u8) -> LogicLevel {
        if index >= self.width {
            return LogicLevel::Unknown;
        }
        let m = 1u64 << index;
        if self.x_mask & m != 0 {
            LogicLevel::Unknown
        } else if self.z_mask & m != 0 {
            LogicLevel::HighZ
        } else {
            LogicLevel::from(self.value & m != 0)
        }
    }

    pub fn set_bit(&mut self, index: u8, level: LogicLevel) {
        if index >= self.width {
            return;
        }
        let m = 1u64 << index;
        self.value &= !m;
        self.x_mask &= !m;
        self.z_mask &= !m;
        match level {
            LogicLevel::Low => {}
            LogicLevel::High => self.value |= m,
            LogicLevel::Unknown => self.x_mask |= m,
            LogicLevel::HighZ => self.z_mask |= m,
        }
    }

    /// Extracts bits `hi..=lo` into a new vector of width `hi - lo + 1`.
    pub fn slice(&self, hi: u8, lo: u8) -> Option<Self> {
        if hi < lo || hi >= self.width {
            return None;
        }
        let width = hi - lo + 1;
        let mask = width_mask(width);
        Some(Self {
            width,
            value: (self.value >> lo) & mask,
            x_mask: (self.x_mask >> lo) & mask,
            z_mask: (self.z_mask >> lo) & mask,
        })
    }
}

impl fmt::Display for LogicVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            write!(f, "{}", self.bit(i).as_char())?;
        }
        Ok(())
    }
}

impl FromStr for LogicVector {
    type Err = String;

    /// Parses an MSB-first string of `0`, `1`, `x`, `z` (underscores ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<char> = s.trim().chars().filter(|c| *c != '_').collect();
        if digits.is_empty() || digits.len() > MAX_VECTOR_WIDTH as usize {
            return Err(format!(
                "logic vector '{}' must have 1..={} bits",
                s, MAX_VECTOR_WIDTH
            ));
        }
        let mut vec = LogicVector::new(digits.len() as u8, 0);
        for (i, c) in digits.iter().rev().enumerate() {
            vec.set_bit(i as u8, LogicLevel::try_from(*c)?);
        }
        Ok(vec)
    }
}
