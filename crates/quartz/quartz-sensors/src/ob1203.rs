//! Renesas OB1203 light and proximity sensor.

use crate::i2c::RegisterBus;
use quartz_events::SensorError;
use std::time::Duration;

pub const OB1203_ADDR: u16 = 0x53;

mod reg {
    pub const STATUS_0: u8 = 0x00;
    pub const STATUS_1: u8 = 0x01;
    pub const PS_DATA: u8 = 0x02;
    pub const LS_DATA_GREEN: u8 = 0x07;
    pub const LS_DATA_BLUE: u8 = 0x0a;
    pub const LS_DATA_RED: u8 = 0x0d;
    pub const MAIN_CTRL_0: u8 = 0x15;
    pub const MAIN_CTRL_1: u8 = 0x16;
    pub const PS_MEAS_RATE: u8 = 0x1a;
}

// Light sensor active in colour-sensing (CS) mode.
const LS_ENABLE_CS: u8 = 0x03;
// 50 ms proximity measurement period.
const PS_PERIOD_50MS: u8 = 0x14;
const PS_ENABLE: u8 = 0x01;

const LS_DATA_WAIT: Duration = Duration::from_millis(100);
const PS_DATA_WAIT: Duration = Duration::from_millis(50);

/// Scaling from summed RGB counts to lux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightScale {
    pub gain: u32,
    pub resolution_bits: u32,
}

impl Default for LightScale {
    fn default() -> Self {
        Self {
            gain: 3,
            resolution_bits: 18,
        }
    }
}

impl LightScale {
    /// `(6 / gain) * 2^(20 - resolution) * (r + g + b)`, in integer arithmetic.
    pub fn lux(&self, red: u32, green: u32, blue: u32) -> u32 {
        let gain_factor = 6 / self.gain.max(1);
        let resolution_factor = 1u32 << 20u32.saturating_sub(self.resolution_bits);
        gain_factor
            .saturating_mul(resolution_factor)
            .saturating_mul(red + green + blue)
    }
}

pub struct Ob1203<B> {
    bus: B,
    scale: LightScale,
    ls_wait: Duration,
    ps_wait: Duration,
}

impl<B: RegisterBus> Ob1203<B> {
    pub fn new(bus: B, scale: LightScale) -> Self {
        Self {
            bus,
            scale,
            ls_wait: LS_DATA_WAIT,
            ps_wait: PS_DATA_WAIT,
        }
    }

    #[cfg(test)]
    fn without_wait(bus: B, scale: LightScale) -> Self {
        Self {
            bus,
            scale,
            ls_wait: Duration::ZERO,
            ps_wait: Duration::ZERO,
        }
    }

    /// Enables the light channel in CS mode and the proximity channel.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.bus
            .write_register(OB1203_ADDR, reg::MAIN_CTRL_0, LS_ENABLE_CS)?;
        self.bus
            .write_register(OB1203_ADDR, reg::PS_MEAS_RATE, PS_PERIOD_50MS)?;
        self.bus
            .write_register(OB1203_ADDR, reg::MAIN_CTRL_1, PS_ENABLE)?;
        Ok(())
    }

    pub fn read_light(&mut self) -> Result<u32, SensorError> {
        let status = self.bus.read_u8(OB1203_ADDR, reg::STATUS_0)?;
        if status & 0x01 == 0 {
            pause(self.ls_wait);
        }
        let green = self.bus.read_u8(OB1203_ADDR, reg::LS_DATA_GREEN)?;
        let blue = self.bus.read_u8(OB1203_ADDR, reg::LS_DATA_BLUE)?;
        let red = self.bus.read_u8(OB1203_ADDR, reg::LS_DATA_RED)?;
        Ok(self
            .scale
            .lux(u32::from(red), u32::from(green), u32::from(blue)))
    }

    pub fn read_proximity(&mut self) -> Result<u32, SensorError> {
        let status = self.bus.read_u8(OB1203_ADDR, reg::STATUS_1)?;
        if status & 0x01 == 0 {
            pause(self.ps_wait);
        }
        let mut raw = [0u8; 2];
        self.bus.read_register(OB1203_ADDR, reg::PS_DATA, &mut raw)?;
        Ok(u32::from(u16::from_le_bytes(raw)))
    }
}

fn pause(wait: Duration) {
    if !wait.is_zero() {
        std::thread::sleep(wait);
    }
}
