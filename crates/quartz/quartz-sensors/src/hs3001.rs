//! Renesas HS3001 relative humidity and temperature sensor.

use crate::i2c::RegisterBus;
use quartz_events::{Climate, SensorError};
use std::time::Duration;

pub const HS3001_ADDR: u16 = 0x44;

/// Conversion time between the measurement request and the data fetch.
const MEASUREMENT_WAIT: Duration = Duration::from_millis(50);

const FULL_SCALE: f32 = 16383.0;

pub struct Hs3001<B> {
    bus: B,
    wait: Duration,
}

impl<B: RegisterBus> Hs3001<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            wait: MEASUREMENT_WAIT,
        }
    }

    #[cfg(test)]
    fn without_wait(bus: B) -> Self {
        Self {
            bus,
            wait: Duration::ZERO,
        }
    }

    /// Triggers one measurement, waits for the conversion, and fetches it.
    pub fn measure(&mut self) -> Result<Climate, SensorError> {
        self.bus.write(HS3001_ADDR, &[0u8; 4])?;
        if !self.wait.is_zero() {
            std::thread::sleep(self.wait);
        }
        let mut raw = [0u8; 4];
        self.bus.read(HS3001_ADDR, &mut raw)?;
        convert(raw)
    }
}

/// Converts a 4-byte measurement frame.
///
/// Bytes 0-1 hold the 14-bit humidity with the status bits on top; bytes 2-3
/// hold the 14-bit temperature left-aligned. A non-zero status means the
/// sensor has not finished a fresh conversion.
pub fn convert(raw: [u8; 4]) -> Result<Climate, SensorError> {
    if raw[0] >> 6 != 0 {
        return Err(SensorError::Stale);
    }
    let humidity_raw = u16::from_be_bytes([raw[0], raw[1]]) & 0x3fff;
    let temperature_raw = u16::from_be_bytes([raw[2], raw[3]]) >> 2;

    Ok(Climate {
        humidity_pct: f32::from(humidity_raw) / FULL_SCALE * 100.0,
        temperature_c: f32::from(temperature_raw) / FULL_SCALE * 165.0 - 40.0,
    })
}
