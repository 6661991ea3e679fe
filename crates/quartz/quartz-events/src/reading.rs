// One Reading is produced per sampler cycle. Each field carries its own
// activity flag because the three sensor reads fail independently: a failed
// read keeps the previous value but reports it as inactive for that cycle.

/// A sensor value plus whether it was refreshed successfully this cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Field<T> {
    pub value: T,
    pub active: bool,
}

impl<T> Field<T> {
    pub fn active(value: T) -> Self {
        Self {
            value,
            active: true,
        }
    }

    pub fn inactive(value: T) -> Self {
        Self {
            value,
            active: false,
        }
    }
}

/// One temperature/humidity measurement; both come from the same sensor read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Climate {
    /// Degrees Celsius
    pub temperature_c: f32,
    /// Relative humidity, percent
    pub humidity_pct: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    pub temperature: Field<f32>,
    pub humidity: Field<f32>,
    /// Illuminance, lux
    pub light: Field<u32>,
    /// Raw proximity counts
    pub proximity: Field<u32>,
}
