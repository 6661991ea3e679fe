pub mod hs3001;
pub mod i2c;
pub mod ob1203;
pub mod pmod_led;
pub mod simulated;

pub use hs3001::Hs3001;
pub use i2c::{I2cBus, RegisterBus};
pub use ob1203::{LightScale, Ob1203};
pub use pmod_led::PmodLed;
pub use simulated::{FailurePlan, SimulatedBoard, SimulatedLed};

use quartz_config::{QuartzConfig, SensorBackend, SensorConfig};
use quartz_events::{Actuator, ActuatorError, Climate, SensorError, SensorSource};
use tracing::{info, warn};

/// The environmental sensor pair on the board's I2C bus.
pub struct EnvironmentBoard<B> {
    climate: Hs3001<B>,
    optical: Ob1203<B>,
}

impl<B: RegisterBus> EnvironmentBoard<B> {
    pub fn new(climate: Hs3001<B>, optical: Ob1203<B>) -> Self {
        Self { climate, optical }
    }
}

impl EnvironmentBoard<I2cBus> {
    /// Opens the bus once per device and enables the optical sensor.
    ///
    /// A failed enable is logged; subsequent reads report it as inactive data.
    pub fn open(config: &SensorConfig) -> Result<Self, SensorError> {
        let climate = Hs3001::new(I2cBus::open(&config.i2c_device)?);
        let scale = LightScale {
            gain: config.light_gain,
            resolution_bits: config.light_resolution_bits,
        };
        let mut optical = Ob1203::new(I2cBus::open(&config.i2c_device)?, scale);
        if let Err(error) = optical.init() {
            warn!(%error, "failed to enable light/proximity sensor");
        }
        info!(device = %config.i2c_device, "sensor bus opened");
        Ok(Self::new(climate, optical))
    }
}

impl<B: RegisterBus> SensorSource for EnvironmentBoard<B> {
    fn read_climate(&mut self) -> Result<Climate, SensorError> {
        self.climate.measure()
    }

    fn read_light(&mut self) -> Result<u32, SensorError> {
        self.optical.read_light()
    }

    fn read_proximity(&mut self) -> Result<u32, SensorError> {
        self.optical.read_proximity()
    }
}

/// Builds the sensor source selected by `sensors.backend`.
pub fn open_sensors(config: &QuartzConfig) -> Result<Box<dyn SensorSource>, SensorError> {
    match config.sensors.backend {
        SensorBackend::Hardware => Ok(Box::new(EnvironmentBoard::open(&config.sensors)?)),
        SensorBackend::Simulated => Ok(Box::new(SimulatedBoard::new())),
    }
}

/// Builds and prepares the LED actuator matching `sensors.backend`.
pub fn open_actuator(config: &QuartzConfig) -> Result<Box<dyn Actuator>, ActuatorError> {
    match config.sensors.backend {
        SensorBackend::Hardware => {
            let mut led = PmodLed::new(&config.led);
            led.prepare()?;
            Ok(Box::new(led))
        }
        SensorBackend::Simulated => Ok(Box::new(SimulatedLed::new())),
    }
}
