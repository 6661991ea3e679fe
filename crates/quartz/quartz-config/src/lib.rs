mod config;

pub use config::{
    ConfigError, LedConfig, LedPin, MIN_SAMPLING_INTERVAL_MS, QuartzConfig, SensorBackend,
    SensorConfig, clamp_interval_ms,
};
