use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Floor for the sampling period, in milliseconds.
pub const MIN_SAMPLING_INTERVAL_MS: u64 = 250;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QuartzConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Requested sampling period. Read through [`QuartzConfig::sampling_interval`],
    /// which applies the floor.
    #[serde(default = "defaults::sampling_interval_ms")]
    pub sampling_interval_ms: u64,
    #[serde(default = "defaults::ring_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "defaults::ring_capacity")]
    pub command_capacity: usize,
    #[serde(default = "defaults::listen_addr")]
    pub listen_addr: String,
    /// Upper bound on how long the event loop sleeps waiting for a wake.
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Connections that have not completed the WebSocket upgrade within this
    /// window are dropped.
    #[serde(default = "defaults::handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub led: LedConfig,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    #[default]
    Hardware,
    Simulated,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    #[serde(default)]
    pub backend: SensorBackend,
    #[serde(default = "defaults::i2c_device")]
    pub i2c_device: String,
    /// OB1203 light sensor analog gain.
    #[serde(default = "defaults::light_gain")]
    pub light_gain: u32,
    /// OB1203 light sensor ADC resolution in bits.
    #[serde(default = "defaults::light_resolution_bits")]
    pub light_resolution_bits: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LedConfig {
    #[serde(default = "defaults::gpio_sysfs_root")]
    pub sysfs_root: String,
    #[serde(default = "defaults::led_pins")]
    pub pins: Vec<LedPin>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedPin {
    /// Kernel GPIO number written to `export`.
    pub gpio: u32,
    /// Directory name the kernel creates for the exported pin.
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

mod defaults {
    use super::LedPin;

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn sampling_interval_ms() -> u64 {
        super::MIN_SAMPLING_INTERVAL_MS
    }

    pub fn ring_capacity() -> usize {
        8
    }

    pub fn listen_addr() -> String {
        "0.0.0.0:3000".into()
    }

    pub fn poll_interval_ms() -> u64 {
        10
    }

    pub fn handshake_timeout_ms() -> u64 {
        5_000
    }

    pub fn i2c_device() -> String {
        "/dev/i2c-1".into()
    }

    pub fn light_gain() -> u32 {
        3
    }

    pub fn light_resolution_bits() -> u32 {
        18
    }

    pub fn gpio_sysfs_root() -> String {
        "/sys/class/gpio".into()
    }

    // PMOD LED header LD0..LD3
    pub fn led_pins() -> Vec<LedPin> {
        [(268, "P18_4"), (128, "P1_0"), (131, "P1_3"), (132, "P1_4")]
            .into_iter()
            .map(|(gpio, name)| LedPin {
                gpio,
                name: name.into(),
            })
            .collect()
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            backend: SensorBackend::default(),
            i2c_device: defaults::i2c_device(),
            light_gain: defaults::light_gain(),
            light_resolution_bits: defaults::light_resolution_bits(),
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            sysfs_root: defaults::gpio_sysfs_root(),
            pins: defaults::led_pins(),
        }
    }
}

impl Default for QuartzConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            sampling_interval_ms: defaults::sampling_interval_ms(),
            broadcast_capacity: defaults::ring_capacity(),
            command_capacity: defaults::ring_capacity(),
            listen_addr: defaults::listen_addr(),
            poll_interval_ms: defaults::poll_interval_ms(),
            handshake_timeout_ms: defaults::handshake_timeout_ms(),
            sensors: SensorConfig::default(),
            led: LedConfig::default(),
        }
    }
}

/// Applies the sampling floor: anything below it becomes the floor.
pub fn clamp_interval_ms(requested_ms: u64) -> u64 {
    requested_ms.max(MIN_SAMPLING_INTERVAL_MS)
}

impl QuartzConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_to_str)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: QuartzConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid("broadcast_capacity must be > 0".into()));
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid("command_capacity must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid("handshake_timeout_ms must be > 0".into()));
        }
        if self.sensors.light_gain == 0 {
            return Err(ConfigError::Invalid("sensors.light_gain must be > 0".into()));
        }
        if self.sensors.light_resolution_bits > 20 {
            return Err(ConfigError::Invalid(
                "sensors.light_resolution_bits must be <= 20".into(),
            ));
        }
        Ok(())
    }

    /// Effective sampling period, never below [`MIN_SAMPLING_INTERVAL_MS`].
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(clamp_interval_ms(self.sampling_interval_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
