use quartz_config::{QuartzConfig, SensorBackend};
use quartz_events::{Command, SwitchState};

fn simulated_config() -> QuartzConfig {
    let mut cfg = QuartzConfig::default();
    cfg.sensors.backend = SensorBackend::Simulated;
    cfg
}

#[test]
fn simulated_backend_produces_readings() {
    let mut source = quartz_sensors::open_sensors(&simulated_config()).unwrap();
    let climate = source.read_climate().unwrap();
    assert!(climate.temperature_c > 0.0);
    assert!(source.read_light().unwrap() >= 200);
    source.read_proximity().unwrap();
}

#[test]
fn simulated_backend_accepts_commands() {
    let mut actuator = quartz_sensors::open_actuator(&simulated_config()).unwrap();
    actuator.apply(Command::led(SwitchState::On)).unwrap();
}

#[test]
fn hardware_backend_reports_missing_bus() {
    let mut cfg = QuartzConfig::default();
    cfg.sensors.i2c_device = "/nonexistent/i2c-9".into();
    assert!(quartz_sensors::open_sensors(&cfg).is_err());
}
