//! Configuration loading and serial bring-up tests.

use super::common::broadcast_config;
use std::io::Write;
use std::time::Duration;
use timebase_common::{BusDriver, FlowControl, Parity, TimesyncConfig};
use timebase_serial::{SerialDevice, SimulatedSerial};

#[test]
fn test_config_file_round_trip() {
    let config = broadcast_config(Duration::from_millis(500), 10);
    let toml = config.to_toml().unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();

    let loaded = TimesyncConfig::from_file(file.path()).unwrap();
    assert_eq!(loaded.broadcast.interval, Duration::from_millis(500));
    assert_eq!(loaded.broadcast.max_cycles, 10);
    assert_eq!(loaded.broadcast.channel, "MBOT_TIMESYNC");
}

#[test]
fn test_deployment_config_parses() {
    // The shape a robot deployment actually ships
    let toml = r#"
        [broadcast]
        channel = "MBOT_TIMESYNC"
        interval = "1s"

        [bus]
        driver = "lcm"
        multicast_url = "udpm://239.255.76.67:7667?ttl=1"

        [serial]
        port = "/dev/mbot_lcm"
        baud = 115200
        databits = 8
        parity = "none"
        stopbits = 1
        flow_control = "rts_cts"

        [metrics]
        enabled = true
        percentiles = [50.0, 99.0]
    "#;

    let config = TimesyncConfig::from_toml(toml).unwrap();
    assert_eq!(config.bus.driver, BusDriver::Lcm);
    assert_eq!(config.serial.baud, 115_200);
    assert_eq!(config.serial.flow_control, Some(FlowControl::RtsCts));
    assert_eq!(config.metrics.percentiles, vec![50.0, 99.0]);
}

#[test]
fn test_serial_bring_up_applies_configured_mode() {
    let toml = r#"
        [serial]
        port = "/dev/ttyACM0"
        baud = 57600
        databits = 7
        parity = "even"
        stopbits = 2
        flow_control = "xon_xoff"
    "#;
    let config = TimesyncConfig::from_toml(toml).unwrap();

    // Same bring-up sequence the daemon performs
    let mut device = SimulatedSerial::open(
        &config.serial.port.as_ref().unwrap().display().to_string(),
        config.serial.baud,
        config.serial.blocking,
    );
    device
        .set_mode(
            config.serial.databits,
            config.serial.parity,
            config.serial.stopbits,
        )
        .unwrap();
    if let Some(kind) = config.serial.flow_control {
        device.enable_flow_control(kind).unwrap();
    }

    let settings = device.settings();
    assert_eq!(settings.baud, 57_600);
    assert_eq!(settings.databits, 7);
    assert_eq!(settings.parity, Parity::Even);
    assert_eq!(settings.stopbits, 2);
    assert_eq!(settings.flow_control, vec![FlowControl::XonXoff]);
    device.close().unwrap();
}
