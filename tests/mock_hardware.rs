//! Integration tests for the simulated hardware collaborators
//!
//! These tests verify that the simulated sensor families and the host transports honour
//! the capability-trait contracts the telemetry core relies on.

use sci_telemetry::config::{AppConfig, TransportConfig, TransportKind};
use sci_telemetry::hardware::{
    build_transport, FileTransport, GroupReading, MockTransport, SensorGroup,
    SimulatedSensorGroup, Transport,
};
use sci_telemetry::sampling::SensorSet;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// Sensor Families
// =============================================================================

#[tokio::test]
async fn test_simulated_families_match_configuration() {
    let config = AppConfig::default();
    let sensors = SensorSet::simulated(&config.sensors);

    assert_eq!(sensors.thermocouples.channel_count(), 4);
    assert_eq!(sensors.pressure.channel_count(), 4);
    assert_eq!(sensors.board_temperatures.channel_count(), 6);
    assert_eq!(sensors.power_monitors.channel_count(), 24);

    let reading = sensors.thermocouples.read_channel_group().await;
    assert!(reading.present);
    // 1% noise around the configured 22 °C
    assert!(reading
        .values
        .iter()
        .all(|v| (21.7..=22.3).contains(v)));
}

#[tokio::test]
async fn test_configured_absence() {
    let mut config = AppConfig::default();
    config.sensors.power_monitors.present = false;
    let sensors = SensorSet::simulated(&config.sensors);

    let reading = sensors.power_monitors.read_channel_group().await;
    assert_eq!(reading, GroupReading::absent(24));
}

#[tokio::test(start_paused = true)]
async fn test_latency_is_simulated() {
    let group = SimulatedSensorGroup::fixed("slow", vec![1.0])
        .with_latency(Duration::from_millis(40));

    let start = Instant::now();
    group.read_channel_group().await;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(40) && elapsed < Duration::from_millis(50));
}

#[tokio::test]
async fn test_values_can_change_at_runtime() {
    let group = SimulatedSensorGroup::fixed("tc", vec![20.0; 4]);
    group.set_values(vec![-300.0; 4]);
    assert_eq!(
        group.read_channel_group().await.values,
        vec![-300.0; 4]
    );
}

// =============================================================================
// Transports
// =============================================================================

#[tokio::test]
async fn test_mock_transport_keeps_order() {
    let transport = MockTransport::new();
    for i in 0..3u8 {
        transport.transmit(&[i]).await.unwrap();
    }
    assert_eq!(transport.sent(), vec![vec![0], vec![1], vec![2]]);
}

#[tokio::test]
async fn test_file_transport_through_builder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("downlink.bin");
    let transport = build_transport(&TransportConfig {
        kind: TransportKind::File,
        path: Some(path.clone()),
        ..Default::default()
    })
    .unwrap();

    transport.transmit(b"abc").await.unwrap();
    transport.transmit(b"def").await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    assert_eq!(FileTransport::new(&path).path(), path.as_path());
}

#[cfg(not(feature = "serial"))]
#[test]
fn test_serial_requires_feature() {
    let result = build_transport(&TransportConfig {
        kind: TransportKind::Serial,
        path: Some("/dev/ttyUSB0".into()),
        ..Default::default()
    });
    assert!(result.is_err());
}
