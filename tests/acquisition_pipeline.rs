//! End-to-end acquisition and downlink tests
//!
//! Runs the full core (acquisition, buffer, distribution, transport) on paused time with
//! deterministic sensor families.

use sci_telemetry::calibration::CalibrationGroup;
use sci_telemetry::config::{AppConfig, TransportConfig, TransportKind};
use sci_telemetry::data::{unframe, unframe_all, EncodedRecord};
use sci_telemetry::hardware::{MockTransport, SensorGroup, SimulatedSensorGroup};
use sci_telemetry::sampling::{volts_to_kpa, SensorSet};
use sci_telemetry::TelemetryApp;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

struct Bench {
    sensors: SensorSet,
    board: Arc<SimulatedSensorGroup>,
}

fn bench() -> Bench {
    let board = Arc::new(SimulatedSensorGroup::fixed("board", vec![25.0; 6]));
    let mut power = vec![5.0; 6];
    power.extend([0.12; 6]);
    power.extend([0.6; 6]);
    power.extend([30.0; 6]);

    let sensors = SensorSet {
        thermocouples: Arc::new(SimulatedSensorGroup::fixed("tc", vec![20.0, 21.0, 22.0, 23.0])),
        pressure: Arc::new(SimulatedSensorGroup::fixed("p", vec![0.000147; 4])),
        board_temperatures: board.clone() as Arc<dyn SensorGroup>,
        power_monitors: Arc::new(SimulatedSensorGroup::fixed("pm", power)),
    };
    Bench { sensors, board }
}

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.calibration.path = dir.path().join("calibration.toml");
    config
}

fn stamps(records: &[EncodedRecord]) -> Vec<u32> {
    records.iter().map(EncodedRecord::timestamp_ms).collect()
}

#[tokio::test(start_paused = true)]
async fn test_records_flow_to_transport() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    // Polls at 0, 300, ..., 2100 never coincide with the final acquisition at 2000
    config.distribution.poll_interval_ms = 300;
    let transport = Arc::new(MockTransport::new());
    let app = TelemetryApp::start_with(&config, bench().sensors, transport.clone())
        .await
        .unwrap();

    sleep(Duration::from_millis(2250)).await;
    app.shutdown().await;

    // Acquisition at 0..=2000 every 500 ms; the 2100 poll carries all of it
    let records = app_records(&transport);
    let last = records.last().unwrap();
    assert_eq!(stamps(last), vec![0, 500, 1000, 1500, 2000]);

    let decoded = last[0].decode();
    assert_eq!(decoded.temperatures, [20.0, 21.0, 22.0, 23.0]);
    assert!((decoded.pressures[0] - volts_to_kpa(0.000147)).abs() < 1e-3);
    assert_eq!(decoded.currents, [0.12; 6]);
}

fn app_records(transport: &MockTransport) -> Vec<Vec<EncodedRecord>> {
    transport
        .sent()
        .iter()
        .map(|frame| unframe(frame).unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_buffer_wraps_at_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.acquisition.buffer_capacity = 3;
    let app = TelemetryApp::start_with(&config, bench().sensors, Arc::new(MockTransport::new()))
        .await
        .unwrap();

    sleep(Duration::from_millis(2250)).await;
    assert_eq!(stamps(&app.buffer().snapshot_all()), vec![1000, 1500, 2000]);
    assert!(app.buffer().is_full());

    app.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_absent_group_does_not_stall_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let bench = bench();
    let app = TelemetryApp::start_with(&config, bench.sensors, Arc::new(MockTransport::new()))
        .await
        .unwrap();

    sleep(Duration::from_millis(600)).await;
    bench.board.set_present(false);
    sleep(Duration::from_millis(500)).await;
    bench.board.set_present(true);
    sleep(Duration::from_millis(500)).await;

    let records: Vec<_> = app
        .buffer()
        .snapshot_all()
        .iter()
        .map(EncodedRecord::decode)
        .collect();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1].board_temperatures, [25.0; 6]);
    assert_eq!(records[2].board_temperatures, [0.0; 6]);
    assert_eq!(records[2].temperatures, [20.0, 21.0, 22.0, 23.0]);
    assert_eq!(records[3].board_temperatures, [25.0; 6]);

    app.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_sensor_keeps_fixed_rate() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let slow = SimulatedSensorGroup::fixed("p", vec![0.000147; 4])
        .with_latency(Duration::from_secs(10));
    let sensors = SensorSet {
        pressure: Arc::new(slow),
        ..bench().sensors
    };
    let app = TelemetryApp::start_with(&config, sensors, Arc::new(MockTransport::new()))
        .await
        .unwrap();

    sleep(Duration::from_millis(1250)).await;
    let records: Vec<_> = app
        .buffer()
        .snapshot_all()
        .iter()
        .map(EncodedRecord::decode)
        .collect();

    // Each read is cut off at the 100 ms timeout; cycles still start every 500 ms
    let timestamps: Vec<u32> = records.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(timestamps, vec![100, 600, 1100]);
    assert!(records.iter().all(|r| r.pressures == [0.0; 4]));

    app.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_calibration_applies_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let app = TelemetryApp::start_with(&config, bench().sensors, Arc::new(MockTransport::new()))
        .await
        .unwrap();
    app.calibration()
        .update(CalibrationGroup::TemperatureOffset, 0, 10.0)
        .unwrap();
    sleep(Duration::from_millis(600)).await;

    // Edits do not reach live acquisition
    let live = app.buffer().latest().unwrap().decode();
    assert_eq!(live.temperatures[0], 20.0);
    app.shutdown().await;

    // A restart reloads calibration and starts with an empty buffer
    let app = TelemetryApp::start_with(&config, bench().sensors, Arc::new(MockTransport::new()))
        .await
        .unwrap();
    assert!(!app.calibration().restart_required());
    sleep(Duration::from_millis(100)).await;
    let records = app.buffer().snapshot_all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decode().temperatures[0], 30.0);

    app.shutdown().await;
}

#[tokio::test]
async fn test_file_transport_capture_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    let capture = dir.path().join("downlink.bin");
    config.distribution.transport = TransportConfig {
        kind: TransportKind::File,
        path: Some(capture.clone()),
        ..Default::default()
    };
    config.acquisition.buffer_capacity = 4;
    config.acquisition.interval_ms = 50;
    config.distribution.poll_interval_ms = 100;

    let app = TelemetryApp::start(&config).await.unwrap();
    sleep(Duration::from_millis(450)).await;
    app.shutdown().await;

    let bytes = std::fs::read(&capture).unwrap();
    let frames = unframe_all(&bytes).unwrap();
    assert!(frames.len() >= 3);
    for frame in &frames {
        assert!(!frame.is_empty() && frame.len() <= 4);
        let ts = stamps(frame);
        assert!(ts.windows(2).all(|w| w[1] > w[0]));
    }
}
