mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use common::{service, session_settings, zone, FakeBoard, FakeSensors};
use pankha_zoned::config::types::DaemonConfig;
use pankha_zoned::control::GuardState;
use pankha_zoned::error::exit_code;
use pankha_zoned::hardware::types::FanMode;
use pankha_zoned::hardware::Ipmi;
use pankha_zoned::zone::Zone;
use pankha_zoned::{ControlError, Service, ServiceOptions, ServiceState};

const CPU_ZONE: &str = r#"{"type": "cpu", "name": "CPU zone", "sensors": ["cpu0"],
    "curve": [[30, 20], [60, 100]], "hysteresis": 0, "polling": 2}"#;

#[tokio::test(start_paused = true)]
async fn cpu_zone_at_45_degrees_runs_at_60_percent() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    sensors.set_temp("cpu0", Some(45.0));
    let (_tx, rx) = watch::channel(false);

    let mut svc = service(vec![zone(CPU_ZONE)], sensors, board.clone(), session_settings(1, 5), rx);
    svc.init().await.unwrap();
    assert_eq!(svc.state(), ServiceState::Running);
    assert_eq!(board.mode(), FanMode::Full);

    svc.cycle().await.unwrap();
    assert_eq!(board.level(0), Some(60));
    assert_eq!(svc.applied_level(0), Some(60));
}

#[tokio::test(start_paused = true)]
async fn gpu_zone_keeps_level_when_all_sensors_fail() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    let gpu = zone(
        r#"{"type": "gpu", "sensors": ["gpu0", "gpu1"], "curve": [[40, 35], [70, 100]],
            "hysteresis": 0, "temp_calc": "max", "polling": 2}"#,
    );
    let (_tx, rx) = watch::channel(false);
    let mut svc = service(vec![gpu], sensors.clone(), board.clone(), session_settings(1, 5), rx);
    svc.init().await.unwrap();

    sensors.set_temp("gpu0", Some(50.0));
    sensors.set_temp("gpu1", Some(48.0));
    svc.cycle().await.unwrap();
    assert_eq!(board.level(1), Some(57));

    sensors.set_temp("gpu0", None);
    sensors.set_temp("gpu1", None);
    tokio::time::advance(Duration::from_secs(2)).await;
    svc.cycle().await.unwrap();
    assert_eq!(svc.zone_read_failures(0), 1);
    assert_eq!(svc.zones().next().unwrap().level(), 57);
    assert_eq!(board.sets(), vec![(1, 57)]);

    sensors.set_temp("gpu0", Some(70.0));
    sensors.set_temp("gpu1", Some(65.0));
    tokio::time::advance(Duration::from_secs(2)).await;
    svc.cycle().await.unwrap();
    assert_eq!(board.level(1), Some(100));
    assert_eq!(svc.zone_read_failures(0), 1);
}

#[tokio::test(start_paused = true)]
async fn hd_zone_suppresses_reads_after_confirmed_standby() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    let hd = zone(
        r#"{"type": "hd", "sensors": ["/dev/sda", "/dev/sdb"], "curve": [[32, 35], [46, 100]],
            "hysteresis": 0, "temp_calc": "max", "standby_guard": {"confirmations": 2}}"#,
    );
    let (_tx, rx) = watch::channel(false);
    let mut svc = service(vec![hd], sensors.clone(), board.clone(), session_settings(1, 5), rx);
    svc.init().await.unwrap();

    let guard_of = |svc: &Service| match svc.zones().next() {
        Some(Zone::Hd(hd)) => hd.guard("/dev/sda").cloned().unwrap(),
        _ => panic!("expected an HD zone"),
    };

    sensors.set_temp("/dev/sda", Some(40.0));
    sensors.set_temp("/dev/sdb", Some(36.0));
    svc.cycle().await.unwrap();
    assert_eq!(guard_of(&svc).state(), GuardState::Active);

    // device A reports standby for three consecutive cycles
    sensors.set_standby("/dev/sda", true);
    sensors.set_temp("/dev/sda", Some(41.0));

    tokio::time::advance(Duration::from_secs(10)).await;
    svc.cycle().await.unwrap();
    assert_eq!(guard_of(&svc).standby_count(), 1);
    assert_eq!(guard_of(&svc).state(), GuardState::Active);

    tokio::time::advance(Duration::from_secs(10)).await;
    svc.cycle().await.unwrap();
    assert_eq!(guard_of(&svc).standby_count(), 2);
    assert_eq!(guard_of(&svc).state(), GuardState::Standby);
    assert_eq!(sensors.reads_of("/dev/sda"), 3);

    tokio::time::advance(Duration::from_secs(10)).await;
    svc.cycle().await.unwrap();
    assert_eq!(sensors.reads_of("/dev/sda"), 3);
    assert_eq!(sensors.reads_of("/dev/sdb"), 4);

    // 41°C reused for the sleeping drive: 35 + 9/14 * 65 = 76.8
    assert_eq!(board.level(1), Some(77));
    assert_eq!(svc.zone_read_failures(0), 0);
}

#[tokio::test(start_paused = true)]
async fn fifth_management_failure_is_fatal() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    sensors.set_temp("cpu0", Some(45.0));
    board.fail_sets.store(true, Ordering::SeqCst);
    let (_tx, rx) = watch::channel(false);

    let mut svc = service(vec![zone(CPU_ZONE)], sensors.clone(), board.clone(), session_settings(1, 5), rx);
    let err = svc.run().await.unwrap_err();

    assert!(matches!(err, ControlError::ManagementChannelFatal { failures: 5, ceiling: 5 }));
    assert_eq!(err.exit_code(), exit_code::IPMI_FATAL);
    assert_eq!(svc.state(), ServiceState::Stopped);
    assert_eq!(sensors.reads_of("cpu0"), 5);

    // five failed applies, then one best-effort safe level
    let sets = board.sets();
    assert_eq!(sets.len(), 6);
    assert_eq!(sets.last(), Some(&(0, 100)));
}

#[tokio::test(start_paused = true)]
async fn termination_applies_safe_level_and_stops() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    sensors.set_temp("cpu0", Some(45.0));
    let (tx, rx) = watch::channel(false);

    let mut svc = service(vec![zone(CPU_ZONE)], sensors.clone(), board.clone(), session_settings(1, 5), rx);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tx.send(true);
    });

    svc.run().await.unwrap();
    assert_eq!(svc.state(), ServiceState::Stopped);
    assert!(!svc.ipmi().is_open());
    assert_eq!(sensors.reads_of("cpu0"), 3);
    // unchanged level is not re-sent between polls
    assert_eq!(board.sets(), vec![(0, 60), (0, 100)]);
}

#[tokio::test(start_paused = true)]
async fn termination_without_safe_level_leaves_fans_alone() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    sensors.set_temp("cpu0", Some(45.0));
    let (tx, rx) = watch::channel(false);

    let ipmi = Ipmi::new(board.clone(), session_settings(1, 5));
    let options = ServiceOptions { fan_mode: FanMode::Full, safe_level: None };
    let mut svc = Service::new(vec![zone(CPU_ZONE)], sensors.clone(), ipmi, options, rx).unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = tx.send(true);
    });

    svc.run().await.unwrap();
    assert_eq!(svc.state(), ServiceState::Stopped);
    assert_eq!(sensors.reads_of("cpu0"), 2);
    assert_eq!(board.sets(), vec![(0, 60)]);
}

#[tokio::test(start_paused = true)]
async fn zones_poll_on_their_own_intervals() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    sensors.set_temp("cpu0", Some(45.0));
    sensors.set_temp("/dev/sda", Some(38.0));
    let hd = zone(
        r#"{"type": "hd", "sensors": ["/dev/sda"], "curve": [[32, 35], [46, 100]],
            "hysteresis": 0, "polling": 10}"#,
    );
    let (tx, rx) = watch::channel(false);

    let mut svc = service(vec![zone(CPU_ZONE), hd], sensors.clone(), board.clone(), session_settings(1, 5), rx);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(11)).await;
        let _ = tx.send(true);
    });

    svc.run().await.unwrap();
    // CPU at 0, 2, 4, 6, 8 and 10 s; HD at 0 and 10 s
    assert_eq!(sensors.reads_of("cpu0"), 6);
    assert_eq!(sensors.reads_of("/dev/sda"), 2);
}

#[tokio::test(start_paused = true)]
async fn shared_ipmi_zone_runs_at_highest_level() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    sensors.set_temp("cpu0", Some(30.0));
    let pinned = zone(r#"{"type": "const", "name": "Chassis", "ipmi_zones": [0], "level": 80}"#);
    let (_tx, rx) = watch::channel(false);

    let mut svc = service(vec![zone(CPU_ZONE), pinned], sensors.clone(), board.clone(), session_settings(1, 5), rx);
    svc.init().await.unwrap();
    svc.cycle().await.unwrap();
    assert_eq!(board.level(0), Some(80));

    sensors.set_temp("cpu0", Some(60.0));
    tokio::time::advance(Duration::from_secs(2)).await;
    svc.cycle().await.unwrap();
    assert_eq!(board.level(0), Some(100));
}

#[tokio::test]
async fn repeated_set_level_is_idempotent() {
    let board = FakeBoard::new();
    let mut ipmi = Ipmi::new(board.clone(), session_settings(3, 5));
    ipmi.set_level(1, 65).await.unwrap();
    ipmi.set_level(1, 65).await.unwrap();
    assert_eq!(ipmi.get_level(1).await.unwrap(), 65);
    assert_eq!(ipmi.consecutive_failures(), 0);
}

#[tokio::test]
async fn unreadable_fan_mode_fails_init() {
    let sensors = FakeSensors::new();
    let board = FakeBoard::new();
    board.fail_mode.store(true, Ordering::SeqCst);
    let (_tx, rx) = watch::channel(false);

    let mut svc = service(vec![zone(CPU_ZONE)], sensors, board.clone(), session_settings(2, 5), rx);
    let err = svc.run().await.unwrap_err();
    assert_eq!(err.exit_code(), exit_code::IPMI_INIT);
    assert_eq!(svc.state(), ServiceState::Init);
    assert!(board.sets().is_empty());
}

#[tokio::test]
async fn unresolvable_sensor_fails_init() {
    let board = FakeBoard::new();
    let (_tx, rx) = watch::channel(false);
    let cpu = zone(r#"{"type": "cpu", "sensors": ["/missing/temp1_input"]}"#);

    let mut svc = service(vec![cpu], FakeSensors::new(), board.clone(), session_settings(1, 5), rx);
    let err = svc.init().await.unwrap_err();
    assert!(matches!(err, ControlError::Configuration(_)));
    assert_eq!(board.mode(), FanMode::Optimal);
}

#[tokio::test]
async fn no_enabled_zone_is_refused() {
    let config: DaemonConfig =
        serde_json::from_str(r#"{"zones": [{"type": "cpu", "enabled": false, "sensors": ["cpu0"]}]}"#).unwrap();
    let (_tx, rx) = watch::channel(false);
    let err = Service::from_config(&config, FakeSensors::new(), FakeBoard::new(), rx).err().unwrap();
    assert_eq!(err.exit_code(), exit_code::NO_ZONES);

    let (_tx, rx) = watch::channel(false);
    let ipmi = Ipmi::new(FakeBoard::new(), session_settings(1, 5));
    let options = ServiceOptions { fan_mode: FanMode::Full, safe_level: None };
    assert!(matches!(
        Service::new(vec![], FakeSensors::new(), ipmi, options, rx),
        Err(ControlError::NoZones)
    ));
}

#[tokio::test]
async fn board_levels_survive_without_shared_state() {
    // zones never hold the session: two services over one board see the same levels
    let board = FakeBoard::new();
    let sensors = FakeSensors::new();
    sensors.set_temp("cpu0", Some(45.0));
    let (_tx, rx) = watch::channel(false);
    let mut svc = service(vec![zone(CPU_ZONE)], sensors, Arc::clone(&board), session_settings(1, 5), rx);
    svc.init().await.unwrap();
    svc.cycle().await.unwrap();

    let mut reader = Ipmi::new(board, session_settings(1, 5));
    assert_eq!(reader.get_level(0).await.unwrap(), 60);
}
