use std::time::Duration;

use liftctl_engine::{
    BatchRunner, Engine, EngineConfig, EngineError, EngineEvent, EngineHandle, SimDevice,
};
use liftctl_frame::{
    AccessChannel, AfMode, AllStatus, Command, DpCommand, DpReport, Frame, SwitchState,
};
use liftctl_macro::MacroFile;
use liftctl_transport::{memory_pair, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

fn quiet_config() -> EngineConfig {
    EngineConfig {
        heartbeat_enabled: false,
        ..EngineConfig::default()
    }
}

fn start(tag: &str, device: &SimDevice, config: EngineConfig) -> (Engine, EngineHandle) {
    let (console, device_end) = memory_pair(tag);
    device.spawn(device_end);
    let engine = Engine::spawn(console, config).unwrap();
    let handle = engine.handle();
    (engine, handle)
}

fn channel_frame(channel: u16) -> Frame {
    DpCommand::channel(channel).into_frame().unwrap()
}

async fn wait_for_log(events: &mut tokio::sync::broadcast::Receiver<EngineEvent>, needle: &str) {
    loop {
        if let EngineEvent::Log(line) = events.recv().await.unwrap() {
            if line.message.contains(needle) {
                return;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn query_status_refreshes_snapshot() {
    let device = SimDevice::new(AllStatus {
        switch: 0x01,
        access_channel: 0x01,
        max_channel: 0x1122,
        channel: 0x1033,
        action: 0x02,
        af_mode: 0x01,
    });
    let (engine, handle) = start("query", &device, quiet_config());

    let status = handle.query_status().await.unwrap();
    assert_eq!(status.switch, Some(SwitchState::On));
    assert_eq!(status.af_mode, Some(AfMode::F));
    assert_eq!(status.max_channel, Some(0x1122));
    assert_eq!(status.channel, Some(0x1033));
    assert_eq!(handle.watch_status().borrow().channel, Some(0x1033));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn submissions_are_transmitted_in_order() {
    let device = SimDevice::default();
    let (engine, handle) = start("fifo", &device, quiet_config());

    for channel in 1..=3 {
        handle
            .enqueue(channel_frame(channel), format!("channel {channel}"))
            .await
            .unwrap();
    }
    let ack = handle.submit(channel_frame(4), "channel 4").await.unwrap();
    assert_eq!(ack.attempts, 1);
    assert_eq!(ack.response.command(), Command::McuResponse);

    let sent: Vec<u16> = device
        .received()
        .iter()
        .map(|frame| match DpReport::decode(frame.payload()).unwrap() {
            DpReport::Channel(ch) => ch,
            other => panic!("unexpected report {other:?}"),
        })
        .collect();
    assert_eq!(sent, vec![1, 2, 3, 4]);
    assert_eq!(device.status().channel, 4);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn silent_device_gets_three_attempts() {
    let device = SimDevice::default();
    device.set_silent(true);
    let (engine, handle) = start("silent", &device, quiet_config());

    let started = Instant::now();
    let err = handle.submit(channel_frame(7), "channel 7").await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        EngineError::Timeout { label, attempts } => {
            assert_eq!(label, "channel 7");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_millis(600), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(700), "{elapsed:?}");
    assert_eq!(device.received().len(), 3);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missed_heartbeats_lock_panel_until_device_answers() {
    let device = SimDevice::default();
    device.set_silent(true);
    let config = EngineConfig {
        heartbeat_interval: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let (engine, handle) = start("heartbeat", &device, config);
    let mut panel = handle.watch_panel();

    panel.wait_for(|locked| *locked).await.unwrap();
    assert!(handle.panel_locked());
    assert!(matches!(
        handle.set_channel(5).await,
        Err(EngineError::PanelLocked)
    ));
    // One probe, retried twice.
    assert_eq!(device.received().len(), 3);
    assert!(device
        .received()
        .iter()
        .all(|frame| frame.command() == Command::Heartbeat));

    device.set_silent(false);
    panel.wait_for(|locked| !*locked).await.unwrap();
    handle.set_channel(5).await.unwrap();
    assert_eq!(device.status().channel, 5);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn corrupt_reply_is_dropped_and_link_survives() {
    let device = SimDevice::default();
    device.set_corrupt_checksums(true);
    let (engine, handle) = start("corrupt", &device, quiet_config());
    let mut events = handle.subscribe();

    let err = handle.query_status().await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { attempts: 3, .. }));
    wait_for_log(&mut events, "checksum").await;
    assert_eq!(handle.status().channel, None);

    device.set_corrupt_checksums(false);
    let status = handle.query_status().await.unwrap();
    assert_eq!(status.channel, Some(1));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_batch_sends_reset_once() {
    let device = SimDevice::default();
    let (engine, handle) = start("cancel", &device, quiet_config());
    handle.query_status().await.unwrap();

    let file = MacroFile::parse("A,1,UP,5\nB,2,DOWN,0\nC,3,STOP,0\n").unwrap();
    let runner = BatchRunner::new(handle.clone());
    let cancel = runner.cancel_token();
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        wait_for_log(&mut events, "row 1/3: A ch 1 UP: acknowledged").await;
        cancel.cancel();
    });

    let summary = runner.run_file(&file, true).await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.rows_acked, 1);
    assert_eq!(summary.passes_completed, 0);

    let received = device.received();
    // query, row 1, reset
    assert_eq!(received.len(), 3);
    let DpReport::AllStatus(row) = DpReport::decode(received[1].payload()).unwrap() else {
        panic!("row 1 is not an ALL_STATUS frame");
    };
    assert_eq!(row.channel, 1);
    let DpReport::AllStatus(reset) = DpReport::decode(received[2].payload()).unwrap() else {
        panic!("reset is not an ALL_STATUS frame");
    };
    assert_eq!(reset.switch, SwitchState::Off.value());
    assert_eq!(reset.channel, 99);
    assert_eq!(reset.max_channel, 100);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_during_final_delay_still_resets() {
    let device = SimDevice::default();
    let (engine, handle) = start("cancel-delay", &device, quiet_config());
    handle.query_status().await.unwrap();

    let file = MacroFile::parse("A,1,UP,5\n").unwrap();
    let runner = BatchRunner::new(handle.clone());
    let cancel = runner.cancel_token();
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        wait_for_log(&mut events, "row 1/1: A ch 1 UP: acknowledged").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let summary = runner.run_file(&file, true).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(summary.cancelled);
    assert_eq!(summary.rows_acked, 1);
    assert_eq!(summary.passes_completed, 0);

    let received = device.received();
    // query, row 1, reset
    assert_eq!(received.len(), 3);
    let DpReport::AllStatus(reset) = DpReport::decode(received[2].payload()).unwrap() else {
        panic!("reset is not an ALL_STATUS frame");
    };
    assert_eq!(reset.channel, 99);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_without_delays_stops_after_current_row() {
    let device = SimDevice::default();
    let (engine, handle) = start("cancel-zero", &device, quiet_config());
    handle.query_status().await.unwrap();

    let file = MacroFile::parse("A,1,UP,0\nB,2,DOWN,0\nC,3,STOP,0\n").unwrap();
    let runner = BatchRunner::new(handle.clone());
    let cancel = runner.cancel_token();
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        wait_for_log(&mut events, "row 2/3: B ch 2 DOWN: sent").await;
        cancel.cancel();
    });

    let summary = runner.run_file(&file, true).await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.rows_acked, 2);

    let channels: Vec<u16> = device
        .received()
        .iter()
        .filter_map(|frame| match DpReport::decode(frame.payload()) {
            Ok(DpReport::AllStatus(record)) => Some(record.channel),
            _ => None,
        })
        .collect();
    // rows 1 and 2, then a single reset; row 3 never goes out
    assert_eq!(channels, vec![1, 2, 99]);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn locked_panel_refuses_macro() {
    let device = SimDevice::default();
    device.set_silent(true);
    let config = EngineConfig {
        heartbeat_interval: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let (engine, handle) = start("locked-macro", &device, config);
    handle
        .watch_panel()
        .wait_for(|locked| *locked)
        .await
        .unwrap();

    let file = MacroFile::parse("A,1,UP,0\n").unwrap();
    let err = BatchRunner::new(handle.clone())
        .run_file(&file, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PanelLocked), "{err:?}");
    assert!(device
        .received()
        .iter()
        .all(|frame| frame.command() == Command::Heartbeat));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn panel_lock_mid_run_stops_before_next_row() {
    let device = SimDevice::default();
    let config = EngineConfig {
        heartbeat_interval: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let (engine, handle) = start("locked-mid-run", &device, config);
    handle.query_status().await.unwrap();

    let file = MacroFile::parse("A,1,UP,2\nB,2,DOWN,0\n").unwrap();
    let mut events = handle.subscribe();
    let silenced = device.clone();
    tokio::spawn(async move {
        wait_for_log(&mut events, "row 1/2: A ch 1 UP: acknowledged").await;
        silenced.set_silent(true);
    });

    let err = BatchRunner::new(handle.clone())
        .run_file(&file, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PanelLocked), "{err:?}");
    let control_frames = device
        .received()
        .iter()
        .filter(|frame| frame.command() == Command::DeviceControl)
        .count();
    assert_eq!(control_frames, 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn relaxed_macro_row_switches_device_mode() {
    let device = SimDevice::default();
    let (engine, handle) = start("relaxed", &device, quiet_config());
    handle.query_status().await.unwrap();

    let file = MacroFile::parse("F3,5,UP,0\n").unwrap();
    let summary = BatchRunner::new(handle.clone())
        .run_file(&file, false)
        .await
        .unwrap();
    assert_eq!(summary.rows_acked, 1);
    assert_eq!(device.status().af_mode, AfMode::F.value());
    assert_eq!(device.status().channel, 5);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stray_heartbeat_reply_does_not_settle_queued_probe() {
    let started = Instant::now();
    let (console, mut device_end) = memory_pair("stray");
    let config = EngineConfig {
        heartbeat_interval: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let engine = Engine::spawn(console, config).unwrap();
    let handle = engine.handle();
    let mut panel = handle.watch_panel();

    // Channel 1 is in flight from 0.5 s to 1.1 s, so the probe due at 1.0 s
    // waits behind it.
    tokio::time::sleep_until(started + Duration::from_millis(500)).await;
    handle.enqueue(channel_frame(1), "channel 1").await.unwrap();

    tokio::time::sleep_until(started + Duration::from_millis(1050)).await;
    let reply = Frame::with_version(0x03, Command::Heartbeat, vec![0x01]).unwrap();
    device_end.write_all(&reply.encode(true)).await.unwrap();

    // The probe goes out at 1.1 s and is abandoned at 1.7 s, before the
    // next tick.
    tokio::time::timeout_at(
        started + Duration::from_millis(1950),
        panel.wait_for(|locked| *locked),
    )
    .await
    .expect("panel should lock when the queued probe is abandoned")
    .unwrap();

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn invalid_macro_sends_nothing() {
    let device = SimDevice::default();
    let (engine, handle) = start("invalid", &device, quiet_config());
    handle.query_status().await.unwrap();

    // Mode A is active, so F1 is refused when the mode is enforced.
    let file = MacroFile::parse("A,1,UP,0\nF1,2,DOWN,0\nZ,3,SIDEWAYS,0\n").unwrap();
    let err = BatchRunner::new(handle.clone())
        .run_file(&file, true)
        .await
        .unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert_eq!(errors.len(), 3);
    assert_eq!(device.received().len(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn channel_above_max_is_rejected() {
    let device = SimDevice::default();
    let (engine, handle) = start("max", &device, quiet_config());
    handle.query_status().await.unwrap();

    let err = handle.set_channel(101).await.unwrap_err();
    assert!(matches!(err, EngineError::Rejected(_)));
    handle.set_channel(100).await.unwrap();

    handle
        .select_access(AccessChannel::parse("C").unwrap())
        .await
        .unwrap();
    assert_eq!(device.status().access_channel, 2);
    assert_eq!(device.received().len(), 3);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn closed_link_fails_in_flight_and_holds_queue_until_reopen() {
    let (console, mut device_end) = memory_pair("reopen");
    let engine = Engine::spawn(console, quiet_config()).unwrap();
    let handle = engine.handle();
    let mut events = handle.subscribe();

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.submit(channel_frame(1), "first").await }
    });
    let mut wire = vec![0u8; channel_frame(1).encode(true).len()];
    device_end.read_exact(&mut wire).await.unwrap();
    handle.enqueue(channel_frame(2), "second").await.unwrap();
    drop(device_end);

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(TransportError::Closed)
    ));
    wait_for_log(&mut events, "held until the link is reopened").await;

    let err = handle.submit(channel_frame(3), "third").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(TransportError::Closed)
    ));

    let device = SimDevice::default();
    let (console, device_end) = memory_pair("reopen-2");
    device.spawn(device_end);
    handle.reopen(console).await.unwrap();
    handle.submit(channel_frame(4), "fourth").await.unwrap();

    let sent: Vec<Frame> = device.received();
    assert_eq!(sent, vec![channel_frame(2), channel_frame(4)]);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_config_is_refused() {
    let (console, _device_end) = memory_pair("config");
    let config = EngineConfig {
        max_attempts: 0,
        ..EngineConfig::default()
    };
    assert!(matches!(
        Engine::spawn(console, config),
        Err(EngineError::Config(_))
    ));
}
