//! Integration tests for the polling loop, the one-shot check and the
//! register sweep, run against a scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use drivemon_client::client::DriveClient;
use drivemon_client::error::{Error, ReadErrorKind, Result};
use drivemon_client::poller::{DrivePoller, PollerState};
use drivemon_client::registers::{REG_LAST_FAULT, REG_STATUS_WORD};
use drivemon_client::status::{FaultCode, OperatingState};
use drivemon_client::stop::stop_channel;
use drivemon_client::sweep::RegisterSweep;
use drivemon_client::transport::Transport;

/// Shared state of the scripted transport, probed by tests after the
/// component under test has consumed the transport itself.
#[derive(Default)]
struct FakeState {
    connected: bool,
    connects: u32,
    disconnects: u32,
    /// Every (address, count) pair requested, in order.
    reads: Vec<(u16, u16)>,
    /// Scripted responses, consumed one per read. Once the script runs out,
    /// reads succeed with all-zero registers (a ready drive at standstill).
    responses: VecDeque<Result<Vec<u16>>>,
    fail_connect: bool,
}

#[derive(Clone)]
struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(Error::connection("fake", "No such file or directory"));
        }
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(Error::connection("fake", "transport not connected"));
        }
        state.reads.push((address, count));
        match state.responses.pop_front() {
            Some(response) => response,
            None => Ok(vec![0; count as usize]),
        }
    }
}

fn fake_drive() -> (FakeTransport, Arc<Mutex<FakeState>>) {
    let state = Arc::new(Mutex::new(FakeState::default()));
    let transport = FakeTransport {
        state: state.clone(),
    };
    (transport, state)
}

fn script(state: &Arc<Mutex<FakeState>>, responses: Vec<Result<Vec<u16>>>) {
    state.lock().unwrap().responses.extend(responses);
}

async fn next_update<T>(rx: &mut mpsc::Receiver<T>) -> T {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an update")
        .expect("update channel closed unexpectedly")
}

fn timeout_error(address: u16, count: u16) -> Error {
    Error::read(address, count, ReadErrorKind::Timeout(Duration::from_secs(2)))
}

#[tokio::test]
async fn test_poller_delivers_scaled_samples() {
    let (transport, state) = fake_drive();
    // 45.00 Hz, 5.2 A, running.
    script(&state, vec![Ok(vec![4500, 52]), Ok(vec![0x0004])]);

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(10));
    let (handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move {
        let result = poller.run(tx, token).await;
        (result, poller)
    });

    let sample = next_update(&mut rx).await.expect("first cycle failed");
    assert_eq!(sample.measurement.frequency_hz, 45.0);
    assert!((sample.measurement.current_a - 5.2).abs() < 1e-9);
    assert!(sample.status.running);
    assert!(!sample.status.faulted);
    assert_eq!(sample.status.operating_state(), OperatingState::Running);

    handle.stop();
    let (result, poller) = timeout(Duration::from_secs(2), worker)
        .await
        .expect("poller did not stop")
        .expect("poller task panicked");

    result.expect("polling failed");
    assert_eq!(poller.state(), PollerState::Stopped);

    let state = state.lock().unwrap();
    assert_eq!(state.connects, 1);
    assert_eq!(state.disconnects, 1);
    assert!(!state.connected);
}

#[tokio::test]
async fn test_fault_code_read_only_when_fault_bit_set() {
    let (transport, state) = fake_drive();
    // Fault latched with code 1 (overcurrent), drive stopped.
    script(&state, vec![Ok(vec![0, 0]), Ok(vec![0x0008]), Ok(vec![1])]);

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(10));
    let (handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { poller.run(tx, token).await });

    let sample = next_update(&mut rx).await.expect("first cycle failed");
    assert!(sample.status.faulted);
    assert_eq!(sample.status.fault_code, FaultCode(1));
    assert_eq!(sample.status.operating_state(), OperatingState::Faulted);

    handle.stop();
    timeout(Duration::from_secs(2), worker)
        .await
        .expect("poller did not stop")
        .expect("poller task panicked")
        .expect("polling failed");

    let state = state.lock().unwrap();
    assert_eq!(state.reads[0], (0, 2));
    assert_eq!(state.reads[1], (REG_STATUS_WORD, 1));
    assert_eq!(state.reads[2], (REG_LAST_FAULT, 1));
}

#[tokio::test]
async fn test_healthy_cycles_skip_the_fault_register() {
    let (transport, state) = fake_drive();

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(5));
    let (handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { poller.run(tx, token).await });

    // Two healthy cycles on the default all-zero script.
    let first = next_update(&mut rx).await.expect("first cycle failed");
    assert_eq!(first.status.operating_state(), OperatingState::Ready);
    assert!(!first.status.fault_code.is_available());
    next_update(&mut rx).await.expect("second cycle failed");

    handle.stop();
    timeout(Duration::from_secs(2), worker)
        .await
        .expect("poller did not stop")
        .expect("poller task panicked")
        .expect("polling failed");

    let state = state.lock().unwrap();
    assert!(
        !state.reads.iter().any(|&(addr, _)| addr == REG_LAST_FAULT),
        "fault register was read without the fault bit set"
    );
}

#[tokio::test]
async fn test_read_failure_skips_cycle_and_polling_continues() {
    let (transport, state) = fake_drive();
    // The status read of the first cycle times out, later cycles are healthy.
    script(&state, vec![Ok(vec![0, 0]), Err(timeout_error(REG_STATUS_WORD, 1))]);

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(5));
    let (handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { poller.run(tx, token).await });

    match next_update(&mut rx).await {
        Err(Error::Read {
            address,
            kind: ReadErrorKind::Timeout(_),
            ..
        }) => assert_eq!(address, REG_STATUS_WORD),
        other => panic!("expected a timeout read error, got {:?}", other),
    }

    // The loop survived the failed cycle.
    next_update(&mut rx).await.expect("next cycle failed");

    handle.stop();
    let result = timeout(Duration::from_secs(2), worker)
        .await
        .expect("poller did not stop")
        .expect("poller task panicked");
    result.expect("a skipped cycle must not end the loop");
}

#[tokio::test]
async fn test_connect_failure_is_fatal_before_any_read() {
    let (transport, state) = fake_drive();
    state.lock().unwrap().fail_connect = true;

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(5));
    let (_handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let err = poller.run(tx, token).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(poller.state(), PollerState::Stopped);

    assert!(rx.try_recv().is_err(), "no update may precede the failure");
    assert!(state.lock().unwrap().reads.is_empty());
}

#[tokio::test]
async fn test_stop_cuts_the_sleep_short() {
    let (transport, _state) = fake_drive();

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_secs(60));
    let (handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { poller.run(tx, token).await });

    next_update(&mut rx).await.expect("first cycle failed");
    handle.stop();

    // Stopping must not wait out the 60 s interval.
    timeout(Duration::from_secs(1), worker)
        .await
        .expect("stop request was not honored during the sleep")
        .expect("poller task panicked")
        .expect("polling failed");
}

#[tokio::test]
async fn test_dropped_receiver_stops_the_poller() {
    let (transport, state) = fake_drive();

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(1));
    let (_handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { poller.run(tx, token).await });

    next_update(&mut rx).await.expect("first cycle failed");
    drop(rx);

    timeout(Duration::from_secs(2), worker)
        .await
        .expect("poller did not notice the dropped receiver")
        .expect("poller task panicked")
        .expect("polling failed");

    assert_eq!(state.lock().unwrap().disconnects, 1);
}

#[tokio::test]
async fn test_stopped_poller_cannot_rerun() {
    let (transport, _state) = fake_drive();

    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, Duration::from_millis(1));

    // Stop requested before the first cycle: the loop exits cleanly without
    // emitting anything.
    let (handle, token) = stop_channel();
    handle.stop();
    let (tx, mut rx) = mpsc::channel(16);
    poller.run(tx, token).await.expect("run failed");
    assert_eq!(poller.state(), PollerState::Stopped);
    assert!(rx.try_recv().is_err());

    // Stopped is terminal.
    let (_handle, token) = stop_channel();
    let (tx, _rx) = mpsc::channel(16);
    let err = poller.run(tx, token).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_check_reports_and_releases_the_port() {
    let (transport, state) = fake_drive();
    // Running with a latched fault: the label stays RUNNING.
    script(&state, vec![Ok(vec![4500, 52]), Ok(vec![0x000C]), Ok(vec![2])]);

    let mut client = DriveClient::new(transport);
    let sample = client.check().await.expect("check failed");

    assert_eq!(sample.measurement.frequency_hz, 45.0);
    assert!(sample.status.running);
    assert!(sample.status.faulted);
    assert_eq!(sample.status.fault_code, FaultCode(2));
    assert_eq!(sample.status.operating_state(), OperatingState::Running);

    let state = state.lock().unwrap();
    assert_eq!(state.connects, 1);
    assert_eq!(state.disconnects, 1);
    assert!(!state.connected);
}

#[tokio::test]
async fn test_check_releases_the_port_on_read_failure() {
    let (transport, state) = fake_drive();
    script(&state, vec![Err(timeout_error(0, 2))]);

    let mut client = DriveClient::new(transport);
    let err = client.check().await.unwrap_err();
    assert!(matches!(err, Error::Read { .. }));

    let state = state.lock().unwrap();
    assert_eq!(state.disconnects, 1);
    assert!(!state.connected);
}

#[tokio::test]
async fn test_check_connect_failure_reads_nothing() {
    let (transport, state) = fake_drive();
    state.lock().unwrap().fail_connect = true;

    let mut client = DriveClient::new(transport);
    let err = client.check().await.unwrap_err();
    assert!(err.is_fatal());

    let state = state.lock().unwrap();
    assert!(state.reads.is_empty());
    assert_eq!(state.disconnects, 0);
}

#[tokio::test]
async fn test_sweep_walks_the_range_in_order() {
    let (transport, state) = fake_drive();

    let client = DriveClient::new(transport);
    let mut sweep = RegisterSweep::new(client, 0..=2, Duration::from_millis(1));
    let (_handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { sweep.run(tx, token).await });

    for expected in 0..=2u16 {
        let entry = next_update(&mut rx).await.expect("sweep step failed");
        assert_eq!(entry.address, expected);
        assert_eq!(entry.value, 0);
        assert_eq!(entry.status.operating_state(), OperatingState::Ready);
    }

    timeout(Duration::from_secs(2), worker)
        .await
        .expect("sweep did not finish")
        .expect("sweep task panicked")
        .expect("sweep failed");

    let state = state.lock().unwrap();
    assert_eq!(state.reads[0], (0, 1));
    assert_eq!(state.reads[1], (REG_STATUS_WORD, 1));
    assert_eq!(state.reads[2], (1, 1));
    assert_eq!(state.disconnects, 1);
}

#[tokio::test]
async fn test_sweep_aborts_when_the_drive_faults() {
    let (transport, state) = fake_drive();
    // First step sees a latched fault on a stopped drive.
    script(&state, vec![Ok(vec![7]), Ok(vec![0x0008]), Ok(vec![9])]);

    let client = DriveClient::new(transport);
    let mut sweep = RegisterSweep::new(client, 0..=10, Duration::from_millis(1));
    let (_handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { sweep.run(tx, token).await });

    let entry = next_update(&mut rx).await.expect("first step failed");
    assert_eq!(entry.address, 0);
    assert_eq!(entry.value, 7);
    assert_eq!(entry.status.fault_code, FaultCode(9));
    assert_eq!(entry.status.operating_state(), OperatingState::Faulted);

    timeout(Duration::from_secs(2), worker)
        .await
        .expect("sweep did not abort")
        .expect("sweep task panicked")
        .expect("sweep failed");

    // The faulting entry is delivered, nothing after it.
    assert!(rx.recv().await.is_none());
    assert_eq!(state.lock().unwrap().reads.len(), 3);
}

#[tokio::test]
async fn test_sweep_continues_while_the_drive_runs_with_a_latched_fault() {
    let (transport, state) = fake_drive();
    // Running and faulted at once shows RUNNING, which does not abort.
    script(&state, vec![Ok(vec![7]), Ok(vec![0x000C]), Ok(vec![2])]);

    let client = DriveClient::new(transport);
    let mut sweep = RegisterSweep::new(client, 0..=3, Duration::from_millis(1));
    let (_handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { sweep.run(tx, token).await });

    let first = next_update(&mut rx).await.expect("first step failed");
    assert!(first.status.faulted);
    assert_eq!(first.status.operating_state(), OperatingState::Running);

    let second = next_update(&mut rx).await.expect("second step failed");
    assert_eq!(second.address, 1);

    timeout(Duration::from_secs(2), worker)
        .await
        .expect("sweep did not finish")
        .expect("sweep task panicked")
        .expect("sweep failed");
}

#[tokio::test]
async fn test_sweep_skips_a_failed_step() {
    let (transport, state) = fake_drive();
    script(&state, vec![Err(timeout_error(0, 1))]);

    let client = DriveClient::new(transport);
    let mut sweep = RegisterSweep::new(client, 0..=1, Duration::from_millis(1));
    let (_handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { sweep.run(tx, token).await });

    match next_update(&mut rx).await {
        Err(Error::Read { address, .. }) => assert_eq!(address, 0),
        other => panic!("expected a read error, got {:?}", other),
    }

    let entry = next_update(&mut rx).await.expect("second step failed");
    assert_eq!(entry.address, 1);

    timeout(Duration::from_secs(2), worker)
        .await
        .expect("sweep did not finish")
        .expect("sweep task panicked")
        .expect("sweep failed");
}

#[tokio::test]
async fn test_sweep_stops_on_request() {
    let (transport, _state) = fake_drive();

    let client = DriveClient::new(transport);
    let mut sweep = RegisterSweep::new(client, 0..=1000, Duration::from_secs(60));
    let (handle, token) = stop_channel();
    let (tx, mut rx) = mpsc::channel(16);

    let worker = tokio::spawn(async move { sweep.run(tx, token).await });

    next_update(&mut rx).await.expect("first step failed");
    handle.stop();

    timeout(Duration::from_secs(1), worker)
        .await
        .expect("stop request was not honored during the sleep")
        .expect("sweep task panicked")
        .expect("sweep failed");
}
