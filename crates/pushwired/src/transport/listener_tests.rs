//! Tests for the socket listener.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::listener::{ListenerSettings, SocketListener, StopMode};
use super::test_utils::{CountingHandler, GatedHandler, wait_until};
use super::{ConnectionHandler, ListenerError};

#[fixture]
fn loopback() -> ListenerSettings {
    ListenerSettings::new("127.0.0.1", 0)
}

#[rstest]
fn tcp_listener_accepts_connections(loopback: ListenerSettings) {
    let listener = SocketListener::bind(&loopback).expect("bind tcp listener");
    let addr = listener.local_addr();
    let (count, handler) = CountingHandler::new();
    let handler: Arc<dyn ConnectionHandler> = handler;
    let handle = listener.start(handler).expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(
        wait_until(|| count.load(Ordering::SeqCst) >= 2),
        "expected two connections"
    );
    handle.stop(StopMode::Immediate).expect("stop listener");
}

#[rstest]
fn bind_fails_when_port_is_taken() {
    let reserved = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
    let port = reserved.local_addr().expect("reserved addr").port();

    let error = SocketListener::bind(&ListenerSettings::new("127.0.0.1", port))
        .expect_err("bind should fail");
    assert!(
        matches!(error, ListenerError::Bind { .. }),
        "unexpected error: {error}"
    );
}

#[rstest]
fn bind_fails_for_unresolvable_host() {
    let error = SocketListener::bind(&ListenerSettings::new("pushwire.invalid", 0))
        .expect_err("resolution should fail");
    assert!(
        matches!(
            error,
            ListenerError::Resolve { .. } | ListenerError::ResolveEmpty { .. }
        ),
        "unexpected error: {error}"
    );
}

#[rstest]
#[case(StopMode::Immediate)]
#[case(StopMode::Graceful { drain_timeout: Duration::from_secs(1) })]
fn stop_is_prompt_without_new_connections(loopback: ListenerSettings, #[case] mode: StopMode) {
    let listener = SocketListener::bind(&loopback).expect("bind tcp listener");
    let addr = listener.local_addr();
    let (_, handler) = CountingHandler::new();
    let handle = listener.start(handler).expect("start listener");

    let started = Instant::now();
    handle.stop(mode).expect("stop listener");
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "stop took {:?}",
        started.elapsed()
    );
    assert!(
        wait_until(|| TcpStream::connect(addr).is_err()),
        "listening socket should be closed after stop"
    );
}

#[rstest]
fn immediate_stop_abandons_running_handlers(loopback: ListenerSettings) {
    let listener = SocketListener::bind(&loopback).expect("bind tcp listener");
    let addr = listener.local_addr();
    let gated = GatedHandler::new();
    let handle = listener
        .start(Arc::clone(&gated) as Arc<dyn ConnectionHandler>)
        .expect("start listener");

    let _client = TcpStream::connect(addr).expect("connect client");
    assert!(wait_until(|| gated.entered() == 1), "handler should start");
    assert_eq!(handle.active_connections(), 1);

    let started = Instant::now();
    handle.stop(StopMode::Immediate).expect("stop listener");
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(gated.finished(), 0, "handler should still be running");

    gated.release();
    assert!(wait_until(|| gated.finished() == 1));
}

#[rstest]
fn graceful_stop_waits_for_running_handlers(loopback: ListenerSettings) {
    let listener = SocketListener::bind(&loopback).expect("bind tcp listener");
    let addr = listener.local_addr();
    let gated = GatedHandler::new();
    let handle = listener
        .start(Arc::clone(&gated) as Arc<dyn ConnectionHandler>)
        .expect("start listener");

    let _client = TcpStream::connect(addr).expect("connect client");
    assert!(wait_until(|| gated.entered() == 1), "handler should start");

    let releaser = {
        let gated = Arc::clone(&gated);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            gated.release();
        })
    };
    handle
        .stop(StopMode::Graceful {
            drain_timeout: Duration::from_secs(2),
        })
        .expect("stop listener");

    assert_eq!(gated.finished(), 1, "graceful stop should drain handlers");
    releaser.join().expect("join releaser");
}

#[rstest]
fn admission_gate_defers_connections_beyond_the_limit(loopback: ListenerSettings) {
    let settings = loopback.with_max_connections(1);
    let listener = SocketListener::bind(&settings).expect("bind tcp listener");
    let addr = listener.local_addr();
    let gated = GatedHandler::new();
    let handle = listener
        .start(Arc::clone(&gated) as Arc<dyn ConnectionHandler>)
        .expect("start listener");

    let _first = TcpStream::connect(addr).expect("connect first client");
    assert!(wait_until(|| gated.entered() == 1));
    let _second = TcpStream::connect(addr).expect("second client waits in backlog");

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(gated.entered(), 1, "second handler must wait for a slot");
    assert_eq!(handle.active_connections(), 1);

    gated.release();
    assert!(
        wait_until(|| gated.entered() == 2),
        "second connection should be served once the first finishes"
    );
    handle
        .stop(StopMode::Graceful {
            drain_timeout: Duration::from_secs(2),
        })
        .expect("stop listener");
}

#[rstest]
fn read_timeout_is_applied_to_accepted_streams(loopback: ListenerSettings) {
    struct TimeoutRecorder {
        observed: std::sync::Mutex<Option<Option<Duration>>>,
    }

    impl ConnectionHandler for TimeoutRecorder {
        fn handle(&self, stream: TcpStream) {
            let timeout = stream.read_timeout().ok().flatten();
            *self.observed.lock().expect("recorder mutex") = Some(timeout);
        }
    }

    let settings = loopback.with_read_timeout(Some(Duration::from_millis(750)));
    let listener = SocketListener::bind(&settings).expect("bind tcp listener");
    let addr = listener.local_addr();
    let recorder = Arc::new(TimeoutRecorder {
        observed: std::sync::Mutex::new(None),
    });
    let handle = listener
        .start(Arc::clone(&recorder) as Arc<dyn ConnectionHandler>)
        .expect("start listener");

    let _client = TcpStream::connect(addr).expect("connect client");
    assert!(wait_until(|| recorder
        .observed
        .lock()
        .expect("recorder mutex")
        .is_some()));
    assert_eq!(
        *recorder.observed.lock().expect("recorder mutex"),
        Some(Some(Duration::from_millis(750)))
    );
    handle.stop(StopMode::Immediate).expect("stop listener");
}
