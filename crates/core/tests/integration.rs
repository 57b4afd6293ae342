//! Integration tests against a fake camera.
//!
//! The fake camera serves the control endpoint (recording every command
//! method) and hands out one scripted liveview body per stream connection.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use liveview::protocol::encode;
use liveview::{Client, ClientConfig, ClientState, Frame, LiveviewError, ReconnectPolicy};
use parking_lot::Mutex;

/// How one liveview connection is served.
enum Script {
    /// Write the bytes with no body framing, then close.
    Close(Vec<u8>),
    /// Write the bytes as a chunked body in uneven chunks, then close.
    Chunked(Vec<u8>),
    /// Write the bytes, then keep the connection open until the client
    /// goes away.
    Hold(Vec<u8>),
    /// Accept the request but never answer it.
    Silent,
}

/// How a failing command is answered.
#[derive(Clone, Copy)]
enum Failure {
    CameraError,
    HttpStatus(u16),
}

#[derive(Default)]
struct CameraState {
    commands: Vec<String>,
    scripts: VecDeque<Script>,
    failure: Option<(&'static str, Failure)>,
}

#[derive(Clone)]
struct FakeCamera {
    addr: SocketAddr,
    state: Arc<Mutex<CameraState>>,
}

impl FakeCamera {
    fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake camera");
        let addr = listener.local_addr().unwrap();
        let camera = FakeCamera {
            addr,
            state: Arc::new(Mutex::new(CameraState::default())),
        };

        let state = camera.state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let state = state.clone();
                thread::spawn(move || serve(stream, state));
            }
        });

        camera
    }

    fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    fn push_stream(&self, script: Script) {
        self.state.lock().scripts.push_back(script);
    }

    fn fail(&self, method: &'static str, failure: Failure) {
        self.state.lock().failure = Some((method, failure));
    }

    fn pending_streams(&self) -> usize {
        self.state.lock().scripts.len()
    }

    fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }
}

fn serve(stream: TcpStream, state: Arc<Mutex<CameraState>>) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        if line == "\r\n" {
            break;
        }
        if let Some(v) = line.to_lowercase().strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap();
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/sony/camera") => {
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(request["params"], serde_json::json!([]));
            assert_eq!(request["id"], 1);
            assert_eq!(request["version"], "1.0");
            let command = request["method"].as_str().unwrap().to_string();

            let failure = {
                let mut state = state.lock();
                state.commands.push(command.clone());
                state
                    .failure
                    .filter(|(m, _)| *m == command)
                    .map(|(_, f)| f)
            };

            match failure {
                None => respond(&mut writer, 200, r#"{"result":[0],"id":1}"#),
                Some(Failure::CameraError) => {
                    respond(&mut writer, 200, r#"{"error":[40401,"Camera Not Ready"],"id":1}"#)
                }
                Some(Failure::HttpStatus(status)) => respond(&mut writer, status, ""),
            }
        }
        ("GET", "/liveview/liveviewstream") => {
            let script = state.lock().scripts.pop_front();
            match script {
                None => respond(&mut writer, 503, ""),
                Some(Script::Close(bytes)) => {
                    let _ = writer.write_all(b"HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nConnection: close\r\n\r\n");
                    let _ = writer.write_all(&bytes);
                }
                Some(Script::Chunked(bytes)) => {
                    let _ = writer.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
                    let sizes = [7usize, 50, 200, 1];
                    let mut offset = 0;
                    let mut i = 0;
                    while offset < bytes.len() {
                        let end = (offset + sizes[i % sizes.len()]).min(bytes.len());
                        let chunk = &bytes[offset..end];
                        let _ = write!(writer, "{:x}\r\n", chunk.len());
                        let _ = writer.write_all(chunk);
                        let _ = writer.write_all(b"\r\n");
                        offset = end;
                        i += 1;
                    }
                    let _ = writer.write_all(b"0\r\n\r\n");
                }
                Some(Script::Silent) => {
                    let mut sink = [0u8; 64];
                    while matches!(reader.read(&mut sink), Ok(n) if n > 0) {}
                }
                Some(Script::Hold(bytes)) => {
                    let _ = writer.write_all(b"HTTP/1.1 200 OK\r\n\r\n");
                    let _ = writer.write_all(&bytes);
                    let mut sink = [0u8; 64];
                    while matches!(reader.read(&mut sink), Ok(n) if n > 0) {}
                }
            }
        }
        _ => respond(&mut writer, 404, ""),
    }
}

fn respond(writer: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Error",
    };
    let _ = write!(
        writer,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
}

fn test_config() -> ClientConfig {
    ClientConfig {
        connect_timeout: Duration::from_secs(2),
        control_timeout: Duration::from_secs(2),
        stream_read_timeout: Some(Duration::from_secs(5)),
        reconnect: ReconnectPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
            jitter: 0.0,
            max_retries: Some(5),
        },
        ..ClientConfig::default()
    }
}

fn jpeg(seed: u8, len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend((0..len).map(|i| seed.wrapping_add(i as u8)));
    data.extend([0xFF, 0xD9]);
    data
}

#[test]
fn start_enables_rec_mode_then_liveview() {
    let camera = FakeCamera::spawn();
    let client = Client::start_with_config(&camera.url(), test_config()).expect("start");

    assert_eq!(camera.commands(), vec!["startRecMode", "startLiveview"]);
    assert_eq!(client.state(), ClientState::Ready);
    assert_eq!(client.url().port(), camera.addr.port());
}

#[test]
fn start_aborts_on_camera_error() {
    let camera = FakeCamera::spawn();
    camera.fail("startRecMode", Failure::CameraError);

    match Client::start_with_config(&camera.url(), test_config()) {
        Err(LiveviewError::Control { method, code, .. }) => {
            assert_eq!(method, "startRecMode");
            assert_eq!(code, 40401);
        }
        Err(other) => panic!("expected control error, got {:?}", other),
        Ok(_) => panic!("start should fail"),
    }
    assert_eq!(camera.commands(), vec!["startRecMode"]);
}

#[test]
fn start_aborts_on_http_error() {
    let camera = FakeCamera::spawn();
    camera.fail("startLiveview", Failure::HttpStatus(500));

    assert!(matches!(
        Client::start_with_config(&camera.url(), test_config()),
        Err(LiveviewError::HttpStatus { status: 500, .. })
    ));
}

#[test]
fn start_fails_when_camera_unreachable() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let result = Client::start_with_config(&format!("http://{}", addr), test_config());
    assert!(matches!(result, Err(LiveviewError::Io(_))));
}

#[test]
fn decodes_frames_from_chunked_stream() {
    let camera = FakeCamera::spawn();
    let first = jpeg(1, 300);
    let second = jpeg(2, 5);

    let mut body = encode::frame_info(1, 0, 0);
    body.extend(encode::image_frame(2, 33, &first, 3));
    body.extend(encode::frame_info(3, 66, 5));
    body.extend(encode::image_frame(4, 99, &second, 0));
    camera.push_stream(Script::Chunked(body));

    let mut client = Client::start_with_config(&camera.url(), test_config()).unwrap();
    client.connect().expect("connect");
    assert_eq!(client.state(), ClientState::Streaming);

    assert_eq!(client.fetch_frame().unwrap(), None);
    let frame = client.next_frame().unwrap();
    assert_eq!(frame.sequence, 2);
    assert_eq!(frame.timestamp, 33);
    assert_eq!(frame.jpeg, first);

    let frame = client.next_frame().unwrap();
    assert_eq!(frame.sequence, 4);
    assert_eq!(frame.jpeg, second);
    assert_eq!(client.last_header().map(|h| h.sequence), Some(4));

    // Terminating chunk ends the body: a short read on the next header.
    assert!(matches!(client.fetch_frame(), Err(LiveviewError::Io(_))));
    assert_eq!(client.state(), ClientState::Ready);
}

#[test]
fn reconnect_after_truncated_stream_starts_fresh() {
    let camera = FakeCamera::spawn();

    let mut broken = encode::image_frame(1, 0, &jpeg(1, 10), 0);
    let partial = encode::image_frame(2, 33, &jpeg(2, 100), 0);
    broken.extend_from_slice(&partial[..partial.len() / 2]);
    camera.push_stream(Script::Close(broken));
    camera.push_stream(Script::Close(encode::image_frame(100, 5000, &jpeg(3, 10), 2)));

    let mut client = Client::start_with_config(&camera.url(), test_config()).unwrap();
    client.connect().unwrap();
    assert_eq!(client.next_frame().unwrap().sequence, 1);

    let err = client.next_frame().unwrap_err();
    assert!(err.is_stream_fault(), "unexpected error: {:?}", err);
    assert_eq!(client.state(), ClientState::Ready);
    assert!(matches!(client.fetch_frame(), Err(LiveviewError::NotConnected)));

    client.connect().unwrap();
    let frame = client.next_frame().unwrap();
    assert_eq!(frame.sequence, 100);
    assert_eq!(frame.jpeg, jpeg(3, 10));
}

#[test]
fn connect_reports_http_status_when_stream_unavailable() {
    let camera = FakeCamera::spawn();
    let mut client = Client::start_with_config(&camera.url(), test_config()).unwrap();

    match client.connect() {
        Err(e @ LiveviewError::HttpStatus { status: 503, .. }) => assert!(e.is_stream_fault()),
        other => panic!("expected 503, got {:?}", other),
    }
    assert_eq!(client.state(), ClientState::Ready);
}

#[test]
fn run_reconnects_and_feeds_sink() {
    let camera = FakeCamera::spawn();

    let mut first = encode::image_frame(1, 0, &jpeg(1, 20), 1);
    first.extend_from_slice(&[0xFF, 0x01, 0x00]);
    camera.push_stream(Script::Close(first));

    let mut bad_marker = encode::image_frame(9, 0, &jpeg(9, 20), 0);
    bad_marker[8] = 0x00;
    camera.push_stream(Script::Close(bad_marker));

    let mut second = encode::frame_info(2, 10, 0);
    second.extend(encode::image_frame(3, 20, &jpeg(3, 20), 0));
    second.extend(encode::image_frame(4, 30, &jpeg(4, 20), 0));
    camera.push_stream(Script::Chunked(second));

    let mut client = Client::start_with_config(&camera.url(), test_config()).unwrap();

    let mut seen = Vec::new();
    let mut sink = |frame: Frame| {
        seen.push(frame.sequence);
        if seen.len() == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    client.run(&mut sink).expect("run");

    assert_eq!(seen, vec![1, 3, 4]);
    assert_eq!(client.state(), ClientState::Ready);
}

#[test]
fn run_gives_up_after_max_retries() {
    let camera = FakeCamera::spawn();
    let mut config = test_config();
    config.reconnect.max_retries = Some(2);

    let mut client = Client::start_with_config(&camera.url(), config).unwrap();
    let mut sink = |_: Frame| ControlFlow::Continue(());

    match client.run(&mut sink) {
        Err(LiveviewError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, LiveviewError::HttpStatus { status: 503, .. }));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[test]
fn stop_handle_interrupts_blocked_read() {
    let camera = FakeCamera::spawn();
    camera.push_stream(Script::Hold(encode::image_frame(1, 0, &jpeg(1, 64), 0)));

    let mut client = Client::start_with_config(&camera.url(), test_config()).unwrap();
    let stop = client.stop_handle();

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let mut sink = |frame: Frame| {
            let _ = tx.send(frame.sequence);
            ControlFlow::Continue(())
        };
        let result = client.run(&mut sink);
        (client, result)
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    stop.stop();
    assert!(stop.is_stopped());

    let (mut client, result) = worker.join().unwrap();
    result.expect("run exits cleanly after stop");

    client.stop();
    assert_eq!(client.state(), ClientState::Stopped);
    assert_eq!(camera.commands().last().map(String::as_str), Some("stopLiveview"));
    assert!(matches!(client.fetch_frame(), Err(LiveviewError::Stopped)));
    assert!(matches!(client.connect(), Err(LiveviewError::Stopped)));
}

#[test]
fn stop_handle_interrupts_connect_waiting_for_response() {
    let camera = FakeCamera::spawn();
    camera.push_stream(Script::Silent);

    let config = ClientConfig {
        stream_read_timeout: None,
        ..test_config()
    };
    let mut client = Client::start_with_config(&camera.url(), config).unwrap();
    let stop = client.stop_handle();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut sink = |_: Frame| ControlFlow::Continue(());
        let result = client.run(&mut sink);
        let _ = tx.send(result);
    });

    for _ in 0..500 {
        if camera.pending_streams() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(camera.pending_streams(), 0, "stream request never arrived");
    stop.stop();

    let result = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("run returns after stop while connecting");
    result.expect("run exits cleanly after stop");
}

#[test]
fn stop_completes_when_stop_liveview_fails() {
    let camera = FakeCamera::spawn();
    camera.fail("stopLiveview", Failure::HttpStatus(500));
    camera.push_stream(Script::Hold(Vec::new()));

    let mut client = Client::start_with_config(&camera.url(), test_config()).unwrap();
    client.connect().unwrap();

    client.stop();
    assert_eq!(client.state(), ClientState::Stopped);
    assert_eq!(
        camera.commands(),
        vec!["startRecMode", "startLiveview", "stopLiveview"]
    );

    // Second stop is a no-op.
    client.stop();
    assert_eq!(camera.commands().len(), 3);
}
