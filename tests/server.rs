//! End-to-end tests against a real server on a loopback port.

use std::{
    io::{ErrorKind, Read, Write},
    net::TcpStream,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use frost::{
    Server, ServerConfig, ServerError,
    protocol::{ProtocolTransport, Request, Response},
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a server on an ephemeral port in a background thread.
struct Harness {
    server: Arc<Server>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl Harness {
    fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default())
    }

    fn spawn_with(config: ServerConfig) -> Self {
        let server = Arc::new(Server::bind("127.0.0.1:0", config).unwrap());
        let handle = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.start())
        };
        Self { server, handle }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.server.local_addr()).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        stream
    }

    fn client(&self) -> ProtocolTransport<TcpStream> {
        ProtocolTransport::new(self.connect())
    }

    fn wait_for_clients(&self, n: usize) {
        let start = Instant::now();
        while self.server.clients() != n {
            assert!(start.elapsed() < TIMEOUT, "timeout waiting for {n} clients");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn shutdown(self) {
        self.server.stop().unwrap();
        self.handle.join().unwrap().unwrap();
    }
}

fn call(client: &mut ProtocolTransport<TcpStream>, args: &[&str]) -> Response {
    client.write_request(&Request::from_args(args)).unwrap();
    client.read_response().unwrap()
}

/// The server closed its end: EOF, or a reset if it dropped unread bytes.
fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert!(
            !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
            "connection still open"
        ),
    }
}

fn exchange(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).unwrap();
    let mut reply = vec![0; expected.len()];
    stream.read_exact(&mut reply).unwrap();
    assert_eq!(
        String::from_utf8_lossy(&reply),
        String::from_utf8_lossy(expected)
    );
}

#[test]
fn set_then_get_raw_bytes() {
    let harness = Harness::spawn();
    let mut stream = harness.connect();

    exchange(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    );
    exchange(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n",
        b"$3\r\nbar\r\n",
    );

    harness.shutdown();
}

#[test]
fn binary_value_round_trips() {
    let harness = Harness::spawn();
    let mut stream = harness.connect();

    exchange(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\n\xff\xfe\r\n",
        b"+OK\r\n",
    );

    let mut client = harness.client();
    let get: [&[u8]; 2] = [b"GET", b"k"];
    client.write_request(&Request::from_args(get)).unwrap();
    assert_eq!(client.read_response().unwrap(), Response::Bulk(vec![0xff, 0xfe]));
    assert_eq!(harness.server.store().get(b"k"), Some(vec![0xff, 0xfe]));

    harness.shutdown();
}

#[test]
fn get_missing_key_is_null() {
    let harness = Harness::spawn();
    let mut stream = harness.connect();

    exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n", b"_\r\n");

    harness.shutdown();
}

#[test]
fn arity_error_keeps_connection_open() {
    let harness = Harness::spawn();
    let mut client = harness.client();

    assert!(matches!(call(&mut client, &["GET"]), Response::Err(_)));
    assert_eq!(call(&mut client, &["SET", "k", "v"]), Response::Ok);
    assert_eq!(call(&mut client, &["get", "k"]), Response::Bulk(b"v".to_vec()));

    harness.shutdown();
}

#[test]
fn unknown_command_is_rejected() {
    let harness = Harness::spawn();
    let mut client = harness.client();

    assert_eq!(
        call(&mut client, &["PING"]),
        Response::error("unknown command 'PING'")
    );
    assert_eq!(call(&mut client, &["GET", "x"]), Response::Null);

    harness.shutdown();
}

#[test]
fn last_write_wins_across_connections() {
    let harness = Harness::spawn();
    let mut first = harness.client();
    let mut second = harness.client();

    assert_eq!(call(&mut first, &["SET", "k", "v1"]), Response::Ok);
    assert_eq!(call(&mut second, &["SET", "k", "v2"]), Response::Ok);
    assert_eq!(call(&mut first, &["GET", "k"]), Response::Bulk(b"v2".to_vec()));

    harness.shutdown();
}

#[test]
fn concurrent_clients_on_disjoint_keys() {
    let harness = Harness::spawn();

    let writers = (0..8)
        .map(|i| {
            let mut client = harness.client();
            thread::spawn(move || {
                for n in 0..50 {
                    let key = format!("key-{i}");
                    let value = format!("value-{i}-{n}");
                    let reply = call(&mut client, &["SET", key.as_str(), value.as_str()]);
                    assert_eq!(reply, Response::Ok);
                }
            })
        })
        .collect::<Vec<_>>();
    for writer in writers {
        writer.join().unwrap();
    }

    let mut client = harness.client();
    for i in 0..8 {
        assert_eq!(
            call(&mut client, &["GET", format!("key-{i}").as_str()]),
            Response::Bulk(format!("value-{i}-49").into_bytes())
        );
    }
    assert_eq!(harness.server.store().len(), 8);

    harness.shutdown();
}

#[test]
fn malformed_frame_only_drops_offender() {
    let harness = Harness::spawn();
    let mut good = harness.client();
    let mut bad = harness.connect();

    bad.write_all(b"*1\r\n$-5\r\n").unwrap();
    assert_closed(&mut bad);

    assert_eq!(call(&mut good, &["SET", "still", "here"]), Response::Ok);

    harness.shutdown();
}

#[test]
fn oversized_count_is_rejected() {
    let harness = Harness::spawn();
    let mut stream = harness.connect();

    stream.write_all(b"*1000000000\r\n").unwrap();
    assert_closed(&mut stream);

    harness.shutdown();
}

#[test]
fn idle_client_is_disconnected() {
    let config = ServerConfig::default().with_read_timeout(Some(Duration::from_millis(100)));
    let harness = Harness::spawn_with(config);
    let mut stream = harness.connect();
    harness.wait_for_clients(1);

    assert_closed(&mut stream);
    harness.wait_for_clients(0);

    harness.shutdown();
}

#[test]
fn client_disconnect_is_deregistered() {
    let harness = Harness::spawn();
    let client = harness.connect();
    harness.wait_for_clients(1);

    drop(client);
    harness.wait_for_clients(0);

    harness.shutdown();
}

#[test]
fn start_twice_fails() {
    let harness = Harness::spawn();
    let mut client = harness.client();
    assert_eq!(call(&mut client, &["SET", "a", "b"]), Response::Ok);

    assert!(matches!(
        harness.server.start(),
        Err(ServerError::AlreadyStarted)
    ));
    assert_eq!(call(&mut client, &["GET", "a"]), Response::Bulk(b"b".to_vec()));

    harness.shutdown();
}

#[test]
fn stop_closes_clients_and_listener() {
    let harness = Harness::spawn();
    let address = harness.server.local_addr();
    let mut clients = (0..4).map(|_| harness.connect()).collect::<Vec<_>>();
    harness.wait_for_clients(4);

    harness.server.stop().unwrap();

    for client in &mut clients {
        assert_closed(client);
    }
    assert_eq!(harness.server.clients(), 0);
    assert!(TcpStream::connect(address).is_err());

    assert!(matches!(
        harness.server.stop(),
        Err(ServerError::AlreadyStopped)
    ));
    harness.handle.join().unwrap().unwrap();
}

#[test]
fn concurrent_stops_succeed_once() {
    let harness = Harness::spawn();
    let _clients = (0..3).map(|_| harness.connect()).collect::<Vec<_>>();
    harness.wait_for_clients(3);

    let stoppers = (0..4)
        .map(|_| {
            let server = Arc::clone(&harness.server);
            thread::spawn(move || server.stop().is_ok())
        })
        .collect::<Vec<_>>();
    let succeeded = stoppers
        .into_iter()
        .map(|s| s.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 1);
    harness.handle.join().unwrap().unwrap();
}
