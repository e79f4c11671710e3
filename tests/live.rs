//! Round trip against a real broker. Run with `cargo test -- --ignored`.

use dotenvy::dotenv;
use minimqtt::mqtt::{MqttClient, QoS, SessionRegistry, WireTransport};
use minimqtt::network::error::Error;
use minimqtt::network::{Close, Connect, Connection, Read, Write};
use rand::Rng;
use std::cell::RefCell;
use std::env;
use std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use std::net::TcpStream;
use std::time::{Duration, Instant};

struct NetConnection {
    stream: TcpStream,
}

impl Read for NetConnection {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.stream.read(buf) {
            // std reports end of stream as `Ok(0)`.
            Ok(0) if !buf.is_empty() => Err(Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) => match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => Err(Error::Timeout),
                _ => Err(Error::ReadError),
            },
        }
    }
}

impl Write for NetConnection {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Close for NetConnection {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        self.stream
            .shutdown(std::net::Shutdown::Both)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Connection for NetConnection {}

struct NetNetwork;

impl Connect for NetNetwork {
    type Connection = NetConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let stream = TcpStream::connect(remote).map_err(|_| Error::ConnectionRefused)?;
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .map_err(|_| Error::ConnectionRefused)?;
        Ok(NetConnection { stream })
    }
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_round_trip_with_public_broker() {
    dotenv().ok();
    let address = env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string());
    let suffix: u32 = rand::thread_rng().r#gen();
    let client_id = format!("minimqtt-test-{suffix}");
    let topic = format!("minimqtt/test/{suffix}");

    let received = RefCell::new(Vec::new());
    let mut on_message = |topic: &str, payload: &str| {
        received
            .borrow_mut()
            .push((topic.to_string(), payload.to_string()))
    };
    let registry: SessionRegistry = SessionRegistry::new();
    let mut client = MqttClient::new(WireTransport::new(NetNetwork), &registry).unwrap();
    client.on_message(&mut on_message);

    client.begin(&address).unwrap();
    client.connect(Some(&client_id)).unwrap();
    client.subscribe(&topic, QoS::AtMostOnce).unwrap();

    let start = Instant::now();
    let mut published = false;
    while received.borrow().is_empty() && start.elapsed() < Duration::from_secs(10) {
        let now_ms = start.elapsed().as_millis() as u64;
        client.poll(now_ms).unwrap();
        if !published && start.elapsed() > Duration::from_millis(500) {
            client.publish(&topic, b"hello from minimqtt", false).unwrap();
            published = true;
        }
    }

    assert_eq!(
        received.borrow().first(),
        Some(&(topic.clone(), "hello from minimqtt".to_string()))
    );
    client.disconnect();
}
