use criterion::{Criterion, Throughput};
use minimqtt::mqtt::{
    InboundMessage, MqttClient, NullTransport, SessionRegistry, Transport, WireTransport,
    truncate_payload,
};
use minimqtt::network::error::Error;
use minimqtt::network::{Close, Connect, Connection, Read, Write};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::hint::black_box;
use std::rc::Rc;

/// An in-memory connection: reads drain `inbound`, writes are discarded.
struct MemConnection {
    inbound: Rc<RefCell<VecDeque<u8>>>,
}

impl Read for MemConnection {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut inbound = self.inbound.borrow_mut();
        let len = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MemConnection {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MemConnection {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MemConnection {}

struct MemNetwork {
    inbound: Rc<RefCell<VecDeque<u8>>>,
}

impl Connect for MemNetwork {
    type Connection = MemConnection;
    type Error = Error;

    fn connect(&mut self, _remote: &str) -> Result<Self::Connection, Self::Error> {
        Ok(MemConnection {
            inbound: self.inbound.clone(),
        })
    }
}

fn publish_packet(topic: &str, payload: &[u8], qos: u8) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    if qos > 0 {
        body.extend_from_slice(&1u16.to_be_bytes());
    }
    body.extend_from_slice(payload);

    let mut packet = vec![0x30 | (qos << 1)];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if len == 0 {
            break;
        }
    }
    packet.extend_from_slice(&body);
    packet
}

fn setup_wire() -> (WireTransport<MemNetwork>, Rc<RefCell<VecDeque<u8>>>) {
    let inbound = Rc::new(RefCell::new(VecDeque::new()));
    let mut transport = WireTransport::new(MemNetwork {
        inbound: inbound.clone(),
    });
    transport
        .set_server("bench.local", 1883)
        .expect("Failed to set server");
    inbound.borrow_mut().extend([0x20, 0x02, 0x00, 0x00]);
    transport
        .connect("minimqtt-bench", None)
        .expect("Failed to connect");
    (transport, inbound)
}

pub fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = b"hello world";
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let registry: SessionRegistry = SessionRegistry::new();
    let mut client = MqttClient::new(NullTransport::new(), &registry).expect("Failed to create client");
    client.begin("mqtt://bench.local").expect("Failed to begin");
    client.connect(Some("minimqtt-bench")).expect("Failed to connect");

    group.bench_function("null_transport", |b| {
        b.iter(|| {
            client
                .publish(black_box("minimqtt/bench"), black_box(payload), false)
                .expect("Failed to publish")
        })
    });

    let (mut transport, _inbound) = setup_wire();
    group.bench_function("wire_transport", |b| {
        b.iter(|| {
            transport
                .publish(black_box("minimqtt/bench"), black_box(payload), false)
                .expect("Failed to publish")
        })
    });
    group.finish();
}

pub fn bench_truncate(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate_payload");
    for len in [64usize, 511, 1024] {
        let payload = vec![b'x'; len];
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(format!("{len}_bytes"), |b| {
            b.iter(|| truncate_payload(black_box(&payload)))
        });
    }
    group.finish();
}

fn bench_poll(c: &mut Criterion, name: &str, qos: u8) {
    let mut group = c.benchmark_group(name);
    let payload = vec![b'x'; 256];
    let packet = publish_packet("minimqtt/bench", &payload, qos);
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let (mut transport, inbound) = setup_wire();
    group.bench_function("poll", |b| {
        b.iter(|| {
            inbound.borrow_mut().extend(packet.iter().copied());
            let mut delivered = 0;
            transport
                .poll(0, &mut |message: InboundMessage<'_>| delivered += message.payload.len())
                .expect("Failed to poll");
            black_box(delivered)
        })
    });
    group.finish();
}

pub fn bench_poll_qos0(c: &mut Criterion) {
    bench_poll(c, "poll_qos0", 0);
}

pub fn bench_poll_qos1(c: &mut Criterion) {
    bench_poll(c, "poll_qos1", 1);
}
