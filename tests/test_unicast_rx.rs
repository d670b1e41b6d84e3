use someip_stack::codec::{MessageId, MessageType, RequestId, ReturnCode, SessionHandling, SomeIpHeader};
use someip_stack::diagnostics::{ErrorKind, ErrorReportBuffer};
use someip_stack::message::{MessageBuilder, TxPool};
use someip_stack::runtime::config::{InstanceConfig, ServiceConfig};
use someip_stack::runtime::process::{RxContext, process_unicast};
use someip_stack::service::{LocalServiceRegistry, MethodHandler, Request};
use someip_stack::transport::RecordingTransport;
use someip_stack::SomeIpRuntime;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const CLIENT: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 9), 40000);

fn request(service_id: u16, method_id: u16, interface_version: u8, payload: &[u8]) -> Vec<u8> {
    let mut header = SomeIpHeader::new(
        MessageId::new(service_id, method_id),
        RequestId::new(0x0001, 0x0001),
        interface_version,
        MessageType::Request,
        ReturnCode::Ok,
    );
    header.length = (8 + payload.len()) as u32;
    let mut datagram = header.serialize().to_vec();
    datagram.extend_from_slice(payload);
    datagram
}

fn echo() -> Arc<dyn MethodHandler> {
    Arc::new(|request: &Request<'_>, response: &mut MessageBuilder| match response.put(request.payload) {
        Ok(()) => ReturnCode::Ok,
        Err(_) => ReturnCode::NotOk,
    })
}

struct Node {
    registry: LocalServiceRegistry,
    pool: TxPool,
    transport: RecordingTransport,
    diag: ErrorReportBuffer,
}

impl Node {
    fn new() -> Self {
        Node {
            registry: LocalServiceRegistry::new(8, 8),
            pool: TxPool::new(2, 1400),
            transport: RecordingTransport::new(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5005)),
            diag: ErrorReportBuffer::default(),
        }
    }

    fn receive(&mut self, datagram: &[u8]) -> Option<SomeIpHeader> {
        let mut ctx = RxContext {
            registry: &self.registry,
            pool: &mut self.pool,
            transport: &self.transport,
            diag: &mut self.diag,
            handling: SessionHandling::Enabled,
        };
        let _ = process_unicast(&mut ctx, datagram, SocketAddr::V4(CLIENT));
        assert_eq!(self.pool.available(), 2, "tx slot leaked");

        let sent = self.transport.take_sent();
        sent.first().map(|(bytes, to)| {
            assert_eq!(*to, CLIENT);
            let header = SomeIpHeader::parse(bytes).unwrap();
            assert_eq!(header.total_length(), bytes.len());
            header
        })
    }
}

#[test]
fn test_request_to_unknown_service_gets_error() {
    let mut node = Node::new();
    let response = node.receive(&request(7, 2, 1, &[])).unwrap();

    assert_eq!(response.message_type, MessageType::Error);
    assert_eq!(response.return_code, ReturnCode::UnknownService);
    assert_eq!(response.length, 8);
    assert_eq!(response.message_id, MessageId::new(7, 2));
    assert_eq!(response.request_id, RequestId::new(1, 1));
    assert_eq!(node.diag.count(ErrorKind::LocalServiceNotFound), 1);
}

#[test]
fn test_request_with_other_interface_version_gets_error() {
    let mut node = Node::new();
    node.registry.add_service(7, 1, 2, 5005).unwrap();
    node.registry.add_method(7, 2, echo()).unwrap();

    let response = node.receive(&request(7, 2, 1, &[])).unwrap();
    assert_eq!(response.message_type, MessageType::Error);
    assert_eq!(response.return_code, ReturnCode::WrongInterfaceVersion);
    assert_eq!(response.length, 8);
    assert_eq!(node.diag.count(ErrorKind::LocalServiceInterfaceMismatch), 1);
}

#[test]
fn test_request_to_unknown_method_gets_error() {
    let mut node = Node::new();
    node.registry.add_service(7, 1, 1, 5005).unwrap();

    let response = node.receive(&request(7, 2, 1, &[])).unwrap();
    assert_eq!(response.return_code, ReturnCode::UnknownMethod);
}

#[test]
fn test_request_is_answered_by_handler() {
    let mut node = Node::new();
    node.registry.add_service(7, 1, 1, 5005).unwrap();
    node.registry.add_method(7, 2, echo()).unwrap();

    let mut ctx = RxContext {
        registry: &node.registry,
        pool: &mut node.pool,
        transport: &node.transport,
        diag: &mut node.diag,
        handling: SessionHandling::Enabled,
    };
    let outcome = process_unicast(&mut ctx, &request(7, 2, 1, &[1, 2, 3]), SocketAddr::V4(CLIENT)).unwrap();
    assert!(outcome.handler_called);
    assert_eq!(outcome.response_len, Some(19));

    let (bytes, _) = node.transport.take_sent().remove(0);
    let header = SomeIpHeader::parse(&bytes).unwrap();
    assert_eq!(header.message_type, MessageType::Response);
    assert_eq!(header.return_code, ReturnCode::Ok);
    assert_eq!(header.length, 11);
    assert_eq!(&bytes[16..], &[1, 2, 3]);
    assert!(node.diag.is_empty());
}

#[test]
fn test_request_to_event_id_gets_wrong_message_type() {
    let mut node = Node::new();
    node.registry.add_service(7, 1, 1, 5005).unwrap();

    let response = node.receive(&request(7, 0x8002, 1, &[])).unwrap();
    assert_eq!(response.return_code, ReturnCode::WrongMessageType);
    assert_eq!(node.diag.count(ErrorKind::RequestHeaderSemantic), 1);
}

#[test]
fn test_malformed_request_gets_malformed_message() {
    let mut node = Node::new();
    let mut datagram = request(7, 2, 1, &[]);
    datagram[12] = 0x02;

    let response = node.receive(&datagram).unwrap();
    assert_eq!(response.return_code, ReturnCode::MalformedMessage);
    assert_eq!(response.protocol_version, 1);
    assert_eq!(node.diag.count(ErrorKind::RequestHeaderSyntactic), 1);
}

#[test]
fn test_notification_failure_is_silent_but_reported() {
    let mut node = Node::new();
    let mut datagram = request(7, 2, 1, &[]);
    datagram[14] = 0x02;

    assert!(node.receive(&datagram).is_none());
    assert_eq!(node.diag.count(ErrorKind::RequestFailedWithoutResponse), 1);
}

#[test]
fn test_framing_errors_are_dropped() {
    let mut node = Node::new();
    let mut datagram = request(7, 2, 1, &[0xAA]);
    datagram.pop();

    assert!(node.receive(&datagram).is_none());
    assert!(node.receive(&datagram[..10]).is_none());
    assert_eq!(node.diag.count(ErrorKind::UdpRxError), 2);
}

#[test]
fn test_exhausted_pool_skips_response() {
    let mut node = Node::new();
    let held = [
        MessageBuilder::init(&mut node.pool).unwrap(),
        MessageBuilder::init(&mut node.pool).unwrap(),
    ];

    let mut ctx = RxContext {
        registry: &node.registry,
        pool: &mut node.pool,
        transport: &node.transport,
        diag: &mut node.diag,
        handling: SessionHandling::Enabled,
    };
    assert!(process_unicast(&mut ctx, &request(7, 2, 1, &[]), SocketAddr::V4(CLIENT)).is_err());
    assert!(node.transport.sent().is_empty());
    assert_eq!(node.diag.count(ErrorKind::TxPoolExhausted), 1);
    drop(held);
}

fn counting(calls: &Arc<AtomicUsize>) -> Arc<dyn MethodHandler> {
    let calls = calls.clone();
    Arc::new(move |_: &Request<'_>, response: &mut MessageBuilder| {
        calls.fetch_add(1, Ordering::SeqCst);
        match response.put(&[0xFF]) {
            Ok(()) => ReturnCode::Ok,
            Err(_) => ReturnCode::NotOk,
        }
    })
}

#[test]
fn test_exhausted_pool_still_delivers_fire_and_forget() {
    let mut node = Node::new();
    let calls = Arc::new(AtomicUsize::new(0));
    node.registry.add_service(7, 1, 1, 5005).unwrap();
    node.registry.add_method(7, 0x8001, counting(&calls)).unwrap();
    node.registry.add_method(7, 0x0002, counting(&calls)).unwrap();
    let held = [
        MessageBuilder::init(&mut node.pool).unwrap(),
        MessageBuilder::init(&mut node.pool).unwrap(),
    ];

    let mut notification = request(7, 0x8001, 1, &[]);
    notification[14] = 0x02;
    let mut fire_and_forget = request(7, 0x0002, 1, &[]);
    fire_and_forget[14] = 0x01;

    for datagram in [notification, fire_and_forget] {
        let mut ctx = RxContext {
            registry: &node.registry,
            pool: &mut node.pool,
            transport: &node.transport,
            diag: &mut node.diag,
            handling: SessionHandling::Enabled,
        };
        let outcome = process_unicast(&mut ctx, &datagram, SocketAddr::V4(CLIENT)).unwrap();
        assert!(outcome.handler_called);
        assert_eq!(outcome.response_len, None);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(node.transport.sent().is_empty());
    assert_eq!(node.pool.available(), 0);
    assert_eq!(node.diag.count(ErrorKind::TxPoolExhausted), 0);
    drop(held);
}

fn instance(ip: Ipv4Addr, port: u16) -> InstanceConfig {
    let mut config = InstanceConfig::new(ip);
    config.stack.unicast_port = port;
    config.providing.insert(
        "echo".to_string(),
        ServiceConfig {
            service_id: 0x1234,
            instance_id: 1,
            major_version: 1,
            minor_version: 0,
            interface_version: 1,
            port: None,
        },
    );
    config
}

#[test]
fn test_runtime_serves_requests_and_discovery() {
    let provider_ip = Ipv4Addr::new(10, 0, 0, 1);
    let unicast = Arc::new(RecordingTransport::new(SocketAddrV4::new(provider_ip, 5005)));
    let sd = Arc::new(RecordingTransport::new(SocketAddrV4::new(provider_ip, 30490)));
    let provider = SomeIpRuntime::new(
        instance(provider_ip, 5005),
        Box::new(unicast.clone()),
        Some(Box::new(sd.clone())),
    )
    .unwrap();

    let offer = provider.offer_service("echo", vec![(0x0001, echo())]).unwrap();
    assert_eq!(offer.endpoint, SocketAddrV4::new(provider_ip, 5005));
    let announced = sd.take_sent();
    assert_eq!(announced.len(), 1);

    unicast.push_inbound(&request(0x1234, 0x0001, 1, b"ping"), SocketAddr::V4(CLIENT));
    assert_eq!(provider.poll().unwrap(), 1);
    let (reply, to) = unicast.take_sent().remove(0);
    assert_eq!(to, CLIENT);
    assert_eq!(&reply[16..], b"ping");

    let consumer_ip = Ipv4Addr::new(10, 0, 0, 2);
    let consumer_sd = Arc::new(RecordingTransport::new(SocketAddrV4::new(consumer_ip, 30490)));
    let consumer = SomeIpRuntime::new(
        InstanceConfig::new(consumer_ip),
        Box::new(RecordingTransport::new(SocketAddrV4::new(consumer_ip, 5005))),
        Some(Box::new(consumer_sd.clone())),
    )
    .unwrap();

    consumer_sd.push_inbound(&announced[0].0, SocketAddr::V4(SocketAddrV4::new(provider_ip, 30490)));
    assert_eq!(consumer.poll().unwrap(), 1);
    let remote = consumer.lookup_remote(0x1234, 1, 1).unwrap();
    assert_eq!(remote.endpoint, offer.endpoint);
    assert_eq!(remote.ttl, 3);

    consumer.tick(3).unwrap();
    assert!(consumer.lookup_remote(0x1234, 1, 1).is_none());
}

#[test]
fn test_runtime_answers_find_with_unicast_offer() {
    let provider_ip = Ipv4Addr::new(10, 0, 0, 1);
    let sd = Arc::new(RecordingTransport::new(SocketAddrV4::new(provider_ip, 30490)));
    let provider = SomeIpRuntime::new(
        instance(provider_ip, 5005),
        Box::new(RecordingTransport::new(SocketAddrV4::new(provider_ip, 5005))),
        Some(Box::new(sd.clone())),
    )
    .unwrap();
    provider.offer_service("echo", vec![(0x0001, echo())]).unwrap();
    sd.take_sent();

    let consumer_ip = Ipv4Addr::new(10, 0, 0, 2);
    let consumer_sd = Arc::new(RecordingTransport::new(SocketAddrV4::new(consumer_ip, 30490)));
    let consumer = SomeIpRuntime::new(
        InstanceConfig::new(consumer_ip),
        Box::new(RecordingTransport::new(SocketAddrV4::new(consumer_ip, 5005))),
        Some(Box::new(consumer_sd.clone())),
    )
    .unwrap();
    consumer.find_service(0x1234, 0xFFFF, 1).unwrap();
    let (find, _) = consumer_sd.take_sent().remove(0);

    let consumer_sd_addr = SocketAddrV4::new(consumer_ip, 30490);
    sd.push_inbound(&find, SocketAddr::V4(consumer_sd_addr));
    provider.poll().unwrap();

    let sent = sd.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, consumer_sd_addr);
    assert_eq!(sent[0].0[24], 0x01);
    assert_eq!(sent[0].0[11], 0x01); // first unicast session

    provider.stop_offer_service("echo").unwrap();
    assert!(provider.offer_service("missing", Vec::new()).is_err());
}
