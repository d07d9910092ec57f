// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end method invocation over the loopback transport.

use pubrpc::session::loopback::{LoopbackRequest, LoopbackSessionManager};
use pubrpc::session::ReplyEvent;
use pubrpc::{
    Attributes, ClientConfig, Message, MessageType, Payload, PayloadFormat, Priority, RpcClient,
    RpcError, Uri,
};
use std::sync::Arc;
use std::time::Duration;

fn reply_to(request: &LoopbackRequest, data: &[u8]) -> ReplyEvent {
    let attributes = request
        .attributes
        .as_ref()
        .map(Attributes::response)
        .unwrap_or_default();
    ReplyEvent::message(&Message::new(attributes, Payload::value(data.to_vec())))
        .expect("encode reply")
}

fn client_with(manager: &Arc<LoopbackSessionManager>, config: ClientConfig) -> Arc<RpcClient> {
    RpcClient::new(manager.clone(), config.worker_pool_size(4)).expect("valid config")
}

fn call(client: &RpcClient, method: &Uri, data: Vec<u8>) -> Payload {
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);
    client
        .invoke_method(method, &Payload::value(data), &attributes)
        .expect("dispatched")
        .wait()
}

#[test]
fn test_update_door_round_trip() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("body.access", 1, "UpdateDoor");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        assert_eq!(req.payload, vec![0x01, 0x02]);
        vec![reply_to(req, &[0xAA, 0xBB])]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    let payload = call(&client, &method, vec![0x01, 0x02]);

    assert_eq!(payload.data, vec![0xAA, 0xBB]);
    assert_eq!(payload.format, PayloadFormat::Value);
    assert_eq!(manager.published(), 1);
}

#[test]
fn test_responder_sees_request_attributes() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "echo");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        let attributes = req.attributes.as_ref().expect("attributes attached");
        assert_eq!(attributes.message_type, MessageType::Request);
        let sink = attributes.sink.as_ref().expect("sink set");
        vec![reply_to(req, sink.to_long_form().as_bytes())]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    let payload = call(&client, &method, vec![1]);

    assert_eq!(payload.data, method.to_long_form().into_bytes());
}

#[test]
fn test_multiple_replies_last_wins() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "stream");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        vec![
            ReplyEvent::sample(Vec::new()),
            reply_to(req, b"A"),
            ReplyEvent::sample(vec![0xFF; 3]),
            reply_to(req, b""),
            reply_to(req, b"B"),
        ]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    assert_eq!(call(&client, &method, vec![1]).data, b"B".to_vec());

    let metrics = client.metrics();
    assert_eq!(metrics.replies_accepted, 2);
    assert_eq!(metrics.replies_skipped, 3);
}

#[test]
fn test_no_responder_resolves_empty() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");

    let payload = call(&client, &Uri::rpc_method("nobody", 1, "home"), vec![1]);
    assert!(payload.is_empty());
}

#[test]
fn test_slow_responder_times_out_empty() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "slow");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        std::thread::sleep(Duration::from_millis(100));
        vec![reply_to(req, b"late")]
    });

    let client = client_with(&manager, ClientConfig::new().request_timeout_ms(20));
    let _guard = client.acquire().expect("init");

    let payload = call(&client, &method, vec![1]);
    assert!(payload.is_empty());
    assert_eq!(client.metrics().error_replies, 1);
}

#[test]
fn test_error_reply_keeps_earlier_answer() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "flaky");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        vec![
            reply_to(req, b"A"),
            ReplyEvent::error("remote failure"),
            reply_to(req, b"B"),
        ]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    assert_eq!(call(&client, &method, vec![1]).data, b"A".to_vec());
}

#[test]
fn test_publish_refused_by_transport() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "echo");
    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    manager.set_fail_publish(true);

    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);
    let result = client.invoke_method(&method, &Payload::value(vec![1]), &attributes);
    assert!(matches!(result, Err(RpcError::PublishFailed(_))));
    assert_eq!(client.metrics().channels_in_flight(), 0);
}

#[test]
fn test_concurrent_calls_get_their_own_replies() {
    const CALLERS: usize = 8;
    const CALLS: usize = 20;

    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "echo");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        vec![reply_to(req, &req.payload)]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");

    let handles: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let client = Arc::clone(&client);
            let method = method.clone();
            std::thread::spawn(move || {
                for i in 0..CALLS {
                    let data = vec![caller as u8, i as u8, fastrand::u8(..)];
                    assert_eq!(call(&client, &method, data.clone()).data, data);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("caller thread");
    }

    let metrics = client.metrics();
    assert_eq!(metrics.calls_dispatched, (CALLERS * CALLS) as u64);
    assert_eq!(metrics.channels_in_flight(), 0);
}

#[test]
fn test_term_waits_for_queued_drains() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "echo");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        std::thread::sleep(Duration::from_millis(5));
        vec![reply_to(req, b"done")]
    });

    let client = client_with(&manager, ClientConfig::default());
    client.init().expect("init");
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);
    let pending: Vec<_> = (0..6)
        .map(|_| {
            client
                .invoke_method(&method, &Payload::value(vec![1]), &attributes)
                .expect("dispatched")
        })
        .collect();

    client.term().expect("term");
    for reply in pending {
        assert_eq!(reply.wait().data, b"done".to_vec());
    }
    assert_eq!(client.metrics().drains_completed, 6);
}

#[test]
fn test_wait_timeout_leaves_reply_pending() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "slow");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        std::thread::sleep(Duration::from_millis(150));
        vec![reply_to(req, b"eventually")]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);
    let mut pending = client
        .invoke_method(&method, &Payload::value(vec![1]), &attributes)
        .expect("dispatched");

    assert!(pending.wait_timeout(Duration::from_millis(20)).is_none());
    assert_eq!(pending.wait().data, b"eventually".to_vec());
}

#[tokio::test]
async fn test_blocking_wait_inside_runtime_resolves_empty() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "echo");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        vec![reply_to(req, &req.payload)]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);

    let pending = client
        .invoke_method(&method, &Payload::value(vec![3]), &attributes)
        .expect("dispatched");
    let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pending.wait()))
        .expect("wait must not panic inside a runtime");
    assert!(payload.is_empty());

    let mut pending = client
        .invoke_method(&method, &Payload::value(vec![4]), &attributes)
        .expect("dispatched");
    assert_eq!(pending.wait_timeout(Duration::from_millis(10)), Some(Payload::default()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_calls_can_be_awaited_together() {
    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("petapp", 1, "echo");
    manager.declare_responder(&method, |req: &LoopbackRequest| {
        vec![reply_to(req, &req.payload)]
    });

    let client = client_with(&manager, ClientConfig::default());
    let _guard = client.acquire().expect("init");
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);

    let first = client
        .invoke_method(&method, &Payload::value(vec![1]), &attributes)
        .expect("dispatched");
    let second = client
        .invoke_method(&method, &Payload::value(vec![2]), &attributes)
        .expect("dispatched");
    let (a, b) = tokio::join!(first, second);

    assert_eq!(a.data, vec![1]);
    assert_eq!(b.data, vec![2]);
}
