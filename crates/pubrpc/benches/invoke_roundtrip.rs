// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Invoke Round-Trip Benchmark
//!
//! Measures `invoke_method` + `wait` over the loopback transport with an
//! echo responder, by payload size, plus the drain alone on a pre-filled
//! reply channel.

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pubrpc::client::handle_reply;
use pubrpc::metrics::ClientMetrics;
use pubrpc::observer::NoopObserver;
use pubrpc::session::loopback::{LoopbackRequest, LoopbackSessionManager};
use pubrpc::session::{ReplyChannel, ReplyEvent};
use pubrpc::{Attributes, ClientConfig, DrainPolicy, Message, Payload, Priority, RpcClient, Uri};
use std::hint::black_box as bb;
use std::sync::Arc;

fn echo(request: &LoopbackRequest) -> Vec<ReplyEvent> {
    let attributes = request
        .attributes
        .as_ref()
        .map(Attributes::response)
        .unwrap_or_default();
    let message = Message::new(attributes, Payload::value(request.payload.clone()));
    ReplyEvent::message(&message).map(|e| vec![e]).unwrap_or_default()
}

/// Full call: publish, delivery thread, drain on the pool, completion.
fn bench_invoke_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke_roundtrip_by_size");

    let manager = Arc::new(LoopbackSessionManager::new());
    let method = Uri::rpc_method("bench", 1, "echo");
    manager.declare_responder(&method, echo);

    let client = RpcClient::builder(manager.clone())
        .config(ClientConfig::new().worker_pool_size(4))
        .observer(Arc::new(NoopObserver))
        .build()
        .expect("client creation");
    let _guard = client.acquire().expect("client init");
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);

    for size in [16, 256, 4096, 65536] {
        let payload = Payload::value(vec![0xAB; size]);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let reply = client
                    .invoke_method(&method, payload, &attributes)
                    .expect("dispatch")
                    .wait();
                bb(reply);
            });
        });
    }

    group.finish();
}

/// Drain only: decode and select over a full reply FIFO.
fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");
    let metrics = ClientMetrics::new();

    for policy in [DrainPolicy::LastNonEmpty, DrainPolicy::FirstNonEmpty] {
        group.bench_function(format!("{:?}", policy), |b| {
            b.iter(|| {
                let (sink, channel) = ReplyChannel::bounded(16);
                for i in 0..16u8 {
                    let message = Message::new(Attributes::publish(), Payload::value(vec![i; 64]));
                    let event = ReplyEvent::message(&message).expect("encode");
                    let _ = sink.try_send(event);
                }
                sink.close();
                bb(handle_reply(channel, policy, &NoopObserver, &metrics));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_invoke_by_size, bench_drain);
criterion_main!(benches);
