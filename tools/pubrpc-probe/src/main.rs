// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pubrpc-probe - request/reply latency tool
//!
//! Starts a client over the in-process transport with an echo responder and
//! measures `invoke_method` round-trips.

use clap::Parser;
use colored::*;
use pubrpc::config::yaml::YamlLoader;
use pubrpc::session::loopback::{LoopbackRequest, LoopbackSessionManager};
use pubrpc::session::ReplyEvent;
use pubrpc::{
    Attributes, ClientConfig, DrainPolicy, Message, MetricsSnapshot, Payload, Priority,
    RpcClient, Uri,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request/reply latency probe
#[derive(Parser, Debug)]
#[command(name = "pubrpc-probe")]
#[command(version)]
#[command(about = "Measure pubrpc invoke_method round-trip latency")]
struct Args {
    /// Method URI (long form), e.g. /petapp/1/rpc.echo
    #[arg(short, long, default_value = "/pubrpc.probe/1/rpc.echo")]
    method: String,

    /// Payload size in bytes (at least 8, the sequence number)
    #[arg(short = 's', long, default_value = "64", value_parser = clap::value_parser!(u64).range(8..))]
    size: u64,

    /// Number of calls (0 = until Ctrl+C)
    #[arg(short = 'n', long, default_value = "1000")]
    count: u64,

    /// Warmup calls before measurement
    #[arg(short, long, default_value = "10")]
    warmup: u64,

    /// Replies the echo responder sends per request
    #[arg(short, long, default_value = "1")]
    replies: usize,

    /// Responder processing delay in microseconds
    #[arg(long, default_value = "0")]
    delay: u64,

    /// Drain policy: last, first
    #[arg(long, default_value = "last")]
    policy: PolicyArg,

    /// Worker pool size (overrides config)
    #[arg(long)]
    pool: Option<usize>,

    /// Request timeout in milliseconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// YAML client configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON results
    #[arg(long)]
    json: bool,

    /// Quiet mode - only output final results
    #[arg(long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug)]
enum PolicyArg {
    Last,
    First,
}

impl std::str::FromStr for PolicyArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last" | "last-non-empty" => Ok(PolicyArg::Last),
            "first" | "first-non-empty" => Ok(PolicyArg::First),
            _ => Err(format!("Unknown drain policy: {}", s)),
        }
    }
}

impl From<PolicyArg> for DrainPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Last => DrainPolicy::LastNonEmpty,
            PolicyArg::First => DrainPolicy::FirstNonEmpty,
        }
    }
}

fn main() {
    // RUST_LOG-based debug output
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => YamlLoader::load_from_file(path)?,
        None => ClientConfig::default(),
    }
    .with_env_overrides()?
    .drain_policy(args.policy.into());

    if let Some(pool) = args.pool {
        config = config.worker_pool_size(pool);
    }
    if let Some(timeout) = args.timeout {
        config = config.request_timeout_ms(timeout);
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let method: Uri = args.method.parse()?;
    let config = build_config(args)?;

    if !args.quiet && !args.json {
        eprintln!("{} pubrpc probe", ">>>".green().bold());
        eprintln!(
            "    method={}, size={} bytes, count={}, warmup={}, replies={}",
            method, args.size, args.count, args.warmup, args.replies
        );
        eprintln!(
            "    pool={}, timeout={:?}, policy={:?}",
            config.worker_pool_size, config.request_timeout, config.drain_policy
        );
    }

    let manager = Arc::new(LoopbackSessionManager::new());
    let replies = args.replies;
    let delay = Duration::from_micros(args.delay);
    manager.declare_responder(&method, move |request: &LoopbackRequest| {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        echo(request, replies)
    });

    let client = RpcClient::new(manager, config)?;
    let guard = client.acquire()?;
    let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);

    let mut payload = vec![0u8; args.size as usize];
    let mut tally = Tally::default();
    let total = if args.count == 0 {
        u64::MAX
    } else {
        args.warmup + args.count
    };

    if !args.quiet && !args.json && args.warmup > 0 {
        eprintln!("{}", "    Warmup...".dimmed());
    }

    let mut baseline = guard.metrics();
    let mut start_time = Instant::now();

    for i in 0..total {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if i == args.warmup {
            baseline = guard.metrics();
            start_time = Instant::now();
        }
        payload[0..8].copy_from_slice(&i.to_le_bytes());

        let send_time = Instant::now();
        let reply = guard
            .invoke_method(&method, &Payload::value(payload.clone()), &attributes)?
            .wait();
        let outcome = Outcome::classify(&reply, &payload[0..8], send_time.elapsed());

        if i >= args.warmup {
            tally.record(outcome);
            let measured = tally.calls();
            if !args.quiet && !args.json && (measured % 100 == 0 || measured == args.count) {
                eprint!("\r    Progress: {}/{}", measured, args.count);
                let _ = io::stderr().flush();
            }
        }
    }

    let report = Report {
        size: args.size,
        elapsed: start_time.elapsed(),
        replies: ReplyCounts::between(&baseline, &guard.metrics()),
        latency: tally.latency(),
        tally,
    };
    drop(guard);

    if args.json {
        println!("{}", report.to_json());
    } else if args.quiet {
        println!("{}", report.one_line());
    } else {
        eprintln!();
        report.print();
    }

    Ok(())
}

fn echo(request: &LoopbackRequest, replies: usize) -> Vec<ReplyEvent> {
    let attributes = request
        .attributes
        .as_ref()
        .map(Attributes::response)
        .unwrap_or_default();
    let message = Message::new(attributes, Payload::value(request.payload.clone()));
    match ReplyEvent::message(&message) {
        Ok(event) => vec![event; replies],
        Err(e) => vec![ReplyEvent::error(e.to_string())],
    }
}

/// How one measured call ended.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    /// Reply echoed this call's sequence number.
    Answered(Duration),
    /// Drain resolved to the empty payload (timeout, error stop, nothing valid).
    Empty,
    /// Non-empty reply that belongs to another call.
    Mismatched,
}

impl Outcome {
    fn classify(reply: &Payload, sequence: &[u8], rtt: Duration) -> Self {
        if reply.is_empty() {
            Outcome::Empty
        } else if reply.data.starts_with(sequence) {
            Outcome::Answered(rtt)
        } else {
            Outcome::Mismatched
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    answered: Vec<Duration>,
    empty: u64,
    mismatched: u64,
}

impl Tally {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Answered(rtt) => self.answered.push(rtt),
            Outcome::Empty => self.empty += 1,
            Outcome::Mismatched => self.mismatched += 1,
        }
    }

    fn calls(&self) -> u64 {
        self.answered.len() as u64 + self.empty + self.mismatched
    }

    /// Latency over answered calls only; `None` when nothing was answered.
    fn latency(&self) -> Option<Latency> {
        let mut sorted = self.answered.clone();
        sorted.sort_unstable();
        let (first, last) = (*sorted.first()?, *sorted.last()?);
        let rank = |q: f64| sorted[((sorted.len() - 1) as f64 * q).round() as usize];
        let total: Duration = sorted.iter().sum();
        Some(Latency {
            min: first,
            median: rank(0.5),
            p90: rank(0.9),
            p99: rank(0.99),
            max: last,
            mean: total / sorted.len() as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Latency {
    min: Duration,
    median: Duration,
    p90: Duration,
    p99: Duration,
    max: Duration,
    mean: Duration,
}

/// Drain-side counters for the measured window.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct ReplyCounts {
    accepted: u64,
    skipped: u64,
    error_stops: u64,
    dispatch_failures: u64,
}

impl ReplyCounts {
    fn between(before: &MetricsSnapshot, after: &MetricsSnapshot) -> Self {
        Self {
            accepted: after.replies_accepted - before.replies_accepted,
            skipped: after.replies_skipped - before.replies_skipped,
            error_stops: after.error_replies - before.error_replies,
            dispatch_failures: after.dispatch_failures - before.dispatch_failures,
        }
    }
}

struct Report {
    size: u64,
    elapsed: Duration,
    tally: Tally,
    replies: ReplyCounts,
    latency: Option<Latency>,
}

fn micros(d: Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

impl Report {
    fn calls_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.tally.calls() as f64 / secs
        } else {
            0.0
        }
    }

    fn one_line(&self) -> String {
        let latency = self.latency.map_or_else(
            || "no answers".to_string(),
            |l| format!("median={:.1}us p99={:.1}us", micros(l.median), micros(l.p99)),
        );
        format!(
            "calls={} answered={} empty={} mismatched={} error_stops={} {}",
            self.tally.calls(),
            self.tally.answered.len(),
            self.tally.empty,
            self.tally.mismatched,
            self.replies.error_stops,
            latency
        )
    }

    fn to_json(&self) -> String {
        let latency = self.latency.map_or_else(
            || "null".to_string(),
            |l| {
                format!(
                    r#"{{"min":{:.2},"median":{:.2},"p90":{:.2},"p99":{:.2},"max":{:.2},"mean":{:.2}}}"#,
                    micros(l.min),
                    micros(l.median),
                    micros(l.p90),
                    micros(l.p99),
                    micros(l.max),
                    micros(l.mean)
                )
            },
        );
        format!(
            r#"{{"payload_size":{},"elapsed_secs":{:.3},"calls":{{"answered":{},"empty":{},"mismatched":{}}},"replies":{{"accepted":{},"skipped":{},"error_stops":{}}},"dispatch_failures":{},"latency_us":{}}}"#,
            self.size,
            self.elapsed.as_secs_f64(),
            self.tally.answered.len(),
            self.tally.empty,
            self.tally.mismatched,
            self.replies.accepted,
            self.replies.skipped,
            self.replies.error_stops,
            self.replies.dispatch_failures,
            latency
        )
    }

    fn print(&self) {
        println!("{}", "=== pubrpc call report ===".bold());
        println!(
            "  {} {} bytes, {} calls in {:.2}s ({:.0} calls/s)",
            "Load:".cyan(),
            self.size,
            self.tally.calls(),
            self.elapsed.as_secs_f64(),
            self.calls_per_sec()
        );
        println!();
        println!("{}", "--- Outcomes ---".dimmed());
        println!("  {:<12} {:>8}", "answered".green(), self.tally.answered.len());
        println!("  {:<12} {:>8}", "empty".yellow(), self.tally.empty);
        println!("  {:<12} {:>8}", "mismatched".red(), self.tally.mismatched);
        println!();
        println!("{}", "--- Drain ---".dimmed());
        println!("  {:<12} {:>8}", "accepted", self.replies.accepted);
        println!("  {:<12} {:>8}", "skipped", self.replies.skipped);
        println!("  {:<12} {:>8}", "error stops", self.replies.error_stops);
        if self.replies.dispatch_failures > 0 {
            println!(
                "  {:<12} {:>8}",
                "not sent".red(),
                self.replies.dispatch_failures
            );
        }
        println!();

        let Some(l) = self.latency else {
            println!("{}", "  no answered calls, latency not measured".yellow());
            return;
        };
        println!("{}", "--- Latency of answered calls (us) ---".dimmed());
        println!(
            "  min {:.1} | median {:.1} | p90 {:.1} | p99 {:.1} | max {:.1} | mean {:.1}",
            micros(l.min),
            micros(l.median),
            micros(l.p90),
            micros(l.p99),
            micros(l.max),
            micros(l.mean)
        );
    }
}
