// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use serde_json::Value;
use the_sluice::config::load_and_validate_config;
use the_sluice::message::Message;
use the_sluice::runtime::{FlowRuntime, Observed};
use tracing_subscriber::EnvFilter;

/// Give up when no message reached a debug node for this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("the_sluice=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parses the payload argument as JSON, falling back to a plain string.
fn parse_payload(arg: Option<&String>) -> Value {
    match arg {
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())),
        None => Value::Null,
    }
}

/// A group is over once its last chunk, an abort, or an unsplit result arrives.
fn ends_group(message: &Message) -> bool {
    match &message.parts {
        Some(parts) => message.complete || parts.abort || parts.index.is_none(),
        None => true,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <flow.yaml> [payload-json]", args[0]);
        eprintln!("Example: {} configs/demo-stream.yaml '{{\"customer\": 7}}'", args[0]);
        eprintln!("Example: {} configs/demo-single.yaml", args[0]);
        std::process::exit(1);
    }

    let flow_file = &args[1];
    let payload = parse_payload(args.get(2));

    let config = load_and_validate_config(flow_file).with_context(|| format!("loading {}", flow_file))?;
    let mut runtime = FlowRuntime::start(&config)?;

    let entry_points = runtime.inject_nodes();
    if entry_points.is_empty() {
        bail!("flow {} has no inject node to start from", flow_file);
    }

    println!("Flow: {}", flow_file);
    println!("Payload: {}", payload);
    println!();

    let started = Instant::now();
    for node_id in &entry_points {
        runtime.inject(node_id, Message::new(payload.clone()))?;
    }

    let mut finished = 0;
    let mut received = 0;
    while finished < entry_points.len() {
        let Ok(next) = tokio::time::timeout(IDLE_TIMEOUT, runtime.next_observed()).await else {
            eprintln!("No output for {:?}, stopping", IDLE_TIMEOUT);
            break;
        };
        let Some(Observed { node_id, message }) = next else {
            break;
        };

        received += 1;
        if ends_group(&message) {
            finished += 1;
        }
        println!("[{}] {}", node_id, message.to_value());
    }

    println!();
    println!("{} messages, {} groups finished in {:?}", received, finished, started.elapsed());
    runtime.shutdown().await;
    Ok(())
}
