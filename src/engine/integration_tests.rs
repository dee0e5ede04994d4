// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Query node behaviour across whole request lifecycles, driven against the
//! in-memory pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backends::{HandlebarsRenderer, MemoryDatabase, MemoryPool};
use crate::engine::{QueryNode, QueryNodeConfig, QueryNodeContext, SessionState};
use crate::graph::{find_upstream_producer, Graph, NodeDescriptor, TickCapabilities, TickCapable};
use crate::message::{Message, Parts};
use crate::traits::{ConnectionPool, NodeHost};

const QUERY: &str = "SELECT * FROM events";

#[derive(Default)]
struct RecordingHost {
    sent: Mutex<Vec<Message>>,
    delivered: Mutex<Vec<(String, Message)>>,
}

impl RecordingHost {
    fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    fn upstream_ticks(&self) -> usize {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, msg)| to == "src" && msg.tick)
            .count()
    }
}

impl NodeHost for RecordingHost {
    fn send(&self, from: &str, msg: Message) {
        assert_eq!(from, "q");
        self.sent.lock().unwrap().push(msg);
    }

    fn deliver(&self, to: &str, msg: Message) {
        self.delivered.lock().unwrap().push((to.to_string(), msg));
    }
}

/// Forwards everything into channels so a spawned node can be observed.
struct ChannelHost {
    sent: mpsc::UnboundedSender<Message>,
    delivered: mpsc::UnboundedSender<(String, Message)>,
}

impl NodeHost for ChannelHost {
    fn send(&self, _from: &str, msg: Message) {
        let _ = self.sent.send(msg);
    }

    fn deliver(&self, to: &str, msg: Message) {
        let _ = self.delivered.send((to.to_string(), msg));
    }
}

fn graph() -> Arc<Graph> {
    let graph: Graph = [
        NodeDescriptor::new("src", "inject")
            .with_capabilities(TickCapabilities {
                provide: false,
                consume: true,
            })
            .with_port(["q"]),
        NodeDescriptor::new("q", "postgresql")
            .with_capabilities(TickCapabilities::BOTH)
            .with_port(["sink"]),
        NodeDescriptor::new("sink", "debug").with_capabilities(TickCapabilities {
            provide: true,
            consume: false,
        }),
    ]
    .into_iter()
    .collect();
    Arc::new(graph)
}

fn rows(n: usize) -> Vec<Value> {
    (1..=n).map(|i| json!({ "r": i })).collect()
}

fn streaming(rows_per_msg: usize) -> QueryNodeConfig {
    QueryNodeConfig {
        name: None,
        query: QUERY.to_string(),
        streaming: true,
        rows_per_msg,
    }
}

fn single() -> QueryNodeConfig {
    QueryNodeConfig {
        name: None,
        query: QUERY.to_string(),
        streaming: false,
        rows_per_msg: 1,
    }
}

fn node_with(pool: &Arc<MemoryPool>, host: Arc<dyn NodeHost>, config: QueryNodeConfig) -> QueryNode {
    let context = QueryNodeContext {
        pool: Arc::clone(pool) as Arc<dyn ConnectionPool>,
        renderer: Arc::new(HandlebarsRenderer::new()),
        host,
        graph: graph(),
    };
    QueryNode::new("q", config, context)
}

fn setup(database: MemoryDatabase, config: QueryNodeConfig) -> (QueryNode, Arc<RecordingHost>, Arc<MemoryPool>) {
    let pool = Arc::new(MemoryPool::new(database, 4));
    let host = Arc::new(RecordingHost::default());
    let node = node_with(&pool, host.clone(), config);
    (node, host, pool)
}

/// Runs in-flight operations until the node waits on its inbox.
async fn settle(node: &mut QueryNode) {
    while node.has_in_flight() {
        let step = node.next_step().await;
        node.on_step(step);
    }
}

/// Delivers a message, then lets the node settle.
async fn feed(node: &mut QueryNode, msg: Message) {
    node.on_input(msg);
    settle(node).await;
}

fn parts(msg: &Message) -> &Parts {
    msg.parts.as_ref().expect("message carries parts")
}

#[tokio::test]
async fn test_scenario_a_chunks_with_tick_after_each() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(5)), streaming(2));

    feed(&mut node, Message::new(json!("go"))).await;
    while node.session_state() == Some(SessionState::Streaming) {
        feed(&mut node, Message::tick()).await;
    }

    let sent = host.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].payload, json!([{ "r": 1 }, { "r": 2 }]));
    assert_eq!(sent[1].payload, json!([{ "r": 3 }, { "r": 4 }]));
    assert_eq!(sent[2].payload, json!([{ "r": 5 }]));
    assert_eq!(sent[3].payload, json!([]));

    // P1: contiguous indices, count and complete only on the last
    for (i, msg) in sent.iter().enumerate() {
        assert_eq!(parts(msg).index, Some(i as u64));
        assert_eq!(parts(msg).kind.as_deref(), Some("array"));
    }
    assert!(sent[..3].iter().all(|m| !m.complete && parts(m).count.is_none()));
    assert_eq!(parts(&sent[3]).count, Some(4));
    assert!(sent[3].complete);

    assert_eq!(node.session_state(), Some(SessionState::Completed));
    assert_eq!(host.upstream_ticks(), 1);

    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.cursors_closed, 1);
}

#[tokio::test]
async fn test_scenario_b_stalls_without_tick() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(6)), streaming(2));

    feed(&mut node, Message::new(json!("go"))).await;
    settle(&mut node).await;

    assert_eq!(host.sent().len(), 1);
    assert!(!node.is_downstream_ready());
    assert!(!node.has_in_flight());
    assert_eq!(pool.stats().reads, 1);
    assert_eq!(pool.stats().in_use, 1);

    feed(&mut node, Message::tick()).await;
    assert_eq!(host.sent().len(), 2);
    assert_eq!(parts(&host.sent()[1]).index, Some(1));
}

#[tokio::test]
async fn test_pacing_one_emission_per_tick() {
    let (mut node, host, _pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(10)), streaming(1));

    feed(&mut node, Message::new(json!("go"))).await;
    for ticks in 1..=4 {
        feed(&mut node, Message::tick()).await;
        assert_eq!(host.sent().len(), ticks + 1);
        assert!(!node.is_downstream_ready());
    }

    // rows_per_msg of one sends the row itself
    assert_eq!(host.sent()[4].payload, json!({ "r": 5 }));
}

#[tokio::test]
async fn test_scenario_c_read_failure_aborts_group() {
    let (mut node, host, pool) = setup(
        MemoryDatabase::new().with_read_failure(QUERY, rows(6), 1),
        streaming(2),
    );

    feed(&mut node, Message::new(json!("go"))).await;
    feed(&mut node, Message::tick()).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 2);
    let abort = &sent[1];
    assert!(abort.is_abort());
    assert_eq!(parts(abort).id, parts(&sent[0]).id);
    assert_eq!(
        abort.payload,
        json!(format!("error: Connection terminated unexpectedly {}", QUERY))
    );

    assert_eq!(node.session_state(), Some(SessionState::Errored));
    assert_eq!(host.upstream_ticks(), 0);

    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.cursors_closed, 1);
}

#[tokio::test]
async fn test_scenario_d_single_mode_result_set() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(3)), single());

    let request = Message::new(json!("original")).with_field("topic", json!("events"));
    feed(&mut node, request).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload["rowCount"], json!(3));
    assert_eq!(sent[0].payload["rows"], json!(rows(3)));
    assert_eq!(sent[0].extra.get("topic"), Some(&json!("events")));
    assert!(sent[0].parts.is_none());

    assert_eq!(host.upstream_ticks(), 1);
    assert_eq!(pool.stats().executions, 1);
    assert_eq!(pool.stats().in_use, 0);
}

#[tokio::test]
async fn test_single_mode_ignores_ticks() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(1)), single());

    feed(&mut node, Message::new(json!(1))).await;
    feed(&mut node, Message::tick()).await;
    feed(&mut node, Message::tick()).await;

    assert_eq!(host.sent().len(), 1);
    assert_eq!(pool.stats().executions, 1);
}

#[tokio::test]
async fn test_single_mode_failure() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_error(QUERY, "relation does not exist"), single());

    feed(&mut node, Message::new(json!(1))).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_abort());
    assert_eq!(host.upstream_ticks(), 0);
    assert_eq!(pool.stats().in_use, 0);
}

#[tokio::test]
async fn test_scenario_e_supersession_mid_read() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(8)), streaming(2));

    feed(&mut node, Message::new(json!("first"))).await;
    let first_group = node.current_group().map(str::to_owned).unwrap();

    // tick starts the read for chunk 1, the new request lands before it finishes
    node.on_input(Message::tick());
    assert!(node.has_in_flight());
    node.on_input(Message::new(json!("second")));

    // P2: the old session is fully released before the new one acquires
    let stats = pool.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.cursors_closed, 1);
    assert_eq!(stats.in_use, 0);

    settle(&mut node).await;
    let second_group = node.current_group().map(str::to_owned).unwrap();
    assert_ne!(first_group, second_group);

    let sent = host.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(parts(&sent[0]).id, first_group);
    assert_eq!(parts(&sent[1]).id, second_group);
    assert_eq!(parts(&sent[1]).index, Some(0));
    assert_eq!(sent[1].payload, json!([{ "r": 1 }, { "r": 2 }]));

    // P4: supersession sends no upstream tick
    assert_eq!(host.upstream_ticks(), 0);
    assert_eq!(pool.stats().peak_in_use, 1);
}

#[tokio::test]
async fn test_supersession_while_connecting() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(2)), streaming(1));

    node.on_input(Message::new(json!("first")));
    node.on_input(Message::new(json!("second")));
    settle(&mut node).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, json!({ "r": 1 }));
    assert_eq!(pool.stats().acquired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_mode_supersession_while_executing() {
    let database = MemoryDatabase::new()
        .with_rows(QUERY, rows(2))
        .with_latency(Duration::from_millis(50));
    let pool = Arc::new(MemoryPool::new(database, 1));
    let host = Arc::new(RecordingHost::default());
    let mut node = node_with(&pool, host.clone(), single());

    node.on_input(Message::new(json!("first")).with_field("tag", json!("first")));
    let step = node.next_step().await;
    node.on_step(step);
    assert_eq!(node.session_state(), Some(SessionState::Executing));
    assert!(node.has_in_flight());

    node.on_input(Message::new(json!("second")).with_field("tag", json!("second")));

    // the pending execute is dropped with its connection before the next acquire
    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.acquired, 1);
    assert_eq!(node.session_state(), Some(SessionState::Connecting));

    settle(&mut node).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].extra.get("tag"), Some(&json!("second")));
    assert_eq!(sent[0].payload["rowCount"], json!(2));
    assert_eq!(host.upstream_ticks(), 1);

    let stats = pool.stats();
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.peak_in_use, 1);
    assert_eq!(stats.in_use, 0);
}

#[tokio::test]
async fn test_request_while_stalled_starts_fresh_and_ready() {
    let (mut node, host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(4)), streaming(1));

    feed(&mut node, Message::new(json!("first"))).await;
    assert!(!node.is_downstream_ready());

    feed(&mut node, Message::new(json!("second"))).await;

    // the new request resets readiness, so its first chunk goes out at once
    assert_eq!(host.sent().len(), 2);
    assert_eq!(parts(&host.sent()[1]).index, Some(0));
    assert_eq!(pool.stats().in_use, 1);
    assert_eq!(pool.stats().released, 1);
}

#[tokio::test]
async fn test_group_id_taken_from_inbound_parts() {
    let (mut node, host, _pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(1)), streaming(5));

    let request = Message::new(json!("go")).with_parts(Parts {
        id: "upstream-group".into(),
        ..Default::default()
    });
    feed(&mut node, request).await;
    feed(&mut node, Message::tick()).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| parts(m).id == "upstream-group"));
}

#[tokio::test]
async fn test_query_renders_message_fields() {
    let database = MemoryDatabase::new().with_rows("SELECT * FROM events WHERE kind = 'login'", rows(1));
    let pool = Arc::new(MemoryPool::new(database, 1));
    let host = Arc::new(RecordingHost::default());
    let config = QueryNodeConfig {
        name: None,
        query: "SELECT * FROM events WHERE kind = '{{msg.payload.kind}}'".into(),
        streaming: false,
        rows_per_msg: 1,
    };
    let mut node = node_with(&pool, host.clone(), config);

    feed(&mut node, Message::new(json!({ "kind": "login" }))).await;

    let sent = host.sent();
    assert_eq!(sent[0].payload["rowCount"], json!(1));
}

#[tokio::test]
async fn test_template_failure_supersedes_and_aborts() {
    let pool = Arc::new(MemoryPool::new(MemoryDatabase::new().with_rows(QUERY, rows(4)), 1));
    let host = Arc::new(RecordingHost::default());
    let broken = QueryNodeConfig {
        name: None,
        query: "SELECT {{#if msg.payload}} FROM events".into(),
        streaming: true,
        rows_per_msg: 1,
    };
    let mut node = node_with(&pool, host.clone(), broken);

    feed(&mut node, Message::new(json!("go"))).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_abort());
    let text = sent[0].payload.as_str().unwrap();
    assert!(text.starts_with("template error"));
    assert!(text.ends_with("SELECT {{#if msg.payload}} FROM events"));
    assert_eq!(pool.stats().acquired, 0);
    assert_eq!(host.upstream_ticks(), 0);
}

#[tokio::test]
async fn test_acquire_failure_aborts_without_tick() {
    let pool = Arc::new(MemoryPool::new(MemoryDatabase::new(), 1).with_acquire_error("password authentication failed"));
    let host = Arc::new(RecordingHost::default());
    let mut node = node_with(&pool, host.clone(), streaming(1));

    feed(&mut node, Message::new(json!("go"))).await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].payload,
        json!(format!("error: password authentication failed {}", QUERY))
    );
    assert_eq!(host.upstream_ticks(), 0);
}

#[tokio::test]
async fn test_tick_without_session_only_marks_ready() {
    let (mut node, host, pool) = setup(MemoryDatabase::new(), streaming(1));

    feed(&mut node, Message::tick()).await;

    assert!(node.is_downstream_ready());
    assert!(host.sent().is_empty());
    assert_eq!(pool.stats().acquired, 0);
    // the first inbound message of any kind resolves the upstream
    assert_eq!(node.upstream(), Some("src"));
}

#[test]
fn test_upstream_lookup_is_idempotent() {
    let graph = graph();
    let accepts_ticks = |node: &NodeDescriptor| node.can_consume_tick();

    let first = find_upstream_producer("q", &graph, Some(&accepts_ticks));
    let second = find_upstream_producer("q", &graph, Some(&accepts_ticks));
    assert_eq!(first, second);
    assert_eq!(first.as_deref(), Some("src"));

    assert_eq!(find_upstream_producer("sink", &graph, Some(&accepts_ticks)).as_deref(), Some("q"));
    assert_eq!(find_upstream_producer("src", &graph, None), None);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_paces_and_supersedes() {
    let database = MemoryDatabase::new()
        .with_rows(QUERY, rows(6))
        .with_latency(Duration::from_millis(20));
    let pool = Arc::new(MemoryPool::new(database, 1));
    let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
    let (delivered_tx, mut delivered_rx) = mpsc::unbounded_channel();
    let host = Arc::new(ChannelHost {
        sent: sent_tx,
        delivered: delivered_tx,
    });
    let node = node_with(&pool, host, streaming(2));

    let (inbox, inbox_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(node.run(inbox_rx, shutdown.clone()));

    inbox.send(Message::new(json!("first"))).unwrap();
    let chunk = sent_rx.recv().await.unwrap();
    assert_eq!(parts(&chunk).index, Some(0));
    let first_group = parts(&chunk).id.clone();

    // nothing more without a tick
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(sent_rx.try_recv().is_err());

    // tick starts a 20ms read; the request arriving meanwhile replaces it
    inbox.send(Message::tick()).unwrap();
    inbox.send(Message::new(json!("second"))).unwrap();

    let chunk = sent_rx.recv().await.unwrap();
    assert_ne!(parts(&chunk).id, first_group);
    assert_eq!(parts(&chunk).index, Some(0));

    // drain the second group
    let mut last = chunk;
    while !last.complete {
        inbox.send(Message::tick()).unwrap();
        last = sent_rx.recv().await.unwrap();
    }
    assert_eq!(parts(&last).count, Some(4));

    let (to, tick) = delivered_rx.recv().await.unwrap();
    assert_eq!(to, "src");
    assert!(tick.tick);
    assert!(delivered_rx.try_recv().is_err());

    shutdown.cancel();
    task.await.unwrap();
    assert_eq!(pool.stats().in_use, 0);
    assert_eq!(pool.stats().peak_in_use, 1);
}

#[tokio::test]
async fn test_run_loop_releases_on_shutdown() {
    let (node, _host, pool) = setup(MemoryDatabase::new().with_rows(QUERY, rows(6)), streaming(1));
    let (inbox, inbox_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(node.run(inbox_rx, shutdown.clone()));

    inbox.send(Message::new(json!("go"))).unwrap();
    while pool.stats().reads == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(pool.stats().in_use, 1);

    shutdown.cancel();
    task.await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.cursors_closed, 1);
}
