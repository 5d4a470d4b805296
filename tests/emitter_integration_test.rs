//! Integration tests for the event emitter
//!
//! These exercise the public API end-to-end: pattern hierarchies,
//! severity floors, and the async queue drain on shutdown.

use agent_substrate::{
    EmitterConfig, Event, EventCategory, EventEmitter, Severity, SubscribeOptions,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn named(name: &str, severity: Severity) -> Event {
    Event::new(name, EventCategory::Agent, severity, "test", Value::Null)
}

#[tokio::test]
async fn test_pattern_hierarchy_delivery() {
    let emitter = EventEmitter::new(EmitterConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    emitter.subscribe(
        "agent.*.started",
        move |event| {
            sink.lock().unwrap().push(event.name.clone());
            Ok(())
        },
        SubscribeOptions::default(),
    );

    emitter
        .emit(named("agent.llm.started", Severity::Info))
        .await
        .unwrap();
    // wrong segment count
    emitter
        .emit(named("agent.started", Severity::Info))
        .await
        .unwrap();
    // wrong tail segment
    emitter
        .emit(named("agent.tool.completed", Severity::Info))
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().as_slice(), ["agent.llm.started"]);
}

#[tokio::test]
async fn test_severity_floor_across_emissions() {
    let emitter = EventEmitter::new(EmitterConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    emitter.subscribe(
        "*",
        move |event| {
            sink.lock().unwrap().push(event.severity);
            Ok(())
        },
        SubscribeOptions::new().with_min_severity(Severity::Warning),
    );

    for severity in [Severity::Info, Severity::Warning, Severity::Error] {
        emitter.emit(named("sensor.reading", severity)).await.unwrap();
    }

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [Severity::Warning, Severity::Error]
    );
}

#[tokio::test]
async fn test_stop_drains_everything_in_insertion_order() {
    let emitter = EventEmitter::new(
        EmitterConfig::new()
            .with_async_processing(true)
            .with_batch_size(100)
            .with_flush_interval(Duration::from_millis(1000)),
    );
    emitter.start();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    emitter.subscribe(
        "*",
        move |event| {
            sink.lock().unwrap().push(event.name.clone());
            Ok(())
        },
        SubscribeOptions::default(),
    );

    for i in 0..250 {
        emitter
            .emit(named(&format!("burst.{i}"), Severity::Info))
            .await
            .unwrap();
    }

    // Called immediately: the worker's first 1s tick has not fired yet,
    // so stop() itself must deliver all 250 before returning.
    emitter.stop().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 250);
    for (i, name) in seen.iter().enumerate() {
        assert_eq!(name, &format!("burst.{i}"));
    }
}

#[tokio::test]
async fn test_mixed_sync_and_async_subscribers_see_same_events() {
    let emitter = EventEmitter::new(EmitterConfig::default());
    let sync_count = Arc::new(Mutex::new(0usize));
    let async_count = Arc::new(Mutex::new(0usize));

    let sink = sync_count.clone();
    emitter.subscribe(
        "tool.*",
        move |_| {
            *sink.lock().unwrap() += 1;
            Ok(())
        },
        SubscribeOptions::default(),
    );

    let sink = async_count.clone();
    emitter.subscribe_async(
        "tool.*",
        move |_event| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() += 1;
                Ok(())
            }
        },
        SubscribeOptions::default(),
    );

    for _ in 0..3 {
        emitter
            .emit(Event::tool_invoked("calc", serde_json::json!({})))
            .await
            .unwrap();
    }

    assert_eq!(*sync_count.lock().unwrap(), 3);
    assert_eq!(*async_count.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_subscription_survives_emitter_restart() {
    let emitter = EventEmitter::new(
        EmitterConfig::new()
            .with_async_processing(true)
            .with_flush_interval(Duration::from_millis(5)),
    );
    let seen = Arc::new(Mutex::new(0usize));
    let sink = seen.clone();
    emitter.subscribe(
        "*",
        move |_| {
            *sink.lock().unwrap() += 1;
            Ok(())
        },
        SubscribeOptions::default(),
    );

    emitter.start();
    emitter.emit(named("first.run", Severity::Info)).await.unwrap();
    emitter.stop().await;
    assert_eq!(*seen.lock().unwrap(), 1);

    emitter.start();
    emitter.emit(named("second.run", Severity::Info)).await.unwrap();
    emitter.stop().await;
    assert_eq!(*seen.lock().unwrap(), 2);
}
