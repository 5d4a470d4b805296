use agent_substrate::{
    CoercionOptions, Event, EventCategory, FilterExpr, FilterField, FilterOp, FilterValue, Schema,
    Severity, coerce, pattern_matches, validate,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

// Helper to build an event with a name of the given segment depth
fn deep_event(depth: usize) -> Event {
    let name = (0..depth)
        .map(|i| format!("seg{i}"))
        .collect::<Vec<_>>()
        .join(".");
    Event::new(name, EventCategory::Agent, Severity::Info, "bench", json!({"depth": depth}))
}

// Helper to build a nested object value of the given width and depth
fn nested_value(width: usize, depth: usize) -> Value {
    if depth == 0 {
        return json!(42);
    }
    let mut map = serde_json::Map::new();
    for i in 0..width {
        map.insert(format!("k{i}"), nested_value(width, depth - 1));
    }
    Value::Object(map)
}

fn nested_schema(width: usize, depth: usize) -> Schema {
    if depth == 0 {
        return Schema::number();
    }
    let mut builder = Schema::object();
    for i in 0..width {
        builder = builder.required_property(format!("k{i}"), nested_schema(width, depth - 1));
    }
    builder.build()
}

// Benchmark: pattern matching across pattern shapes
fn bench_pattern_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_matches");

    let cases = [
        ("literal", "agent.llm.started", "agent.llm.started"),
        ("prefix_star", "agent.llm.started", "agent.*"),
        ("segment_star", "agent.llm.started", "agent.*.started"),
        ("miss", "agent.llm.started", "tool.*.failed"),
    ];

    for (name, event_name, pattern) in cases {
        group.bench_function(name, |b| {
            b.iter(|| pattern_matches(black_box(event_name), black_box(pattern)));
        });
    }

    group.finish();
}

// Benchmark: pattern matching with deep hierarchies
fn bench_pattern_matches_by_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_matches_by_depth");

    for depth in [2, 4, 8, 16].iter() {
        let event = deep_event(*depth);
        let pattern: String = (0..*depth)
            .map(|i| if i % 2 == 0 { "*" } else { "seg1" })
            .collect::<Vec<_>>()
            .join(".");
        group.bench_with_input(BenchmarkId::from_parameter(depth), &event, |b, event| {
            b.iter(|| pattern_matches(black_box(&event.name), black_box(&pattern)));
        });
    }

    group.finish();
}

// Benchmark: filter expression evaluation
fn bench_filter_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_eval");

    let event = Event::builder("agent.llm.completed")
        .category(EventCategory::Agent)
        .severity(Severity::Warning)
        .source("bench")
        .tag("llm")
        .payload(json!({"usage": {"total_tokens": 1200}}))
        .build();

    let simple = FilterExpr::severity_at_least(Severity::Info);
    let compound = FilterExpr::severity_at_least(Severity::Info)
        .and(FilterExpr::category_is(EventCategory::Agent))
        .and(FilterExpr::has_tag("llm"))
        .or(FilterExpr::name_matches("tool.*"));
    let deep_path = FilterExpr::condition(
        FilterField::PayloadField("usage.total_tokens".into()),
        FilterOp::Gt,
        FilterValue::I64(1000),
    );

    group.bench_function("severity_only", |b| {
        b.iter(|| black_box(&simple).matches(black_box(&event)));
    });
    group.bench_function("compound", |b| {
        b.iter(|| black_box(&compound).matches(black_box(&event)));
    });
    group.bench_function("payload_path", |b| {
        b.iter(|| black_box(&deep_path).matches(black_box(&event)));
    });

    group.finish();
}

// Benchmark: validation over nested objects
fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for (width, depth) in [(4, 1), (4, 2), (4, 3)].iter() {
        let value = nested_value(*width, *depth);
        let schema = nested_schema(*width, *depth);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{depth}")),
            &(value, schema),
            |b, (value, schema)| {
                b.iter(|| validate(black_box(value), black_box(schema)));
            },
        );
    }

    group.finish();
}

// Benchmark: coercion of loose inputs
fn bench_coerce(c: &mut Criterion) {
    let mut group = c.benchmark_group("coerce");

    let schema = Schema::object()
        .required_property("n", Schema::number())
        .required_property("enabled", Schema::boolean())
        .property("note", Schema::string())
        .build();
    let options = CoercionOptions::new()
        .with_string_to_number(true)
        .with_string_to_boolean(true)
        .with_trim_strings(true)
        .with_null_to_defaults(true);

    let loose = json!({"n": " 42 ", "enabled": "yes"});
    let conformant = json!({"n": 42, "enabled": true, "note": ""});

    group.bench_function("loose_input", |b| {
        b.iter(|| coerce(black_box(&loose), black_box(&schema), black_box(&options)));
    });
    group.bench_function("already_conformant", |b| {
        b.iter(|| coerce(black_box(&conformant), black_box(&schema), black_box(&options)));
    });

    group.finish();
}

// Benchmark: event JSON round trip (the file backend's hot path)
fn bench_event_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_round_trip");

    let event = Event::builder("tool.succeeded")
        .category(EventCategory::Tool)
        .severity(Severity::Info)
        .source("calculator")
        .correlation_id("corr-1")
        .tag("math")
        .payload(json!({"tool_name": "calculator", "output": {"sum": 7}, "duration_ms": 12}))
        .build();

    group.bench_function("to_json", |b| {
        b.iter(|| black_box(&event).to_json().unwrap());
    });

    let json = event.to_json().unwrap();
    group.bench_function("from_json", |b| {
        b.iter(|| Event::from_json(black_box(&json)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pattern_matches,
    bench_pattern_matches_by_depth,
    bench_filter_eval,
    bench_validate,
    bench_coerce,
    bench_event_round_trip,
);
criterion_main!(benches);
