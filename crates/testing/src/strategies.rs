//! Property-based testing strategies for wire records.

use chrono::{DateTime, TimeZone, Utc};
use proptest::collection::vec;
use proptest::prelude::*;
use resque_domain::{Job, JobFailure, Value, ValueMap, WorkerStatus};

/// Any JSON-representable value, nested up to three levels.
///
/// Floats are finite eighths so their decimal form is exact.
pub fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1_000_000i64..1_000_000).prop_map(|n| Value::Float(n as f64 / 8.0)),
        "[ -~]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            arb_map(inner).prop_map(Value::Object),
        ]
    })
}

fn arb_map(values: impl Strategy<Value = Value>) -> impl Strategy<Value = ValueMap> {
    vec(("[a-z_]{1,8}", values), 0..4).prop_map(|entries| entries.into_iter().collect())
}

/// Dates with millisecond precision between 1970 and 2100.
pub fn arb_datetime() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800_000)
        .prop_filter_map("valid timestamp", |ms| Utc.timestamp_millis_opt(ms).single())
}

/// Valid jobs, with and without variables.
pub fn arb_job() -> impl Strategy<Value = Job> {
    (
        "[A-Z][A-Za-z]{0,15}",
        vec(arb_value(), 0..4),
        proptest::option::of(arb_map(arb_value())),
    )
        .prop_map(|(class_name, args, vars)| Job {
            class_name,
            args,
            vars,
        })
}

/// Failure records with every optional field exercised.
pub fn arb_failure() -> impl Strategy<Value = JobFailure> {
    (
        "[a-z0-9:.-]{1,24}",
        proptest::option::of("[a-z]{1,8}"),
        arb_job(),
        "[A-Za-z]{0,12}",
        "[ -~]{0,24}",
        vec("[ -~]{0,24}", 0..3),
        arb_datetime(),
        proptest::option::of(arb_datetime()),
    )
        .prop_map(
            |(worker, queue, payload, exception, error, backtrace, failed_at, retried_at)| {
                JobFailure {
                    worker,
                    queue,
                    payload,
                    exception,
                    error,
                    backtrace,
                    failed_at,
                    retried_at,
                }
            },
        )
}

/// Worker status snapshots.
pub fn arb_status() -> impl Strategy<Value = WorkerStatus> {
    (arb_datetime(), "[a-z]{1,8}", arb_job(), any::<bool>()).prop_map(
        |(run_at, queue, payload, paused)| WorkerStatus {
            run_at,
            queue,
            payload,
            paused,
        },
    )
}
