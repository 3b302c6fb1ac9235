//! [`WireRecord`] implementations for jobs, failures and worker statuses.
//!
//! Readers scan keys until the object closes and dispatch on the field name;
//! any field not listed in the record's schema is rejected. Writers emit
//! fields in a fixed order.

use crate::codec::value::{ArraySeed, DateSeed, ObjectSeed, OptionSeed, WireArray, WireObject};
use crate::codec::{Codec, RecordSeed, Wire, WireRecord};
use crate::datetime::format_datetime;
use resque_domain::{Job, JobFailure, WorkerStatus};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use std::fmt;

const JOB_FIELDS: &[&str] = &["class", "args", "vars"];

const COMMAND_FIELDS: &[&str] = &["class", "args"];

const FAILURE_FIELDS: &[&str] = &[
    "worker",
    "queue",
    "payload",
    "exception",
    "error",
    "backtrace",
    "failed_at",
    "retried_at",
];

const STATUS_FIELDS: &[&str] = &["run_at", "queue", "payload", "paused"];

/// Store `value` in `slot`, failing if the field was already seen.
fn set_once<T, E: de::Error>(slot: &mut Option<T>, field: &'static str, value: T) -> Result<(), E> {
    if slot.is_some() {
        return Err(E::duplicate_field(field));
    }
    *slot = Some(value);
    Ok(())
}

/// Resolve a field name against the schema, keeping the `'static` name for
/// error reporting.
fn field<E: de::Error>(key: &str, fields: &'static [&'static str]) -> Result<&'static str, E> {
    fields
        .iter()
        .find(|name| **name == key)
        .copied()
        .ok_or_else(|| E::unknown_field(key, fields))
}

// ============================================================================
// Job
// ============================================================================

impl WireRecord for Job {
    const NAME: &'static str = "job";

    fn write<S>(&self, _codec: &Codec, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.vars.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("class", &self.class_name)?;
        map.serialize_entry("args", &WireArray(&self.args))?;
        if let Some(vars) = &self.vars {
            map.serialize_entry("vars", &WireObject(vars))?;
        }
        map.end()
    }

    fn read<'de, D>(_codec: &Codec, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(JobVisitor { fields: JOB_FIELDS })
    }
}

/// Job-shaped visitor; `fields` decides whether `vars` is allowed.
struct JobVisitor {
    fields: &'static [&'static str],
}

impl<'de> Visitor<'de> for JobVisitor {
    type Value = Job;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an object with fields {:?}", self.fields)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Job, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut class_name = None;
        let mut args = None;
        let mut vars = None;

        while let Some(key) = map.next_key::<String>()? {
            match field(&key, self.fields)? {
                "class" => set_once(&mut class_name, "class", map.next_value::<String>()?)?,
                "args" => set_once(&mut args, "args", map.next_value_seed(ArraySeed)?)?,
                name => set_once(&mut vars, name, map.next_value_seed(OptionSeed(ObjectSeed))?)?,
            }
        }

        Ok(Job {
            class_name: class_name.ok_or_else(|| de::Error::missing_field("class"))?,
            args: args.ok_or_else(|| de::Error::missing_field("args"))?,
            vars: vars.flatten(),
        })
    }
}

// ============================================================================
// Admin command descriptor
// ============================================================================

/// The `{class, args}` descriptor of an admin command. Unlike a job it has
/// no `vars`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor(pub Job);

impl WireRecord for CommandDescriptor {
    const NAME: &'static str = "admin command";

    fn write<S>(&self, _codec: &Codec, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(COMMAND_FIELDS.len()))?;
        map.serialize_entry("class", &self.0.class_name)?;
        map.serialize_entry("args", &WireArray(&self.0.args))?;
        map.end()
    }

    fn read<'de, D>(_codec: &Codec, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_map(JobVisitor {
                fields: COMMAND_FIELDS,
            })
            .map(CommandDescriptor)
    }
}

// ============================================================================
// JobFailure
// ============================================================================

impl WireRecord for JobFailure {
    const NAME: &'static str = "job failure";

    fn write<S>(&self, codec: &Codec, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("worker", &self.worker)?;
        if let Some(queue) = &self.queue {
            map.serialize_entry("queue", queue)?;
        }
        map.serialize_entry("payload", &Wire::new(codec, &self.payload))?;
        map.serialize_entry("exception", &self.exception)?;
        map.serialize_entry("error", &self.error)?;
        map.serialize_entry("backtrace", &self.backtrace)?;
        map.serialize_entry("failed_at", &format_datetime(&self.failed_at))?;
        if let Some(retried_at) = &self.retried_at {
            map.serialize_entry("retried_at", &format_datetime(retried_at))?;
        }
        map.end()
    }

    fn read<'de, D>(codec: &Codec, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(FailureVisitor { codec })
    }
}

struct FailureVisitor<'c> {
    codec: &'c Codec,
}

impl<'de> Visitor<'de> for FailureVisitor<'_> {
    type Value = JobFailure;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a job failure object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<JobFailure, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut worker = None;
        let mut queue = None;
        let mut payload = None;
        let mut exception = None;
        let mut error = None;
        let mut backtrace = None;
        let mut failed_at = None;
        let mut retried_at = None;

        while let Some(key) = map.next_key::<String>()? {
            match field(&key, FAILURE_FIELDS)? {
                "worker" => set_once(&mut worker, "worker", map.next_value::<String>()?)?,
                "queue" => set_once(&mut queue, "queue", map.next_value::<Option<String>>()?)?,
                "payload" => set_once(
                    &mut payload,
                    "payload",
                    map.next_value_seed(RecordSeed::<Job>::new(self.codec))?,
                )?,
                "exception" => set_once(
                    &mut exception,
                    "exception",
                    map.next_value::<Option<String>>()?,
                )?,
                "error" => set_once(&mut error, "error", map.next_value::<Option<String>>()?)?,
                "backtrace" => set_once(
                    &mut backtrace,
                    "backtrace",
                    map.next_value::<Option<Vec<String>>>()?,
                )?,
                "failed_at" => set_once(
                    &mut failed_at,
                    "failed_at",
                    map.next_value_seed(DateSeed::new(self.codec))?,
                )?,
                name => set_once(
                    &mut retried_at,
                    name,
                    map.next_value_seed(OptionSeed(DateSeed::new(self.codec)))?,
                )?,
            }
        }

        Ok(JobFailure {
            worker: worker.ok_or_else(|| de::Error::missing_field("worker"))?,
            queue: queue.flatten(),
            payload: payload.ok_or_else(|| de::Error::missing_field("payload"))?,
            exception: exception.flatten().unwrap_or_default(),
            error: error.flatten().unwrap_or_default(),
            backtrace: backtrace.flatten().unwrap_or_default(),
            failed_at: failed_at.ok_or_else(|| de::Error::missing_field("failed_at"))?,
            retried_at: retried_at.flatten(),
        })
    }
}

// ============================================================================
// WorkerStatus
// ============================================================================

impl WireRecord for WorkerStatus {
    const NAME: &'static str = "worker status";

    fn write<S>(&self, codec: &Codec, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(STATUS_FIELDS.len()))?;
        map.serialize_entry("run_at", &format_datetime(&self.run_at))?;
        map.serialize_entry("queue", &self.queue)?;
        map.serialize_entry("payload", &Wire::new(codec, &self.payload))?;
        map.serialize_entry("paused", &self.paused)?;
        map.end()
    }

    fn read<'de, D>(codec: &Codec, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(StatusVisitor { codec })
    }
}

struct StatusVisitor<'c> {
    codec: &'c Codec,
}

impl<'de> Visitor<'de> for StatusVisitor<'_> {
    type Value = WorkerStatus;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a worker status object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<WorkerStatus, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut run_at = None;
        let mut queue = None;
        let mut payload = None;
        let mut paused = None;

        while let Some(key) = map.next_key::<String>()? {
            match field(&key, STATUS_FIELDS)? {
                "run_at" => set_once(
                    &mut run_at,
                    "run_at",
                    map.next_value_seed(DateSeed::new(self.codec))?,
                )?,
                "queue" => set_once(&mut queue, "queue", map.next_value::<String>()?)?,
                "payload" => set_once(
                    &mut payload,
                    "payload",
                    map.next_value_seed(RecordSeed::<Job>::new(self.codec))?,
                )?,
                name => set_once(&mut paused, name, map.next_value::<Option<bool>>()?)?,
            }
        }

        Ok(WorkerStatus {
            run_at: run_at.ok_or_else(|| de::Error::missing_field("run_at"))?,
            queue: queue.ok_or_else(|| de::Error::missing_field("queue"))?,
            payload: payload.ok_or_else(|| de::Error::missing_field("payload"))?,
            paused: paused.flatten().unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use resque_domain::Value;

    fn codec() -> Codec {
        Codec::default()
    }

    #[test]
    fn test_job_field_order() {
        let job = Job::new("Resize", vec![Value::from(640)]).with_var("fmt", "png");
        assert_eq!(
            codec().encode(&job).unwrap(),
            r#"{"class":"Resize","args":[640],"vars":{"fmt":"png"}}"#
        );

        let job = Job::without_args("Noop");
        assert_eq!(codec().encode(&job).unwrap(), r#"{"class":"Noop","args":[]}"#);
    }

    #[test]
    fn test_job_requires_class_and_args() {
        let codec = codec();
        assert!(codec.decode::<Job>(r#"{"args":[]}"#).is_err());
        assert!(codec.decode::<Job>(r#"{"class":"Noop"}"#).is_err());
        assert!(codec.decode::<Job>(r#"{"class":"Noop","args":[],"vars":null}"#).is_ok());
    }

    #[test]
    fn test_command_descriptor_has_no_vars() {
        let codec = codec();
        let descriptor = codec
            .decode::<CommandDescriptor>(r#"{"class":"PauseCommand","args":[true]}"#)
            .unwrap();
        assert_eq!(descriptor.0, Job::new("PauseCommand", vec![Value::Bool(true)]));

        let err = codec
            .decode::<CommandDescriptor>(r#"{"class":"PauseCommand","args":[true],"vars":{}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown field `vars`"));
    }

    #[test]
    fn test_job_rejects_duplicate_fields() {
        let err = codec()
            .decode::<Job>(r#"{"class":"A","class":"B","args":[]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("duplicate field"));
    }

    #[test]
    fn test_failure_field_order_and_defaults() {
        let failed_at = Utc.with_ymd_and_hms(2013, 3, 8, 2, 26, 5).unwrap();
        let failure = JobFailure::new("w1", Job::without_args("Boom"), "IOError", "disk", failed_at)
            .with_queue("mail")
            .with_backtrace(["a.rs:1"]);

        assert_eq!(
            codec().encode(&failure).unwrap(),
            concat!(
                r#"{"worker":"w1","queue":"mail","payload":{"class":"Boom","args":[]},"#,
                r#""exception":"IOError","error":"disk","backtrace":["a.rs:1"],"#,
                r#""failed_at":"2013-03-08T02:26:05.000+0000"}"#
            )
        );

        let minimal = codec()
            .decode::<JobFailure>(
                r#"{"worker":"w1","payload":{"class":"Boom","args":[]},"failed_at":"2013/03/08 02:26:05 +0000"}"#,
            )
            .unwrap();
        assert_eq!(minimal.exception, "");
        assert!(minimal.backtrace.is_empty());
        assert_eq!(minimal.failed_at, failed_at);
    }

    #[test]
    fn test_status_paused_defaults_to_false() {
        let status = codec()
            .decode::<WorkerStatus>(
                r#"{"run_at":"Fri Mar 08 02:26:05 UTC 2013","queue":"q","payload":{"class":"A","args":[]}}"#,
            )
            .unwrap();
        assert!(!status.paused);
        assert_eq!(status.queue, "q");
    }
}
