//! Wire codec for queue records.
//!
//! Records are JSON objects read and written by hand through serde's
//! `Serializer`/`MapAccess` APIs rather than derived impls, so that field
//! order, optional fields, legacy dates and strict schemas are all under
//! explicit control.
//!
//! A [`Codec`] is an immutable table holding the date parse strategies and the
//! admin [`CommandRegistry`]. Build one at startup and share it as
//! `Arc<Codec>`.
//!
//! # Examples
//!
//! ```
//! use resque_common::codec::Codec;
//! use resque_domain::{Job, Value};
//!
//! let codec = Codec::default();
//! let json = codec.encode(&Job::new("SendEmail", vec![Value::from("bob")])).unwrap();
//! assert_eq!(json, r#"{"class":"SendEmail","args":["bob"]}"#);
//!
//! let job: Job = codec.decode(&json).unwrap();
//! assert_eq!(job.class_name, "SendEmail");
//! ```

pub mod commands;
mod records;
pub mod value;

pub use commands::{CommandConstructor, CommandRegistry, CommandRegistryBuilder};

use records::CommandDescriptor;

use crate::datetime::{self, DateFormat, DateParseError};
use chrono::{DateTime, Utc};
use resque_domain::{AdminCommand, ErrorKind};
use serde::de::{DeserializeSeed, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::marker::PhantomData;
use thiserror::Error;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A record could not be written
    #[error("failed to encode {record}: {source}")]
    Encode {
        /// Record name
        record: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A record was malformed, violated its schema or held a bad date
    #[error("failed to decode {record}: {source}")]
    Decode {
        /// Record name
        record: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Date matched no accepted format
    #[error(transparent)]
    Date(#[from] DateParseError),

    /// Admin command name is not registered
    #[error("unknown admin command '{0}'")]
    UnknownCommand(String),

    /// Admin command has the wrong number of arguments
    #[error("admin command '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        /// Command name
        name: String,
        /// Registered arity
        expected: usize,
        /// Arguments supplied
        found: usize,
    },

    /// Admin command argument has the wrong type
    #[error("admin command '{name}' argument {index} must be {expected}, got {found}")]
    ArgumentType {
        /// Command name
        name: String,
        /// Zero-based argument position
        index: usize,
        /// Expected type
        expected: &'static str,
        /// Type that was supplied
        found: &'static str,
    },
}

impl CodecError {
    /// Error classification.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Decode
    }

    /// True when an admin command name failed to resolve.
    pub fn is_lookup(&self) -> bool {
        matches!(self, CodecError::UnknownCommand(_))
    }
}

/// A record with a hand-written JSON reader and writer.
pub trait WireRecord: Sized {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Write the record as a JSON object.
    fn write<S>(&self, codec: &Codec, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer;

    /// Read the record from a JSON object.
    fn read<'de, D>(codec: &Codec, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>;
}

/// Borrowed record paired with the codec that writes it.
pub struct Wire<'c, T> {
    codec: &'c Codec,
    record: &'c T,
}

impl<'c, T: WireRecord> Wire<'c, T> {
    /// Pair `record` with `codec`.
    pub fn new(codec: &'c Codec, record: &'c T) -> Self {
        Self { codec, record }
    }
}

impl<T: WireRecord> Serialize for Wire<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.record.write(self.codec, serializer)
    }
}

/// Deserialize seed reading a `T` with a codec.
pub struct RecordSeed<'c, T> {
    codec: &'c Codec,
    _record: PhantomData<T>,
}

impl<'c, T: WireRecord> RecordSeed<'c, T> {
    /// Seed bound to `codec`.
    pub fn new(codec: &'c Codec) -> Self {
        Self {
            codec,
            _record: PhantomData,
        }
    }
}

impl<'de, T: WireRecord> DeserializeSeed<'de> for RecordSeed<'_, T> {
    type Value = T;

    fn deserialize<D>(self, deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::read(self.codec, deserializer)
    }
}

/// Immutable codec table.
#[derive(Debug, Clone)]
pub struct Codec {
    date_formats: Vec<DateFormat>,
    commands: CommandRegistry,
}

impl Codec {
    /// Codec with explicit date strategies and command registry.
    pub fn new(date_formats: Vec<DateFormat>, commands: CommandRegistry) -> Self {
        Self {
            date_formats,
            commands,
        }
    }

    /// Codec with the default date strategies and a custom registry.
    pub fn with_commands(commands: CommandRegistry) -> Self {
        Self::new(DateFormat::LEGACY_ORDER.to_vec(), commands)
    }

    /// Date formats tried on decode, in order.
    pub fn date_formats(&self) -> &[DateFormat] {
        &self.date_formats
    }

    /// The admin command registry.
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Encode a record as JSON.
    pub fn encode<T: WireRecord>(&self, record: &T) -> Result<String, CodecError> {
        serde_json::to_string(&Wire::new(self, record)).map_err(|source| CodecError::Encode {
            record: T::NAME,
            source,
        })
    }

    /// Decode a record from JSON. Trailing data is rejected.
    pub fn decode<T: WireRecord>(&self, json: &str) -> Result<T, CodecError> {
        let to_error = |source| CodecError::Decode {
            record: T::NAME,
            source,
        };
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let record = RecordSeed::<T>::new(self)
            .deserialize(&mut deserializer)
            .map_err(to_error)?;
        deserializer.end().map_err(to_error)?;
        Ok(record)
    }

    /// Encode an admin command as its `{class, args}` descriptor.
    pub fn encode_command(&self, command: &AdminCommand) -> Result<String, CodecError> {
        self.encode(&CommandDescriptor(command.descriptor()))
    }

    /// Decode a descriptor and resolve it through the registry.
    pub fn decode_command(&self, json: &str) -> Result<AdminCommand, CodecError> {
        let CommandDescriptor(descriptor) = self.decode(json)?;
        self.commands.resolve(&descriptor)
    }

    /// Parse a date with this codec's strategies.
    pub fn parse_date(&self, input: &str) -> Result<DateTime<Utc>, CodecError> {
        Ok(datetime::parse_with(input, &self.date_formats)?)
    }

    /// Format a date in the canonical wire format.
    pub fn format_date(&self, date: &DateTime<Utc>) -> String {
        datetime::format_datetime(date)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::with_commands(CommandRegistry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resque_domain::Job;

    #[test]
    fn test_command_round_trip() {
        let codec = Codec::default();
        for command in [
            AdminCommand::pause(true),
            AdminCommand::pause(false),
            AdminCommand::shutdown(true),
            AdminCommand::shutdown(false),
        ] {
            let json = codec.encode_command(&command).unwrap();
            assert_eq!(codec.decode_command(&json).unwrap(), command);
        }
    }

    #[test]
    fn test_pause_wire_form() {
        let json = Codec::default()
            .encode_command(&AdminCommand::pause(true))
            .unwrap();
        assert_eq!(json, r#"{"class":"PauseCommand","args":[true]}"#);
    }

    #[test]
    fn test_unknown_command_is_lookup_error() {
        let err = Codec::default()
            .decode_command(r#"{"class":"Reboot","args":[]}"#)
            .unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_malformed_command_is_decode_error() {
        let err = Codec::default()
            .decode_command(r#"{"class":"PauseCommand"}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
        assert!(!err.is_lookup());
    }

    #[test]
    fn test_command_with_vars_is_rejected() {
        let err = Codec::default()
            .decode_command(r#"{"class":"PauseCommand","args":[true],"vars":{"x":1}}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
        assert!(!err.is_lookup());
    }

    #[test]
    fn test_trailing_data_rejected() {
        let codec = Codec::default();
        assert!(codec.decode::<Job>(r#"{"class":"A","args":[]} x"#).is_err());
    }

    #[test]
    fn test_restricted_date_formats() {
        let codec = Codec::new(vec![DateFormat::Iso8601], CommandRegistry::default());
        assert!(codec.parse_date("2013-03-08T02:26:05.234+0000").is_ok());
        assert!(matches!(
            codec.parse_date("2013/03/08 02:26:05 +0000"),
            Err(CodecError::Date(_))
        ));
    }

    #[test]
    fn test_unknown_field_names_the_field() {
        let err = Codec::default()
            .decode::<Job>(r#"{"class":"A","args":[1],"queue":"x"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown field `queue`"));
    }
}
