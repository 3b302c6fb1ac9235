//! Admin command name registry.
//!
//! Maps the `class` of a command descriptor to its arity and constructor.
//! The registry is assembled once through [`CommandRegistryBuilder`] and is
//! read-only afterwards.

use crate::codec::CodecError;
use resque_domain::{AdminCommand, Job, Value};
use std::collections::HashMap;

/// Builds an [`AdminCommand`] from arguments whose count was already checked.
pub type CommandConstructor = fn(&str, &[Value]) -> Result<AdminCommand, CodecError>;

#[derive(Clone, Copy)]
struct CommandEntry {
    arity: usize,
    construct: CommandConstructor,
}

/// Read-only table of admin command names.
#[derive(Clone)]
pub struct CommandRegistry {
    entries: HashMap<String, CommandEntry>,
}

impl CommandRegistry {
    /// Start an empty registry.
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    /// Whether `name` resolves to a command.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Turn a `{class, args}` descriptor into a command.
    pub fn resolve(&self, descriptor: &Job) -> Result<AdminCommand, CodecError> {
        let name = descriptor.class_name.as_str();
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| CodecError::UnknownCommand(name.to_string()))?;

        if descriptor.args.len() != entry.arity {
            return Err(CodecError::Arity {
                name: name.to_string(),
                expected: entry.arity,
                found: descriptor.args.len(),
            });
        }

        (entry.construct)(name, &descriptor.args)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builder().with_defaults().build()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Mutable stage of a [`CommandRegistry`].
#[derive(Default)]
pub struct CommandRegistryBuilder {
    entries: HashMap<String, CommandEntry>,
}

impl CommandRegistryBuilder {
    /// Register `PauseCommand` and `ShutdownCommand`.
    pub fn with_defaults(self) -> Self {
        self.register(AdminCommand::PAUSE, 1, construct_pause)
            .register(AdminCommand::SHUTDOWN, 1, construct_shutdown)
    }

    /// Register (or replace) a command name.
    pub fn register(
        mut self,
        name: impl Into<String>,
        arity: usize,
        construct: CommandConstructor,
    ) -> Self {
        self.entries
            .insert(name.into(), CommandEntry { arity, construct });
        self
    }

    /// Make `alias` resolve like the already registered `target`.
    pub fn alias(mut self, alias: impl Into<String>, target: &str) -> Result<Self, CodecError> {
        let entry = *self
            .entries
            .get(target)
            .ok_or_else(|| CodecError::UnknownCommand(target.to_string()))?;
        self.entries.insert(alias.into(), entry);
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            entries: self.entries,
        }
    }
}

fn construct_pause(name: &str, args: &[Value]) -> Result<AdminCommand, CodecError> {
    Ok(AdminCommand::pause(bool_arg(name, args, 0)?))
}

fn construct_shutdown(name: &str, args: &[Value]) -> Result<AdminCommand, CodecError> {
    Ok(AdminCommand::shutdown(bool_arg(name, args, 0)?))
}

/// Positional boolean argument.
pub fn bool_arg(name: &str, args: &[Value], index: usize) -> Result<bool, CodecError> {
    let value = args.get(index);
    value.and_then(Value::as_bool).ok_or_else(|| CodecError::ArgumentType {
        name: name.to_string(),
        index,
        expected: "boolean",
        found: value.map_or("missing", Value::type_name),
    })
}
