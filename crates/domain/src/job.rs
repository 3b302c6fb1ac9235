//! Job descriptors.

use crate::value::{Value, ValueMap};
use std::fmt;

/// A unit of work: the name of the class that performs it plus its arguments.
///
/// `class_name` is resolved by whichever worker pops the job, so it is an
/// opaque string here. A job is only eligible for enqueueing when
/// [`Job::is_valid`] holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Job {
    /// Name of the job implementation the worker should run
    pub class_name: String,
    /// Positional arguments
    pub args: Vec<Value>,
    /// Named variables, absent on the wire unless set
    pub vars: Option<ValueMap>,
}

impl Job {
    /// Create a job with positional arguments.
    pub fn new(class_name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class_name: class_name.into(),
            args,
            vars: None,
        }
    }

    /// Create a job without arguments.
    pub fn without_args(class_name: impl Into<String>) -> Self {
        Self::new(class_name, Vec::new())
    }

    /// Attach named variables.
    pub fn with_vars(mut self, vars: ValueMap) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set a single named variable, creating the map if needed.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars
            .get_or_insert_with(ValueMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// A job is valid when it names the class that runs it.
    pub fn is_valid(&self) -> bool {
        !self.class_name.is_empty()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.class_name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}
