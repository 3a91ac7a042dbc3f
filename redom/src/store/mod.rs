//! Store boundary: command descriptors and the backends that execute them.
//!
//! Every field operation is expressed as a [`Command`] and sent through a [`Store`].
//! `RedisStore` talks to a live server; `MemoryStore` answers the same command set
//! in-process.

mod memory;
mod redis_store;
pub(crate) mod reply;

use std::fmt;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::errors::RepoError;

/// Raw reply returned by a store for one command.
pub type Reply = redis::Value;

/// A single store command: name plus textual arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self { name, args: Vec::new() }
    }

    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes commands against a key-value store.
///
/// Failures are returned as-is; callers add no retry or wrapping.
pub trait Store: Send {
    fn execute(&mut self, command: &Command) -> Result<Reply, RepoError>;
}

impl<S> Store for Box<S>
where
    S: Store + ?Sized,
{
    fn execute(&mut self, command: &Command) -> Result<Reply, RepoError> {
        (**self).execute(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_text_joins_arguments() {
        let command = Command::new("LRANGE").arg("user:1:likes").arg(0).arg(-1);
        assert_eq!(command.to_string(), "LRANGE user:1:likes 0 -1");
        assert_eq!(command.name(), "LRANGE");
        assert_eq!(command.args().len(), 3);
    }
}
