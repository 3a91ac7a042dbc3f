use redis::ConnectionLike;

use super::{Command, Reply, Store};
use crate::errors::RepoError;

/// Store backed by a synchronous Redis connection.
pub struct RedisStore<C>
where
    C: ConnectionLike + Send,
{
    connection: C,
}

impl<C> RedisStore<C>
where
    C: ConnectionLike + Send,
{
    pub fn new(connection: C) -> Self {
        Self { connection }
    }

    pub fn into_inner(self) -> C {
        self.connection
    }
}

impl RedisStore<redis::Connection> {
    /// Opens a single blocking connection to `url`.
    pub fn open(url: &str) -> Result<Self, RepoError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection()?;
        Ok(Self::new(connection))
    }
}

impl<C> Store for RedisStore<C>
where
    C: ConnectionLike + Send,
{
    fn execute(&mut self, command: &Command) -> Result<Reply, RepoError> {
        let mut cmd = redis::cmd(command.name());
        for arg in command.args() {
            cmd.arg(arg);
        }
        let reply: Reply = cmd.query(&mut self.connection)?;
        Ok(reply)
    }
}
