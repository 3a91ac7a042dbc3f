use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    config::RedomConfig,
    errors::RepoError,
    keys::KeyContext,
    store::{Command, RedisStore, Reply, Store},
};

/// Connection holder shared by every entity type registered against it.
///
/// Cloning is cheap; clones share the same store handle. Commands are serialized
/// through a mutex, one blocking round trip at a time.
#[derive(Clone)]
pub struct Manager {
    store: Arc<Mutex<Box<dyn Store>>>,
    prefix: Arc<str>,
}

impl Manager {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Arc::new(Mutex::new(Box::new(store))),
            prefix: Arc::from(""),
        }
    }

    /// Returns a manager sharing this connection but namespacing keys under `prefix`.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: Arc::from(prefix.into()),
        }
    }

    /// Opens a blocking Redis connection at `url`.
    pub fn connect(url: &str) -> Result<Self, RepoError> {
        Ok(Self::new(RedisStore::open(url)?))
    }

    pub fn from_config(config: &RedomConfig) -> anyhow::Result<Self> {
        let url = config.redis_url()?;
        let manager = Self::connect(&url)?;
        Ok(manager.with_prefix(config.redis.key_prefix.clone()))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key_context<'a>(&'a self, entity: &'a str) -> KeyContext<'a> {
        KeyContext::new(&self.prefix, entity)
    }

    pub fn execute(&self, command: &Command) -> Result<Reply, RepoError> {
        let mut store = self.store.lock().map_err(|_| RepoError::Other {
            message: "store connection lock poisoned".into(),
        })?;
        store.execute(command)
    }

    pub fn ping(&self) -> Result<bool, RepoError> {
        let reply = self.execute(&Command::new("PING"))?;
        Ok(matches!(reply, Reply::SimpleString(ref pong) if pong == "PONG"))
    }

    /// True when both managers share one connection.
    pub fn shares_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}
