use std::collections::{HashMap, HashSet, VecDeque};

use redis::{ErrorKind, RedisError, RedisResult};

use super::{Command, Reply, Store};
use crate::errors::RepoError;

#[derive(Debug, Clone)]
enum Entry {
    Text(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

/// In-process store answering the Redis command subset used by redom.
///
/// Follows server semantics where they matter to fields: `WRONGTYPE` errors,
/// empty collections disappear, negative list indices count from the tail.
/// `SPOP` removes an arbitrary member.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Entry>,
}

fn wrong_type() -> RedisError {
    RedisError::from((
        ErrorKind::ResponseError,
        "WRONGTYPE",
        "Operation against a key holding the wrong kind of value".to_string(),
    ))
}

fn server_error(message: impl Into<String>) -> RedisError {
    RedisError::from((ErrorKind::ResponseError, "ERR", message.into()))
}

fn bulk(value: impl Into<String>) -> Reply {
    Reply::BulkString(value.into().into_bytes())
}

fn bulk_array<I>(values: I) -> Reply
where
    I: IntoIterator<Item = String>,
{
    Reply::Array(values.into_iter().map(bulk).collect())
}

fn parse_int(raw: &str) -> RedisResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| server_error("value is not an integer or out of range"))
}

fn count(n: usize) -> Reply {
    Reply::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then(|| index as usize)
}

/// Inclusive `start..=stop` range with Redis clamping rules, or `None` when empty.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Glob match supporting `*` and `?`.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..])),
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn arity(name: &str, args: &[String], min: usize) -> RedisResult<()> {
    if args.len() < min {
        return Err(server_error(format!(
            "wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        )));
    }
    Ok(())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn list(&self, key: &str) -> RedisResult<Option<&VecDeque<String>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::List(list)) => Ok(Some(list)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn list_mut(&mut self, key: &str, create: bool) -> RedisResult<Option<&mut VecDeque<String>>> {
        if create && !self.entries.contains_key(key) {
            self.entries.insert(key.to_string(), Entry::List(VecDeque::new()));
        }
        match self.entries.get_mut(key) {
            None => Ok(None),
            Some(Entry::List(list)) => Ok(Some(list)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set(&self, key: &str) -> RedisResult<Option<&HashSet<String>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set_mut(&mut self, key: &str, create: bool) -> RedisResult<Option<&mut HashSet<String>>> {
        if create && !self.entries.contains_key(key) {
            self.entries.insert(key.to_string(), Entry::Set(HashSet::new()));
        }
        match self.entries.get_mut(key) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn hash(&self, key: &str) -> RedisResult<Option<&HashMap<String, String>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn hash_mut(&mut self, key: &str, create: bool) -> RedisResult<Option<&mut HashMap<String, String>>> {
        if create && !self.entries.contains_key(key) {
            self.entries.insert(key.to_string(), Entry::Hash(HashMap::new()));
        }
        match self.entries.get_mut(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
        }
    }

    /// Drops `key` if it now holds an empty collection.
    fn prune(&mut self, key: &str) {
        let empty = match self.entries.get(key) {
            Some(Entry::List(list)) => list.is_empty(),
            Some(Entry::Set(set)) => set.is_empty(),
            Some(Entry::Hash(hash)) => hash.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }

    fn set_algebra(&self, name: &str, keys: &[String]) -> RedisResult<Reply> {
        let mut operands = Vec::with_capacity(keys.len());
        for key in keys {
            operands.push(self.set(key)?.cloned().unwrap_or_default());
        }
        let mut iter = operands.into_iter();
        let first = iter.next().unwrap_or_default();
        let result = iter.fold(first, |acc, other| match name {
            "SINTER" => acc.intersection(&other).cloned().collect(),
            "SUNION" => acc.union(&other).cloned().collect(),
            _ => acc.difference(&other).cloned().collect(),
        });
        Ok(bulk_array(result))
    }

    fn push(&mut self, key: &str, values: &[String], front: bool) -> RedisResult<Reply> {
        let list = self.list_mut(key, true)?.ok_or_else(wrong_type)?;
        for value in values {
            if front {
                list.push_front(value.clone());
            } else {
                list.push_back(value.clone());
            }
        }
        Ok(count(list.len()))
    }

    fn pop(&mut self, key: &str, front: bool) -> RedisResult<Reply> {
        let popped = match self.list_mut(key, false)? {
            Some(list) if front => list.pop_front(),
            Some(list) => list.pop_back(),
            None => None,
        };
        self.prune(key);
        Ok(popped.map_or(Reply::Nil, bulk))
    }

    fn lrem(&mut self, key: &str, limit: i64, value: &str) -> RedisResult<Reply> {
        let Some(list) = self.list_mut(key, false)? else {
            return Ok(Reply::Int(0));
        };
        let max = if limit == 0 { usize::MAX } else { limit.unsigned_abs() as usize };
        let mut removed = 0usize;
        if limit >= 0 {
            let mut kept = VecDeque::with_capacity(list.len());
            for item in list.drain(..) {
                if removed < max && item == value {
                    removed += 1;
                } else {
                    kept.push_back(item);
                }
            }
            *list = kept;
        } else {
            let mut kept = VecDeque::with_capacity(list.len());
            while let Some(item) = list.pop_back() {
                if removed < max && item == value {
                    removed += 1;
                } else {
                    kept.push_front(item);
                }
            }
            *list = kept;
        }
        self.prune(key);
        Ok(count(removed))
    }

    fn scan(&self, args: &[String]) -> RedisResult<Reply> {
        let mut pattern = "*";
        let mut rest = args.iter().skip(1);
        while let Some(option) = rest.next() {
            let value = rest.next().ok_or_else(|| server_error("syntax error"))?;
            if option.eq_ignore_ascii_case("MATCH") {
                pattern = value;
            }
        }
        let keys = self
            .entries
            .keys()
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned();
        Ok(Reply::Array(vec![bulk("0"), bulk_array(keys)]))
    }

    fn dispatch(&mut self, name: &str, args: &[String]) -> RedisResult<Reply> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "PING" => Ok(Reply::SimpleString("PONG".to_string())),
            "GET" => {
                arity(name, args, 1)?;
                match self.entries.get(&args[0]) {
                    None => Ok(Reply::Nil),
                    Some(Entry::Text(text)) => Ok(bulk(text.clone())),
                    Some(_) => Err(wrong_type()),
                }
            }
            "SET" => {
                arity(name, args, 2)?;
                self.entries.insert(args[0].clone(), Entry::Text(args[1].clone()));
                Ok(Reply::Okay)
            }
            "DEL" => {
                arity(name, args, 1)?;
                let removed = args.iter().filter(|key| self.entries.remove(*key).is_some()).count();
                Ok(count(removed))
            }
            "EXISTS" => {
                arity(name, args, 1)?;
                Ok(count(args.iter().filter(|key| self.entries.contains_key(*key)).count()))
            }
            "INCR" => {
                arity(name, args, 1)?;
                let current = match self.entries.get(&args[0]) {
                    None => 0,
                    Some(Entry::Text(text)) => parse_int(text)?,
                    Some(_) => return Err(wrong_type()),
                };
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| server_error("increment or decrement would overflow"))?;
                self.entries.insert(args[0].clone(), Entry::Text(next.to_string()));
                Ok(Reply::Int(next))
            }
            "SADD" => {
                arity(name, args, 2)?;
                let set = self.set_mut(&args[0], true)?.ok_or_else(wrong_type)?;
                Ok(count(args[1..].iter().filter(|member| set.insert((*member).clone())).count()))
            }
            "SREM" => {
                arity(name, args, 2)?;
                let removed = match self.set_mut(&args[0], false)? {
                    Some(set) => args[1..].iter().filter(|member| set.remove(*member)).count(),
                    None => 0,
                };
                self.prune(&args[0]);
                Ok(count(removed))
            }
            "SISMEMBER" => {
                arity(name, args, 2)?;
                let found = self.set(&args[0])?.is_some_and(|set| set.contains(&args[1]));
                Ok(Reply::Int(i64::from(found)))
            }
            "SMEMBERS" => {
                arity(name, args, 1)?;
                let members = self.set(&args[0])?.cloned().unwrap_or_default();
                Ok(bulk_array(members))
            }
            "SCARD" => {
                arity(name, args, 1)?;
                Ok(count(self.set(&args[0])?.map_or(0, HashSet::len)))
            }
            "SPOP" => {
                arity(name, args, 1)?;
                let popped = match self.set_mut(&args[0], false)? {
                    Some(set) => {
                        let member = set.iter().next().cloned();
                        if let Some(member) = &member {
                            set.remove(member);
                        }
                        member
                    }
                    None => None,
                };
                self.prune(&args[0]);
                Ok(popped.map_or(Reply::Nil, bulk))
            }
            "SINTER" | "SUNION" | "SDIFF" => {
                arity(name, args, 1)?;
                self.set_algebra(&upper, args)
            }
            "LPUSH" | "RPUSH" => {
                arity(name, args, 2)?;
                self.push(&args[0], &args[1..], upper == "LPUSH")
            }
            "LPOP" | "RPOP" => {
                arity(name, args, 1)?;
                self.pop(&args[0], upper == "LPOP")
            }
            "LLEN" => {
                arity(name, args, 1)?;
                Ok(count(self.list(&args[0])?.map_or(0, VecDeque::len)))
            }
            "LINDEX" => {
                arity(name, args, 2)?;
                let index = parse_int(&args[1])?;
                let item = self
                    .list(&args[0])?
                    .and_then(|list| resolve_index(list.len(), index).map(|at| list[at].clone()));
                Ok(item.map_or(Reply::Nil, bulk))
            }
            "LSET" => {
                arity(name, args, 3)?;
                let index = parse_int(&args[1])?;
                let list = self.list_mut(&args[0], false)?.ok_or_else(|| server_error("no such key"))?;
                let at = resolve_index(list.len(), index).ok_or_else(|| server_error("index out of range"))?;
                list[at] = args[2].clone();
                Ok(Reply::Okay)
            }
            "LREM" => {
                arity(name, args, 3)?;
                let limit = parse_int(&args[1])?;
                self.lrem(&args[0], limit, &args[2])
            }
            "LRANGE" => {
                arity(name, args, 3)?;
                let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
                let items = match self.list(&args[0])? {
                    Some(list) => match resolve_range(list.len(), start, stop) {
                        Some((from, to)) => list.range(from..=to).cloned().collect(),
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                };
                Ok(bulk_array(items))
            }
            "LTRIM" => {
                arity(name, args, 3)?;
                let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
                if let Some(list) = self.list_mut(&args[0], false)? {
                    match resolve_range(list.len(), start, stop) {
                        Some((from, to)) => {
                            list.truncate(to + 1);
                            list.drain(..from);
                        }
                        None => list.clear(),
                    }
                }
                self.prune(&args[0]);
                Ok(Reply::Okay)
            }
            "HSET" => {
                arity(name, args, 3)?;
                if (args.len() - 1) % 2 != 0 {
                    return Err(server_error("wrong number of arguments for 'hset' command"));
                }
                let hash = self.hash_mut(&args[0], true)?.ok_or_else(wrong_type)?;
                let added = args[1..]
                    .chunks(2)
                    .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                    .count();
                Ok(count(added))
            }
            "HGET" => {
                arity(name, args, 2)?;
                let value = self.hash(&args[0])?.and_then(|hash| hash.get(&args[1]).cloned());
                Ok(value.map_or(Reply::Nil, bulk))
            }
            "HDEL" => {
                arity(name, args, 2)?;
                let removed = match self.hash_mut(&args[0], false)? {
                    Some(hash) => args[1..].iter().filter(|field| hash.remove(*field).is_some()).count(),
                    None => 0,
                };
                self.prune(&args[0]);
                Ok(count(removed))
            }
            "HEXISTS" => {
                arity(name, args, 2)?;
                let found = self.hash(&args[0])?.is_some_and(|hash| hash.contains_key(&args[1]));
                Ok(Reply::Int(i64::from(found)))
            }
            "HLEN" => {
                arity(name, args, 1)?;
                Ok(count(self.hash(&args[0])?.map_or(0, HashMap::len)))
            }
            "HKEYS" | "HVALS" | "HGETALL" => {
                arity(name, args, 1)?;
                let hash = self.hash(&args[0])?.cloned().unwrap_or_default();
                let items: Vec<String> = match upper.as_str() {
                    "HKEYS" => hash.into_keys().collect(),
                    "HVALS" => hash.into_values().collect(),
                    _ => hash.into_iter().flat_map(|(key, value)| [key, value]).collect(),
                };
                Ok(bulk_array(items))
            }
            "SCAN" => {
                arity(name, args, 1)?;
                self.scan(args)
            }
            _ => Err(server_error(format!("unknown command '{name}'"))),
        }
    }
}

impl Store for MemoryStore {
    fn execute(&mut self, command: &Command) -> Result<Reply, RepoError> {
        Ok(self.dispatch(command.name(), command.args())?)
    }
}
