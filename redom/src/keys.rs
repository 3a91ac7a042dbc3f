/// Key-construction helpers for one entity type.
///
/// Layout: `<entity>` is the id counter, `<entity>:all` the membership index and
/// `<entity>:<id>:<field>` holds a field value. A non-empty prefix is prepended as
/// `<prefix>:`.
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
    pub entity: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str, entity: &'a str) -> Self {
        Self { prefix, entity }
    }

    /// Joins `parts` under the entity namespace.
    pub fn join(&self, parts: &[&str]) -> String {
        let mut key = String::new();
        if !self.prefix.is_empty() {
            key.push_str(self.prefix);
            key.push(':');
        }
        key.push_str(self.entity);
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    pub fn counter(&self) -> String {
        self.join(&[])
    }

    pub fn membership(&self) -> String {
        self.join(&["all"])
    }

    pub fn field(&self, entity_id: &str, field: &str) -> String {
        self.join(&[entity_id, field])
    }

    /// Glob pattern matching every key owned by this entity type.
    pub fn pattern(&self) -> String {
        format!("{}*", self.counter())
    }
}
