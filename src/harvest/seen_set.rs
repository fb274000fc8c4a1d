//! The global SeenSet: the only cross-stream synchronization
//! point. Contains-or-insert must be atomic per name; `dashmap::DashSet`
//! gives us exactly that as a sharded concurrent set keyed internally on a
//! hash of the name.

use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct SeenSet {
    inner: DashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self { inner: DashSet::new() }
    }

    /// Atomically checks membership and inserts if absent. Returns `true`
    /// if `name` was newly inserted (i.e. it had not been seen before).
    pub fn insert_if_new(&self, name: &str) -> bool {
        self.inner.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
