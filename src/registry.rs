//! Name Registry - First Name Wins, Per Target

use indexmap::IndexSet;

/// Names admitted to one sprite target. Each target owns its own
/// registry, so equal names in different targets never collide.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: IndexSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` and return `true` on its first occurrence; return
    /// `false` without changing anything on every later one.
    pub fn admit(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Admitted names in admission order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
