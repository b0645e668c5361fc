//! Alias table
//!
//! Maps alias names to raw command strings. Lookups ignore ASCII case; the
//! spelling of the first definition is kept for display and persistence.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    /// lowercased name -> (display name, raw command string)
    entries: BTreeMap<String, (String, String)>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace an alias
    pub fn insert(&mut self, name: impl Into<String>, commands: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        let commands = commands.into();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.1 = commands,
            None => {
                self.entries.insert(key, (name, commands));
            }
        }
    }

    /// Remove an alias, returning its command string
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, commands)| commands)
    }

    /// Look up an alias by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, commands)| commands.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterate `(name, commands)` sorted by lowercased name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, commands)| (name.as_str(), commands.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, C: Into<String>> FromIterator<(N, C)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        let mut table = AliasTable::new();
        for (name, commands) in iter {
            table.insert(name, commands);
        }
        table
    }
}
