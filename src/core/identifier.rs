// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Symbol names and the insertion-ordered identifier map.

use std::collections::HashMap;
use std::fmt;

use crate::core::error::AssemblyError;

/// A symbol name. Identifiers produced by macro expansion carry the
/// invocation id as a tag, so the same textual name declared inside two
/// expansions of one macro stays two distinct symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    name: String,
    tag: Option<u32>,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
        }
    }

    pub fn tagged(name: impl Into<String>, tag: u32) -> Self {
        Self {
            name: name.into(),
            tag: Some(tag),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<u32> {
        self.tag
    }

    /// The same name with the hygiene tag stripped. Used as the resolution
    /// fallback so macro bodies can still reach call-site definitions.
    pub fn untagged(&self) -> Identifier {
        Identifier {
            name: self.name.clone(),
            tag: None,
        }
    }

    /// A copy carrying the given invocation tag.
    pub fn retagged(&self, tag: u32) -> Identifier {
        Identifier {
            name: self.name.clone(),
            tag: Some(tag),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(tag) => write!(f, "{}#{}", self.name, tag),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::new(name)
    }
}

/// Symbol table preserving insertion order. Order matters: frame offsets,
/// function indices and the dump all follow declaration order.
#[derive(Debug, Clone)]
pub struct IdentifierMap<T> {
    entries: Vec<(Identifier, T)>,
    lookup: HashMap<Identifier, usize>,
}

impl<T> IdentifierMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry. Inserting a name that is already present is a
    /// hard error; definition passes rely on this to reject duplicates.
    pub fn insert(&mut self, ident: Identifier, value: T) -> Result<(), AssemblyError> {
        if self.lookup.contains_key(&ident) {
            return Err(AssemblyError::new(format!(
                "Duplicate identifier '{ident}'"
            )));
        }
        self.lookup.insert(ident.clone(), self.entries.len());
        self.entries.push((ident, value));
        Ok(())
    }

    /// Insert or replace. Alias definitions use this: a later DEF of the
    /// same name silently wins.
    pub fn set(&mut self, ident: Identifier, value: T) {
        match self.lookup.get(&ident) {
            Some(&at) => self.entries[at].1 = value,
            None => {
                self.lookup.insert(ident.clone(), self.entries.len());
                self.entries.push((ident, value));
            }
        }
    }

    pub fn get(&self, ident: &Identifier) -> Option<&T> {
        self.lookup.get(ident).map(|&at| &self.entries[at].1)
    }

    pub fn contains(&self, ident: &Identifier) -> bool {
        self.lookup.contains_key(ident)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &T)> {
        self.entries.iter().map(|(ident, value)| (ident, value))
    }
}

impl<T> Default for IdentifierMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
