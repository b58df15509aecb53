// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Scope chain for identifier resolution.
//!
//! A scope is an ordered list of identifier maps plus a parent link: the
//! root scope carries globals, app-data labels and functions; each function
//! gets a child scope with its args, locals and code labels. Lookup walks
//! the local maps in declared order before recursing to the parent.

use crate::core::definition::DefId;
use crate::core::identifier::{Identifier, IdentifierMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug)]
struct Scope {
    maps: Vec<IdentifierMap<DefId>>,
    parent: Option<ScopeId>,
}

#[derive(Debug, Default)]
pub struct ScopeSet {
    scopes: Vec<Scope>,
}

impl ScopeSet {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Create an empty scope. Maps arrive later via [`ScopeSet::populate`],
    /// once every definition at that level is known.
    pub fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            maps: Vec::new(),
            parent,
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Attach the definition maps, in resolution order. One-shot.
    pub fn populate(&mut self, id: ScopeId, maps: Vec<IdentifierMap<DefId>>) {
        let scope = &mut self.scopes[id.0];
        debug_assert!(scope.maps.is_empty(), "scope populated twice");
        scope.maps = maps;
    }

    fn resolve_exact(&self, scope: ScopeId, ident: &Identifier) -> Option<DefId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            for map in &scope.maps {
                if let Some(&def) = map.get(ident) {
                    return Some(def);
                }
            }
            current = scope.parent;
        }
        None
    }

    /// Resolve an identifier. A hygiene-tagged name that misses everywhere
    /// retries as its untagged base, so macro bodies still reach call-site
    /// and global definitions while their own locals stay private.
    pub fn resolve(&self, scope: ScopeId, ident: &Identifier) -> Option<DefId> {
        if let Some(def) = self.resolve_exact(scope, ident) {
            return Some(def);
        }
        if ident.tag().is_some() {
            return self.resolve_exact(scope, &ident.untagged());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{DefinitionSet, IndexConverter, IndexDefinition};

    fn def(defs: &mut DefinitionSet, name: &Identifier) -> DefId {
        defs.alloc(IndexDefinition::new(name.clone(), IndexConverter::CodeOffset))
    }

    #[test]
    fn local_maps_shadow_parent_scope() {
        let mut defs = DefinitionSet::new();
        let mut scopes = ScopeSet::new();
        let name = Identifier::new("x");

        let outer_def = def(&mut defs, &name);
        let inner_def = def(&mut defs, &name);

        let root = scopes.alloc(None);
        let child = scopes.alloc(Some(root));

        let mut root_map = IdentifierMap::new();
        root_map.insert(name.clone(), outer_def).unwrap();
        scopes.populate(root, vec![root_map]);

        let mut child_map = IdentifierMap::new();
        child_map.insert(name.clone(), inner_def).unwrap();
        scopes.populate(child, vec![child_map]);

        assert_eq!(scopes.resolve(child, &name), Some(inner_def));
        assert_eq!(scopes.resolve(root, &name), Some(outer_def));
    }

    #[test]
    fn earlier_maps_win_within_one_scope() {
        let mut defs = DefinitionSet::new();
        let mut scopes = ScopeSet::new();
        let name = Identifier::new("x");

        let first = def(&mut defs, &name);
        let second = def(&mut defs, &name);

        let root = scopes.alloc(None);
        let mut vars = IdentifierMap::new();
        vars.insert(name.clone(), first).unwrap();
        let mut labels = IdentifierMap::new();
        labels.insert(name.clone(), second).unwrap();
        scopes.populate(root, vec![vars, labels]);

        assert_eq!(scopes.resolve(root, &name), Some(first));
    }

    #[test]
    fn tagged_identifier_falls_back_to_untagged_base() {
        let mut defs = DefinitionSet::new();
        let mut scopes = ScopeSet::new();

        let global = Identifier::new("g");
        let global_def = def(&mut defs, &global);

        let root = scopes.alloc(None);
        let mut map = IdentifierMap::new();
        map.insert(global.clone(), global_def).unwrap();
        scopes.populate(root, vec![map]);

        let from_macro = Identifier::tagged("g", 3);
        assert_eq!(scopes.resolve(root, &from_macro), Some(global_def));
        assert_eq!(scopes.resolve(root, &Identifier::tagged("h", 3)), None);
    }

    #[test]
    fn tagged_definition_beats_untagged_fallback() {
        let mut defs = DefinitionSet::new();
        let mut scopes = ScopeSet::new();

        let plain = Identifier::new("L");
        let tagged = Identifier::tagged("L", 1);
        let plain_def = def(&mut defs, &plain);
        let tagged_def = def(&mut defs, &tagged);

        let root = scopes.alloc(None);
        let mut map = IdentifierMap::new();
        map.insert(plain.clone(), plain_def).unwrap();
        map.insert(tagged.clone(), tagged_def).unwrap();
        scopes.populate(root, vec![map]);

        assert_eq!(scopes.resolve(root, &tagged), Some(tagged_def));
        assert_eq!(scopes.resolve(root, &plain), Some(plain_def));
    }
}
