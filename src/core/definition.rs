// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Index definitions: everything that gets a resolvable numeric index.
//!
//! Variables, labels and functions all become [`IndexDefinition`]s; the
//! attached [`IndexConverter`] says what the index means once known (plain
//! constant, code offset, frame slot, callable). Label indices are assigned
//! by the layout fixpoint, so the index lives in a `Cell` and operands keep
//! shared references to the definition set while offsets settle.

use std::cell::Cell;
use std::fmt;

use crate::core::constant::Constant;
use crate::core::datatype::{self, DataType};
use crate::core::error::Resolution;
use crate::core::identifier::{Identifier, IdentifierMap};
use crate::core::line::AssemblyLine;
use crate::core::scope::ScopeId;

/// Frame/indirection selector, the high nibble of an operand prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Region {
    Immediate = 0,
    Global = 1,
    Local = 2,
    PrevArg = 3,
    NextArg = 4,
    AppData = 5,
    HeapIndex = 6,
}

impl Region {
    pub fn selector(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Immediate => "immediate",
            Region::Global => "global",
            Region::Local => "local",
            Region::PrevArg => "prev-arg",
            Region::NextArg => "next-arg",
            Region::AppData => "app-data",
            Region::HeapIndex => "heap-index",
        };
        write!(f, "{name}")
    }
}

/// What a definition's index turns into once assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexConverter {
    /// The index is a plain numeric constant (app-data labels).
    Constant { dtype: DataType },
    /// The index is a byte offset into the enclosing code block (labels).
    CodeOffset,
    /// The index is a byte offset into a frame; operands become region
    /// references of the declared type (variables).
    FrameSlot { region: Region, dtype: DataType },
    /// The index is a function's position in the function table.
    Callable,
}

#[derive(Debug)]
pub struct IndexDefinition {
    name: Identifier,
    index: Cell<Option<i64>>,
    converter: IndexConverter,
}

impl IndexDefinition {
    pub fn new(name: Identifier, converter: IndexConverter) -> Self {
        Self {
            name,
            index: Cell::new(None),
            converter,
        }
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn converter(&self) -> &IndexConverter {
        &self.converter
    }

    pub fn index(&self) -> Option<i64> {
        self.index.get()
    }

    /// Set the index. The layout fixpoint reassigns label offsets until
    /// they settle; everything else is assigned exactly once.
    pub fn assign_index(&self, index: i64) {
        self.index.set(Some(index));
    }

    /// The constant form of this definition, if it has one. `None` means
    /// the definition kind has no constant reading (frame slots);
    /// `Some(Deferred)` means the index is simply not assigned yet.
    pub fn constant(&self) -> Option<Resolution<Constant>> {
        let dtype = match &self.converter {
            IndexConverter::Constant { dtype } => *dtype,
            IndexConverter::CodeOffset | IndexConverter::Callable => datatype::DEFAULT_LITERAL,
            IndexConverter::FrameSlot { .. } => return None,
        };
        Some(match self.index.get() {
            Some(index) => Resolution::Resolved(Constant::int(index as i128, dtype)),
            None => Resolution::Deferred,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(usize);

/// Owner of every index definition in a compilation unit.
#[derive(Debug, Default)]
pub struct DefinitionSet {
    defs: Vec<IndexDefinition>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self { defs: Vec::new() }
    }

    pub fn alloc(&mut self, def: IndexDefinition) -> DefId {
        self.defs.push(def);
        DefId(self.defs.len() - 1)
    }

    pub fn get(&self, id: DefId) -> &IndexDefinition {
        &self.defs[id.0]
    }
}

/// One compiled function: definition maps, child scope and body lines.
/// The body is consumed during binary generation.
#[derive(Debug)]
pub struct FunctionDefinition {
    pub name: Identifier,
    pub def: DefId,
    pub id_expr: Option<crate::core::expr::Expression>,
    pub guarded: bool,
    pub args: IdentifierMap<DefId>,
    pub locals: IdentifierMap<DefId>,
    pub labels: IdentifierMap<DefId>,
    pub scope: ScopeId,
    pub body: Vec<AssemblyLine>,
    pub arg_frame_size: u32,
    pub local_frame_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slot_has_no_constant_form() {
        let def = IndexDefinition::new(
            Identifier::new("g"),
            IndexConverter::FrameSlot {
                region: Region::Global,
                dtype: DataType::U32,
            },
        );
        def.assign_index(4);
        assert!(def.constant().is_none());
    }

    #[test]
    fn label_constant_defers_until_assigned() {
        let def = IndexDefinition::new(Identifier::new("loop"), IndexConverter::CodeOffset);
        assert_eq!(def.constant(), Some(Resolution::Deferred));
        def.assign_index(42);
        let constant = def.constant().unwrap().resolved().unwrap();
        assert_eq!(constant.int_value(), Some(42));
        assert_eq!(constant.dtype(), datatype::DEFAULT_LITERAL);
    }

    #[test]
    fn app_data_label_uses_declared_type() {
        let def = IndexDefinition::new(
            Identifier::new("table"),
            IndexConverter::Constant {
                dtype: DataType::S32,
            },
        );
        def.assign_index(16);
        let constant = def.constant().unwrap().resolved().unwrap();
        assert_eq!(constant.int_value(), Some(16));
    }

    #[test]
    fn region_selectors_fit_the_high_nibble() {
        for region in [
            Region::Immediate,
            Region::Global,
            Region::Local,
            Region::PrevArg,
            Region::NextArg,
            Region::AppData,
            Region::HeapIndex,
        ] {
            assert!(region.selector() <= 0x0F);
        }
    }
}
