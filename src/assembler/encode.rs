// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand and instruction encoding.
//!
//! Every operand starts with a self-describing prefix byte,
//! `(region_selector << 4) | datatype_tag`, followed by the payload.
//! Immediates use region 0; reference operands carry the value type in
//! their prefix and a nested index operand for the frame offset;
//! pointer-indirect references additionally prepend the pointer
//! sub-operand's bytes. Index operands (labels, functions, frame offsets)
//! encode as a signed 32-bit payload until the layout fixpoint proves the
//! index fits a signed byte.

use crate::core::constant::Constant;
use crate::core::datatype::{DataType, OPERAND_TYPES};
use crate::core::definition::{DefId, IndexConverter, Region};
use crate::core::error::{AssemblyError, Resolution};
use crate::core::expr::{EvalContext, ExprKind, Expression};
use crate::core::line::AssemblyLine;
use crate::optable;

/// Width every index operand starts at.
const WIDE_INDEX: DataType = DataType::S32;
/// Width an index operand may shrink to.
const NARROW_INDEX: DataType = DataType::S8;

#[derive(Debug, Clone)]
pub enum Operand {
    /// Immediate literal, already narrowed against [`OPERAND_TYPES`].
    Constant(Constant),
    /// A definition's index (label offset, function index, frame offset).
    Index { def: DefId, dtype: DataType },
    /// Constant expression that still involves unassigned indices;
    /// re-evaluated against the current layout on every narrowing pass and
    /// at encode time.
    Deferred { expr: Expression, dtype: DataType },
    /// Frame or data-segment reference. `pointer` is set for
    /// heap-indirect references through a pointer-holding variable.
    Reference {
        region: Region,
        dtype: DataType,
        pointer: Option<Box<Operand>>,
        offset: Box<Operand>,
    },
}

impl Operand {
    pub fn byte_len(&self) -> u32 {
        match self {
            Operand::Constant(constant) => 1 + constant.dtype().byte_size(),
            Operand::Index { dtype, .. } | Operand::Deferred { dtype, .. } => {
                1 + dtype.byte_size()
            }
            Operand::Reference {
                pointer, offset, ..
            } => {
                let pointer_len = pointer.as_ref().map(|p| p.byte_len()).unwrap_or(0);
                1 + pointer_len + offset.byte_len()
            }
        }
    }

    /// Shrink wide index payloads whose value is now known to fit a signed
    /// byte. Returns whether anything changed; widths never grow back, so
    /// the layout fixpoint terminates.
    pub fn try_narrow(&mut self, ctx: &EvalContext<'_>) -> Result<bool, AssemblyError> {
        match self {
            Operand::Constant(_) => Ok(false),
            Operand::Index { def, dtype } => {
                if *dtype != WIDE_INDEX {
                    return Ok(false);
                }
                match ctx.defs.get(*def).index() {
                    Some(index) if NARROW_INDEX.contains(index as i128) => {
                        *dtype = NARROW_INDEX;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            Operand::Deferred { expr, dtype } => {
                if *dtype != WIDE_INDEX {
                    return Ok(false);
                }
                match expr.constant(ctx)? {
                    Resolution::Resolved(constant) => match constant.int_value() {
                        Some(value) if NARROW_INDEX.contains(value) => {
                            *dtype = NARROW_INDEX;
                            Ok(true)
                        }
                        _ => Ok(false),
                    },
                    Resolution::Deferred => Ok(false),
                }
            }
            Operand::Reference {
                pointer, offset, ..
            } => {
                let mut narrowed = false;
                if let Some(pointer) = pointer {
                    narrowed |= pointer.try_narrow(ctx)?;
                }
                narrowed |= offset.try_narrow(ctx)?;
                Ok(narrowed)
            }
        }
    }

    pub fn encode(&self, ctx: &EvalContext<'_>, out: &mut Vec<u8>) -> Result<(), AssemblyError> {
        match self {
            Operand::Constant(constant) => {
                out.push(prefix(Region::Immediate, constant.dtype()));
                constant.encode(out);
            }
            Operand::Index { def, dtype } => {
                let def = ctx.defs.get(*def);
                let index = def.index().ok_or_else(|| {
                    AssemblyError::new(format!("Unresolved value for '{}'", def.name()))
                })?;
                out.push(prefix(Region::Immediate, *dtype));
                dtype.encode_int(index as i128, out);
            }
            Operand::Deferred { expr, dtype } => {
                let constant = expr.constant(ctx)?.required("operand value")?;
                let number = constant
                    .as_number()
                    .ok_or_else(|| AssemblyError::new("Expected numeric value"))?
                    .retype(*dtype)?;
                out.push(prefix(Region::Immediate, *dtype));
                number.encode(out);
            }
            Operand::Reference {
                region,
                dtype,
                pointer,
                offset,
            } => {
                out.push(prefix(*region, *dtype));
                if let Some(pointer) = pointer {
                    pointer.encode(ctx, out)?;
                }
                offset.encode(ctx, out)?;
            }
        }
        Ok(())
    }
}

fn prefix(region: Region, dtype: DataType) -> u8 {
    (region.selector() << 4) | dtype.tag()
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: u8,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn byte_len(&self) -> u32 {
        1 + self.operands.iter().map(Operand::byte_len).sum::<u32>()
    }

    pub fn try_narrow(&mut self, ctx: &EvalContext<'_>) -> Result<bool, AssemblyError> {
        let mut narrowed = false;
        for operand in &mut self.operands {
            narrowed |= operand.try_narrow(ctx)?;
        }
        Ok(narrowed)
    }

    pub fn encode(&self, ctx: &EvalContext<'_>, out: &mut Vec<u8>) -> Result<(), AssemblyError> {
        out.push(self.opcode);
        for operand in &self.operands {
            operand.encode(ctx, out)?;
        }
        Ok(())
    }
}

/// Build an instruction from a mnemonic line, turning every argument
/// expression into an operand.
pub fn instruction_for(
    line: &AssemblyLine,
    ctx: &EvalContext<'_>,
) -> Result<Instruction, AssemblyError> {
    let entry = optable::lookup(&line.directive)
        .ok_or_else(|| line.error(format!("Unknown instruction '{}'", line.directive)))?;
    if line.args.len() != entry.operands as usize {
        return Err(line.error(format!(
            "{} expects {} operands, got {}",
            entry.mnemonic,
            entry.operands,
            line.args.len()
        )));
    }
    let operands = line
        .args
        .iter()
        .map(|arg| operand_for(arg, ctx).map_err(|err| line.locate(err)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instruction {
        opcode: entry.opcode,
        operands,
    })
}

/// Resolve one argument expression to an operand, in query order: named
/// definitions first (frame references, index operands, folded app-data
/// constants), then subscript references, then constant folding with a
/// deferred fallback for layout-dependent expressions.
pub fn operand_for(
    expr: &Expression,
    ctx: &EvalContext<'_>,
) -> Result<Operand, AssemblyError> {
    if let Some(ident) = expr.identifier() {
        if optable::builtin_constant(ident.name()).is_some() {
            let constant = expr.constant(ctx)?.required("operand value")?;
            return compressed(constant);
        }
        let def_id = ctx
            .scopes
            .resolve(expr.resolved_scope(), ident)
            .ok_or_else(|| AssemblyError::new(format!("Unknown identifier '{ident}'")))?;
        let def = ctx.defs.get(def_id);
        return Ok(match def.converter() {
            IndexConverter::FrameSlot { region, dtype } => Operand::Reference {
                region: *region,
                dtype: *dtype,
                pointer: None,
                offset: Box::new(Operand::Index {
                    def: def_id,
                    dtype: WIDE_INDEX,
                }),
            },
            IndexConverter::Constant { .. } => match def.constant() {
                Some(Resolution::Resolved(constant)) => compressed(constant)?,
                _ => Operand::Deferred {
                    expr: expr.clone(),
                    dtype: WIDE_INDEX,
                },
            },
            IndexConverter::CodeOffset | IndexConverter::Callable => Operand::Index {
                def: def_id,
                dtype: WIDE_INDEX,
            },
        });
    }
    if let ExprKind::Subscript { base, index, dtype } = &expr.kind {
        return reference_for(base, index, dtype, ctx);
    }
    match expr.constant(ctx)? {
        Resolution::Resolved(constant) => compressed(constant),
        Resolution::Deferred => Ok(Operand::Deferred {
            expr: expr.clone(),
            dtype: WIDE_INDEX,
        }),
    }
}

/// Immediate operand with default-typed integers narrowed against the
/// instruction-operand type set. Explicitly typed values keep their type.
fn compressed(constant: Constant) -> Result<Operand, AssemblyError> {
    match constant.as_number() {
        Some(number) if number.dtype().is_compressible() => Ok(Operand::Constant(
            Constant::Number(number.compress(OPERAND_TYPES)?),
        )),
        _ => Ok(Operand::Constant(constant)),
    }
}

fn region_keyword(name: &str) -> Option<Region> {
    match name {
        "GLOBAL" => Some(Region::Global),
        "LOCAL" => Some(Region::Local),
        "PREV" => Some(Region::PrevArg),
        "NEXT" => Some(Region::NextArg),
        "DATA" => Some(Region::AppData),
        _ => None,
    }
}

/// `base[index]:type` reference. A region keyword base addresses that
/// frame directly; a variable base is a heap-indirect reference through
/// the pointer it holds.
fn reference_for(
    base: &Expression,
    index: &Expression,
    dtype_expr: &Expression,
    ctx: &EvalContext<'_>,
) -> Result<Operand, AssemblyError> {
    let dtype = dtype_expr.data_type()?;
    let offset = Box::new(operand_for(index, ctx)?);
    if let Some(ident) = base.identifier() {
        if let Some(region) = region_keyword(ident.name()) {
            return Ok(Operand::Reference {
                region,
                dtype,
                pointer: None,
                offset,
            });
        }
    }
    let pointer = operand_for(base, ctx)?;
    match pointer {
        Operand::Reference { .. } => Ok(Operand::Reference {
            region: Region::HeapIndex,
            dtype,
            pointer: Some(Box::new(pointer)),
            offset,
        }),
        _ => Err(AssemblyError::new(
            "Subscript base must be a variable or region keyword",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::datatype::DEFAULT_LITERAL;
    use crate::core::definition::{DefinitionSet, IndexDefinition};
    use crate::core::identifier::{Identifier, IdentifierMap};
    use crate::core::scope::ScopeSet;

    struct Fixture {
        scopes: ScopeSet,
        defs: DefinitionSet,
        root: crate::core::scope::ScopeId,
    }

    fn fixture(defs: Vec<(&str, IndexConverter, Option<i64>)>) -> Fixture {
        let mut set = DefinitionSet::new();
        let mut scopes = ScopeSet::new();
        let root = scopes.alloc(None);
        let mut map = IdentifierMap::new();
        for (name, converter, index) in defs {
            let def = IndexDefinition::new(Identifier::new(name), converter);
            if let Some(index) = index {
                def.assign_index(index);
            }
            map.insert(Identifier::new(name), set.alloc(def)).unwrap();
        }
        scopes.populate(root, vec![map]);
        Fixture {
            scopes,
            defs: set,
            root,
        }
    }

    impl Fixture {
        fn ctx(&self) -> EvalContext<'_> {
            EvalContext {
                scopes: &self.scopes,
                defs: &self.defs,
                functions: &[],
            }
        }

        fn operand(&self, mut expr: Expression) -> Operand {
            expr.assign_scope(self.root);
            operand_for(&expr, &self.ctx()).unwrap()
        }

        fn bytes(&self, expr: Expression) -> Vec<u8> {
            let operand = self.operand(expr);
            let mut out = Vec::new();
            operand.encode(&self.ctx(), &mut out).unwrap();
            out
        }
    }

    #[test]
    fn immediate_literals_compress_to_the_smallest_operand_type() {
        let fx = fixture(vec![]);
        assert_eq!(fx.bytes(Expression::int(3, DEFAULT_LITERAL)), vec![0x04, 3]);
        assert_eq!(
            fx.bytes(Expression::int(300, DEFAULT_LITERAL)),
            vec![0x05, 0x2C, 0x01]
        );
        assert_eq!(
            fx.bytes(Expression::int(100_000, DEFAULT_LITERAL)),
            vec![0x06, 0xA0, 0x86, 0x01, 0x00]
        );
    }

    #[test]
    fn explicitly_typed_immediates_keep_their_type() {
        let fx = fixture(vec![]);
        // 3:u16 stays two unsigned bytes, tag 1.
        assert_eq!(
            fx.bytes(Expression::int(3, DataType::U16)),
            vec![0x01, 3, 0]
        );
    }

    #[test]
    fn global_variable_becomes_a_narrowed_reference() {
        let fx = fixture(vec![(
            "g",
            IndexConverter::FrameSlot {
                region: Region::Global,
                dtype: DataType::U32,
            },
            Some(0),
        )]);
        let mut operand = fx.operand(Expression::ident("g"));
        assert_eq!(operand.byte_len(), 1 + 5);
        assert!(operand.try_narrow(&fx.ctx()).unwrap());
        let mut out = Vec::new();
        operand.encode(&fx.ctx(), &mut out).unwrap();
        assert_eq!(out, vec![0x12, 0x04, 0x00]);
    }

    #[test]
    fn label_index_narrows_only_when_the_offset_fits() {
        let fx = fixture(vec![
            ("near", IndexConverter::CodeOffset, Some(9)),
            ("far", IndexConverter::CodeOffset, Some(300)),
        ]);
        let mut near = fx.operand(Expression::ident("near"));
        assert!(near.try_narrow(&fx.ctx()).unwrap());
        assert_eq!(near.byte_len(), 2);
        let mut far = fx.operand(Expression::ident("far"));
        assert!(!far.try_narrow(&fx.ctx()).unwrap());
        assert_eq!(far.byte_len(), 5);
    }

    #[test]
    fn unassigned_label_defers_then_encodes() {
        let fx = fixture(vec![("later", IndexConverter::CodeOffset, None)]);
        let mut expr = Expression::binary(
            crate::core::expr::BinaryOp::Add,
            Expression::ident("later"),
            Expression::int(2, DEFAULT_LITERAL),
        );
        expr.assign_scope(fx.root);
        let operand = operand_for(&expr, &fx.ctx()).unwrap();
        assert!(matches!(operand, Operand::Deferred { .. }));
        let mut out = Vec::new();
        assert!(operand.encode(&fx.ctx(), &mut out).is_err());

        fx.defs
            .get(fx.scopes.resolve(fx.root, &Identifier::new("later")).unwrap())
            .assign_index(4);
        out.clear();
        operand.encode(&fx.ctx(), &mut out).unwrap();
        assert_eq!(out, vec![0x06, 6, 0, 0, 0]);
    }

    #[test]
    fn region_keyword_subscripts_address_frames_directly() {
        let fx = fixture(vec![]);
        let mut expr = Expression::new(ExprKind::Subscript {
            base: Box::new(Expression::ident("PREV")),
            index: Box::new(Expression::int(2, DEFAULT_LITERAL)),
            dtype: Box::new(Expression::ident("u16")),
        });
        expr.assign_scope(fx.root);
        let operand = operand_for(&expr, &fx.ctx()).unwrap();
        let mut out = Vec::new();
        operand.encode(&fx.ctx(), &mut out).unwrap();
        assert_eq!(out, vec![0x31, 0x04, 0x02]);
    }

    #[test]
    fn pointer_variable_subscript_goes_heap_indirect() {
        let fx = fixture(vec![(
            "p",
            IndexConverter::FrameSlot {
                region: Region::Local,
                dtype: DataType::U32,
            },
            Some(8),
        )]);
        let mut expr = Expression::new(ExprKind::Subscript {
            base: Box::new(Expression::ident("p")),
            index: Box::new(Expression::int(1, DEFAULT_LITERAL)),
            dtype: Box::new(Expression::ident("u8")),
        });
        expr.assign_scope(fx.root);
        let mut operand = operand_for(&expr, &fx.ctx()).unwrap();
        operand.try_narrow(&fx.ctx()).unwrap();
        let mut out = Vec::new();
        operand.encode(&fx.ctx(), &mut out).unwrap();
        // heap prefix, pointer reference (local u32 @8), index 1
        assert_eq!(out, vec![0x60, 0x22, 0x04, 0x08, 0x04, 0x01]);
    }

    #[test]
    fn operand_count_mismatch_names_the_mnemonic() {
        let fx = fixture(vec![]);
        let line = AssemblyLine::new(
            "MOV",
            vec![Expression::int(1, DEFAULT_LITERAL)],
            3,
            "test.vas",
        );
        let err = instruction_for(&line, &fx.ctx()).unwrap_err();
        assert_eq!(err.message(), "MOV expects 2 operands, got 1");
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn unknown_mnemonic_is_reported() {
        let fx = fixture(vec![]);
        let line = AssemblyLine::new("FROB", vec![], 9, "test.vas");
        let err = instruction_for(&line, &fx.ctx()).unwrap_err();
        assert_eq!(err.message(), "Unknown instruction 'FROB'");
    }
}
