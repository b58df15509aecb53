// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression AST and the constant-folding evaluator.
//!
//! Each node answers a set of queries: identifier, constant, data type
//! (operand queries live with the encoder). Folding runs late, at extraction
//! and encode time, so identifiers may legitimately still be unresolved; the
//! [`Resolution`] outcome distinguishes "not yet" from a hard failure.

use crate::core::constant::{Constant, Number, NumberConstant, StringConstant};
use crate::core::datatype::DataType;
use crate::core::definition::{DefinitionSet, FunctionDefinition};
use crate::core::error::{AssemblyError, EvalResult, Resolution};
use crate::core::identifier::Identifier;
use crate::core::scope::{ScopeId, ScopeSet};
use crate::optable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(NumberConstant),
    Str(StringConstant),
    Ident(Identifier),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `base[index]:type` subscript addressing.
    Subscript {
        base: Box<Expression>,
        index: Box<Expression>,
        dtype: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub scope: Option<ScopeId>,
}

/// Shared lookup state for evaluation. Built fresh per pass by the
/// assembler; built-in constants come from the static table instead.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub scopes: &'a ScopeSet,
    pub defs: &'a DefinitionSet,
    pub functions: &'a [FunctionDefinition],
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, scope: None }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Ident(Identifier::new(name)))
    }

    pub fn int(value: i128, dtype: DataType) -> Self {
        Self::new(ExprKind::Number(NumberConstant::new(
            Number::Int(value),
            dtype,
        )))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(ExprKind::Str(StringConstant::new(text)))
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// The scope this expression resolves in. Populated by a dedicated pass
    /// before any evaluation; evaluating without one is a logic fault.
    pub fn resolved_scope(&self) -> ScopeId {
        self.scope
            .expect("expression scope populated before evaluation")
    }

    /// Recursively stamp the resolving scope onto this node and children.
    pub fn assign_scope(&mut self, scope: ScopeId) {
        self.scope = Some(scope);
        match &mut self.kind {
            ExprKind::Unary { operand, .. } => operand.assign_scope(scope),
            ExprKind::Binary { left, right, .. } => {
                left.assign_scope(scope);
                right.assign_scope(scope);
            }
            ExprKind::Subscript { base, index, dtype } => {
                base.assign_scope(scope);
                index.assign_scope(scope);
                dtype.assign_scope(scope);
            }
            _ => {}
        }
    }

    /// Pure rewrite: `f` may replace any node (replacements are not
    /// descended into); other nodes are rebuilt around rewritten children.
    /// Returns the new tree and the replacement count.
    pub fn rewrite<F>(&self, f: &mut F) -> (Expression, usize)
    where
        F: FnMut(&Expression) -> Option<Expression>,
    {
        if let Some(replacement) = f(self) {
            return (replacement, 1);
        }
        match &self.kind {
            ExprKind::Unary { op, operand } => {
                let (new_operand, count) = operand.rewrite(f);
                (
                    Expression {
                        kind: ExprKind::Unary {
                            op: *op,
                            operand: Box::new(new_operand),
                        },
                        scope: self.scope,
                    },
                    count,
                )
            }
            ExprKind::Binary { op, left, right } => {
                let (new_left, lcount) = left.rewrite(f);
                let (new_right, rcount) = right.rewrite(f);
                (
                    Expression {
                        kind: ExprKind::Binary {
                            op: *op,
                            left: Box::new(new_left),
                            right: Box::new(new_right),
                        },
                        scope: self.scope,
                    },
                    lcount + rcount,
                )
            }
            ExprKind::Subscript { base, index, dtype } => {
                let (new_base, bcount) = base.rewrite(f);
                let (new_index, icount) = index.rewrite(f);
                let (new_dtype, dcount) = dtype.rewrite(f);
                (
                    Expression {
                        kind: ExprKind::Subscript {
                            base: Box::new(new_base),
                            index: Box::new(new_index),
                            dtype: Box::new(new_dtype),
                        },
                        scope: self.scope,
                    },
                    bcount + icount + dcount,
                )
            }
            _ => (self.clone(), 0),
        }
    }

    /// The bare identifier this node names, if it is one.
    pub fn identifier(&self) -> Option<&Identifier> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// Resolve to a data type. Only type-name identifiers qualify.
    pub fn data_type(&self) -> Result<DataType, AssemblyError> {
        match &self.kind {
            ExprKind::Ident(ident) => DataType::from_name(ident.name())
                .ok_or_else(|| AssemblyError::new(format!("Unknown data type '{}'", ident.name()))),
            _ => Err(AssemblyError::new("Expected data type name")),
        }
    }

    /// Resolve to a callable function, searching the whole scope chain.
    pub fn function_ref<'a>(
        &self,
        ctx: &EvalContext<'a>,
    ) -> Result<&'a FunctionDefinition, AssemblyError> {
        let ident = self
            .identifier()
            .ok_or_else(|| AssemblyError::new("Expected function name"))?;
        let def = ctx
            .scopes
            .resolve(self.resolved_scope(), ident)
            .ok_or_else(|| AssemblyError::new(format!("Unknown identifier '{ident}'")))?;
        ctx.functions
            .iter()
            .find(|function| function.def == def)
            .ok_or_else(|| AssemblyError::new(format!("'{ident}' is not a function")))
    }

    /// Fold to a constant. `Deferred` means an index definition involved in
    /// the expression has no index assigned yet.
    pub fn constant(&self, ctx: &EvalContext<'_>) -> EvalResult<Constant> {
        match &self.kind {
            ExprKind::Number(number) => Ok(Resolution::Resolved(Constant::Number(number.clone()))),
            ExprKind::Str(string) => Ok(Resolution::Resolved(Constant::Str(string.clone()))),
            ExprKind::Ident(ident) => self.ident_constant(ident, ctx),
            ExprKind::Unary { op, operand } => match operand.constant(ctx)? {
                Resolution::Deferred => Ok(Resolution::Deferred),
                Resolution::Resolved(value) => fold_unary(*op, &value).map(Resolution::Resolved),
            },
            ExprKind::Binary { op, left, right } => {
                let lhs = left.constant(ctx)?;
                let rhs = right.constant(ctx)?;
                match (lhs, rhs) {
                    (Resolution::Resolved(lhs), Resolution::Resolved(rhs)) => {
                        fold_binary(*op, &lhs, &rhs).map(Resolution::Resolved)
                    }
                    _ => Ok(Resolution::Deferred),
                }
            }
            ExprKind::Subscript { .. } => Err(AssemblyError::new("Expected constant value")),
        }
    }

    fn ident_constant(&self, ident: &Identifier, ctx: &EvalContext<'_>) -> EvalResult<Constant> {
        if let Some(value) = optable::builtin_constant(ident.name()) {
            return Ok(Resolution::Resolved(Constant::int(
                value as i128,
                crate::core::datatype::DEFAULT_LITERAL,
            )));
        }
        let def_id = ctx
            .scopes
            .resolve(self.resolved_scope(), ident)
            .ok_or_else(|| AssemblyError::new(format!("Unknown identifier '{ident}'")))?;
        let def = ctx.defs.get(def_id);
        match def.constant() {
            Some(resolution) => Ok(resolution),
            None => Err(AssemblyError::new(format!(
                "Identifier '{ident}' is not a constant"
            ))),
        }
    }
}

fn fold_unary(op: UnaryOp, value: &Constant) -> Result<Constant, AssemblyError> {
    let number = value
        .as_number()
        .ok_or_else(|| AssemblyError::new("Expected numeric value"))?;
    let dtype = number.dtype();
    let folded = match (op, number.value()) {
        (UnaryOp::Neg, Number::Int(value)) => {
            NumberConstant::new(Number::Int(dtype.restrict(-value)), dtype)
        }
        (UnaryOp::Neg, Number::Float(value)) => NumberConstant::new(Number::Float(-value), dtype),
        (UnaryOp::BitNot, Number::Int(value)) => {
            NumberConstant::new(Number::Int(dtype.restrict(!value)), dtype)
        }
        (UnaryOp::BitNot, Number::Float(_)) => {
            return Err(AssemblyError::new("Expected integer value"));
        }
    };
    Ok(Constant::Number(folded))
}

fn fold_binary(op: BinaryOp, lhs: &Constant, rhs: &Constant) -> Result<Constant, AssemblyError> {
    // String concatenation bypasses the numeric merge only when both sides
    // are already strings.
    if op == BinaryOp::Add {
        if let (Constant::Str(left), Constant::Str(right)) = (lhs, rhs) {
            return Ok(Constant::Str(left.concat(right)));
        }
    }

    let merged = lhs.dtype().merge(rhs.dtype())?;
    let (left, right) = match (lhs.as_number(), rhs.as_number()) {
        (Some(left), Some(right)) => (left, right),
        _ => return Err(AssemblyError::new("Expected numeric value")),
    };

    match (left.int_value(), right.int_value()) {
        (Some(lv), Some(rv)) => {
            let raw = match op {
                BinaryOp::Add => lv.wrapping_add(rv),
                BinaryOp::Sub => lv.wrapping_sub(rv),
                BinaryOp::Mul => lv.wrapping_mul(rv),
                BinaryOp::Div => {
                    if rv == 0 {
                        return Err(AssemblyError::new("Division by zero"));
                    }
                    lv / rv
                }
                BinaryOp::Mod => {
                    if rv == 0 {
                        return Err(AssemblyError::new("Division by zero"));
                    }
                    lv % rv
                }
                BinaryOp::And => lv & rv,
                BinaryOp::Or => lv | rv,
                BinaryOp::Xor => lv ^ rv,
                BinaryOp::Shl => lv << (rv as u32 & 0x3F),
                BinaryOp::Shr => lv >> (rv as u32 & 0x3F),
            };
            Ok(Constant::Number(NumberConstant::new(
                Number::Int(merged.restrict(raw)),
                merged,
            )))
        }
        _ => {
            let lv = left.as_f64();
            let rv = right.as_f64();
            let raw = match op {
                BinaryOp::Add => lv + rv,
                BinaryOp::Sub => lv - rv,
                BinaryOp::Mul => lv * rv,
                BinaryOp::Div => lv / rv,
                BinaryOp::Mod => lv % rv,
                _ => {
                    return Err(AssemblyError::new(format!(
                        "Operator '{}' expects integer operands",
                        op.symbol()
                    )));
                }
            };
            Ok(Constant::Number(NumberConstant::new(
                Number::Float(raw),
                merged,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::datatype::DEFAULT_LITERAL;
    use crate::core::definition::{DefinitionSet, IndexConverter, IndexDefinition};
    use crate::core::identifier::IdentifierMap;
    use crate::core::scope::ScopeSet;

    fn eval(expr: &Expression) -> EvalResult<Constant> {
        let mut scopes = ScopeSet::new();
        let root = scopes.alloc(None);
        let defs = DefinitionSet::new();
        let mut expr = expr.clone();
        expr.assign_scope(root);
        let ctx = EvalContext {
            scopes: &scopes,
            defs: &defs,
            functions: &[],
        };
        expr.constant(&ctx)
    }

    #[test]
    fn folds_integer_arithmetic_with_merged_type() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::int(1, DataType::U8),
            Expression::int(2, DataType::S32),
        );
        let constant = eval(&expr).unwrap().resolved().unwrap();
        assert_eq!(constant.int_value(), Some(3));
        assert_eq!(constant.dtype(), DataType::S32);
    }

    #[test]
    fn float_operand_forces_float_result() {
        let expr = Expression::binary(
            BinaryOp::Mul,
            Expression::int(3, DataType::S64),
            Expression::new(ExprKind::Number(NumberConstant::from_float_literal(1.5))),
        );
        let constant = eval(&expr).unwrap().resolved().unwrap();
        assert_eq!(constant.dtype(), DataType::F32);
        assert_eq!(constant.as_number().unwrap().as_f64(), 4.5);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let expr = Expression::binary(
            BinaryOp::Div,
            Expression::int(1, DEFAULT_LITERAL),
            Expression::int(0, DEFAULT_LITERAL),
        );
        assert_eq!(eval(&expr).unwrap_err().message(), "Division by zero");
    }

    #[test]
    fn string_plus_string_concatenates() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::string("ab"),
            Expression::string("cd"),
        );
        let constant = eval(&expr).unwrap().resolved().unwrap();
        assert_eq!(constant.as_string().unwrap().text(), "abcd");
    }

    #[test]
    fn string_plus_number_is_a_type_error() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::string("ab"),
            Expression::int(1, DEFAULT_LITERAL),
        );
        assert_eq!(eval(&expr).unwrap_err().message(), "Expected numeric value");
    }

    #[test]
    fn builtin_constant_resolves_without_definitions() {
        let constant = eval(&Expression::ident("TRUE"))
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(constant.int_value(), Some(1));
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let err = eval(&Expression::ident("nowhere")).unwrap_err();
        assert_eq!(err.message(), "Unknown identifier 'nowhere'");
    }

    #[test]
    fn unassigned_index_defers_instead_of_failing() {
        let mut scopes = ScopeSet::new();
        let root = scopes.alloc(None);
        let mut defs = DefinitionSet::new();
        let label = defs.alloc(IndexDefinition::new(
            Identifier::new("loop"),
            IndexConverter::CodeOffset,
        ));
        let mut labels = IdentifierMap::new();
        labels.insert(Identifier::new("loop"), label).unwrap();
        scopes.populate(root, vec![labels]);

        let mut expr = Expression::binary(
            BinaryOp::Add,
            Expression::ident("loop"),
            Expression::int(4, DEFAULT_LITERAL),
        );
        expr.assign_scope(root);
        let ctx = EvalContext {
            scopes: &scopes,
            defs: &defs,
            functions: &[],
        };
        assert!(expr.constant(&ctx).unwrap().is_deferred());

        defs.get(label).assign_index(8);
        let constant = expr.constant(&ctx).unwrap().resolved().unwrap();
        assert_eq!(constant.int_value(), Some(12));
    }

    #[test]
    fn negation_wraps_in_the_operand_type() {
        let expr = Expression::unary(UnaryOp::Neg, Expression::int(-128, DataType::S8));
        let constant = eval(&expr).unwrap().resolved().unwrap();
        assert_eq!(constant.int_value(), Some(-128));
    }

    #[test]
    fn rewrite_counts_replacements_and_keeps_rest() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::ident("width"),
            Expression::ident("height"),
        );
        let (rewritten, count) = expr.rewrite(&mut |node| {
            node.identifier()
                .filter(|ident| ident.name() == "width")
                .map(|_| Expression::int(640, DEFAULT_LITERAL))
        });
        assert_eq!(count, 1);
        match rewritten.kind {
            ExprKind::Binary { left, right, .. } => {
                assert_eq!(left.kind, Expression::int(640, DEFAULT_LITERAL).kind);
                assert_eq!(right.identifier().unwrap().name(), "height");
            }
            _ => panic!("expected binary node"),
        }
    }
}
