// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Labeled byte-stream layout.
//!
//! A code block is an ordered list of labels, instructions and data
//! values. Layout runs as a fixpoint: assign every label its current byte
//! offset, let operands narrow against the now-known offsets, and repeat
//! until a pass narrows nothing. Widths only ever shrink, so the loop
//! terminates; a narrowing early in the block can cascade into further
//! narrowing behind it. Function bodies and the app-data segment both use
//! this container (data values have a fixed size, so a pure data block
//! settles in one pass).

use crate::core::datatype::DataType;
use crate::core::definition::DefId;
use crate::core::error::AssemblyError;
use crate::core::expr::{EvalContext, Expression};

use super::encode::Instruction;

#[derive(Debug)]
pub enum BlockElement {
    /// The named definition gets the byte offset of the next element.
    Label(DefId),
    Instr {
        instr: Instruction,
        line: u32,
        file: String,
    },
    /// One typed data value, evaluated against the final layout.
    Value {
        dtype: DataType,
        expr: Expression,
        line: u32,
        file: String,
    },
}

impl BlockElement {
    fn byte_len(&self) -> u32 {
        match self {
            BlockElement::Label(_) => 0,
            BlockElement::Instr { instr, .. } => instr.byte_len(),
            BlockElement::Value { dtype, .. } => dtype.byte_size(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CodeBlock {
    elements: Vec<BlockElement>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: BlockElement) {
        self.elements.push(element);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Settle the layout and encode the block.
    pub fn resolve(&mut self, ctx: &EvalContext<'_>) -> Result<Vec<u8>, AssemblyError> {
        loop {
            let mut offset: i64 = 0;
            for element in &self.elements {
                if let BlockElement::Label(def) = element {
                    ctx.defs.get(*def).assign_index(offset);
                }
                offset += element.byte_len() as i64;
            }

            let mut narrowed = false;
            for element in &mut self.elements {
                if let BlockElement::Instr { instr, line, file } = element {
                    narrowed |= instr
                        .try_narrow(ctx)
                        .map_err(|err| err.fill_location(*line, file))?;
                }
            }
            if !narrowed {
                break;
            }
        }

        let mut out = Vec::new();
        for element in &self.elements {
            match element {
                BlockElement::Label(_) => {}
                BlockElement::Instr { instr, line, file } => instr
                    .encode(ctx, &mut out)
                    .map_err(|err| err.fill_location(*line, file))?,
                BlockElement::Value {
                    dtype,
                    expr,
                    line,
                    file,
                } => encode_value(*dtype, expr, ctx, &mut out)
                    .map_err(|err| err.fill_location(*line, file))?,
            }
        }
        Ok(out)
    }
}

fn encode_value(
    dtype: DataType,
    expr: &Expression,
    ctx: &EvalContext<'_>,
    out: &mut Vec<u8>,
) -> Result<(), AssemblyError> {
    let constant = expr.constant(ctx)?.required("data value")?;
    if dtype.is_string() {
        let string = constant
            .as_string()
            .ok_or_else(|| AssemblyError::new("Expected string value"))?;
        string.encode(out);
    } else {
        let number = constant
            .as_number()
            .ok_or_else(|| AssemblyError::new("Expected numeric value"))?
            .retype(dtype)?;
        number.encode(out);
    }
    Ok(())
}
