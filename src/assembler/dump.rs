// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Human-readable module dump: a read-only projection of the assembled
//! state (macros, aliases, definition maps with their resolved offsets,
//! and hex views of the encoded streams) onto any writer.

use std::io::{self, Write};

use crate::core::definition::{DefId, IndexConverter};
use crate::core::expr::{BinaryOp, ExprKind, Expression, UnaryOp};
use crate::core::identifier::{Identifier, IdentifierMap};

use super::Assembler;

impl Assembler {
    pub fn write_dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "== module: {} ==", self.file)?;
        writeln!(out, "global frame: {} bytes", self.global_frame_size)?;

        writeln!(out, "\nmacros ({}):", self.macros.len())?;
        for (name, def) in self.macros.iter() {
            let params: Vec<&str> = def.params.iter().map(Identifier::name).collect();
            writeln!(
                out,
                "  {}({})  {} lines",
                name,
                params.join(", "),
                def.body.len()
            )?;
        }

        writeln!(out, "\naliases ({}):", self.aliases.len())?;
        for (name, expr) in self.aliases.iter() {
            writeln!(out, "  {} = {}", name, render_expr(expr))?;
        }

        writeln!(out, "\nglobals ({}):", self.globals.len())?;
        self.write_slots(out, &self.globals, "  ")?;

        writeln!(out, "\nfunctions ({}):", self.functions.len())?;
        for (at, function) in self.functions.iter().enumerate() {
            let record = &self.module.records[at];
            writeln!(
                out,
                "  [{at}] {}  id={}{}  args={} locals={}  code @{:04X} len {}",
                function.name,
                record.id,
                if record.guarded { " guarded" } else { "" },
                record.arg_frame_size,
                record.local_frame_size,
                record.code_offset,
                record.code_len
            )?;
            self.write_slots(out, &function.args, "      arg   ")?;
            self.write_slots(out, &function.locals, "      local ")?;
            for (name, &def) in function.labels.iter() {
                writeln!(
                    out,
                    "      label {:04X}  {}",
                    self.defs.get(def).index().unwrap_or(-1),
                    name
                )?;
            }
            write_hex(out, &self.module.code[at], "      ")?;
        }

        writeln!(
            out,
            "\napp data ({} bytes @ {:04X}):",
            self.module.data.len(),
            self.module.app_data_offset()
        )?;
        for (name, &def) in self.data_labels.iter() {
            writeln!(
                out,
                "  label {:04X}  {}",
                self.defs.get(def).index().unwrap_or(-1),
                name
            )?;
        }
        write_hex(out, &self.module.data, "  ")?;
        Ok(())
    }

    fn write_slots<W: Write>(
        &self,
        out: &mut W,
        map: &IdentifierMap<DefId>,
        indent: &str,
    ) -> io::Result<()> {
        for (name, &def) in map.iter() {
            let def = self.defs.get(def);
            if let IndexConverter::FrameSlot { dtype, .. } = def.converter() {
                writeln!(
                    out,
                    "{indent}{:04X}  {:<4} {}",
                    def.index().unwrap_or(-1),
                    dtype.to_string(),
                    name
                )?;
            }
        }
        Ok(())
    }
}

fn write_hex<W: Write>(out: &mut W, bytes: &[u8], indent: &str) -> io::Result<()> {
    for (at, row) in bytes.chunks(16).enumerate() {
        let cells: Vec<String> = row.iter().map(|b| format!("{b:02X}")).collect();
        writeln!(out, "{indent}{:04X}: {}", at * 16, cells.join(" "))?;
    }
    Ok(())
}

fn render_expr(expr: &Expression) -> String {
    match &expr.kind {
        ExprKind::Number(number) => number.to_string(),
        ExprKind::Str(string) => format!("\"{}\"", string.text()),
        ExprKind::Ident(ident) => ident.to_string(),
        ExprKind::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::BitNot => "~",
            };
            format!("{symbol}{}", render_expr(operand))
        }
        ExprKind::Binary { op, left, right } => {
            let symbol = match op {
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
            };
            format!("({} {symbol} {})", render_expr(left), render_expr(right))
        }
        ExprKind::Subscript { base, index, dtype } => format!(
            "{}[{}]:{}",
            render_expr(base),
            render_expr(index),
            render_expr(dtype)
        ),
    }
}
