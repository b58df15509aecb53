// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembly lines and the generic line-list rewriting primitives.
//!
//! Every expansion pass is expressed through two pure transforms:
//! [`rewrite_lines`] (filter / replace-with-N-lines) and [`rewrite_exprs`]
//! (recursive expression substitution). Both return new trees plus a change
//! count so fixpoint loops can tell when an iteration did nothing. The
//! line transform is also where errors accrete their source location.

use crate::core::error::AssemblyError;
use crate::core::expr::Expression;
use crate::core::scope::ScopeId;

/// One source directive: name, argument expressions, optional nested block
/// (MACRO/FUNC/GFUNC/APP_DATA bodies) and the source location.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyLine {
    pub directive: String,
    pub args: Vec<Expression>,
    pub block: Option<Vec<AssemblyLine>>,
    pub line: u32,
    pub file: String,
}

impl AssemblyLine {
    pub fn new(
        directive: impl Into<String>,
        args: Vec<Expression>,
        line: u32,
        file: impl Into<String>,
    ) -> Self {
        Self {
            directive: directive.into(),
            args,
            block: None,
            line,
            file: file.into(),
        }
    }

    pub fn with_block(mut self, block: Vec<AssemblyLine>) -> Self {
        self.block = Some(block);
        self
    }

    /// Directive comparison; directive and mnemonic names are
    /// case-insensitive.
    pub fn is(&self, directive: &str) -> bool {
        self.directive.eq_ignore_ascii_case(directive)
    }

    /// An error raised at this line's location.
    pub fn error(&self, message: impl Into<String>) -> AssemblyError {
        AssemblyError::new(message)
            .with_line(self.line)
            .with_file(self.file.clone())
    }

    /// Stamp this line's location onto an error that lacks one.
    pub fn locate(&self, err: AssemblyError) -> AssemblyError {
        err.fill_location(self.line, &self.file)
    }

    /// The identifier named by argument `at`, or an error in terms of
    /// `what` ("macro name", "variable name", ...).
    pub fn ident_arg(&self, at: usize, what: &str) -> Result<&crate::core::identifier::Identifier, AssemblyError> {
        self.args
            .get(at)
            .and_then(Expression::identifier)
            .ok_or_else(|| self.error(format!("Expected {what}")))
    }
}

/// Result of a per-line rewrite callback.
pub enum Rewrite {
    Keep(AssemblyLine),
    /// Replace the line with zero or more lines. Replacements are not
    /// re-visited in this pass; fixpoint loops pick them up next round.
    Replace(Vec<AssemblyLine>),
}

/// Rebuild a line list through `f`, recursing into kept lines' blocks.
/// Returns the new list and the number of replacements performed. Errors
/// escaping `f` are located at the line being processed.
pub fn rewrite_lines<F>(
    lines: Vec<AssemblyLine>,
    f: &mut F,
) -> Result<(Vec<AssemblyLine>, usize), AssemblyError>
where
    F: FnMut(AssemblyLine) -> Result<Rewrite, AssemblyError>,
{
    let mut out = Vec::with_capacity(lines.len());
    let mut replaced = 0;
    for line in lines {
        let location = (line.line, line.file.clone());
        match f(line).map_err(|err| err.fill_location(location.0, &location.1))? {
            Rewrite::Keep(mut kept) => {
                if let Some(block) = kept.block.take() {
                    let (new_block, count) = rewrite_lines(block, f)?;
                    kept.block = Some(new_block);
                    replaced += count;
                }
                out.push(kept);
            }
            Rewrite::Replace(replacement) => {
                replaced += 1;
                out.extend(replacement);
            }
        }
    }
    Ok((out, replaced))
}

/// Apply an expression substitution to every argument expression in the
/// tree, including nested blocks. Returns the rewritten list and the total
/// number of node replacements.
pub fn rewrite_exprs<F>(lines: Vec<AssemblyLine>, f: &mut F) -> (Vec<AssemblyLine>, usize)
where
    F: FnMut(&Expression) -> Option<Expression>,
{
    let mut replaced = 0;
    let out = lines
        .into_iter()
        .map(|mut line| {
            line.args = line
                .args
                .iter()
                .map(|arg| {
                    let (new_arg, count) = arg.rewrite(f);
                    replaced += count;
                    new_arg
                })
                .collect();
            if let Some(block) = line.block.take() {
                let (new_block, count) = rewrite_exprs(block, f);
                replaced += count;
                line.block = Some(new_block);
            }
            line
        })
        .collect();
    (out, replaced)
}

/// Visit every argument expression mutably (blocks included). Used by the
/// scope-assignment pass.
pub fn for_each_expr_mut<F>(lines: &mut [AssemblyLine], f: &mut F)
where
    F: FnMut(&mut Expression),
{
    for line in lines {
        for arg in &mut line.args {
            f(arg);
        }
        if let Some(block) = &mut line.block {
            for_each_expr_mut(block, f);
        }
    }
}

/// Stamp `scope` onto every expression in the list, blocks included.
pub fn assign_scopes(lines: &mut [AssemblyLine], scope: ScopeId) {
    for_each_expr_mut(lines, &mut |expr| expr.assign_scope(scope));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(directive: &str, at: u32) -> AssemblyLine {
        AssemblyLine::new(directive, Vec::new(), at, "test.vas")
    }

    #[test]
    fn replace_expands_in_place_without_revisiting() {
        let lines = vec![line("A", 1), line("B", 2), line("A", 3)];
        let (out, replaced) = rewrite_lines(lines, &mut |current| {
            if current.is("A") {
                let at = current.line;
                Ok(Rewrite::Replace(vec![line("X", at), line("Y", at)]))
            } else {
                Ok(Rewrite::Keep(current))
            }
        })
        .unwrap();
        assert_eq!(replaced, 2);
        let names: Vec<&str> = out.iter().map(|l| l.directive.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "B", "X", "Y"]);
    }

    #[test]
    fn rewrite_recurses_into_kept_blocks() {
        let block = vec![line("INNER", 2)];
        let lines = vec![line("FUNC", 1).with_block(block)];
        let (out, replaced) = rewrite_lines(lines, &mut |current| {
            if current.is("INNER") {
                Ok(Rewrite::Replace(vec![line("NOP", 2)]))
            } else {
                Ok(Rewrite::Keep(current))
            }
        })
        .unwrap();
        assert_eq!(replaced, 1);
        assert_eq!(out[0].block.as_ref().unwrap()[0].directive, "NOP");
    }

    #[test]
    fn callback_errors_pick_up_the_line_location() {
        let lines = vec![line("BAD", 7)];
        let err = rewrite_lines(lines, &mut |current| {
            if current.is("BAD") {
                Err(AssemblyError::new("Unknown directive 'BAD'"))
            } else {
                Ok(Rewrite::Keep(current))
            }
        })
        .unwrap_err();
        assert_eq!(err.line(), Some(7));
        assert_eq!(err.file(), Some("test.vas"));
    }

    #[test]
    fn expr_rewrite_reaches_nested_blocks() {
        let inner = AssemblyLine::new("MOV", vec![Expression::ident("count")], 2, "test.vas");
        let lines = vec![line("FUNC", 1).with_block(vec![inner])];
        let (out, replaced) = rewrite_exprs(lines, &mut |expr| {
            expr.identifier()
                .filter(|ident| ident.name() == "count")
                .map(|_| Expression::int(5, crate::core::datatype::DEFAULT_LITERAL))
        });
        assert_eq!(replaced, 1);
        let rewritten = &out[0].block.as_ref().unwrap()[0].args[0];
        assert_eq!(rewritten.kind, Expression::int(5, crate::core::datatype::DEFAULT_LITERAL).kind);
    }
}
