// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro, alias and include expansion.
//!
//! Extraction and expansion run as one fixpoint loop: extract MACRO blocks,
//! replace invocations with instantiated bodies, pull DEF aliases, inline
//! INCLUDE files (recursively through the same pipeline), and repeat until
//! a round performs no expansion. Included files may therefore define
//! macros whose invocations appear before the INCLUDE line. Alias
//! substitution runs afterwards as its own closure loop.
//!
//! Instantiation is hygienic: every identifier in a macro body that is not
//! a formal parameter gets a per-invocation tag. Tagged names resolve to
//! the invocation's own definitions first and fall back to the untagged
//! base, so two expansions of the same macro cannot capture each other's
//! labels while still reaching globals and call-site names.

use std::path::Path;

use crate::core::error::AssemblyError;
use crate::core::expr::{ExprKind, Expression};
use crate::core::identifier::{Identifier, IdentifierMap};
use crate::core::line::{rewrite_exprs, rewrite_lines, AssemblyLine, Rewrite};
use crate::loader::SourceLoader;
use crate::parser;

/// Upper bound on expansion rounds, include depth and alias substitution
/// rounds. Hitting it means a definition cycle.
pub const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Vec<AssemblyLine>,
}

pub struct Expander<'a> {
    loader: &'a dyn SourceLoader,
    macros: IdentifierMap<MacroDefinition>,
    aliases: IdentifierMap<Expression>,
    next_invocation: u32,
}

impl<'a> Expander<'a> {
    pub fn new(loader: &'a dyn SourceLoader) -> Self {
        Self {
            loader,
            macros: IdentifierMap::new(),
            aliases: IdentifierMap::new(),
            next_invocation: 0,
        }
    }

    /// Run the expansion fixpoint. The result contains no MACRO, DEF or
    /// INCLUDE lines and no macro invocations.
    pub fn expand(
        &mut self,
        lines: Vec<AssemblyLine>,
    ) -> Result<Vec<AssemblyLine>, AssemblyError> {
        self.expand_list(lines, 0)
    }

    fn expand_list(
        &mut self,
        lines: Vec<AssemblyLine>,
        depth: usize,
    ) -> Result<Vec<AssemblyLine>, AssemblyError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(AssemblyError::new("Include depth exceeded maximum"));
        }
        let mut lines = self.extract_macros(lines)?;
        for _ in 0..MAX_EXPANSION_DEPTH {
            let mut changed = 0;

            // Macro invocations. Replacements are picked up next round, so
            // macros may invoke other macros.
            let macros = &self.macros;
            let counter = &mut self.next_invocation;
            let (expanded, count) = rewrite_lines(lines, &mut |line| {
                match macros.get(&Identifier::new(&line.directive)) {
                    Some(def) => instantiate(def, &line, counter).map(Rewrite::Replace),
                    None => Ok(Rewrite::Keep(line)),
                }
            })?;
            lines = expanded;
            changed += count;

            // Aliases revealed by this round's expansions.
            lines = self.extract_aliases(lines)?;

            // Includes, spliced fully expanded.
            let (included, count) = self.inline_includes(lines, depth)?;
            lines = included;
            changed += count;

            if changed == 0 {
                // New macro definitions can only arrive through includes,
                // and those were expanded recursively.
                return Ok(lines);
            }
            lines = self.extract_macros(lines)?;
        }
        Err(AssemblyError::new("Macro expansion exceeded maximum depth"))
    }

    fn extract_macros(
        &mut self,
        lines: Vec<AssemblyLine>,
    ) -> Result<Vec<AssemblyLine>, AssemblyError> {
        let macros = &mut self.macros;
        let (lines, _) = rewrite_lines(lines, &mut |mut line| {
            if !line.is("MACRO") {
                return Ok(Rewrite::Keep(line));
            }
            let name = line.ident_arg(0, "macro name")?.clone();
            let mut params = Vec::with_capacity(line.args.len().saturating_sub(1));
            for arg in &line.args[1..] {
                match arg.identifier() {
                    Some(param) => params.push(param.clone()),
                    None => return Err(line.error("Macro parameters must be identifiers")),
                }
            }
            let body = line.block.take().unwrap_or_default();
            macros.insert(name.clone(), MacroDefinition { name, params, body })?;
            Ok(Rewrite::Replace(Vec::new()))
        })?;
        Ok(lines)
    }

    fn extract_aliases(
        &mut self,
        lines: Vec<AssemblyLine>,
    ) -> Result<Vec<AssemblyLine>, AssemblyError> {
        let aliases = &mut self.aliases;
        let (lines, _) = rewrite_lines(lines, &mut |line| {
            if !line.is("DEF") {
                return Ok(Rewrite::Keep(line));
            }
            if line.args.len() != 2 {
                return Err(line.error("DEF expects a name and an expression"));
            }
            let name = line.ident_arg(0, "alias name")?.clone();
            // Redefinition is allowed; the latest one wins.
            aliases.set(name, line.args[1].clone());
            Ok(Rewrite::Replace(Vec::new()))
        })?;
        Ok(lines)
    }

    fn inline_includes(
        &mut self,
        lines: Vec<AssemblyLine>,
        depth: usize,
    ) -> Result<(Vec<AssemblyLine>, usize), AssemblyError> {
        let mut out = Vec::with_capacity(lines.len());
        let mut count = 0;
        for line in lines {
            if !line.is("INCLUDE") {
                out.push(line);
                continue;
            }
            let name = match line.args.as_slice() {
                [arg] => match &arg.kind {
                    ExprKind::Str(text) => text.text().to_string(),
                    _ => return Err(line.error("INCLUDE expects a file name string")),
                },
                _ => return Err(line.error("INCLUDE expects a file name string")),
            };
            let relative_to = Path::new(&line.file).parent().map(Path::to_path_buf);
            let (resolved, text) = self
                .loader
                .load(relative_to.as_deref(), Path::new(&name))
                .map_err(|err| line.locate(err))?;
            let parsed = parser::parse_source(&text, &resolved)?;
            let expanded = self.expand_list(parsed, depth + 1)?;
            out.extend(expanded);
            count += 1;
        }
        Ok((out, count))
    }

    /// Substitute aliases through every expression to closure. Runs after
    /// the expansion fixpoint, once no DEF lines remain.
    pub fn substitute_aliases(
        &self,
        mut lines: Vec<AssemblyLine>,
    ) -> Result<Vec<AssemblyLine>, AssemblyError> {
        for _ in 0..MAX_EXPANSION_DEPTH {
            let aliases = &self.aliases;
            let (rewritten, count) = rewrite_exprs(lines, &mut |expr| {
                let ident = expr.identifier()?;
                let replacement = aliases
                    .get(ident)
                    .or_else(|| aliases.get(&ident.untagged()))?;
                Some(replacement.clone())
            });
            lines = rewritten;
            if count == 0 {
                return Ok(lines);
            }
        }
        Err(AssemblyError::new("Alias expansion exceeded maximum depth"))
    }

    pub fn into_parts(self) -> (IdentifierMap<MacroDefinition>, IdentifierMap<Expression>) {
        (self.macros, self.aliases)
    }
}

/// Build one invocation's worth of lines: substitute formal parameters with
/// the call-site argument expressions, then tag every remaining identifier
/// with a fresh invocation number.
fn instantiate(
    def: &MacroDefinition,
    call: &AssemblyLine,
    counter: &mut u32,
) -> Result<Vec<AssemblyLine>, AssemblyError> {
    if call.args.len() != def.params.len() {
        return Err(call.error(format!(
            "Wrong number of arguments for macro '{}': expected {}, got {}",
            def.name,
            def.params.len(),
            call.args.len()
        )));
    }
    let tag = *counter;
    *counter += 1;

    let (body, _) = rewrite_exprs(def.body.clone(), &mut |expr| {
        let ident = expr.identifier()?;
        if ident.tag().is_none() {
            if let Some(at) = def.params.iter().position(|p| p.name() == ident.name()) {
                return Some(call.args[at].clone());
            }
        }
        // Already-tagged names come from an enclosing instantiation and
        // keep their tag.
        if ident.tag().is_some() {
            return None;
        }
        Some(Expression::new(ExprKind::Ident(ident.retagged(tag))))
    });
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    fn expand_text(main: &str, extra: &[(&str, &str)]) -> Result<Vec<AssemblyLine>, AssemblyError> {
        let mut loader = MemoryLoader::new();
        for (name, text) in extra {
            loader.add(*name, *text);
        }
        let lines = parser::parse_source(main, "main.vas")?;
        let mut expander = Expander::new(&loader);
        let lines = expander.expand(lines)?;
        expander.substitute_aliases(lines)
    }

    #[test]
    fn macro_bodies_replace_invocations() {
        let lines = expand_text(
            "MACRO pair\nNOP\nNOP\nEND\npair\npair",
            &[],
        )
        .unwrap();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|line| line.is("NOP")));
    }

    #[test]
    fn parameters_substitute_call_site_expressions() {
        let lines = expand_text("MACRO load, value\nMOV GLOBAL[0]:u32, value\nEND\nload 7", &[])
            .unwrap();
        assert_eq!(lines.len(), 1);
        // The subscript expression survives; the parameter was replaced by
        // the literal.
        let arg = &lines[0].args[1];
        assert!(arg.identifier().is_none());
    }

    #[test]
    fn two_invocations_tag_local_labels_differently() {
        let lines = expand_text("MACRO spin\nL:\nJMP L\nEND\nspin\nspin", &[]).unwrap();
        assert_eq!(lines.len(), 4);
        let first = lines[0].args[0].identifier().unwrap();
        let third = lines[2].args[0].identifier().unwrap();
        assert_eq!(first.name(), "L");
        assert_eq!(third.name(), "L");
        assert_ne!(first.tag(), third.tag());
        // Each JMP targets its own invocation's label.
        assert_eq!(lines[1].args[0].identifier().unwrap().tag(), first.tag());
        assert_eq!(lines[3].args[0].identifier().unwrap().tag(), third.tag());
    }

    #[test]
    fn wrong_argument_count_is_reported_at_the_call() {
        let err = expand_text("MACRO one, a\nNOP\nEND\none 1, 2", &[]).unwrap_err();
        assert_eq!(
            err.message(),
            "Wrong number of arguments for macro 'one': expected 1, got 2"
        );
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn included_macro_expands_even_when_invoked_first() {
        let lines = expand_text(
            "blit\nINCLUDE \"lib.vas\"",
            &[("lib.vas", "MACRO blit\nNOP\nEND")],
        )
        .unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is("NOP"));
    }

    #[test]
    fn missing_include_reports_the_include_line() {
        let err = expand_text("INCLUDE \"nope.vas\"", &[]).unwrap_err();
        assert_eq!(err.message(), "Source file not found: 'nope.vas'");
        assert_eq!(err.line(), Some(1));
        assert_eq!(err.file(), Some("main.vas"));
    }

    #[test]
    fn later_alias_definition_wins() {
        let lines =
            expand_text("DEF size, 4\nDEF size, 8\nMOV GLOBAL[0]:u32, size", &[]).unwrap();
        assert_eq!(lines.len(), 1);
        match &lines[0].args[1].kind {
            ExprKind::Number(number) => assert_eq!(number.int_value(), Some(8)),
            other => panic!("alias not substituted: {other:?}"),
        }
    }

    #[test]
    fn alias_chains_substitute_to_closure() {
        let lines = expand_text("DEF a, 2\nDEF b, a\nHALT b", &[]).unwrap();
        match &lines[0].args[0].kind {
            ExprKind::Number(number) => assert_eq!(number.int_value(), Some(2)),
            other => panic!("chain not closed: {other:?}"),
        }
    }

    #[test]
    fn self_referential_alias_hits_the_depth_cap() {
        let err = expand_text("DEF x, x\nHALT x", &[]).unwrap_err();
        assert_eq!(err.message(), "Alias expansion exceeded maximum depth");
    }

    #[test]
    fn recursive_macro_hits_the_depth_cap() {
        let err = expand_text("MACRO loopy\nloopy\nEND\nloopy", &[]).unwrap_err();
        assert_eq!(err.message(), "Macro expansion exceeded maximum depth");
    }
}
