// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The staged assembly pipeline.
//!
//! Load & parse, expand (macros/aliases/includes), stamp the root scope,
//! extract definitions, populate scopes, then generate: the app-data
//! segment first, so its labels are plain constants by the time function
//! bodies encode, then every function's instruction stream, then the
//! function table and header. Any error aborts the whole unit; the module
//! image is only available after full success.

pub mod codeblock;
pub mod dump;
pub mod encode;
pub mod expand;
pub mod extract;
pub mod output;

use std::mem;
use std::path::Path;

use crate::core::definition::{DefId, DefinitionSet, FunctionDefinition};
use crate::core::datatype::DataType;
use crate::core::error::AssemblyError;
use crate::core::expr::{EvalContext, Expression};
use crate::core::identifier::IdentifierMap;
use crate::core::line::{assign_scopes, AssemblyLine};
use crate::core::scope::{ScopeId, ScopeSet};
use crate::loader::SourceLoader;
use crate::parser::{self, LABEL_DIRECTIVE};

use codeblock::{BlockElement, CodeBlock};
use expand::{Expander, MacroDefinition};
use output::{FunctionRecord, Module, HEADER_SIZE, RECORD_SIZE};

#[derive(Debug)]
pub struct Assembler {
    pub(crate) file: String,
    pub(crate) macros: IdentifierMap<MacroDefinition>,
    pub(crate) aliases: IdentifierMap<Expression>,
    pub(crate) defs: DefinitionSet,
    pub(crate) scopes: ScopeSet,
    pub(crate) root: ScopeId,
    pub(crate) globals: IdentifierMap<DefId>,
    pub(crate) global_frame_size: u32,
    pub(crate) data_labels: IdentifierMap<DefId>,
    pub(crate) function_map: IdentifierMap<DefId>,
    pub(crate) functions: Vec<FunctionDefinition>,
    pub(crate) app_data: Vec<AssemblyLine>,
    pub(crate) module: Module,
}

impl Assembler {
    fn new(file: impl Into<String>) -> Self {
        let mut scopes = ScopeSet::new();
        let root = scopes.alloc(None);
        Self {
            file: file.into(),
            macros: IdentifierMap::new(),
            aliases: IdentifierMap::new(),
            defs: DefinitionSet::new(),
            scopes,
            root,
            globals: IdentifierMap::new(),
            global_frame_size: 0,
            data_labels: IdentifierMap::new(),
            function_map: IdentifierMap::new(),
            functions: Vec::new(),
            app_data: Vec::new(),
            module: Module::default(),
        }
    }

    /// Assemble one top-level source file.
    pub fn assemble_file(
        loader: &dyn SourceLoader,
        path: &Path,
    ) -> Result<Assembler, AssemblyError> {
        let (resolved, text) = loader.load(None, path)?;
        Self::assemble_source(&text, &resolved, loader)
    }

    /// Assemble already-loaded source text. `file` names it in
    /// diagnostics and include resolution.
    pub fn assemble_source(
        source: &str,
        file: &str,
        loader: &dyn SourceLoader,
    ) -> Result<Assembler, AssemblyError> {
        let lines = parser::parse_source(source, file)?;
        let mut assembler = Assembler::new(file);
        assembler.run(lines, loader)?;
        Ok(assembler)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn run(
        &mut self,
        lines: Vec<AssemblyLine>,
        loader: &dyn SourceLoader,
    ) -> Result<(), AssemblyError> {
        // Expansion.
        let mut expander = Expander::new(loader);
        let lines = expander.expand(lines)?;
        let mut lines = expander.substitute_aliases(lines)?;
        let (macros, aliases) = expander.into_parts();
        self.macros = macros;
        self.aliases = aliases;

        // Scope stamping; function bodies are re-stamped with their child
        // scope at extraction.
        assign_scopes(&mut lines, self.root);

        // Extraction.
        let lines = extract::extract_functions(
            lines,
            &mut self.defs,
            &mut self.scopes,
            self.root,
            &mut self.function_map,
            &mut self.functions,
        )?;
        let lines = extract::extract_app_data(
            lines,
            &mut self.defs,
            &mut self.data_labels,
            &mut self.app_data,
        )?;
        let lines = extract::extract_globals(
            lines,
            &mut self.defs,
            &mut self.globals,
            &mut self.global_frame_size,
        )?;
        if let Some(line) = lines.first() {
            return Err(line.error(format!("Unknown directive '{}'", line.directive)));
        }

        // Scope population: variables resolve before labels, labels before
        // functions.
        self.scopes.populate(
            self.root,
            vec![
                self.globals.clone(),
                self.data_labels.clone(),
                self.function_map.clone(),
            ],
        );
        for function in &self.functions {
            self.scopes.populate(
                function.scope,
                vec![
                    function.args.clone(),
                    function.locals.clone(),
                    function.labels.clone(),
                ],
            );
        }

        self.generate()
    }

    fn generate(&mut self) -> Result<(), AssemblyError> {
        // App data first: its labels must be resolved constants before any
        // operand referencing them encodes.
        let data_lines = mem::take(&mut self.app_data);
        let data = {
            let ctx = EvalContext {
                scopes: &self.scopes,
                defs: &self.defs,
                functions: &self.functions,
            };
            let mut block = build_data_block(&data_lines, &ctx)?;
            block.resolve(&ctx)?
        };
        self.app_data = data_lines;

        let mut code = Vec::with_capacity(self.functions.len());
        for at in 0..self.functions.len() {
            let body = mem::take(&mut self.functions[at].body);
            let ctx = EvalContext {
                scopes: &self.scopes,
                defs: &self.defs,
                functions: &self.functions,
            };
            let mut block = build_code_block(&body, &ctx)?;
            code.push(block.resolve(&ctx)?);
        }

        let mut records = Vec::with_capacity(self.functions.len());
        let mut offset = HEADER_SIZE + RECORD_SIZE * self.functions.len() as u32;
        for (at, function) in self.functions.iter().enumerate() {
            let ctx = EvalContext {
                scopes: &self.scopes,
                defs: &self.defs,
                functions: &self.functions,
            };
            let id = function_id(function, at, &ctx)?;
            let code_len = code[at].len() as u32;
            records.push(FunctionRecord {
                id,
                guarded: function.guarded,
                arg_frame_size: function.arg_frame_size,
                local_frame_size: function.local_frame_size,
                code_offset: offset,
                code_len,
            });
            offset += code_len;
        }

        self.module = Module {
            global_frame_size: self.global_frame_size,
            records,
            code,
            data,
        };
        Ok(())
    }
}

/// The function-table id: explicit expression if given, table index
/// otherwise.
fn function_id(
    function: &FunctionDefinition,
    at: usize,
    ctx: &EvalContext<'_>,
) -> Result<i32, AssemblyError> {
    let expr = match &function.id_expr {
        Some(expr) => expr,
        None => return Ok(at as i32),
    };
    let constant = expr.constant(ctx)?.required("function id")?;
    let value = constant.int_value().ok_or_else(|| {
        AssemblyError::new(format!(
            "Function id for '{}' must be an integer",
            function.name
        ))
    })?;
    if !DataType::S32.contains(value) {
        return Err(AssemblyError::new(format!("Integer out of range: {value}")));
    }
    Ok(value as i32)
}

fn build_code_block(
    body: &[AssemblyLine],
    ctx: &EvalContext<'_>,
) -> Result<CodeBlock, AssemblyError> {
    let mut block = CodeBlock::new();
    for line in body {
        if line.is(LABEL_DIRECTIVE) {
            let ident = line.ident_arg(0, "label name")?;
            let def = ctx
                .scopes
                .resolve(line.args[0].resolved_scope(), ident)
                .ok_or_else(|| line.error(format!("Unknown identifier '{ident}'")))?;
            block.push(BlockElement::Label(def));
        } else {
            block.push(BlockElement::Instr {
                instr: encode::instruction_for(line, ctx)?,
                line: line.line,
                file: line.file.clone(),
            });
        }
    }
    Ok(block)
}

fn build_data_block(
    lines: &[AssemblyLine],
    ctx: &EvalContext<'_>,
) -> Result<CodeBlock, AssemblyError> {
    let mut block = CodeBlock::new();
    for line in lines {
        if line.is(LABEL_DIRECTIVE) {
            let ident = line.ident_arg(0, "label name")?;
            let def = ctx
                .scopes
                .resolve(line.args[0].resolved_scope(), ident)
                .ok_or_else(|| line.error(format!("Unknown identifier '{ident}'")))?;
            block.push(BlockElement::Label(def));
        } else if line.is("DATA") {
            if line.args.len() < 2 {
                return Err(line.error("DATA expects a type and at least one value"));
            }
            let declared = line.args[0].data_type().map_err(|err| line.locate(err))?;
            for value in &line.args[1..] {
                // String sizes come from the literal itself, so the layout
                // can be fixed before label-dependent values evaluate.
                let dtype = if declared.is_string() {
                    let constant = value
                        .constant(ctx)?
                        .required("data value")
                        .map_err(|err| line.locate(err))?;
                    match constant.as_string() {
                        Some(_) => constant.dtype(),
                        None => return Err(line.error("Expected string value")),
                    }
                } else {
                    declared
                };
                block.push(BlockElement::Value {
                    dtype,
                    expr: value.clone(),
                    line: line.line,
                    file: line.file.clone(),
                });
            }
        } else {
            return Err(line.error(format!("Unknown directive '{}'", line.directive)));
        }
    }
    Ok(block)
}
