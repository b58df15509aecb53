// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Definition extraction: pull FUNC/GFUNC, VAR and APP_DATA out of the
//! expanded line stream into typed definition maps with assigned frame
//! offsets and function indices. Lines left over at the root afterwards
//! are unknown directives.

use crate::core::datatype::DataType;
use crate::core::definition::{
    DefId, DefinitionSet, FunctionDefinition, IndexConverter, IndexDefinition, Region,
};
use crate::core::error::AssemblyError;
use crate::core::expr::ExprKind;
use crate::core::identifier::{Identifier, IdentifierMap};
use crate::core::line::{assign_scopes, AssemblyLine};
use crate::core::scope::{ScopeId, ScopeSet};
use crate::parser::LABEL_DIRECTIVE;

/// A parsed `VAR`/`ARG` declaration: `name, type[, byte_length]`. The
/// length argument is only meaningful (and required) for `str`.
fn parse_var_decl(line: &AssemblyLine) -> Result<(Identifier, DataType), AssemblyError> {
    if line.args.len() < 2 || line.args.len() > 3 {
        return Err(line.error(format!(
            "{} expects a name and a type",
            line.directive.to_uppercase()
        )));
    }
    let name = line.ident_arg(0, "variable name")?.clone();
    let dtype = line.args[1].data_type().map_err(|err| line.locate(err))?;
    match (dtype, line.args.get(2)) {
        (DataType::Str(_), Some(len)) => match &len.kind {
            ExprKind::Number(number) => match number.int_value() {
                Some(bytes) if bytes > 0 && bytes <= u32::MAX as i128 => {
                    Ok((name, DataType::Str(bytes as u32)))
                }
                _ => Err(line.error("Expected a positive integer length")),
            },
            _ => Err(line.error("Expected a positive integer length")),
        },
        (DataType::Str(_), None) => Err(line.error("str variables require a byte length")),
        (_, Some(_)) => Err(line.error(format!(
            "{} expects a name and a type",
            line.directive.to_uppercase()
        ))),
        (_, None) => Ok((name, dtype)),
    }
}

/// Allocate a frame-slot definition at the next byte offset of `frame`.
fn alloc_slot(
    defs: &mut DefinitionSet,
    map: &mut IdentifierMap<DefId>,
    name: Identifier,
    region: Region,
    dtype: DataType,
    frame_size: &mut u32,
) -> Result<(), AssemblyError> {
    let def = IndexDefinition::new(name.clone(), IndexConverter::FrameSlot { region, dtype });
    def.assign_index(*frame_size as i64);
    *frame_size += dtype.byte_size();
    map.insert(name, defs.alloc(def))
}

/// Extract root-level `VAR` declarations into the global frame. Runs after
/// function and app-data extraction, so every remaining line is at the
/// root.
pub fn extract_globals(
    lines: Vec<AssemblyLine>,
    defs: &mut DefinitionSet,
    globals: &mut IdentifierMap<DefId>,
    frame_size: &mut u32,
) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if !line.is("VAR") {
            out.push(line);
            continue;
        }
        let (name, dtype) = parse_var_decl(&line)?;
        alloc_slot(defs, globals, name, Region::Global, dtype, frame_size)
            .map_err(|err| line.locate(err))?;
    }
    Ok(out)
}

/// Extract root-level FUNC/GFUNC blocks into [`FunctionDefinition`]s with
/// sequential function-table indices and their own child scopes. A FUNC
/// nested inside any other block stays where it is and is rejected by the
/// later passes.
pub fn extract_functions(
    lines: Vec<AssemblyLine>,
    defs: &mut DefinitionSet,
    scopes: &mut ScopeSet,
    root: ScopeId,
    function_map: &mut IdentifierMap<DefId>,
    functions: &mut Vec<FunctionDefinition>,
) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let mut out = Vec::with_capacity(lines.len());
    for mut line in lines {
        let guarded = line.is("GFUNC");
        if !guarded && !line.is("FUNC") {
            out.push(line);
            continue;
        }
        if line.args.len() > 2 {
            return Err(line.error("FUNC expects a name and an optional id"));
        }
        let name = line
            .ident_arg(0, "function name")
            .map_err(|err| line.locate(err))?
            .clone();
        let id_expr = line.args.get(1).cloned();
        let body = line.block.take().unwrap_or_default();

        let def = IndexDefinition::new(name.clone(), IndexConverter::Callable);
        def.assign_index(functions.len() as i64);
        let def = defs.alloc(def);
        function_map
            .insert(name.clone(), def)
            .map_err(|err| line.locate(err))?;

        let scope = scopes.alloc(Some(root));
        let mut function = FunctionDefinition {
            name,
            def,
            id_expr,
            guarded,
            args: IdentifierMap::new(),
            locals: IdentifierMap::new(),
            labels: IdentifierMap::new(),
            scope,
            body: Vec::new(),
            arg_frame_size: 0,
            local_frame_size: 0,
        };
        function.body = extract_function_body(body, defs, &mut function)?;
        assign_scopes(&mut function.body, scope);
        functions.push(function);
    }
    Ok(out)
}

fn extract_function_body(
    body: Vec<AssemblyLine>,
    defs: &mut DefinitionSet,
    function: &mut FunctionDefinition,
) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let mut out = Vec::with_capacity(body.len());
    for line in body {
        if line.is("ARG") {
            let (name, dtype) = parse_var_decl(&line)?;
            alloc_slot(
                defs,
                &mut function.args,
                name,
                Region::PrevArg,
                dtype,
                &mut function.arg_frame_size,
            )
            .map_err(|err| line.locate(err))?;
        } else if line.is("VAR") {
            let (name, dtype) = parse_var_decl(&line)?;
            alloc_slot(
                defs,
                &mut function.locals,
                name,
                Region::Local,
                dtype,
                &mut function.local_frame_size,
            )
            .map_err(|err| line.locate(err))?;
        } else if line.is(LABEL_DIRECTIVE) {
            // Offset assigned by the layout fixpoint; the line stays in
            // the body as a position marker.
            let name = line.ident_arg(0, "label name")?.clone();
            let def = defs.alloc(IndexDefinition::new(name.clone(), IndexConverter::CodeOffset));
            function
                .labels
                .insert(name, def)
                .map_err(|err| line.locate(err))?;
            out.push(line);
        } else {
            out.push(line);
        }
    }
    Ok(out)
}

/// Extract APP_DATA blocks. Labels become constant definitions (byte
/// offsets into the data segment, assigned at generation); the DATA and
/// label lines are returned for the generation pass, concatenated in
/// source order.
pub fn extract_app_data(
    lines: Vec<AssemblyLine>,
    defs: &mut DefinitionSet,
    data_labels: &mut IdentifierMap<DefId>,
    app_data: &mut Vec<AssemblyLine>,
) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let mut out = Vec::with_capacity(lines.len());
    for mut line in lines {
        if !line.is("APP_DATA") {
            out.push(line);
            continue;
        }
        if !line.args.is_empty() {
            return Err(line.error("APP_DATA takes no arguments"));
        }
        for body_line in line.block.take().unwrap_or_default() {
            if body_line.is(LABEL_DIRECTIVE) {
                let name = body_line.ident_arg(0, "label name")?.clone();
                let def = defs.alloc(IndexDefinition::new(
                    name.clone(),
                    IndexConverter::Constant {
                        dtype: crate::core::datatype::DEFAULT_LITERAL,
                    },
                ));
                data_labels
                    .insert(name, def)
                    .map_err(|err| body_line.locate(err))?;
            }
            app_data.push(body_line);
        }
    }
    Ok(out)
}
