// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End-to-end assembly tests: source text in, module bytes out.

use std::path::Path;

use modforge::assembler::output::{HEADER_SIZE, RECORD_SIZE};
use modforge::assembler::Assembler;
use modforge::core::error::AssemblyError;
use modforge::loader::MemoryLoader;

fn assemble(source: &str) -> Result<Assembler, AssemblyError> {
    let loader = MemoryLoader::new();
    Assembler::assemble_source(source, "main.vas", &loader)
}

fn assemble_with(source: &str, files: &[(&str, &str)]) -> Result<Assembler, AssemblyError> {
    let mut loader = MemoryLoader::new();
    for (name, text) in files {
        loader.add(*name, *text);
    }
    Assembler::assemble_source(source, "main.vas", &loader)
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

#[test]
fn module_layout_header_table_code() {
    let assembler = assemble(
        "VAR g, u32\n\
         FUNC f\n\
         VAR local, s8\n\
         RET\n\
         END",
    )
    .unwrap();
    let bytes = assembler.module().to_bytes();
    assert_eq!(bytes.len(), 34);
    // Header: global frame, function count, app-data offset.
    assert_eq!(u32_at(&bytes, 0), 4);
    assert_eq!(u32_at(&bytes, 4), 1);
    assert_eq!(u32_at(&bytes, 8), 34);
    // Record: id, guarded, frames, code location.
    assert_eq!(i32::from_le_bytes(bytes[12..16].try_into().unwrap()), 0);
    assert_eq!(bytes[16], 0);
    assert_eq!(u32_at(&bytes, 17), 0);
    assert_eq!(u32_at(&bytes, 21), 1);
    assert_eq!(u32_at(&bytes, 25), HEADER_SIZE + RECORD_SIZE);
    assert_eq!(u32_at(&bytes, 29), 1);
    assert_eq!(bytes[33], 0x34);
}

#[test]
fn backward_label_narrows_to_one_byte_index() {
    let assembler = assemble("FUNC f\ntop:\nJMP top\nEND").unwrap();
    assert_eq!(assembler.module().code[0], vec![0x30, 0x04, 0x00]);
}

#[test]
fn far_label_keeps_the_wide_index() {
    let mut source = String::from("FUNC f\nJMP far\n");
    for _ in 0..15 {
        source.push_str("MOV GLOBAL[0]:u32, 1000000\n");
    }
    source.push_str("far:\nEND");
    let assembler = assemble(&source).unwrap();
    let code = &assembler.module().code[0];
    // Wide jump (6 bytes) plus 15 nine-byte moves puts the label at 141,
    // beyond signed-byte range.
    assert_eq!(code.len(), 141);
    assert_eq!(&code[..6], &[0x30, 0x06, 141, 0, 0, 0]);
}

#[test]
fn macro_labels_stay_private_per_invocation() {
    let assembler = assemble(
        "MACRO spin\n\
         L:\n\
         JMP L\n\
         END\n\
         FUNC f\n\
         spin\n\
         spin\n\
         END",
    )
    .unwrap();
    // Each expansion jumps to its own copy of L.
    assert_eq!(
        assembler.module().code[0],
        vec![0x30, 0x04, 0x00, 0x30, 0x04, 0x03]
    );
}

#[test]
fn app_data_labels_fold_to_segment_offsets() {
    let assembler = assemble(
        "APP_DATA\n\
         DATA u32, 1, 2\n\
         table:\n\
         DATA u8, 7\n\
         END\n\
         FUNC f\n\
         MOV GLOBAL[0]:u32, table\n\
         END",
    )
    .unwrap();
    let module = assembler.module();
    assert_eq!(module.data, vec![1, 0, 0, 0, 2, 0, 0, 0, 7]);
    // The label is 8 bytes into the segment and encodes as an immediate.
    assert_eq!(module.code[0], vec![0x02, 0x12, 0x04, 0x00, 0x04, 0x08]);
    let bytes = module.to_bytes();
    assert_eq!(u32_at(&bytes, 8), HEADER_SIZE + RECORD_SIZE + 6);
}

#[test]
fn strings_encode_with_a_trailing_nul() {
    let assembler = assemble("APP_DATA\nDATA str, \"hi\"\nEND").unwrap();
    assert_eq!(assembler.module().data, vec![0x68, 0x69, 0x00]);
}

#[test]
fn guarded_function_with_explicit_id_and_frames() {
    let assembler = assemble(
        "GFUNC watch, 42\n\
         ARG a, u16\n\
         VAR v, s64\n\
         RET\n\
         END",
    )
    .unwrap();
    let record = &assembler.module().records[0];
    assert_eq!(record.id, 42);
    assert!(record.guarded);
    assert_eq!(record.arg_frame_size, 2);
    assert_eq!(record.local_frame_size, 8);
}

#[test]
fn calls_encode_the_callee_function_index() {
    let assembler = assemble(
        "FUNC first\n\
         CALL second\n\
         RET\n\
         END\n\
         FUNC second\n\
         RET\n\
         END",
    )
    .unwrap();
    let module = assembler.module();
    // Forward reference: second is table index 1.
    assert_eq!(module.code[0], vec![0x33, 0x04, 0x01, 0x34]);
    assert_eq!(module.code[1], vec![0x34]);
    assert_eq!(module.records[0].code_offset, HEADER_SIZE + 2 * RECORD_SIZE);
    assert_eq!(module.records[1].code_offset, HEADER_SIZE + 2 * RECORD_SIZE + 4);
}

#[test]
fn aliases_reach_into_macro_bodies() {
    let assembler = assemble(
        "DEF limit, 250\n\
         MACRO init, dest\n\
         MOV dest, limit\n\
         END\n\
         FUNC f\n\
         init GLOBAL[0]:u8\n\
         END",
    )
    .unwrap();
    assert_eq!(
        assembler.module().code[0],
        vec![0x02, 0x10, 0x04, 0x00, 0x05, 0xFA, 0x00]
    );
}

#[test]
fn local_and_arg_references_use_their_frames() {
    let assembler = assemble(
        "FUNC add1\n\
         ARG x, s32\n\
         VAR tmp, s32\n\
         ADD tmp, x, 1\n\
         RET\n\
         END",
    )
    .unwrap();
    // tmp: local frame @0; x: prev-arg frame @0; immediate 1.
    assert_eq!(
        assembler.module().code[0],
        vec![0x03, 0x26, 0x04, 0x00, 0x36, 0x04, 0x00, 0x04, 0x01, 0x34]
    );
}

#[test]
fn unknown_directive_reports_line_and_file() {
    let err = assemble("VAR g, u32\nBOGUS 1\n").unwrap_err();
    assert_eq!(err.message(), "Unknown directive 'BOGUS'");
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.file(), Some("main.vas"));
}

#[test]
fn operand_count_mismatch_fails_the_unit() {
    let err = assemble("FUNC f\nMOV 1\nEND").unwrap_err();
    assert_eq!(err.message(), "MOV expects 2 operands, got 1");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn function_nested_in_app_data_is_rejected() {
    let err = assemble("APP_DATA\nFUNC f\nRET\nEND\nEND").unwrap_err();
    assert_eq!(err.message(), "Unknown directive 'FUNC'");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn duplicate_global_is_rejected() {
    let err = assemble("VAR x, u8\nVAR x, u16").unwrap_err();
    assert_eq!(err.message(), "Duplicate identifier 'x'");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn unknown_identifier_in_a_function_body() {
    let err = assemble("FUNC f\nMOV GLOBAL[0]:u8, missing\nEND").unwrap_err();
    assert_eq!(err.message(), "Unknown identifier 'missing'");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn includes_splice_macros_and_code() {
    let assembler = assemble_with(
        "INCLUDE \"lib.vas\"\n\
         FUNC f\n\
         halt_ok\n\
         END",
        &[("lib.vas", "MACRO halt_ok\nHALT E_NONE\nEND")],
    )
    .unwrap();
    assert_eq!(assembler.module().code[0], vec![0x01, 0x04, 0x00]);
}

#[test]
fn invalid_input_extension_is_rejected() {
    let mut loader = MemoryLoader::new();
    loader.add("main.txt", "NOP");
    let err = Assembler::assemble_file(&loader, Path::new("main.txt")).unwrap_err();
    assert_eq!(
        err.message(),
        "Invalid file extension for 'main.txt': expected .vas"
    );
}

#[test]
fn missing_end_is_a_parse_error_at_the_opener() {
    let err = assemble("FUNC f\nRET").unwrap_err();
    assert_eq!(err.message(), "Missing END for FUNC block");
    assert_eq!(err.line(), Some(1));
}

#[test]
fn builtin_error_codes_are_available_as_immediates() {
    let assembler = assemble("FUNC f\nHALT E_GUARD\nEND").unwrap();
    assert_eq!(assembler.module().code[0], vec![0x01, 0x04, 0x05]);
}
