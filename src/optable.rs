// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction set and built-in constant tables.
//!
//! The assembler core stays table-driven: it needs a mnemonic's opcode and
//! operand count, and the named integer constants exposed to source code.
//! Nothing here is consulted at VM run time.

pub struct OpEntry {
    pub mnemonic: &'static str,
    pub opcode: u8,
    pub operands: u8,
}

pub static OP_TABLE: &[OpEntry] = &[
    OpEntry {
        mnemonic: "NOP",
        opcode: 0x00,
        operands: 0,
    },
    OpEntry {
        mnemonic: "HALT",
        opcode: 0x01,
        operands: 1,
    },
    OpEntry {
        mnemonic: "MOV",
        opcode: 0x02,
        operands: 2,
    },
    OpEntry {
        mnemonic: "ADD",
        opcode: 0x03,
        operands: 3,
    },
    OpEntry {
        mnemonic: "SUB",
        opcode: 0x04,
        operands: 3,
    },
    OpEntry {
        mnemonic: "MUL",
        opcode: 0x05,
        operands: 3,
    },
    OpEntry {
        mnemonic: "DIV",
        opcode: 0x06,
        operands: 3,
    },
    OpEntry {
        mnemonic: "MOD",
        opcode: 0x07,
        operands: 3,
    },
    OpEntry {
        mnemonic: "NEG",
        opcode: 0x08,
        operands: 2,
    },
    OpEntry {
        mnemonic: "AND",
        opcode: 0x10,
        operands: 3,
    },
    OpEntry {
        mnemonic: "OR",
        opcode: 0x11,
        operands: 3,
    },
    OpEntry {
        mnemonic: "XOR",
        opcode: 0x12,
        operands: 3,
    },
    OpEntry {
        mnemonic: "NOT",
        opcode: 0x13,
        operands: 2,
    },
    OpEntry {
        mnemonic: "SHL",
        opcode: 0x14,
        operands: 3,
    },
    OpEntry {
        mnemonic: "SHR",
        opcode: 0x15,
        operands: 3,
    },
    OpEntry {
        mnemonic: "CMPEQ",
        opcode: 0x20,
        operands: 3,
    },
    OpEntry {
        mnemonic: "CMPLT",
        opcode: 0x21,
        operands: 3,
    },
    OpEntry {
        mnemonic: "CMPGT",
        opcode: 0x22,
        operands: 3,
    },
    OpEntry {
        mnemonic: "JMP",
        opcode: 0x30,
        operands: 1,
    },
    OpEntry {
        mnemonic: "JZ",
        opcode: 0x31,
        operands: 2,
    },
    OpEntry {
        mnemonic: "JNZ",
        opcode: 0x32,
        operands: 2,
    },
    OpEntry {
        mnemonic: "CALL",
        opcode: 0x33,
        operands: 1,
    },
    OpEntry {
        mnemonic: "RET",
        opcode: 0x34,
        operands: 0,
    },
    OpEntry {
        mnemonic: "STRCAT",
        opcode: 0x40,
        operands: 3,
    },
    OpEntry {
        mnemonic: "OUT",
        opcode: 0x41,
        operands: 1,
    },
    OpEntry {
        mnemonic: "IN",
        opcode: 0x42,
        operands: 1,
    },
];

/// Case-insensitive mnemonic lookup.
pub fn lookup(mnemonic: &str) -> Option<&'static OpEntry> {
    OP_TABLE
        .iter()
        .find(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub struct BuiltinConstant {
    pub name: &'static str,
    pub value: i64,
}

/// Named constants visible to every source file: the boolean pair plus the
/// VM error codes reported through HALT.
pub static BUILTIN_CONSTANTS: &[BuiltinConstant] = &[
    BuiltinConstant {
        name: "FALSE",
        value: 0,
    },
    BuiltinConstant {
        name: "TRUE",
        value: 1,
    },
    BuiltinConstant {
        name: "E_NONE",
        value: 0,
    },
    BuiltinConstant {
        name: "E_DIV_ZERO",
        value: 1,
    },
    BuiltinConstant {
        name: "E_INDEX_RANGE",
        value: 2,
    },
    BuiltinConstant {
        name: "E_STACK_OVERFLOW",
        value: 3,
    },
    BuiltinConstant {
        name: "E_TYPE",
        value: 4,
    },
    BuiltinConstant {
        name: "E_GUARD",
        value: 5,
    },
    BuiltinConstant {
        name: "E_BAD_CALL",
        value: 6,
    },
];

/// Built-in constant lookup. Names are case-sensitive like every other
/// identifier.
pub fn builtin_constant(name: &str) -> Option<i64> {
    BUILTIN_CONSTANTS
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.value)
}
