// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! modforge: an assembler producing binary bytecode modules for the
//! frame-based VM.
//!
//! Source files (`.vas`) are parsed into line trees, macro/alias/include
//! expanded to a fixpoint, split into definitions (globals, functions,
//! app data), and encoded into a `.vbm` module: header, function table,
//! per-function instruction streams and a flat data segment.

pub mod assembler;
pub mod cli;
pub mod core;
pub mod loader;
pub mod optable;
pub mod parser;
