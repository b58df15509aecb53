// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Core data model: lines, expressions, constants, types, definitions and
//! scopes. Everything here is independent of the pass pipeline.

pub mod constant;
pub mod datatype;
pub mod definition;
pub mod error;
pub mod expr;
pub mod identifier;
pub mod line;
pub mod scope;
