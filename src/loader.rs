// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source loading behind a trait, so the pipeline (and its tests) never
//! touch the filesystem directly. Includes resolve relative to the
//! including file first, then through the `-I` search path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::AssemblyError;

/// File extension required of every assembly source file.
pub const SOURCE_EXTENSION: &str = "vas";

pub trait SourceLoader {
    /// Load a source file. `relative_to` is the directory of the including
    /// file, `None` for top-level inputs. Returns the resolved path (as
    /// reported in diagnostics) and the file contents.
    fn load(
        &self,
        relative_to: Option<&Path>,
        path: &Path,
    ) -> Result<(String, String), AssemblyError>;
}

/// Reject anything that is not a `.vas` file.
pub fn check_extension(path: &Path) -> Result<(), AssemblyError> {
    let ok = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(AssemblyError::new(format!(
            "Invalid file extension for '{}': expected .{SOURCE_EXTENSION}",
            path.display()
        )))
    }
}

/// Filesystem-backed loader with an ordered include search path.
pub struct FileLoader {
    search_paths: Vec<PathBuf>,
}

impl FileLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }
}

impl SourceLoader for FileLoader {
    fn load(
        &self,
        relative_to: Option<&Path>,
        path: &Path,
    ) -> Result<(String, String), AssemblyError> {
        check_extension(path)?;
        let mut candidates = Vec::new();
        if path.is_absolute() {
            candidates.push(path.to_path_buf());
        } else {
            if let Some(dir) = relative_to {
                candidates.push(dir.join(path));
            }
            candidates.push(path.to_path_buf());
            for dir in &self.search_paths {
                candidates.push(dir.join(path));
            }
        }
        for candidate in candidates {
            if let Ok(text) = fs::read_to_string(&candidate) {
                return Ok((candidate.display().to_string(), text));
            }
        }
        Err(AssemblyError::new(format!(
            "Source file not found: '{}'",
            path.display()
        )))
    }
}

/// In-memory loader for tests: file name to contents.
#[derive(Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), text.into());
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(
        &self,
        _relative_to: Option<&Path>,
        path: &Path,
    ) -> Result<(String, String), AssemblyError> {
        check_extension(path)?;
        let name = path.to_string_lossy();
        match self.files.get(name.as_ref()) {
            Some(text) => Ok((name.into_owned(), text.clone())),
            None => Err(AssemblyError::new(format!(
                "Source file not found: '{name}'"
            ))),
        }
    }
}
