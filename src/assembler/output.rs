// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Binary module layout and the single-shot file write.
//!
//! A `.vbm` module is, in file order: a 12-byte header (global frame size,
//! function count, app-data file offset, all little-endian u32), one
//! 21-byte record per function, the concatenated instruction streams, and
//! the app-data segment. Nothing touches the filesystem until the whole
//! image is built.

use std::fs;
use std::path::Path;

use crate::core::error::AssemblyError;

pub const MODULE_EXTENSION: &str = "vbm";
pub const HEADER_SIZE: u32 = 12;
pub const RECORD_SIZE: u32 = 21;

/// One function-table entry. `code_offset`/`code_len` locate the
/// function's instruction stream within the file.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub id: i32,
    pub guarded: bool,
    pub arg_frame_size: u32,
    pub local_frame_size: u32,
    pub code_offset: u32,
    pub code_len: u32,
}

impl FunctionRecord {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(self.guarded as u8);
        out.extend_from_slice(&self.arg_frame_size.to_le_bytes());
        out.extend_from_slice(&self.local_frame_size.to_le_bytes());
        out.extend_from_slice(&self.code_offset.to_le_bytes());
        out.extend_from_slice(&self.code_len.to_le_bytes());
    }
}

#[derive(Debug, Default)]
pub struct Module {
    pub global_frame_size: u32,
    pub records: Vec<FunctionRecord>,
    /// Per-function instruction streams, in table order.
    pub code: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

impl Module {
    /// File offset of the first function's instruction stream.
    pub fn code_start(&self) -> u32 {
        HEADER_SIZE + RECORD_SIZE * self.records.len() as u32
    }

    pub fn app_data_offset(&self) -> u32 {
        self.code_start() + self.code.iter().map(|c| c.len() as u32).sum::<u32>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.app_data_offset() as usize + self.data.len());
        out.extend_from_slice(&self.global_frame_size.to_le_bytes());
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.app_data_offset().to_le_bytes());
        for record in &self.records {
            record.encode(&mut out);
        }
        for code in &self.code {
            out.extend_from_slice(code);
        }
        out.extend_from_slice(&self.data);
        out
    }
}

/// Write the finished module. Called exactly once per input, and only
/// after assembly fully succeeded.
pub fn write_module(path: &Path, module: &Module) -> Result<(), AssemblyError> {
    fs::write(path, module.to_bytes()).map_err(|err| {
        AssemblyError::new(format!(
            "Error writing output file '{}': {err}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_places_code_behind_the_function_table() {
        let module = Module {
            global_frame_size: 8,
            records: vec![
                FunctionRecord {
                    id: 0,
                    guarded: false,
                    arg_frame_size: 0,
                    local_frame_size: 4,
                    code_offset: 54,
                    code_len: 3,
                },
                FunctionRecord {
                    id: 7,
                    guarded: true,
                    arg_frame_size: 2,
                    local_frame_size: 0,
                    code_offset: 57,
                    code_len: 1,
                },
            ],
            code: vec![vec![0x30, 0x04, 0x00], vec![0x34]],
            data: vec![0xAA, 0xBB],
        };
        assert_eq!(module.code_start(), 54);
        assert_eq!(module.app_data_offset(), 58);

        let bytes = module.to_bytes();
        assert_eq!(bytes.len(), 60);
        assert_eq!(&bytes[0..4], &8u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &58u32.to_le_bytes());
        // Second record starts at 12 + 21.
        assert_eq!(&bytes[33..37], &7i32.to_le_bytes());
        assert_eq!(bytes[37], 1);
        assert_eq!(&bytes[54..57], &[0x30, 0x04, 0x00]);
        assert_eq!(&bytes[58..60], &[0xAA, 0xBB]);
    }
}
