// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::error::AssemblyError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Assembler producing binary bytecode modules (.vbm) for the frame VM.

Each input is assembled independently into <base>.vbm next to the input,
or under the base name given with -o/--outfile. Use -d/--dump to print a
human-readable view of the assembled module (to stdout, or to FILE when
one is given). Include resolution order is: the including file's
directory, then -I roots in command-line order.";

#[derive(Parser, Debug)]
#[command(
    name = "modforge",
    version = VERSION,
    about = "Assembler for frame-VM bytecode modules with macros, aliases and typed operands",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select CLI output format. text is default; json emits machine-readable result and error lines."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress per-input result output for successful runs. Errors are still reported."
    )]
    pub quiet: bool,
    #[arg(
        short = 'i',
        long = "infile",
        value_name = "FILE",
        action = ArgAction::Append,
        long_help = "Input assembly file (repeatable). Files must end with .vas."
    )]
    pub infiles: Vec<PathBuf>,
    #[arg(
        value_name = "INPUT",
        action = ArgAction::Append,
        long_help = "Optional positional input. Exactly one positional INPUT is accepted and treated like -i INPUT. Multiple inputs require explicit -i/--infile."
    )]
    pub positional_inputs: Vec<PathBuf>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "BASE",
        long_help = "Output filename base; a .vbm extension is added. Defaults to the input base. Not allowed with multiple inputs."
    )]
    pub outfile: Option<String>,
    #[arg(
        short = 'd',
        long = "dump",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Print a readable dump of each assembled module. FILE is optional; when omitted, the dump goes to stdout."
    )]
    pub dump_name: Option<String>,
    #[arg(
        short = 'I',
        long = "include-path",
        value_name = "DIR",
        action = ArgAction::Append,
        long_help = "Additional include search root (repeatable). Include resolution order is: including file directory, then include roots in command-line order."
    )]
    pub include_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where `-d/--dump` output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub input_paths: Vec<PathBuf>,
    pub out_base: Option<String>,
    pub dump: Option<DumpTarget>,
    pub include_paths: Vec<PathBuf>,
    pub quiet: bool,
    pub output_format: OutputFormat,
}

fn parse_env_bool(name: &str) -> Result<Option<bool>, AssemblyError> {
    match env::var(name) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(AssemblyError::new(format!(
                "Invalid boolean value for {name}: '{value}'"
            ))),
        },
        Err(_) => Ok(None),
    }
}

fn parse_env_path_list(name: &str) -> Vec<PathBuf> {
    match env::var(name) {
        Ok(value) => value
            .split(':')
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Check argument combinations and fold in environment defaults
/// (`MODFORGE_INCLUDE_PATHS`, `MODFORGE_QUIET`).
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AssemblyError> {
    let mut input_paths = cli.infiles.clone();
    match cli.positional_inputs.len() {
        0 => {}
        1 if input_paths.is_empty() => input_paths.push(cli.positional_inputs[0].clone()),
        1 => {
            return Err(AssemblyError::new(
                "Positional input cannot be combined with -i/--infile",
            ));
        }
        _ => {
            return Err(AssemblyError::new(
                "Multiple positional inputs require explicit -i/--infile",
            ));
        }
    }
    if input_paths.is_empty() {
        return Err(AssemblyError::new(
            "No input files; use -i/--infile or a positional INPUT",
        ));
    }
    if cli.outfile.is_some() && input_paths.len() > 1 {
        return Err(AssemblyError::new(
            "-o/--outfile is not allowed with multiple inputs",
        ));
    }

    let mut include_paths = parse_env_path_list("MODFORGE_INCLUDE_PATHS");
    include_paths.extend(cli.include_paths.clone());

    let quiet = if cli.quiet {
        true
    } else {
        parse_env_bool("MODFORGE_QUIET")?.unwrap_or(false)
    };

    let dump = cli.dump_name.as_ref().map(|name| {
        if name.is_empty() {
            DumpTarget::Stdout
        } else {
            DumpTarget::File(PathBuf::from(name))
        }
    });

    Ok(CliConfig {
        input_paths,
        out_base: cli.outfile.clone(),
        dump,
        include_paths,
        quiet,
        output_format: cli.format,
    })
}
