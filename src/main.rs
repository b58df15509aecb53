// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for modforge.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;

use modforge::assembler::{output, Assembler};
use modforge::cli::{validate_cli, Cli, CliConfig, DumpTarget, OutputFormat};
use modforge::core::error::AssemblyError;
use modforge::loader::FileLoader;

fn report_error(err: &AssemblyError, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            let mut location = String::new();
            if let Some(file) = err.file() {
                location.push_str(file);
                location.push(':');
            }
            if let Some(line) = err.line() {
                location.push_str(&line.to_string());
                location.push(':');
            }
            if location.is_empty() {
                eprintln!("error: {}", err.message());
            } else {
                eprintln!("{location} error: {}", err.message());
            }
        }
        OutputFormat::Json => {
            let line = json!({
                "type": "error",
                "message": err.message(),
                "file": err.file(),
                "line": err.line(),
            });
            eprintln!("{line}");
        }
    }
}

fn report_result(
    input: &Path,
    output_path: &Path,
    bytes: usize,
    functions: usize,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Text => println!(
            "{}: wrote {} ({bytes} bytes, {functions} functions)",
            input.display(),
            output_path.display()
        ),
        OutputFormat::Json => {
            let line = json!({
                "type": "result",
                "input": input.display().to_string(),
                "output": output_path.display().to_string(),
                "bytes": bytes,
                "functions": functions,
            });
            println!("{line}");
        }
    }
}

fn output_path(input: &Path, out_base: Option<&str>) -> PathBuf {
    match out_base {
        Some(base) => Path::new(base).with_extension(output::MODULE_EXTENSION),
        None => input.with_extension(output::MODULE_EXTENSION),
    }
}

fn open_dump_sink(config: &CliConfig) -> Result<Option<Box<dyn Write>>, AssemblyError> {
    match &config.dump {
        None => Ok(None),
        Some(DumpTarget::Stdout) => Ok(Some(Box::new(io::stdout()))),
        Some(DumpTarget::File(path)) => {
            let file = File::create(path).map_err(|err| {
                AssemblyError::new(format!(
                    "Error opening dump file '{}': {err}",
                    path.display()
                ))
            })?;
            Ok(Some(Box::new(file)))
        }
    }
}

fn run(config: &CliConfig) -> Result<(), AssemblyError> {
    let loader = FileLoader::new(config.include_paths.clone());
    let mut dump_sink = open_dump_sink(config)?;

    for input in &config.input_paths {
        let assembler = Assembler::assemble_file(&loader, input)?;
        let module = assembler.module();
        let out_path = output_path(input, config.out_base.as_deref());
        output::write_module(&out_path, module)?;

        if let Some(sink) = dump_sink.as_mut() {
            assembler.write_dump(sink).map_err(|err| {
                AssemblyError::new(format!("Error writing dump: {err}"))
            })?;
        }
        if !config.quiet {
            report_result(
                input,
                &out_path,
                module.to_bytes().len(),
                module.records.len(),
                config.output_format,
            );
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            report_error(&err, cli.format);
            std::process::exit(1);
        }
    };
    if let Err(err) = run(&config) {
        report_error(&err, config.output_format);
        std::process::exit(1);
    }
}
