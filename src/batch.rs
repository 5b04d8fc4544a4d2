//! Batch mode: every configuration document under a directory is compiled
//! as an independent unit.
//!
//! A failing unit is reported and skipped; it never aborts its siblings and
//! never leaves an output file behind.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::compiler::{CompileOptions, CompiledModel, compile};
use crate::error::ForgeResult;
use crate::workbook::Workbook;

/// Recursively find documents with `extension`, in sorted path order.
///
/// An unreadable `root` is an error; unreadable directories below it are
/// logged and skipped.
pub fn discover_documents(root: &Path, extension: &str) -> ForgeResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    scan_entries(fs::read_dir(root)?, extension, &mut found);
    found.sort();
    Ok(found)
}

fn scan_entries(entries: fs::ReadDir, extension: &str, found: &mut Vec<PathBuf>) {
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if path.is_dir() {
            match fs::read_dir(&path) {
                Ok(children) => scan_entries(children, extension, found),
                Err(e) => warn!(dir = %path.display(), "skipping unreadable directory: {}", e),
            }
        } else if path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
        {
            found.push(path);
        }
    }
}

/// Load and compile one document.
pub fn compile_file(path: &Path, options: &CompileOptions) -> ForgeResult<CompiledModel> {
    let workbook = Workbook::load(path)?;
    compile(&workbook, options)
}

/// Write a compiled model into `dir`, returning the written path.
///
/// The text goes to a temporary sibling first and is renamed into place.
pub fn write_output(dir: &Path, compiled: &CompiledModel, options: &CompileOptions) -> ForgeResult<PathBuf> {
    let target = dir.join(compiled.file_name(options.dialect));
    let staging = target.with_extension("partial");
    fs::write(&staging, &compiled.sql)?;
    if let Err(e) = fs::rename(&staging, &target) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(target)
}

/// Result of one unit in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Written {
        input: PathBuf,
        output: PathBuf,
        warnings: usize,
    },
    Failed {
        input: PathBuf,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UnitOutcome::Written { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.written()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Compile every document under `root`. Each output is written next to its
/// input. Only an unreadable `root` is an error.
pub fn run_batch(root: &Path, extension: &str, options: &CompileOptions) -> ForgeResult<BatchReport> {
    let documents = discover_documents(root, extension)?;
    info!(root = %root.display(), documents = documents.len(), "starting batch");

    let mut report = BatchReport::default();
    for input in documents {
        let dir = input.parent().unwrap_or(root).to_path_buf();
        let outcome = match compile_file(&input, options)
            .and_then(|compiled| write_output(&dir, &compiled, options).map(|out| (out, compiled)))
        {
            Ok((output, compiled)) => {
                info!(input = %input.display(), output = %output.display(), "compiled");
                UnitOutcome::Written {
                    input,
                    output,
                    warnings: compiled.warnings.len(),
                }
            }
            Err(e) => {
                warn!(input = %input.display(), "failed: {}", e);
                UnitOutcome::Failed {
                    input,
                    error: e.to_string(),
                }
            }
        };
        report.outcomes.push(outcome);
    }
    Ok(report)
}
