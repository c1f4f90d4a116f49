//! Layer linting - static analysis of JSON layer declaration files.
//!
//! Each file is loaded and stacked on top of a base spec (normally the
//! standard catalog) and checked for:
//! - JSON syntax and declaration errors
//! - build errors of the resulting stack
//! - Exts and removals that hit no field
//! - Exts of the base that a field declaration makes ineffective

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{BuildError, LoadError};
use crate::loader::load_layer;
use crate::spec::{Binding, DataSpec, Layer, ShadowedExt};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/fields/category/ext")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files. Every file
/// is checked on its own, stacked on `base`.
/// If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, strict: bool, base: &DataSpec) -> LintResult {
    let files = collect_layer_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path, base);
        total_errors += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        total_warnings += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single layer file.
pub fn lint_file(file: &Path, base_path: &Path, base: &DataSpec) -> FileResult {
    let mut diagnostics = Vec::new();
    let diag = |severity, code: &str, path: String, message: String| Diagnostic {
        severity,
        code: code.to_string(),
        file: file.to_path_buf(),
        path,
        message,
    };

    match load_layer(file) {
        Err(LoadError::Build(e)) => {
            diagnostics.push(diag(
                Severity::Error,
                "E001",
                build_error_path(&e),
                format!("declaration error: {}", e),
            ));
        }
        Err(e) => {
            let path = match &e {
                LoadError::InvalidDeclaration { path, .. } => path.clone(),
                _ => "/".to_string(),
            };
            diagnostics.push(diag(Severity::Error, "E001", path, format!("syntax error: {}", e)));
        }
        Ok(layer) => check_layer(&layer, base, &mut |severity, code, path, message| {
            diagnostics.push(diag(severity, code, path, message))
        }),
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
    }
}

fn build_error_path(error: &BuildError) -> String {
    match error {
        BuildError::InvalidKey { key, .. } => format!("/fields/{}", key),
        _ => "/".to_string(),
    }
}

fn check_layer(
    layer: &Layer,
    base: &DataSpec,
    report: &mut dyn FnMut(Severity, &str, String, String),
) {
    if layer.name().is_none() {
        report(Severity::Warning, "W003", "/".to_string(), "layer has no name".to_string());
    }

    let spec = match base.extend(layer.clone()) {
        Ok(spec) => spec,
        Err(e) => {
            report(Severity::Error, "E002", build_error_path(&e), format!("build error: {}", e));
            return;
        }
    };

    for key in spec
        .unresolved_ext_keys()
        .difference(base.unresolved_ext_keys())
    {
        report(
            Severity::Warning,
            "W001",
            format!("/fields/{}", key),
            format!("ext for \"{}\" never meets a field", key),
        );
    }
    for (key, binding) in layer.bindings() {
        if matches!(binding, Binding::Remove) && base.field(key).is_none() {
            report(
                Severity::Warning,
                "W001",
                format!("/fields/{}", key),
                format!("removal of \"{}\", which is not defined", key),
            );
        }
    }

    // base indices shift by one under the new layer
    let already: BTreeSet<(usize, &str)> = base
        .shadowed_exts()
        .iter()
        .map(|s| (s.layer + 1, s.key.as_str()))
        .collect();
    for ShadowedExt { layer: index, key } in spec.shadowed_exts() {
        if already.contains(&(*index, key.as_str())) {
            continue;
        }
        let owner = spec.layers()[*index].name().unwrap_or("<unnamed>").to_string();
        report(
            Severity::Warning,
            "W002",
            format!("/fields/{}", key),
            format!(
                "ext for \"{}\" in layer \"{}\" has no effect: this layer finalizes the key first",
                key, owner
            ),
        );
    }
}

/// Collect all .json files under a path.
fn collect_layer_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
