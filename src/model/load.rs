//! Reads a [`ProjectModel`] from YAML and turns parse failures into
//! actionable diagnostics.

use super::ProjectModel;
use camino::Utf8Path;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use std::fs;
use thiserror::Error;

const YAML_HINTS: [(&str, &str); 3] = [
    (
        "unknown field",
        "Check the key spelling; model records reject unknown keys.",
    ),
    (
        "missing field",
        "Add the required key or remove the partially written record.",
    ),
    (
        "unknown variant",
        "Categories are kernel, init, panic, service, driver and data.",
    ),
];

/// Errors raised while reading a project model.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    /// The model file could not be read.
    #[error("failed to read project model {path}")]
    #[diagnostic(code(bootgraph::model::read))]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not describe a valid model.
    #[error("project model parse error")]
    #[diagnostic(code(bootgraph::model::parse))]
    Parse {
        /// Spanned YAML diagnostic.
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync + 'static>,
    },
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(bootgraph::yaml::parse))]
struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("parse error here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

fn saturating_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn location_to_index(src: &str, loc: Location) -> usize {
    let target_line = saturating_usize(loc.line().saturating_sub(1));
    let target_column = saturating_usize(loc.column().saturating_sub(1));
    let mut offset = 0usize;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let line = segment.strip_suffix('\n').unwrap_or(segment);
            let byte_index = line
                .char_indices()
                .nth(target_column)
                .map_or(line.len(), |(byte_idx, _)| byte_idx);
            return offset + byte_index;
        }
        offset += segment.len();
    }
    src.len()
}

fn to_span(src: &str, loc: Location) -> SourceSpan {
    let at = location_to_index(src, loc);
    let len = usize::from(src.as_bytes().get(at).is_some_and(|b| *b != b'\n'));
    SourceSpan::new(at.into(), len)
}

fn hint_for(err_str: &str) -> Option<String> {
    YAML_HINTS
        .iter()
        .find(|(needle, _)| err_str.contains(*needle))
        .map(|(_, hint)| (*hint).to_owned())
}

fn map_yaml_error(err: YamlError, src: &str, name: &str) -> ModelError {
    let loc = err.location();
    let (line, col, span) = loc.map_or((1, 1, None), |l| {
        (l.line(), l.column(), Some(to_span(src, l)))
    });
    let err_str = err.to_string();
    let help = hint_for(&err_str);
    let message = format!("YAML parse error at line {line}, column {col}: {err_str}");
    ModelError::Parse {
        source: Box::new(YamlDiagnostic {
            src: NamedSource::new(name, src.to_owned()),
            span,
            help,
            source: err,
            message,
        }),
    }
}

fn from_str_named(yaml: &str, name: &str) -> Result<ProjectModel, ModelError> {
    serde_saphyr::from_str(yaml).map_err(|e| map_yaml_error(e, yaml, name))
}

/// Parse a model from a YAML string.
///
/// # Errors
///
/// Returns [`ModelError::Parse`] when the YAML is malformed or does not
/// match the model schema.
pub fn from_str(yaml: &str) -> Result<ProjectModel, ModelError> {
    from_str_named(yaml, "bootgraph.yaml")
}

/// Load a model from `path`.
///
/// # Errors
///
/// Returns [`ModelError::Read`] when the file cannot be read and
/// [`ModelError::Parse`] when its contents are invalid.
pub fn from_path(path: &Utf8Path) -> Result<ProjectModel, ModelError> {
    let data = fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_string(),
        source,
    })?;
    from_str_named(&data, path.as_str())
}
