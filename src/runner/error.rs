//! Error types for the runner module.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The project model does not exist at the expected path.
    #[error("no project model found at '{path}'")]
    #[diagnostic(
        code(bootgraph::runner::model_not_found),
        help("pass the model with --file, or change directory with -C")
    )]
    ModelNotFound {
        /// The path that was attempted.
        path: Utf8PathBuf,
    },

    /// A command-line path is not valid UTF-8.
    #[error("path '{path}' is not valid UTF-8")]
    #[diagnostic(code(bootgraph::runner::non_utf8_path))]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// `show` named a file the plan does not generate.
    #[error("'{path}' is not a generated file")]
    #[diagnostic(
        code(bootgraph::runner::unknown_file),
        help("generated files include build.ninja, <target>/target.ninja and module.<name>.ninja")
    )]
    UnknownFile {
        /// The requested path.
        path: Utf8PathBuf,
    },
}
