//! Path resolution helpers for the runner module.
//!
//! Generated build files run with the output directory as their working
//! directory, so every path written into them is made absolute here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

use crate::cli::Cli;
use crate::model::{ProjectModel, rooted};

use super::RunnerError;

/// Absolute locations of one run's inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RunPaths {
    /// Directory the run behaves as if started from.
    pub base: Utf8PathBuf,
    /// Project model file.
    pub model: Utf8PathBuf,
    /// Build root receiving generated files.
    pub output: Utf8PathBuf,
}

impl RunPaths {
    /// Resolve the CLI's paths against `cwd`, honouring `-C`.
    pub(super) fn resolve(cli: &Cli, cwd: &Utf8Path) -> Result<Self> {
        let base = match &cli.directory {
            Some(dir) => rooted(cwd, &utf8(dir)?),
            None => cwd.to_owned(),
        };
        Ok(Self {
            model: rooted(&base, &utf8(&cli.file)?),
            output: rooted(&base, &utf8(&cli.output)?),
            base,
        })
    }

    /// Resolve against the process working directory.
    pub(super) fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("reading the working directory")?;
        Self::resolve(cli, &utf8(&cwd)?)
    }

    /// Fail early with a helpful diagnostic when the model is missing.
    pub(super) fn ensure_model_exists(&self) -> Result<(), RunnerError> {
        if self.model.is_file() {
            Ok(())
        } else {
            Err(RunnerError::ModelNotFound {
                path: self.model.clone(),
            })
        }
    }

    /// Source tree root: the project's declared root, resolved against the
    /// model file's directory, or that directory itself.
    pub(super) fn source_root(&self, model: &ProjectModel) -> Utf8PathBuf {
        let model_dir = self.model.parent().unwrap_or(self.base.as_path());
        match &model.project.root {
            Some(root) => rooted(model_dir, root),
            None => model_dir.to_owned(),
        }
    }

    /// Arguments that rerun this generation from any working directory.
    pub(super) fn regeneration_argv(&self, program: &str) -> Vec<String> {
        vec![
            program.to_owned(),
            String::from("-f"),
            self.model.to_string(),
            String::from("-o"),
            self.output.to_string(),
            String::from("generate"),
        ]
    }
}

fn utf8(path: &Path) -> Result<Utf8PathBuf, RunnerError> {
    Utf8PathBuf::from_path_buf(PathBuf::from(path)).map_err(|path| RunnerError::NonUtf8Path {
        path: path.display().to_string(),
    })
}
