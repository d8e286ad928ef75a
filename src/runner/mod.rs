//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the project model, assembles the plan and then writes, checks or
//! prints it.

mod error;
mod paths;

pub use error::RunnerError;

use std::io::{self, Write};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::action::ActionRegistry;
use crate::assemble::{GenerationPlan, GraphAssembler};
use crate::cli::{Cli, Commands};
use crate::{model, output};

use paths::RunPaths;

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if the model cannot be loaded, the graph cannot be
/// assembled, or the generated files cannot be written.
pub fn run(cli: &Cli) -> Result<()> {
    let paths = RunPaths::from_cli(cli)?;
    let plan = assemble(&paths)?;
    match cli.command.clone().unwrap_or(Commands::Generate) {
        Commands::Generate => {
            let report = output::commit(&plan, &paths.output)
                .with_context(|| format!("writing build files to {}", paths.output))?;
            info!(
                written = report.written.len(),
                unchanged = report.unchanged.len(),
                "generated build files in {}",
                paths.output
            );
            Ok(())
        }
        Commands::Check => {
            let files = plan.rendered().len();
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}: {files} files would be generated", paths.model)
                .context("writing to stdout")?;
            Ok(())
        }
        Commands::Show { file } => {
            let wanted = Utf8PathBuf::from_path_buf(file).map_err(|path| RunnerError::NonUtf8Path {
                path: path.display().to_string(),
            })?;
            let found = plan
                .rendered()
                .into_iter()
                .find(|f| f.path == wanted)
                .ok_or(RunnerError::UnknownFile { path: wanted })?;
            io::stdout()
                .lock()
                .write_all(found.contents.as_bytes())
                .context("writing to stdout")?;
            Ok(())
        }
    }
}

/// Load the project model named by `paths` and assemble its plan.
fn assemble(paths: &RunPaths) -> Result<GenerationPlan> {
    paths.ensure_model_exists()?;
    let model = model::from_path(&paths.model)
        .with_context(|| format!("loading project model at {}", paths.model))?;
    let source_root = paths.source_root(&model);
    debug!(
        project = %model.project.name,
        config = %model.config,
        source_root = %source_root,
        "loaded project model"
    );

    let registry = ActionRegistry::standard();
    let program = std::env::current_exe()
        .ok()
        .and_then(|exe| Utf8PathBuf::from_path_buf(exe).ok())
        .map_or_else(|| String::from(env!("CARGO_PKG_NAME")), Utf8PathBuf::into_string);
    GraphAssembler::new(&model, &registry, source_root, paths.output.clone())
        .with_model_file(paths.model.clone())
        .with_command(paths.regeneration_argv(&program))
        .assemble()
        .context("assembling build graph")
}

#[cfg(test)]
mod tests;
