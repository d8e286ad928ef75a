//! Committing a generation plan to disk.
//!
//! Staging directories are created first, so no build file is ever written
//! before the directories it refers to exist. Files are written next to
//! their destination under a temporary name and renamed once every write
//! has succeeded. Files whose contents are unchanged are left alone, keeping
//! their timestamps stable for the executor.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assemble::{GeneratedFile, GenerationPlan};

const TEMP_SUFFIX: &str = "tmp";

/// Errors raised while writing a plan.
#[derive(Debug, Error, Diagnostic)]
pub enum OutputError {
    /// A directory could not be created or opened.
    #[error("failed to create directory '{path}'")]
    #[diagnostic(code(bootgraph::output::create_dir))]
    CreateDir {
        /// The directory.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A file could not be written.
    #[error("failed to write '{path}'")]
    #[diagnostic(code(bootgraph::output::write))]
    Write {
        /// The file, relative to the build root.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A written file could not be moved into place.
    #[error("failed to move '{path}' into place")]
    #[diagnostic(code(bootgraph::output::rename))]
    Rename {
        /// The file, relative to the build root.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// What a commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Files written or replaced.
    pub written: Vec<Utf8PathBuf>,
    /// Files already holding the planned contents.
    pub unchanged: Vec<Utf8PathBuf>,
}

/// Write `plan` below `build_root`, creating it if needed.
///
/// # Errors
///
/// Returns [`OutputError`] if a directory cannot be created or a file
/// cannot be written. Temporary files are removed on failure and no
/// destination is replaced unless every write succeeded.
pub fn commit(plan: &GenerationPlan, build_root: &Utf8Path) -> Result<CommitReport, OutputError> {
    Dir::create_ambient_dir_all(build_root, ambient_authority()).map_err(|source| {
        OutputError::CreateDir {
            path: build_root.to_owned(),
            source,
        }
    })?;
    let root = Dir::open_ambient_dir(build_root, ambient_authority()).map_err(|source| {
        OutputError::CreateDir {
            path: build_root.to_owned(),
            source,
        }
    })?;

    for dir in plan.directories() {
        root.create_dir_all(dir)
            .map_err(|source| OutputError::CreateDir {
                path: build_root.join(dir),
                source,
            })?;
    }

    let mut report = CommitReport::default();
    let mut staged = Vec::new();
    for file in plan.rendered() {
        if is_current(&root, &file) {
            debug!(path = %file.path, "unchanged");
            report.unchanged.push(file.path);
            continue;
        }
        match stage(&root, &file) {
            Ok(temp) => staged.push((temp, file.path)),
            Err(err) => {
                discard(&root, staged.iter().map(|(temp, _)| temp));
                return Err(err);
            }
        }
    }

    for (index, (temp, path)) in staged.iter().enumerate() {
        if let Err(source) = root.rename(temp, &root, path) {
            discard(&root, staged[index..].iter().map(|(temp, _)| temp));
            return Err(OutputError::Rename {
                path: path.clone(),
                source,
            });
        }
        debug!(%path, "written");
    }
    report.written = staged.into_iter().map(|(_, path)| path).collect();

    info!(
        root = %build_root,
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        "committed generation plan"
    );
    Ok(report)
}

fn is_current(root: &Dir, file: &GeneratedFile) -> bool {
    root.read_to_string(&file.path)
        .is_ok_and(|existing| existing == file.contents)
}

fn stage(root: &Dir, file: &GeneratedFile) -> Result<Utf8PathBuf, OutputError> {
    let temp = temp_path(&file.path);
    if let Some(parent) = file.path.parent().filter(|p| !p.as_str().is_empty()) {
        root.create_dir_all(parent)
            .map_err(|source| OutputError::CreateDir {
                path: parent.to_owned(),
                source,
            })?;
    }
    root.write(&temp, file.contents.as_bytes())
        .map_err(|source| OutputError::Write {
            path: file.path.clone(),
            source,
        })?;
    Ok(temp)
}

fn discard<'a>(root: &Dir, temps: impl Iterator<Item = &'a Utf8PathBuf>) {
    for temp in temps {
        if let Err(err) = root.remove_file(temp) {
            warn!(path = %temp, error = %err, "failed to remove temporary file");
        }
    }
}

fn temp_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut name = path.as_str().to_owned();
    name.push('.');
    name.push_str(TEMP_SUFFIX);
    Utf8PathBuf::from(name)
}
