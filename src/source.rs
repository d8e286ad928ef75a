//! Source file nodes.

use crate::action::{Action, ActionRegistry};
use crate::model::SourceSpec;
use camino::{Utf8Path, Utf8PathBuf};

/// Root of every derived output inside a module subgraph.
pub const MODULE_DIR: &str = "${module_dir}";

/// A file node: a path relative to its owning directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    root: Utf8PathBuf,
    path: Utf8PathBuf,
    output: Option<Utf8PathBuf>,
    deps: Vec<Utf8PathBuf>,
}

impl Source {
    /// Create a source with no override and no extra dependencies.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            path: path.into(),
            output: None,
            deps: Vec::new(),
        }
    }

    /// Create a source rooted at `root` from a declared [`SourceSpec`].
    #[must_use]
    pub fn from_spec(root: impl Into<Utf8PathBuf>, spec: &SourceSpec) -> Self {
        Self {
            root: root.into(),
            path: spec.path.clone(),
            output: spec.output.clone(),
            deps: spec.deps.clone(),
        }
    }

    /// Path relative to the owning directory.
    #[must_use]
    pub fn name(&self) -> &Utf8Path {
        &self.path
    }

    /// Full input path.
    #[must_use]
    pub fn input(&self) -> Utf8PathBuf {
        self.root.join(&self.path)
    }

    /// Extra dependencies in declaration order.
    #[must_use]
    pub fn deps(&self) -> &[Utf8PathBuf] {
        &self.deps
    }

    /// Action selected by the file's suffix.
    #[must_use]
    pub fn action<'r>(&self, registry: &'r ActionRegistry) -> Option<&'r Action> {
        registry.for_path(&self.path)
    }

    /// The node this source produces inside [`MODULE_DIR`].
    ///
    /// An explicit override wins over the action's transform; files without
    /// an action, or whose action produces nothing, yield `None`.
    #[must_use]
    pub fn output(&self, registry: &ActionRegistry) -> Option<Self> {
        let action = self.action(registry)?;
        let path = match &self.output {
            Some(path) => path.clone(),
            None => action.output_of(&self.path)?,
        };
        Some(Self::new(MODULE_DIR, path))
    }
}
