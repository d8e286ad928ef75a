//! Suffix-driven action dispatch.
//!
//! Every recognised file suffix maps to exactly one [`Action`], which names
//! the Ninja rule that processes the file and how the output path is derived
//! from the input path. Files with unknown suffixes have no action and are
//! consumed as opaque leaves.
//!
//! ```
//! use bootgraph::action::ActionRegistry;
//! use camino::Utf8Path;
//!
//! let registry = ActionRegistry::standard();
//! let action = registry.resolve(".c").expect("C is compiled");
//! assert_eq!(action.rule().as_deref(), Some("compile_c"));
//! assert_eq!(
//!     action.output_of(Utf8Path::new("main.c")).as_deref(),
//!     Some(Utf8Path::new("main.c.o")),
//! );
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

/// Sentinel every compiled source waits on before its include scan runs.
pub const PARSE_DEP_SENTINEL: &str = "${module_dir}/.parse_dep.phony";

/// How a source file is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Compile with `compile_<lang>`, appending `suffix` to the path.
    Compile {
        /// Language tag used in the rule name.
        lang: String,
        /// Suffix appended to produce the object path.
        suffix: String,
    },
    /// Preprocess with `parse_<marker>`, removing the `.<marker>` suffix.
    Parse {
        /// Marker suffix without the leading dot.
        marker: String,
    },
    /// Pre-built object fed straight into the link step.
    Link,
    /// Header consumed for ordering only.
    Header,
}

impl Action {
    /// Compile action producing `.o` objects.
    #[must_use]
    pub fn compile(lang: &str) -> Self {
        Self::Compile {
            lang: lang.to_owned(),
            suffix: String::from(".o"),
        }
    }

    /// Parse action stripping `.<marker>`.
    #[must_use]
    pub fn parse(marker: &str) -> Self {
        Self::Parse {
            marker: marker.to_owned(),
        }
    }

    /// Ninja rule processing files of this kind, if any.
    #[must_use]
    pub fn rule(&self) -> Option<String> {
        match self {
            Self::Compile { lang, .. } => Some(format!("compile_{lang}")),
            Self::Parse { marker } => Some(format!("parse_{marker}")),
            Self::Link | Self::Header => None,
        }
    }

    /// Path of the file this action produces from `path`.
    ///
    /// Parse actions pass paths without the marker through unchanged. Link
    /// and header files are consumed in place and produce nothing.
    #[must_use]
    pub fn output_of(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        match self {
            Self::Compile { suffix, .. } => Some(Utf8PathBuf::from(format!("{path}{suffix}"))),
            Self::Parse { marker } => {
                if path.extension() == Some(marker.as_str()) {
                    Some(path.with_extension(""))
                } else {
                    Some(path.to_owned())
                }
            }
            Self::Link | Self::Header => None,
        }
    }

    /// Whether the file is an ordering-only dependency of compiled sources.
    #[must_use]
    pub const fn implicit(&self) -> bool {
        matches!(self, Self::Header)
    }

    /// Dependencies every edge of this kind carries.
    #[must_use]
    pub fn static_deps(&self) -> &'static [&'static str] {
        match self {
            Self::Compile { .. } => &[PARSE_DEP_SENTINEL],
            Self::Parse { .. } | Self::Link | Self::Header => &[],
        }
    }

    /// Whether the executor should merge discovered include dependencies.
    #[must_use]
    pub const fn needs_dep_scan(&self) -> bool {
        matches!(self, Self::Compile { .. })
    }
}

/// Errors raised while building an action table.
#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    /// Two entries claimed the same suffix.
    #[error("suffix '{suffix}' is mapped to more than one action")]
    #[diagnostic(code(bootgraph::action::duplicate_suffix))]
    DuplicateSuffix {
        /// The contested suffix, including its leading dot.
        suffix: String,
    },
}

/// Immutable suffix → [`Action`] table.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: IndexMap<String, Action>,
}

impl ActionRegistry {
    /// The table used for kernel and user-space modules.
    #[must_use]
    pub fn standard() -> Self {
        let actions = IndexMap::from([
            (String::from(".c"), Action::compile("c")),
            (String::from(".cpp"), Action::compile("cxx")),
            (String::from(".s"), Action::compile("asm")),
            (String::from(".cog"), Action::parse("cog")),
            (String::from(".o"), Action::Link),
            (String::from(".h"), Action::Header),
            (String::from(".inc"), Action::Header),
        ]);
        Self { actions }
    }

    /// Build a table from `(suffix, action)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::DuplicateSuffix`] when a suffix repeats.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = (S, Action)>,
        S: Into<String>,
    {
        let mut actions = IndexMap::new();
        for (suffix, action) in entries {
            let key = suffix.into();
            if actions.contains_key(&key) {
                return Err(ActionError::DuplicateSuffix { suffix: key });
            }
            actions.insert(key, action);
        }
        Ok(Self { actions })
    }

    /// Look up the action for `suffix` (with its leading dot).
    #[must_use]
    pub fn resolve(&self, suffix: &str) -> Option<&Action> {
        self.actions.get(suffix)
    }

    /// Look up the action for `path` by its final extension.
    #[must_use]
    pub fn for_path(&self, path: &Utf8Path) -> Option<&Action> {
        let ext = path.extension()?;
        self.resolve(&format!(".{ext}"))
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
