//! Self-regeneration and compile-database edges.
//!
//! The root build file carries a generator edge that reruns `bootgraph`
//! with its original arguments whenever a structural input changes, and a
//! `compdb` edge sharing the same implicit inputs.

use camino::Utf8PathBuf;
use indexmap::IndexSet;
use shell_quote::{QuoteRefExt, Sh};

use crate::ir::{BuildEdge, BuildFile, IrError, Rule};

/// Path of the compile database written by the `compdb` edge.
pub const COMPILE_DATABASE: &str = "${source_root}/compile_commands.json";

/// Build file the regeneration edge produces explicitly.
pub const ROOT_BUILD_FILE: &str = "build.ninja";

/// The generator edge rebuilding every generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationEdge {
    command: String,
    inputs: IndexSet<Utf8PathBuf>,
    outputs: IndexSet<Utf8PathBuf>,
}

impl RegenerationEdge {
    /// Edge rerunning `argv`; each argument is shell-quoted.
    #[must_use]
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = argv
            .into_iter()
            .map(|arg| quote(arg.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            command,
            inputs: IndexSet::new(),
            outputs: IndexSet::new(),
        }
    }

    /// The quoted command line, escaped for Ninja.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Record a structural input. Repeats are ignored.
    pub fn input(&mut self, path: impl Into<Utf8PathBuf>) {
        self.inputs.insert(path.into());
    }

    /// Record a generated file besides `build.ninja`. Repeats are ignored.
    pub fn output(&mut self, path: impl Into<Utf8PathBuf>) {
        let path = path.into();
        if path.as_str() != ROOT_BUILD_FILE {
            self.outputs.insert(path);
        }
    }

    /// Declare the `regen` rule, the regeneration edge and the
    /// compile-database edge in `file`.
    ///
    /// The rule is `restat`: a run that leaves every file untouched marks
    /// `build.ninja` clean instead of leaving it older than its inputs.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateOutput`] when `file` already produces
    /// one of the generated files.
    pub fn emit(&self, file: &mut BuildFile) -> Result<(), IrError> {
        let mut rule = Rule::new("regen", self.command.clone());
        rule.description = Some("Regenerate build files".into());
        rule.generator = true;
        rule.restat = true;
        file.rule(rule);
        file.blank();

        file.build(
            BuildEdge::new("regen", [ROOT_BUILD_FILE])
                .implicit(self.inputs.iter())
                .implicit_outputs(self.outputs.iter()),
        )?;
        file.blank();

        file.build(BuildEdge::new("compdb", [COMPILE_DATABASE]).implicit(self.inputs.iter()))?;
        file.default_targets([COMPILE_DATABASE]);
        file.blank();
        Ok(())
    }
}

/// Quote one argument for `sh` and escape it for a Ninja command.
fn quote(arg: &str) -> String {
    let bytes: Vec<u8> = arg.quoted(Sh);
    let quoted = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(&err.into_bytes()).into_owned(),
    };
    quoted.replace('$', "$$")
}
