//! In-memory build files.
//!
//! A [`BuildFile`] is an ordered list of Ninja statements. Statement order
//! is preserved on output because later statements may reference variables
//! and subgraphs declared earlier. The structures carry no Ninja syntax;
//! rendering lives in [`crate::ninja_gen`].
//!
//! # Examples
//!
//! ```
//! use bootgraph::ir::{BuildEdge, BuildFile};
//!
//! let mut file = BuildFile::new("build.ninja");
//! file.variable("build_root", "out");
//! file.build(BuildEdge::new("cp", ["${build_root}/a"]).inputs(["a"]))
//!     .expect("first edge for this output");
//! assert_eq!(file.edges().count(), 1);
//! ```

mod cycle;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;

/// A rule declared inline in a build file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Rule identifier referenced by edges.
    pub name: String,
    /// Command line executed by the rule.
    pub command: String,
    /// Optional human-friendly summary.
    pub description: Option<String>,
    /// Optional dependency file produced by the command.
    pub depfile: Option<String>,
    /// Dependency file format, e.g. `gcc`.
    pub deps_format: Option<String>,
    /// Optional pool name.
    pub pool: Option<String>,
    /// Whether the rule regenerates build files.
    pub generator: bool,
    /// Whether Ninja should re-stat outputs after running.
    pub restat: bool,
}

impl Rule {
    /// A rule with only a command set.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: None,
            depfile: None,
            deps_format: None,
            pool: None,
            generator: false,
            restat: false,
        }
    }
}

/// A single build edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEdge {
    /// Rule producing the outputs; `phony` for aliases.
    pub rule: String,
    /// Explicit inputs, visible to the command as `$in`.
    pub inputs: Vec<Utf8PathBuf>,
    /// Implicit inputs: rebuild triggers that are not part of `$in`.
    pub implicit_deps: Vec<Utf8PathBuf>,
    /// Ordering-only dependencies.
    pub order_only_deps: Vec<Utf8PathBuf>,
    /// Explicit outputs, visible as `$out`.
    pub explicit_outputs: Vec<Utf8PathBuf>,
    /// Outputs produced as a side effect.
    pub implicit_outputs: Vec<Utf8PathBuf>,
    /// Edge-scoped variables.
    pub variables: IndexMap<String, String>,
}

fn paths<I, P>(items: I) -> impl Iterator<Item = Utf8PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<Utf8PathBuf>,
{
    items.into_iter().map(Into::into)
}

impl BuildEdge {
    /// Start an edge for `rule` producing `outputs`.
    #[must_use]
    pub fn new<I, P>(rule: impl Into<String>, outputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        Self {
            rule: rule.into(),
            inputs: Vec::new(),
            implicit_deps: Vec::new(),
            order_only_deps: Vec::new(),
            explicit_outputs: paths(outputs).collect(),
            implicit_outputs: Vec::new(),
            variables: IndexMap::new(),
        }
    }

    /// Append explicit inputs.
    #[must_use]
    pub fn inputs<I, P>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.inputs.extend(paths(items));
        self
    }

    /// Append implicit inputs.
    #[must_use]
    pub fn implicit<I, P>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.implicit_deps.extend(paths(items));
        self
    }

    /// Append ordering-only dependencies.
    #[must_use]
    pub fn order_only<I, P>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.order_only_deps.extend(paths(items));
        self
    }

    /// Append implicit outputs.
    #[must_use]
    pub fn implicit_outputs<I, P>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.implicit_outputs.extend(paths(items));
        self
    }

    /// Bind an edge-scoped variable.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Every output, explicit first.
    pub fn outputs(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.explicit_outputs.iter().chain(&self.implicit_outputs)
    }

    /// Every dependency: explicit, implicit, then ordering-only.
    pub fn dependencies(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.inputs
            .iter()
            .chain(&self.implicit_deps)
            .chain(&self.order_only_deps)
    }
}

/// One top-level statement of a build file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A `#` comment line.
    Comment(String),
    /// A file-scoped variable binding.
    Variable {
        /// Variable name.
        name: String,
        /// Unescaped value.
        value: String,
    },
    /// Textual inclusion sharing the current scope.
    Include(Utf8PathBuf),
    /// Inclusion in a child scope.
    Subninja(Utf8PathBuf),
    /// An inline rule declaration.
    Rule(Rule),
    /// A build edge.
    Build(BuildEdge),
    /// Outputs built when no target is named.
    Default(Vec<Utf8PathBuf>),
    /// An empty separator line.
    Blank,
}

/// Errors raised while assembling a build file.
#[derive(Debug, Error, Diagnostic)]
pub enum IrError {
    /// Two edges in the same file claim the same output.
    #[error("{file}: output '{output}' is produced by more than one edge")]
    #[diagnostic(code(bootgraph::ir::duplicate_output))]
    DuplicateOutput {
        /// File the edges were declared in.
        file: Utf8PathBuf,
        /// The contested output.
        output: Utf8PathBuf,
    },

    /// The edges of a file form a cycle.
    #[error("{file}: circular dependency detected: {}", format_cycle(.cycle))]
    #[diagnostic(code(bootgraph::ir::cycle))]
    CircularDependency {
        /// File the edges were declared in.
        file: Utf8PathBuf,
        /// Nodes along the cycle, first node repeated at the end.
        cycle: Vec<Utf8PathBuf>,
    },
}

fn format_cycle(cycle: &[Utf8PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// An ordered Ninja build file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFile {
    path: Utf8PathBuf,
    statements: Vec<Statement>,
    outputs: IndexSet<Utf8PathBuf>,
}

impl BuildFile {
    /// An empty file destined for `path`, relative to the build root.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            statements: Vec::new(),
            outputs: IndexSet::new(),
        }
    }

    /// Destination relative to the build root.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Statements in declaration order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Build edges in declaration order.
    pub fn edges(&self) -> impl Iterator<Item = &BuildEdge> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Build(edge) => Some(edge),
            _ => None,
        })
    }

    /// The edge producing `output`, if one was declared here.
    #[must_use]
    pub fn producer(&self, output: &Utf8Path) -> Option<&BuildEdge> {
        self.edges().find(|e| e.outputs().any(|o| o == output))
    }

    /// Whether an edge here produces `output`.
    #[must_use]
    pub fn produces(&self, output: &Utf8Path) -> bool {
        self.outputs.contains(output)
    }

    /// Add a comment line.
    pub fn comment(&mut self, text: impl Into<String>) {
        self.statements.push(Statement::Comment(text.into()));
    }

    /// Bind a file-scoped variable.
    pub fn variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.statements.push(Statement::Variable {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Include another file in the current scope.
    pub fn include(&mut self, path: impl Into<Utf8PathBuf>) {
        self.statements.push(Statement::Include(path.into()));
    }

    /// Include another file in a child scope.
    pub fn subninja(&mut self, path: impl Into<Utf8PathBuf>) {
        self.statements.push(Statement::Subninja(path.into()));
    }

    /// Declare a rule.
    pub fn rule(&mut self, rule: Rule) {
        self.statements.push(Statement::Rule(rule));
    }

    /// Add a separator line.
    pub fn blank(&mut self) {
        self.statements.push(Statement::Blank);
    }

    /// Mark outputs as default targets.
    pub fn default_targets<I, P>(&mut self, items: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.statements
            .push(Statement::Default(paths(items).collect()));
    }

    /// Add a build edge.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateOutput`] when an output is already
    /// produced by an earlier edge in this file; the file is unchanged.
    pub fn build(&mut self, edge: BuildEdge) -> Result<(), IrError> {
        let mut seen = IndexSet::new();
        for output in edge.outputs() {
            if self.outputs.contains(output) || !seen.insert(output.clone()) {
                return Err(IrError::DuplicateOutput {
                    file: self.path.clone(),
                    output: output.clone(),
                });
            }
        }
        self.outputs.extend(seen);
        self.statements.push(Statement::Build(edge));
        Ok(())
    }

    /// Verify the edges declared in this file are acyclic.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::CircularDependency`] naming one cycle.
    pub fn detect_cycles(&self) -> Result<(), IrError> {
        match cycle::find_cycle(self.edges()) {
            Some(cycle) => Err(IrError::CircularDependency {
                file: self.path.clone(),
                cycle,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn build_rejects_duplicate_outputs() {
        let mut file = BuildFile::new("build.ninja");
        file.build(BuildEdge::new("cp", ["a"]).inputs(["src/a"]))
            .expect("first edge");
        let err = file
            .build(BuildEdge::new("cp", ["b"]).implicit_outputs(["a"]))
            .expect_err("duplicate");
        assert!(matches!(err, IrError::DuplicateOutput { ref output, .. } if output == "a"));
        assert_eq!(file.edges().count(), 1);
        assert!(!file.produces(Utf8Path::new("b")));
    }

    #[rstest]
    fn build_rejects_repeated_output_within_edge() {
        let mut file = BuildFile::new("build.ninja");
        let err = file
            .build(BuildEdge::new("cp", ["a", "a"]))
            .expect_err("duplicate");
        assert!(matches!(err, IrError::DuplicateOutput { .. }));
    }

    #[rstest]
    fn producer_finds_implicit_outputs() {
        let mut file = BuildFile::new("build.ninja");
        file.build(
            BuildEdge::new("strip", ["net.sys"])
                .inputs(["x64/net.sys"])
                .implicit_outputs(["net.sys.debug"]),
        )
        .expect("edge");
        let edge = file
            .producer(Utf8Path::new("net.sys.debug"))
            .expect("producer");
        assert_eq!(edge.rule, "strip");
    }

    #[rstest]
    fn detect_cycles_reports_file() {
        let mut file = BuildFile::new("x64/target.ninja");
        file.build(BuildEdge::new("cp", ["a"]).inputs(["b"]))
            .expect("edge a");
        file.build(BuildEdge::new("cp", ["b"]).order_only(["a"]))
            .expect("edge b");
        let err = file.detect_cycles().expect_err("cycle");
        assert_eq!(
            err.to_string(),
            "x64/target.ninja: circular dependency detected: a -> b -> a"
        );
    }
}
