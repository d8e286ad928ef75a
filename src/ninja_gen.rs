//! Ninja file generator.
//!
//! This module converts a [`crate::ir::BuildFile`] into the textual
//! representation expected by the Ninja build system. Statements are written
//! in declaration order; identical files always render to identical text.

use crate::ir::{BuildEdge, BuildFile, Rule, Statement};
use camino::Utf8PathBuf;
use itertools::Itertools;
use std::fmt::{self, Display, Formatter};

macro_rules! write_kv {
    ($f:expr, $key:expr, $opt:expr) => {
        if let Some(val) = $opt {
            writeln!($f, "  {} = {}", $key, val)?;
        }
    };
}

macro_rules! write_flag {
    ($f:expr, $key:expr, $cond:expr) => {
        if $cond {
            writeln!($f, "  {} = 1", $key)?;
        }
    };
}

/// Generate the text of a Ninja build file.
#[must_use]
pub fn generate(file: &BuildFile) -> String {
    file.to_string()
}

/// Escape a path for use in a `build` or `default` line.
///
/// Spaces and colons are significant in path lists. Dollar signs are left
/// alone so paths may reference variables such as `${build_root}`.
fn escape_path(path: &Utf8PathBuf) -> String {
    path.as_str().replace(' ', "$ ").replace(':', "$:")
}

/// Convert a slice of paths into a space-separated string.
fn join(paths: &[Utf8PathBuf]) -> String {
    paths.iter().map(escape_path).join(" ")
}

impl Display for BuildFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for statement in self.statements() {
            match statement {
                Statement::Comment(text) => {
                    for line in text.lines() {
                        writeln!(f, "# {line}")?;
                    }
                }
                Statement::Variable { name, value } => writeln!(f, "{name} = {value}")?,
                Statement::Include(path) => writeln!(f, "include {}", escape_path(path))?,
                Statement::Subninja(path) => writeln!(f, "subninja {}", escape_path(path))?,
                Statement::Rule(rule) => write!(f, "{}", DisplayRule(rule))?,
                Statement::Build(edge) => write!(f, "{}", DisplayEdge(edge))?,
                Statement::Default(paths) => writeln!(f, "default {}", join(paths))?,
                Statement::Blank => writeln!(f)?,
            }
        }
        Ok(())
    }
}

/// Wrapper struct to display a rule declaration.
struct DisplayRule<'a>(&'a Rule);

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rule = self.0;
        writeln!(f, "rule {}", rule.name)?;
        writeln!(f, "  command = {}", rule.command)?;
        write_kv!(f, "description", &rule.description);
        write_kv!(f, "depfile", &rule.depfile);
        write_kv!(f, "deps", &rule.deps_format);
        write_kv!(f, "pool", &rule.pool);
        write_flag!(f, "generator", rule.generator);
        write_flag!(f, "restat", rule.restat);
        Ok(())
    }
}

/// Wrapper struct to display a build edge.
struct DisplayEdge<'a>(&'a BuildEdge);

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let edge = self.0;
        write!(f, "build {}", join(&edge.explicit_outputs))?;
        if !edge.implicit_outputs.is_empty() {
            write!(f, " | {}", join(&edge.implicit_outputs))?;
        }
        write!(f, ": {}", edge.rule)?;
        if !edge.inputs.is_empty() {
            write!(f, " {}", join(&edge.inputs))?;
        }
        if !edge.implicit_deps.is_empty() {
            write!(f, " | {}", join(&edge.implicit_deps))?;
        }
        if !edge.order_only_deps.is_empty() {
            write!(f, " || {}", join(&edge.order_only_deps))?;
        }
        writeln!(f)?;
        for (name, value) in &edge.variables {
            writeln!(f, "  {name} = {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BuildEdge, BuildFile, Rule};
    use rstest::rstest;

    #[rstest]
    fn generate_simple_ninja() {
        let mut file = BuildFile::new("build.ninja");
        file.comment("generated");
        file.variable("build_root", "/out");
        file.blank();
        file.build(BuildEdge::new("cp", ["out"]).inputs(["in"]))
            .expect("edge");
        file.default_targets(["out"]);

        let expected = concat!(
            "# generated\n",
            "build_root = /out\n",
            "\n",
            "build out: cp in\n",
            "default out\n"
        );
        assert_eq!(generate(&file), expected);
    }

    #[rstest]
    fn generate_complex_dependencies() {
        let mut file = BuildFile::new("build.ninja");
        file.build(
            BuildEdge::new("strip", ["${build_root}/net.sys"])
                .inputs(["${build_root}/x64/net.sys"])
                .implicit(["${build_root}/x64/net.sys.dump"])
                .order_only(["stamp"])
                .implicit_outputs(["${build_root}/.debug/net.sys.debug"])
                .var("name", "Stripping drivers.net"),
        )
        .expect("edge");

        let expected = concat!(
            "build ${build_root}/net.sys | ${build_root}/.debug/net.sys.debug: strip ",
            "${build_root}/x64/net.sys | ${build_root}/x64/net.sys.dump || stamp\n",
            "  name = Stripping drivers.net\n",
        );
        assert_eq!(generate(&file), expected);
    }

    #[rstest]
    fn generate_generator_rule() {
        let mut file = BuildFile::new("build.ninja");
        let mut rule = Rule::new("regen", "bootgraph -o out");
        rule.description = Some("Regenerate build files".into());
        rule.generator = true;
        file.rule(rule);
        file.subninja("x64/target.ninja");
        file.include("/src/assets/build/rules.ninja");

        let expected = concat!(
            "rule regen\n",
            "  command = bootgraph -o out\n",
            "  description = Regenerate build files\n",
            "  generator = 1\n",
            "subninja x64/target.ninja\n",
            "include /src/assets/build/rules.ninja\n",
        );
        assert_eq!(generate(&file), expected);
    }

    #[rstest]
    fn paths_escape_spaces_and_colons() {
        let mut file = BuildFile::new("build.ninja");
        file.build(BuildEdge::new("cp", ["my dir/a:b"]).inputs(["c"]))
            .expect("edge");
        assert_eq!(generate(&file), "build my$ dir/a$:b: cp c\n");
    }

    #[rstest]
    fn generate_empty_file() {
        assert!(generate(&BuildFile::new("build.ninja")).is_empty());
    }
}
