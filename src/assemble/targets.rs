//! Target resolution and per-target build files.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::hasher::TargetHasher;
use crate::install::BUILD_ROOT;
use crate::ir::{BuildEdge, BuildFile};
use crate::model::{Module, ProjectModel, Target};

use super::{GENERATED_BY, GenerateError};

/// Path of a target's build file, relative to the build root.
#[must_use]
pub fn target_file(name: &str) -> Utf8PathBuf {
    Utf8Path::new(name).join("target.ninja")
}

/// Collect the distinct targets referenced by every module.
///
/// Targets are returned in order of first reference. Catalog entries with
/// the same name collapse when their identities match, and their dependency
/// files are merged.
pub(crate) fn resolve(model: &ProjectModel) -> Result<Vec<Target>, GenerateError> {
    let mut resolved: IndexMap<String, Target> = IndexMap::new();
    for module in &model.modules {
        for name in &module.targets {
            if resolved.contains_key(name) {
                continue;
            }
            let target = resolve_one(model, module, name)?;
            debug!(target = %target.name, "resolved target");
            resolved.insert(name.clone(), target);
        }
    }
    Ok(resolved.into_values().collect())
}

fn resolve_one(model: &ProjectModel, module: &Module, name: &str) -> Result<Target, GenerateError> {
    let mut identities: IndexMap<String, Target> = IndexMap::new();
    for candidate in model.targets.iter().filter(|t| t.name == name) {
        identities
            .entry(TargetHasher::hash(candidate))
            .and_modify(|existing| merge_depfiles(existing, candidate))
            .or_insert_with(|| candidate.clone());
    }
    if identities.len() > 1 {
        return Err(GenerateError::TargetCollision {
            target: name.to_owned(),
            variants: identities.len(),
        });
    }
    identities
        .into_values()
        .next()
        .ok_or_else(|| GenerateError::UnknownTarget {
            module: module.name.clone(),
            target: name.to_owned(),
        })
}

fn merge_depfiles(existing: &mut Target, duplicate: &Target) {
    let mut depfiles: IndexSet<Utf8PathBuf> = existing.depfiles.drain(..).collect();
    depfiles.extend(duplicate.depfiles.iter().cloned());
    existing.depfiles = depfiles.into_iter().collect();
}

/// Build the file declaring `target`'s variables and module subgraphs.
pub(crate) fn target_build_file(
    target: &Target,
    modules: &[Module],
) -> Result<BuildFile, GenerateError> {
    let path = target_file(&target.name);
    let mut file = BuildFile::new(path.clone());
    file.comment(GENERATED_BY);
    file.blank();

    file.variable("target", target.name.as_str());
    file.variable(
        "target_dir",
        Utf8Path::new(BUILD_ROOT).join(&target.name).as_str(),
    );
    file.blank();

    for (name, value) in &target.variables {
        file.variable(name.as_str(), value.as_str());
    }
    file.blank();

    for kind in ["defs", "run"] {
        for lang in ["c", "cpp"] {
            let dump = format!("${{target_dir}}/{lang}.{kind}");
            file.build(
                BuildEdge::new(format!("dump_{lang}_{kind}"), [dump.as_str()])
                    .implicit([path.as_path()]),
            )?;
            file.default_targets([dump]);
            file.blank();
        }
    }

    for module in modules.iter().filter(|m| m.builds_for(&target.name)) {
        file.subninja(super::module::module_file(&module.name));
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::from_str;
    use rstest::rstest;

    const CATALOG: &str = r"
project:
  name: jsix
  version: { major: 0, minor: 8, patch: 1, revision: abc }
targets:
  - name: x64
    variables: { arch: x86_64 }
    depfiles: [targets/x64.yaml]
  - name: user
    variables: { arch: x86_64, cflags: -fPIC }
  - name: x64
    variables: { arch: x86_64 }
    depfiles: [targets/base.yaml]
modules:
  - name: kernel
    targets: [x64]
    root: src/kernel
  - name: drv.uart
    targets: [user, x64]
    root: src/user/drv.uart
manifest: {}
";

    #[rstest]
    fn targets_follow_first_reference_and_merge_depfiles() {
        let model = from_str(CATALOG).expect("model");
        let targets = resolve(&model).expect("resolve");
        let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["x64", "user"]);
        let depfiles: Vec<_> = targets[0].depfiles.iter().map(|p| p.as_str()).collect();
        assert_eq!(depfiles, ["targets/x64.yaml", "targets/base.yaml"]);
    }

    #[rstest]
    fn same_name_with_other_variables_collides() {
        let mut model = from_str(CATALOG).expect("model");
        model.targets[2].variables.insert("arch".into(), "i686".into());
        let err = resolve(&model).expect_err("collision");
        assert!(matches!(err, GenerateError::TargetCollision { ref target, variants: 2 } if target == "x64"));
    }

    #[rstest]
    fn unknown_target_names_module() {
        let mut model = from_str(CATALOG).expect("model");
        model.modules[0].targets.push("arm64".into());
        let err = resolve(&model).expect_err("unknown");
        assert!(matches!(err, GenerateError::UnknownTarget { ref module, .. } if module == "kernel"));
    }

    #[rstest]
    fn target_file_lists_dump_edges_and_modules() {
        let model = from_str(CATALOG).expect("model");
        let targets = resolve(&model).expect("resolve");
        let file = target_build_file(&targets[1], &model.modules).expect("file");
        assert_eq!(file.path().as_str(), "user/target.ninja");
        let text = file.to_string();
        assert!(text.contains("target_dir = ${build_root}/user\n"));
        assert!(text.contains("cflags = -fPIC\n"));
        assert!(text.contains("build ${target_dir}/c.defs: dump_c_defs | user/target.ninja\n"));
        assert!(text.contains("subninja module.drv.uart.ninja\n"));
        assert!(!text.contains("module.kernel.ninja"));
        assert_eq!(file.edges().count(), 4);
    }
}
