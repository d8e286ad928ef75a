//! Per-module compilation and header-publishing build files.

use std::collections::VecDeque;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, trace};

use crate::action::{Action, ActionRegistry, PARSE_DEP_SENTINEL};
use crate::install::BUILD_ROOT;
use crate::ir::{BuildEdge, BuildFile};
use crate::model::{Module, ModuleKind, rooted};
use crate::source::Source;

use super::{GENERATED_BY, GenerateError};

/// Stamp produced once every public header is in place.
pub const ALL_HEADERS: &str = "${build_root}/.all_headers";

/// Path of a module's build file, relative to the build root.
#[must_use]
pub fn module_file(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("module.{name}.ninja"))
}

/// Path of a module's header build file, relative to the build root.
#[must_use]
pub fn headers_file(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("headers.{name}.ninja"))
}

/// Stamp touched once a module's public headers are installed.
#[must_use]
pub fn headers_stamp(name: &str) -> Utf8PathBuf {
    include_dir(name).join(".headers.phony")
}

fn include_dir(name: &str) -> Utf8PathBuf {
    Utf8Path::new(BUILD_ROOT).join("include").join(name)
}

fn source_dir(module: &Module) -> Utf8PathBuf {
    rooted(Utf8Path::new("${source_root}"), &module.root)
}

/// What the action chains of a module leave behind.
#[derive(Default)]
struct Products {
    objects: Vec<Utf8PathBuf>,
    parsed: Vec<Utf8PathBuf>,
    headers: Vec<Utf8PathBuf>,
}

/// Build the file compiling and linking `module`.
///
/// The file is included once per target, so every path is rooted at
/// `${module_dir}` or `${target_dir}` and resolves per target.
pub(crate) fn module_build_file(
    module: &Module,
    modules: &[Module],
    registry: &ActionRegistry,
) -> Result<BuildFile, GenerateError> {
    let mut file = BuildFile::new(module_file(&module.name));
    file.comment(GENERATED_BY);
    file.blank();
    file.variable("module_dir", format!("${{target_dir}}/{}", module.name));
    file.blank();

    let root = source_dir(module);
    let mut pending: VecDeque<Source> = module
        .sources
        .iter()
        .map(|spec| Source::from_spec(root.clone(), spec))
        .collect();
    let mut products = Products::default();

    while let Some(source) = pending.pop_front() {
        let Some(action) = source.action(registry) else {
            trace!(module = %module.name, source = %source.name(), "no action for source");
            continue;
        };
        match action {
            Action::Link => products.objects.push(source.input()),
            Action::Header => products.headers.push(source.input()),
            Action::Compile { .. } | Action::Parse { .. } => {
                let (Some(rule), Some(output)) = (action.rule(), source.output(registry)) else {
                    continue;
                };
                let mut edge = BuildEdge::new(rule, [output.input()])
                    .inputs([source.input()])
                    .implicit(source.deps().iter())
                    .implicit(action.static_deps().iter().copied());
                if action.needs_dep_scan() {
                    edge = edge
                        .order_only([ALL_HEADERS])
                        .var("depfile", "$out.d")
                        .var("deps", "gcc");
                }
                file.build(edge)?;
                if matches!(action, Action::Parse { .. }) {
                    products.parsed.push(output.input());
                    pending.push_front(output);
                } else {
                    products.objects.push(output.input());
                }
            }
        }
    }
    file.blank();

    file.build(
        BuildEdge::new("phony", [PARSE_DEP_SENTINEL])
            .order_only(products.parsed.iter().chain(&products.headers)),
    )?;
    file.blank();

    link(&mut file, module, modules, products.objects)?;
    debug!(module = %module.name, edges = file.edges().count(), "assembled module");
    Ok(file)
}

fn link(
    file: &mut BuildFile,
    module: &Module,
    modules: &[Module],
    objects: Vec<Utf8PathBuf>,
) -> Result<(), GenerateError> {
    let mut libraries = Vec::new();
    for dep in &module.deps {
        let found = modules
            .iter()
            .find(|m| &m.name == dep)
            .ok_or_else(|| GenerateError::UnknownDependency {
                module: module.name.clone(),
                dependency: dep.clone(),
            })?;
        match (found.kind, found.output()) {
            (ModuleKind::Library, Some(output)) => {
                if let Some(target) = module.targets.iter().find(|t| !found.builds_for(t)) {
                    return Err(GenerateError::UnbuiltDependency {
                        module: module.name.clone(),
                        dependency: dep.clone(),
                        target: target.clone(),
                    });
                }
                libraries.push(Utf8Path::new("${target_dir}").join(output));
            }
            _ => trace!(module = %module.name, dependency = %dep, "dependency has no archive"),
        }
    }

    let Some(output) = module.output() else {
        return Ok(());
    };
    let product = Utf8Path::new("${target_dir}").join(&output);
    match module.kind {
        ModuleKind::Executable => {
            file.build(
                BuildEdge::new("exe", [product.as_path()])
                    .inputs(objects)
                    .inputs(libraries)
                    .var("name", module.name.as_str()),
            )?;
            file.blank();
            file.build(
                BuildEdge::new("dump", [format!("{product}.dump")])
                    .inputs([product.as_path()])
                    .var("name", module.name.as_str()),
            )?;
        }
        ModuleKind::Library => {
            file.build(
                BuildEdge::new("lib", [product.as_path()])
                    .inputs(objects)
                    .implicit(libraries)
                    .var("name", module.name.as_str()),
            )?;
        }
        ModuleKind::Headers => {}
    }
    file.blank();
    Ok(())
}

/// Build the file publishing `module`'s headers under
/// `${build_root}/include/<module>/`.
///
/// Modules without public headers get a file holding only a comment, so
/// the root file can include every module unconditionally.
pub(crate) fn headers_build_file(
    module: &Module,
    registry: &ActionRegistry,
) -> Result<BuildFile, GenerateError> {
    let mut file = BuildFile::new(headers_file(&module.name));
    file.comment(GENERATED_BY);
    if !module.public_headers {
        file.comment(format!("{} publishes no headers", module.name));
        return Ok(file);
    }
    file.blank();

    let root = source_dir(module);
    let dest_root = include_dir(&module.name);
    let mut installed = Vec::new();
    for spec in &module.sources {
        let source = Source::from_spec(root.clone(), spec);
        let Some(action) = source.action(registry) else {
            continue;
        };
        let edge = match action {
            Action::Header => {
                let dest = dest_root.join(public_name(source.name()));
                BuildEdge::new("cp", [dest.as_path()])
                    .inputs([source.input()])
                    .var("description", format!("Installing {}", source.name()))
            }
            Action::Parse { .. } => {
                let Some(parsed) = source.output(registry) else {
                    continue;
                };
                if !matches!(parsed.action(registry), Some(Action::Header)) {
                    continue;
                }
                let dest = dest_root.join(public_name(parsed.name()));
                let rule = action.rule().unwrap_or_default();
                BuildEdge::new(rule, [dest.as_path()])
                    .inputs([source.input()])
                    .implicit(source.deps().iter())
            }
            Action::Compile { .. } | Action::Link => continue,
        };
        installed.extend(edge.explicit_outputs.iter().cloned());
        file.build(edge)?;
        file.blank();
    }

    file.build(BuildEdge::new("touch", [headers_stamp(&module.name)]).implicit(installed))?;
    debug!(module = %module.name, "assembled public headers");
    Ok(file)
}

/// Header path below the module's include directory.
fn public_name(path: &Utf8Path) -> &Utf8Path {
    path.strip_prefix("include").unwrap_or(path)
}
