//! Build-graph assembly.
//!
//! [`GraphAssembler`] turns a resolved [`ProjectModel`] into a
//! [`GenerationPlan`]: every build file and the boot configuration, held in
//! memory. Nothing touches the filesystem here; a plan is either complete
//! or an error is returned, so a failed generation never leaves partial
//! output behind. Writing a plan is the job of [`crate::output`].
//!
//! The root file declares global variables, includes each target's file and
//! each module's header file, then the install pipeline, the images and the
//! regeneration edge. Target files bind target variables and include the
//! module files, so a module built for two targets is compiled twice from
//! the same file under different `${target_dir}` values.

mod image;
mod module;
mod targets;

pub use image::{BootConfig, BootProgram, SYMBOL_TABLE};
pub use module::{ALL_HEADERS, headers_file, headers_stamp, module_file};
pub use targets::target_file;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

use crate::action::ActionRegistry;
use crate::install::StagingLayout;
use crate::ir::{BuildEdge, BuildFile, IrError};
use crate::model::{Category, ProjectModel, Target, rooted};
use crate::ninja_gen;
use crate::regen::{ROOT_BUILD_FILE, RegenerationEdge};

/// Comment heading every generated build file.
pub(crate) const GENERATED_BY: &str = "This file is automatically generated by bootgraph";

/// Errors raised while assembling a generation plan.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerateError {
    /// A module names a target the catalog does not define.
    #[error("module '{module}' is built for unknown target '{target}'")]
    #[diagnostic(code(bootgraph::generate::unknown_target))]
    UnknownTarget {
        /// Module referencing the target.
        module: String,
        /// The missing target name.
        target: String,
    },

    /// One target name maps to descriptors with different variables.
    #[error("target '{target}' is defined {variants} different ways")]
    #[diagnostic(
        code(bootgraph::generate::target_collision),
        help("targets sharing a name must declare identical variables")
    )]
    TargetCollision {
        /// The contested target name.
        target: String,
        /// Number of distinct definitions.
        variants: usize,
    },

    /// A module links against a module that does not exist.
    #[error("module '{module}' depends on unknown module '{dependency}'")]
    #[diagnostic(code(bootgraph::generate::unknown_dependency))]
    UnknownDependency {
        /// The depending module.
        module: String,
        /// The missing dependency.
        dependency: String,
    },

    /// A module links a library that is not built for one of its targets.
    #[error("module '{module}' links '{dependency}', which is not built for target '{target}'")]
    #[diagnostic(
        code(bootgraph::generate::unbuilt_dependency),
        help("add the target to the library's targets")
    )]
    UnbuiltDependency {
        /// The depending module.
        module: String,
        /// The library it links.
        dependency: String,
        /// Target the library is missing from.
        target: String,
    },

    /// A manifest entry names a module that does not exist.
    #[error("manifest entry '{output}' names unknown module '{module}'")]
    #[diagnostic(code(bootgraph::generate::unknown_module))]
    UnknownModule {
        /// The missing module.
        module: String,
        /// Output file of the entry.
        output: String,
    },

    /// A manifest entry names a target its module is not built for.
    #[error("module '{module}' is not built for target '{target}'")]
    #[diagnostic(code(bootgraph::generate::unbuilt_entry))]
    UnbuiltEntry {
        /// Module of the entry.
        module: String,
        /// Target of the entry.
        target: String,
    },

    /// A manifest entry's output is not what its module links.
    #[error("manifest expects '{expected}' from module '{module}', which produces {}", .found.as_deref().unwrap_or("nothing"))]
    #[diagnostic(code(bootgraph::generate::output_mismatch))]
    OutputMismatch {
        /// Module of the entry.
        module: String,
        /// Output named by the entry.
        expected: String,
        /// Output the module actually links.
        found: Option<String>,
    },

    /// Two manifest entries install the same file name.
    #[error("'{output}' is installed more than once")]
    #[diagnostic(code(bootgraph::generate::duplicate_install))]
    DuplicateInstall {
        /// The contested file name.
        output: String,
    },

    /// The manifest lacks a kernel entry.
    #[error("the manifest has no kernel entry")]
    #[diagnostic(code(bootgraph::generate::missing_kernel))]
    MissingKernel,

    /// A single-instance role appears more than once.
    #[error("the manifest has more than one {category} entry")]
    #[diagnostic(code(bootgraph::generate::duplicate_role))]
    DuplicateRole {
        /// The repeated category.
        category: Category,
    },

    /// A build file failed a structural check.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ir(#[from] IrError),

    /// The boot configuration could not be serialised.
    #[error("failed to serialise boot configuration")]
    #[diagnostic(code(bootgraph::generate::boot_config))]
    BootConfig(#[from] serde_json::Error),
}

/// A file ready to be written, relative to the build root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Destination relative to the build root.
    pub path: Utf8PathBuf,
    /// Full file contents.
    pub contents: String,
}

/// Everything one generation run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
    directories: Vec<Utf8PathBuf>,
    build_files: Vec<BuildFile>,
    boot_config: GeneratedFile,
}

impl GenerationPlan {
    /// Directories to create before writing, relative to the build root,
    /// parents first.
    #[must_use]
    pub fn directories(&self) -> &[Utf8PathBuf] {
        &self.directories
    }

    /// Build files, root file first.
    #[must_use]
    pub fn build_files(&self) -> &[BuildFile] {
        &self.build_files
    }

    /// The build file written to `path`, if the plan has one.
    #[must_use]
    pub fn build_file(&self, path: &str) -> Option<&BuildFile> {
        self.build_files.iter().find(|f| f.path() == Utf8Path::new(path))
    }

    /// The serialised boot configuration.
    #[must_use]
    pub const fn boot_config(&self) -> &GeneratedFile {
        &self.boot_config
    }

    /// Every file of the plan, rendered, in write order.
    #[must_use]
    pub fn rendered(&self) -> Vec<GeneratedFile> {
        self.build_files
            .iter()
            .map(|file| GeneratedFile {
                path: file.path().to_owned(),
                contents: ninja_gen::generate(file),
            })
            .chain(std::iter::once(self.boot_config.clone()))
            .collect()
    }
}

/// Assembles a [`GenerationPlan`] from a resolved project.
#[derive(Debug, Clone)]
pub struct GraphAssembler<'a> {
    model: &'a ProjectModel,
    registry: &'a ActionRegistry,
    source_root: Utf8PathBuf,
    build_root: Utf8PathBuf,
    model_file: Option<Utf8PathBuf>,
    argv: Vec<String>,
}

impl<'a> GraphAssembler<'a> {
    /// Assembler for `model` with sources under `source_root` and output
    /// under `build_root`.
    #[must_use]
    pub fn new(
        model: &'a ProjectModel,
        registry: &'a ActionRegistry,
        source_root: impl Into<Utf8PathBuf>,
        build_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            model,
            registry,
            source_root: source_root.into(),
            build_root: build_root.into(),
            model_file: None,
            argv: vec![String::from(env!("CARGO_PKG_NAME"))],
        }
    }

    /// Record the model file as a regeneration input.
    #[must_use]
    pub fn with_model_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.model_file = Some(path.into());
        self
    }

    /// Command line the regeneration edge reruns.
    #[must_use]
    pub fn with_command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }

    /// Assemble every file of the build.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError`] when targets collide or are unknown, when
    /// the manifest cannot be installed, or when a build file has duplicate
    /// outputs or a cycle.
    pub fn assemble(&self) -> Result<GenerationPlan, GenerateError> {
        let model = self.model;
        let targets = targets::resolve(model)?;
        self.validate_manifest()?;

        let layout = StagingLayout::new(model.manifest.location.clone());
        let boot_config = BootConfig::from_model(model)?;
        let boot_config = GeneratedFile {
            path: BootConfig::file_path(layout.location()),
            contents: boot_config.to_json()?,
        };

        let mut build_files = Vec::new();
        build_files.push(self.root_build_file(&targets, &layout)?);
        for target in &targets {
            build_files.push(targets::target_build_file(target, &model.modules)?);
        }
        for module in &model.modules {
            build_files.push(module::headers_build_file(module, self.registry)?);
            build_files.push(module::module_build_file(
                module,
                &model.modules,
                self.registry,
            )?);
        }
        for file in &build_files {
            file.detect_cycles()?;
            debug!(file = %file.path(), edges = file.edges().count(), "assembled build file");
        }

        let mut directories = layout.directories();
        directories.extend(targets.iter().map(|t| Utf8PathBuf::from(&t.name)));

        info!(
            project = %model.project.name,
            version = %model.project.version,
            files = build_files.len() + 1,
            "assembled generation plan"
        );
        Ok(GenerationPlan {
            directories,
            build_files,
            boot_config,
        })
    }

    /// Check every manifest entry resolves to a link product before any
    /// install edge refers to it.
    fn validate_manifest(&self) -> Result<(), GenerateError> {
        let manifest = &self.model.manifest;
        let mut installed = IndexSet::new();
        for entry in &manifest.entries {
            let module = self
                .model
                .modules
                .iter()
                .find(|m| m.name == entry.module)
                .ok_or_else(|| GenerateError::UnknownModule {
                    module: entry.module.clone(),
                    output: entry.output.clone(),
                })?;
            if !module.builds_for(&entry.target) {
                return Err(GenerateError::UnbuiltEntry {
                    module: entry.module.clone(),
                    target: entry.target.clone(),
                });
            }
            let found = module.output();
            if found.as_deref() != Some(entry.output.as_str()) {
                return Err(GenerateError::OutputMismatch {
                    module: entry.module.clone(),
                    expected: entry.output.clone(),
                    found,
                });
            }
            if entry.output == SYMBOL_TABLE || !installed.insert(entry.output.as_str()) {
                return Err(GenerateError::DuplicateInstall {
                    output: entry.output.clone(),
                });
            }
        }

        let mut counts: IndexMap<Category, usize> = IndexMap::new();
        for entry in &manifest.entries {
            *counts.entry(entry.category).or_default() += 1;
        }
        match counts.get(&Category::Kernel).copied().unwrap_or(0) {
            0 => return Err(GenerateError::MissingKernel),
            1 => {}
            _ => {
                return Err(GenerateError::DuplicateRole {
                    category: Category::Kernel,
                });
            }
        }
        if counts.get(&Category::Init).copied().unwrap_or(0) > 1 {
            return Err(GenerateError::DuplicateRole {
                category: Category::Init,
            });
        }
        Ok(())
    }

    fn root_build_file(
        &self,
        targets: &[Target],
        layout: &StagingLayout,
    ) -> Result<BuildFile, GenerateError> {
        let model = self.model;
        let source_root = Utf8Path::new("${source_root}");
        let mut file = BuildFile::new(ROOT_BUILD_FILE);
        file.comment(GENERATED_BY);
        file.variable("ninja_required_version", "1.3");
        file.variable("build_root", self.build_root.as_str());
        file.variable("source_root", self.source_root.as_str());
        file.blank();

        file.include(rooted(source_root, &model.assets.rules));
        file.blank();

        let version = &model.project.version;
        file.variable("version_major", version.major.to_string());
        file.variable("version_minor", version.minor.to_string());
        file.variable("version_patch", version.patch.to_string());
        file.variable("version_sha", version.revision.as_str());
        file.blank();
        file.variable("cogflags", model.assets.parse_flags.join(" "));
        file.blank();

        for target in targets {
            file.subninja(target_file(&target.name));
        }
        file.blank();
        for module in &model.modules {
            file.subninja(headers_file(&module.name));
        }
        file.blank();

        let stamps = model
            .modules
            .iter()
            .filter(|m| m.public_headers)
            .map(|m| headers_stamp(&m.name));
        file.build(BuildEdge::new("touch", [ALL_HEADERS]).implicit(stamps))?;
        file.build(BuildEdge::new("phony", ["all-headers"]).inputs([ALL_HEADERS]))?;
        file.blank();

        let content = image::install_manifest(&mut file, model, layout)?;
        let image = image::package_images(&mut file, model, layout, content)?;

        self.regeneration(targets, layout).emit(&mut file)?;
        file.default_targets([image]);
        Ok(file)
    }

    fn regeneration(&self, targets: &[Target], layout: &StagingLayout) -> RegenerationEdge {
        let model = self.model;
        let mut regen = RegenerationEdge::new(&self.argv);
        if let Some(path) = &self.model_file {
            regen.input(path.clone());
        }
        if let Some(path) = &model.manifest_file {
            regen.input(rooted(&self.source_root, path));
        }
        for module in &model.modules {
            if let Some(path) = &module.descriptor {
                regen.input(rooted(&self.source_root, path));
            }
        }
        for target in targets {
            for path in &target.depfiles {
                regen.input(rooted(&self.source_root, path));
            }
        }

        for module in &model.modules {
            regen.output(module_file(&module.name));
            regen.output(headers_file(&module.name));
        }
        for target in targets {
            regen.output(target_file(&target.name));
        }
        regen.output(BootConfig::file_path(layout.location()));
        regen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::from_str;
    use rstest::{fixture, rstest};

    const MODEL: &str = r"
project:
  name: jsix
  version: { major: 0, minor: 8, patch: 1, revision: 4c1d9a2 }
manifest_file: assets/manifests/default.yaml
targets:
  - { name: kernel, variables: { arch: x86_64 }, depfiles: [targets/kernel.yaml] }
  - { name: user, variables: { arch: x86_64 }, depfiles: [targets/user.yaml] }
modules:
  - name: kernel
    targets: [kernel]
    root: src/kernel
    output: jsix.elf
    descriptor: src/kernel/kernel.module
    sources: [{ path: main.cpp }, { path: apic.cpp }]
  - name: j6
    kind: library
    targets: [user]
    root: src/libraries/j6
    public_headers: true
    sources: [{ path: include/j6/types.h }, { path: init.cpp }]
  - name: drivers.net
    targets: [user]
    root: src/drivers/net
    output: net.sys
    deps: [j6]
    sources: [{ path: main.c }]
manifest:
  entries:
    - { target: kernel, module: kernel, output: jsix.elf, category: kernel }
    - { target: user, module: drivers.net, output: net.sys, category: driver }
";

    #[fixture]
    fn model() -> ProjectModel {
        from_str(MODEL).expect("model")
    }

    fn assemble(model: &ProjectModel) -> Result<GenerationPlan, GenerateError> {
        let registry = ActionRegistry::standard();
        GraphAssembler::new(model, &registry, "/src/jsix", "/src/jsix/build")
            .with_model_file("/src/jsix/bootgraph.yaml")
            .with_command(["bootgraph", "-C", "/src/jsix"])
            .assemble()
    }

    #[rstest]
    fn plan_contains_every_file(model: ProjectModel) {
        let plan = assemble(&model).expect("plan");
        let paths: Vec<_> = plan.rendered().into_iter().map(|f| f.path.to_string()).collect();
        assert_eq!(
            paths,
            [
                "build.ninja",
                "kernel/target.ninja",
                "user/target.ninja",
                "headers.kernel.ninja",
                "module.kernel.ninja",
                "headers.j6.ninja",
                "module.j6.ninja",
                "headers.drivers.net.ninja",
                "module.drivers.net.ninja",
                "fatroot/jsix/boot.conf",
            ]
        );
        assert_eq!(plan.directories().last().map(|d| d.as_str()), Some("user"));
    }

    #[rstest]
    fn root_file_wires_targets_headers_and_driver_install(model: ProjectModel) {
        let plan = assemble(&model).expect("plan");
        let root = plan.build_file("build.ninja").expect("root file");
        let text = root.to_string();
        assert!(text.contains("build_root = /src/jsix/build\n"));
        assert!(text.contains("include ${source_root}/assets/build/rules.ninja\n"));
        assert!(text.contains("version_sha = 4c1d9a2\n"));
        assert!(text.contains("subninja kernel/target.ninja\nsubninja user/target.ninja\n"));
        assert!(text.contains(
            "build ${build_root}/.all_headers: touch | ${build_root}/include/j6/.headers.phony\n"
        ));

        let strip = root
            .producer(Utf8Path::new("${build_root}/net.sys"))
            .expect("strip edge");
        assert_eq!(strip.rule, "strip");
        assert_eq!(strip.inputs, ["${build_root}/user/net.sys"]);
        let copy = root
            .producer(Utf8Path::new("${build_root}/initrd_root/jsix/drivers/net.sys"))
            .expect("copy edge");
        assert_eq!(copy.inputs, ["${build_root}/net.sys"]);
    }

    #[rstest]
    fn regeneration_covers_structural_inputs_and_outputs(model: ProjectModel) {
        let plan = assemble(&model).expect("plan");
        let root = plan.build_file("build.ninja").expect("root file");
        let regen = root
            .producer(Utf8Path::new("build.ninja"))
            .expect("regen edge");
        for input in [
            "/src/jsix/bootgraph.yaml",
            "/src/jsix/assets/manifests/default.yaml",
            "/src/jsix/src/kernel/kernel.module",
            "/src/jsix/targets/kernel.yaml",
            "/src/jsix/targets/user.yaml",
        ] {
            assert!(regen.implicit_deps.iter().any(|p| p == input), "missing {input}");
        }
        for file in plan.rendered().iter().skip(1) {
            assert!(
                regen.implicit_outputs.contains(&file.path),
                "regen does not produce {}",
                file.path
            );
        }
    }

    #[rstest]
    fn driver_links_against_library(model: ProjectModel) {
        let plan = assemble(&model).expect("plan");
        let module = plan
            .build_file("module.drivers.net.ninja")
            .expect("module file");
        let exe = module
            .producer(Utf8Path::new("${target_dir}/net.sys"))
            .expect("link edge");
        assert_eq!(exe.inputs, ["${module_dir}/main.c.o", "${target_dir}/libj6.a"]);
    }

    #[rstest]
    fn kernel_cannot_link_user_library(mut model: ProjectModel) {
        model.modules[0].deps = vec!["j6".into()];
        let err = assemble(&model).expect_err("j6 is user-only");
        assert!(matches!(
            err,
            GenerateError::UnbuiltDependency { ref module, ref target, .. }
                if module == "kernel" && target == "kernel"
        ));
    }

    #[rstest]
    fn image_depends_on_regenerated_boot_config(model: ProjectModel) {
        let plan = assemble(&model).expect("plan");
        let root = plan.build_file("build.ninja").expect("root file");
        let regen = root
            .producer(Utf8Path::new("build.ninja"))
            .expect("regen edge");
        let fat = root
            .producer(Utf8Path::new("${build_root}/jsix.img"))
            .expect("makefat edge");
        let boot_config = fat
            .implicit_deps
            .iter()
            .find(|p| p.as_str().ends_with("boot.conf"))
            .expect("boot config dependency");
        assert_eq!(boot_config, &plan.boot_config().path);
        assert!(regen.implicit_outputs.contains(boot_config));
    }

    #[rstest]
    fn assembly_is_deterministic(model: ProjectModel) {
        let first = assemble(&model).expect("first").rendered();
        let second = assemble(&model).expect("second").rendered();
        assert_eq!(first, second);
    }

    #[rstest]
    #[case::unknown_module(|m: &mut ProjectModel| m.manifest.entries[1].module = "drivers.ahci".into())]
    #[case::wrong_target(|m: &mut ProjectModel| m.manifest.entries[1].target = "kernel".into())]
    #[case::wrong_output(|m: &mut ProjectModel| m.manifest.entries[1].output = "net.elf".into())]
    #[case::no_kernel(|m: &mut ProjectModel| { m.manifest.entries.remove(0); })]
    #[case::two_kernels(|m: &mut ProjectModel| {
        let kernel = m.manifest.entries[0].clone();
        m.manifest.entries.push(kernel);
    })]
    #[case::target_collision(|m: &mut ProjectModel| {
        let mut user = m.targets[1].clone();
        user.variables.insert("cflags".into(), "-O2".into());
        m.targets.push(user);
    })]
    fn invalid_models_are_rejected(mut model: ProjectModel, #[case] break_model: fn(&mut ProjectModel)) {
        break_model(&mut model);
        assert!(assemble(&model).is_err());
    }

    #[rstest]
    fn duplicate_install_is_named(mut model: ProjectModel) {
        let mut twin = model.modules[2].clone();
        twin.name = "drivers.net2".into();
        model.modules.push(twin);
        model.manifest.entries.push(crate::model::ManifestEntry {
            target: "user".into(),
            module: "drivers.net2".into(),
            output: "net.sys".into(),
            category: Category::Driver,
        });
        let err = assemble(&model).expect_err("duplicate install");
        assert!(matches!(err, GenerateError::DuplicateInstall { ref output } if output == "net.sys"));
    }
}
