//! Install, ramdisk and disk-image edges of the root build file.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::install::{BUILD_ROOT, InstallPipeline, StagingContent, StagingLayout};
use crate::ir::{BuildEdge, BuildFile};
use crate::model::{Category, ManifestEntry, ProjectModel, RamdiskSpec, rooted};

use super::GenerateError;

/// Name of the symbol table installed into the ramdisk.
pub const SYMBOL_TABLE: &str = "symbol_table.dat";

/// Boot configuration read by the bootloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootConfig {
    /// Boot-partition directory holding the executables.
    pub location: Utf8PathBuf,
    /// The kernel image.
    pub kernel: BootProgram,
    /// The first user-space program.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<BootProgram>,
    /// Panic handlers, in manifest order.
    pub panics: Vec<BootProgram>,
    /// Services unpacked from the ramdisk.
    pub services: Vec<BootProgram>,
    /// Drivers unpacked from the ramdisk.
    pub drivers: Vec<BootProgram>,
    /// Data blobs unpacked from the ramdisk.
    pub data: Vec<BootProgram>,
    /// Ramdisk image settings.
    pub initrd: RamdiskSpec,
    /// Flags passed through to the kernel.
    pub flags: Vec<String>,
}

/// One program or blob named in the boot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootProgram {
    /// Module the file came from.
    pub name: String,
    /// Path on the boot partition or inside the ramdisk.
    pub path: Utf8PathBuf,
}

impl BootConfig {
    /// Describe the installed layout of a validated manifest.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::MissingKernel`] when the manifest has no
    /// kernel entry.
    pub fn from_model(model: &ProjectModel) -> Result<Self, GenerateError> {
        let manifest = &model.manifest;
        let program = |entry: &ManifestEntry| BootProgram {
            name: entry.module.clone(),
            path: match entry.category.ramdisk_dir() {
                Some(dir) => Utf8Path::new(dir).join(&entry.output),
                None => manifest.location.join(&entry.output),
            },
        };
        let all = |category| manifest.by_category(category).map(program).collect::<Vec<_>>();

        let kernel = manifest
            .by_category(Category::Kernel)
            .next()
            .map(program)
            .ok_or(GenerateError::MissingKernel)?;
        let mut data = all(Category::Data);
        data.push(BootProgram {
            name: String::from("symbols"),
            path: Utf8Path::new("jsix/data").join(SYMBOL_TABLE),
        });

        Ok(Self {
            location: manifest.location.clone(),
            kernel,
            init: manifest.by_category(Category::Init).next().map(program),
            panics: all(Category::Panic),
            services: all(Category::Service),
            drivers: all(Category::Driver),
            data,
            initrd: manifest.initrd.clone(),
            flags: manifest.flags.clone(),
        })
    }

    /// Path of the written configuration, relative to the build root.
    #[must_use]
    pub fn file_path(location: &Utf8Path) -> Utf8PathBuf {
        Utf8Path::new("fatroot").join(location).join("boot.conf")
    }

    /// Pretty-printed JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::BootConfig`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, GenerateError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

/// Declare install edges for every manifest entry, in category order.
pub(crate) fn install_manifest(
    file: &mut BuildFile,
    model: &ProjectModel,
    layout: &StagingLayout,
) -> Result<StagingContent, GenerateError> {
    let pipeline = InstallPipeline::new(layout);
    let mut content = StagingContent::default();
    for category in [
        Category::Kernel,
        Category::Init,
        Category::Panic,
        Category::Service,
        Category::Driver,
        Category::Data,
    ] {
        for entry in model.manifest.by_category(category) {
            debug!(module = %entry.module, output = %entry.output, %category, "installing");
            content.merge(pipeline.install_entry(file, entry)?);
        }
    }

    let kernel = model
        .manifest
        .by_category(Category::Kernel)
        .next()
        .ok_or(GenerateError::MissingKernel)?;
    let symbols = Utf8Path::new(BUILD_ROOT).join(SYMBOL_TABLE);
    file.build(
        BuildEdge::new("makest", [symbols.as_path()])
            .inputs([InstallPipeline::linked_path(kernel)]),
    )?;
    content.merge(pipeline.copy_to_ramdisk(file, &symbols, "jsix/data", SYMBOL_TABLE)?);
    Ok(content)
}

/// Declare the bootloader copy, the ramdisk image, the disk image and the
/// auxiliary asset copies.
///
/// Returns the disk image path; the caller marks it as a default target.
pub(crate) fn package_images(
    file: &mut BuildFile,
    model: &ProjectModel,
    layout: &StagingLayout,
    mut content: StagingContent,
) -> Result<Utf8PathBuf, GenerateError> {
    let assets = &model.assets;
    let source_root = Utf8Path::new("${source_root}");

    let bootloader = layout.boot_root().join(&assets.bootloader_dest);
    file.build(
        BuildEdge::new("cp", [bootloader.as_path()])
            .inputs([Utf8Path::new(BUILD_ROOT).join(&assets.bootloader)])
            .var("description", "Installing bootloader"),
    )?;
    file.blank();

    let initrd = layout
        .boot_root()
        .join(layout.location())
        .join(&model.manifest.initrd.name);
    file.build(
        BuildEdge::new("makeinitrd", [initrd.as_path()])
            .inputs([layout.ramdisk_root()])
            .implicit(content.ramdisk.iter())
            .implicit([rooted(source_root, &assets.initrd_helper)])
            .var("format", model.manifest.initrd.format.as_str()),
    )?;
    file.blank();
    content.merge(StagingContent::boot(initrd));

    let image_name = format!("{}.img", model.project.name);
    let image = Utf8Path::new(BUILD_ROOT).join(&image_name);
    let boot_config = BootConfig::file_path(layout.location());
    file.build(
        BuildEdge::new("makefat", [image.as_path()])
            .inputs([rooted(source_root, &assets.disk_base)])
            .implicit(content.boot.iter())
            .implicit([bootloader, boot_config])
            .var("name", image_name),
    )?;
    file.blank();

    for asset in &assets.aux {
        let out = Utf8Path::new(BUILD_ROOT).join(&asset.output);
        file.build(
            BuildEdge::new("cp", [out.as_path()])
                .inputs([rooted(source_root, &asset.source)])
                .var("name", asset.name.as_str()),
        )?;
        file.default_targets([out]);
        file.blank();
    }
    Ok(image)
}
