//! Strip and copy sequencing for install artifacts.
//!
//! Installation declares edges only; the `strip` and `cp` rules run later
//! under the executor. Each copy returns a [`StagingContent`] naming the
//! staged file so callers can merge content sets explicitly instead of
//! sharing a mutable accumulator.

use crate::ir::{BuildEdge, BuildFile, IrError};
use crate::model::{Category, ManifestEntry};
use camino::{Utf8Path, Utf8PathBuf};

/// Variable naming the build output root inside build files.
pub const BUILD_ROOT: &str = "${build_root}";

/// Directory names under the build root.
const DEBUG_DIR: &str = ".debug";
const BOOT_DIR: &str = "fatroot";
const RAMDISK_DIR: &str = "initrd_root";

/// Locations of the staging trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    location: Utf8PathBuf,
}

impl StagingLayout {
    /// Layout installing boot executables under `location` on the boot
    /// partition.
    #[must_use]
    pub fn new(location: impl Into<Utf8PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Boot-partition directory receiving executables, relative to the
    /// partition root.
    #[must_use]
    pub fn location(&self) -> &Utf8Path {
        &self.location
    }

    /// Root of the boot-partition staging tree.
    #[must_use]
    pub fn boot_root(&self) -> Utf8PathBuf {
        Utf8Path::new(BUILD_ROOT).join(BOOT_DIR)
    }

    /// Root of the ramdisk staging tree.
    #[must_use]
    pub fn ramdisk_root(&self) -> Utf8PathBuf {
        Utf8Path::new(BUILD_ROOT).join(RAMDISK_DIR)
    }

    /// Path of the separated debug info for `name`.
    #[must_use]
    pub fn debug_artifact(&self, name: &str) -> Utf8PathBuf {
        Utf8Path::new(BUILD_ROOT)
            .join(DEBUG_DIR)
            .join(format!("{name}.debug"))
    }

    /// Directories to create before any build file is written, relative
    /// to the build root, parents first.
    #[must_use]
    pub fn directories(&self) -> Vec<Utf8PathBuf> {
        vec![
            Utf8PathBuf::from(DEBUG_DIR),
            Utf8PathBuf::from(BOOT_DIR),
            Utf8Path::new(BOOT_DIR).join(&self.location),
            Utf8PathBuf::from(RAMDISK_DIR),
        ]
    }
}

/// Files staged into the boot partition and the ramdisk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingContent {
    /// Files under the boot-partition staging tree.
    pub boot: Vec<Utf8PathBuf>,
    /// Files under the ramdisk staging tree.
    pub ramdisk: Vec<Utf8PathBuf>,
}

impl StagingContent {
    /// Content holding a single boot-partition file.
    #[must_use]
    pub fn boot(path: Utf8PathBuf) -> Self {
        Self {
            boot: vec![path],
            ramdisk: Vec::new(),
        }
    }

    /// Content holding a single ramdisk file.
    #[must_use]
    pub fn ramdisk(path: Utf8PathBuf) -> Self {
        Self {
            boot: Vec::new(),
            ramdisk: vec![path],
        }
    }

    /// Append `other`, preserving order.
    pub fn merge(&mut self, other: Self) {
        self.boot.extend(other.boot);
        self.ramdisk.extend(other.ramdisk);
    }
}

/// Result of a strip step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    /// Binary without symbol and debug sections.
    pub binary: Utf8PathBuf,
    /// The removed sections, addressable by the binary's build id.
    pub debug: Utf8PathBuf,
}

/// Declares install edges into the staging trees.
#[derive(Debug, Clone, Copy)]
pub struct InstallPipeline<'a> {
    layout: &'a StagingLayout,
}

impl<'a> InstallPipeline<'a> {
    /// Pipeline writing into `layout`.
    #[must_use]
    pub const fn new(layout: &'a StagingLayout) -> Self {
        Self { layout }
    }

    /// Unstripped link output of `entry` inside its target directory.
    #[must_use]
    pub fn linked_path(entry: &ManifestEntry) -> Utf8PathBuf {
        Utf8Path::new(BUILD_ROOT)
            .join(&entry.target)
            .join(&entry.output)
    }

    /// Declare a strip edge for `input`.
    ///
    /// The stripped binary lands at `${build_root}/<name>` and the debug
    /// sections at `${build_root}/.debug/<name>.debug`. The input's `.dump`
    /// listing is an implicit dependency so disassembly stays current.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateOutput`] when `name` was already
    /// stripped in `file`.
    pub fn strip(
        &self,
        file: &mut BuildFile,
        input: &Utf8Path,
        name: &str,
        label: &str,
    ) -> Result<Stripped, IrError> {
        let binary = Utf8Path::new(BUILD_ROOT).join(name);
        let debug = self.layout.debug_artifact(name);
        file.build(
            BuildEdge::new("strip", [binary.clone()])
                .inputs([input])
                .implicit([format!("{input}.dump")])
                .implicit_outputs([debug.clone()])
                .var("name", format!("Stripping {label}"))
                .var("debug", debug.as_str()),
        )?;
        file.blank();
        Ok(Stripped { binary, debug })
    }

    /// Copy `source` to `<location>/<name>` on the boot partition.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateOutput`] when the destination is taken.
    pub fn copy_to_boot(
        &self,
        file: &mut BuildFile,
        source: &Utf8Path,
        name: &str,
    ) -> Result<StagingContent, IrError> {
        let relative = self.layout.location().join(name);
        let dest = self.layout.boot_root().join(&relative);
        copy(file, source, &dest, &format!("Installing {relative}"))?;
        Ok(StagingContent::boot(dest))
    }

    /// Copy `source` to `<dir>/<name>` in the ramdisk.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateOutput`] when the destination is taken.
    pub fn copy_to_ramdisk(
        &self,
        file: &mut BuildFile,
        source: &Utf8Path,
        dir: &str,
        name: &str,
    ) -> Result<StagingContent, IrError> {
        let dest = self.layout.ramdisk_root().join(dir).join(name);
        copy(file, source, &dest, &format!("Installing {name}"))?;
        Ok(StagingContent::ramdisk(dest))
    }

    /// Declare every edge installing one manifest entry.
    ///
    /// Executables are stripped first; data blobs are copied unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateOutput`] when another entry already
    /// claimed the same stripped or staged path.
    pub fn install_entry(
        &self,
        file: &mut BuildFile,
        entry: &ManifestEntry,
    ) -> Result<StagingContent, IrError> {
        let linked = Self::linked_path(entry);
        if entry.category == Category::Data {
            return self.copy_to_ramdisk(file, &linked, "jsix/data", &entry.output);
        }
        let stripped = self.strip(file, &linked, &entry.output, &entry.module)?;
        match entry.category.ramdisk_dir() {
            Some(dir) => self.copy_to_ramdisk(file, &stripped.binary, dir, &entry.output),
            None => self.copy_to_boot(file, &stripped.binary, &entry.output),
        }
    }
}

fn copy(
    file: &mut BuildFile,
    source: &Utf8Path,
    dest: &Utf8Path,
    description: &str,
) -> Result<(), IrError> {
    file.build(
        BuildEdge::new("cp", [dest])
            .inputs([source])
            .var("description", description),
    )?;
    file.blank();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn layout() -> StagingLayout {
        StagingLayout::new("jsix")
    }

    fn entry(module: &str, output: &str, category: Category) -> ManifestEntry {
        ManifestEntry {
            target: "x64".into(),
            module: module.into(),
            output: output.into(),
            category,
        }
    }

    #[rstest]
    fn strip_declares_debug_artifact(layout: StagingLayout) {
        let mut file = BuildFile::new("build.ninja");
        let pipeline = InstallPipeline::new(&layout);
        let stripped = pipeline
            .strip(&mut file, Utf8Path::new("${build_root}/x64/net.sys"), "net.sys", "drivers.net")
            .expect("strip");
        assert_eq!(stripped.binary, "${build_root}/net.sys");
        assert_eq!(stripped.debug, "${build_root}/.debug/net.sys.debug");
        let edge = file.producer(&stripped.debug).expect("strip edge");
        assert_eq!(edge.rule, "strip");
        assert_eq!(edge.implicit_deps, ["${build_root}/x64/net.sys.dump"]);
    }

    #[rstest]
    fn driver_is_stripped_then_staged_in_ramdisk(layout: StagingLayout) {
        let mut file = BuildFile::new("build.ninja");
        let content = InstallPipeline::new(&layout)
            .install_entry(&mut file, &entry("drivers.net", "net.sys", Category::Driver))
            .expect("install");
        assert!(content.boot.is_empty());
        assert_eq!(
            content.ramdisk,
            ["${build_root}/initrd_root/jsix/drivers/net.sys"]
        );
        let rules: Vec<_> = file.edges().map(|e| e.rule.as_str()).collect();
        assert_eq!(rules, ["strip", "cp"]);
        let copy = file.producer(&content.ramdisk[0]).expect("copy edge");
        assert_eq!(copy.inputs, ["${build_root}/net.sys"]);
    }

    #[rstest]
    fn panic_handler_lands_on_boot_partition(layout: StagingLayout) {
        let mut file = BuildFile::new("build.ninja");
        let content = InstallPipeline::new(&layout)
            .install_entry(&mut file, &entry("panic.serial", "panic.serial.elf", Category::Panic))
            .expect("install");
        assert_eq!(
            content.boot,
            ["${build_root}/fatroot/jsix/panic.serial.elf"]
        );
    }

    #[rstest]
    fn data_is_copied_without_strip(layout: StagingLayout) {
        let mut file = BuildFile::new("build.ninja");
        let content = InstallPipeline::new(&layout)
            .install_entry(&mut file, &entry("fonts", "tamsyn.psf", Category::Data))
            .expect("install");
        let rules: Vec<_> = file.edges().map(|e| e.rule.as_str()).collect();
        assert_eq!(rules, ["cp"]);
        assert_eq!(
            content.ramdisk,
            ["${build_root}/initrd_root/jsix/data/tamsyn.psf"]
        );
    }

    #[rstest]
    fn merge_preserves_order() {
        let mut content = StagingContent::boot("a".into());
        content.merge(StagingContent::ramdisk("b".into()));
        content.merge(StagingContent::boot("c".into()));
        assert_eq!(content.boot, ["a", "c"]);
        assert_eq!(content.ramdisk, ["b"]);
    }

    #[rstest]
    fn layout_directories_are_parent_first(layout: StagingLayout) {
        let dirs = layout.directories();
        assert_eq!(dirs, [".debug", "fatroot", "fatroot/jsix", "initrd_root"]);
    }
}
