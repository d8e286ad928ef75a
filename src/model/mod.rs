//! Resolved input records consumed by the graph assembler.
//!
//! Descriptor parsing, version extraction and manifest parsing happen
//! elsewhere; by the time records reach this module they are plain values.
//! The structures derive `serde` so a fully-resolved project can be stored
//! as a single YAML document and read back with [`load`].
//!
//! ```yaml
//! project:
//!   name: jsix
//!   version: { major: 0, minor: 8, patch: 1, revision: 4c1d9a2 }
//! targets:
//!   - name: x64
//!     variables: { arch: x86_64 }
//! modules:
//!   - name: kernel
//!     kind: executable
//!     targets: [x64]
//!     sources: [{ path: main.c }]
//! manifest:
//!   entries:
//!     - { target: x64, module: kernel, output: kernel.elf, category: kernel }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod load;

pub use load::{ModelError, from_path, from_str};

/// Top-level document describing one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectModel {
    /// Project identity and version stamp.
    pub project: Project,

    /// Configuration name the targets were resolved for, e.g. `debug`.
    #[serde(default = "default_config")]
    pub config: String,

    /// Path of the textual manifest the entries were resolved from.
    #[serde(default)]
    pub manifest_file: Option<Utf8PathBuf>,

    /// Fixed asset locations used by the install pipeline.
    #[serde(default)]
    pub assets: Assets,

    /// Every resolved target descriptor, possibly repeated.
    #[serde(default)]
    pub targets: Vec<Target>,

    /// Modules in declaration order.
    pub modules: Vec<Module>,

    /// Install manifest.
    pub manifest: Manifest,
}

fn default_config() -> String {
    String::from("debug")
}

/// Top-level owner of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    /// Short project name; also names the final disk image.
    pub name: String,

    /// Source tree root. Relative roots are resolved against the model file.
    #[serde(default)]
    pub root: Option<Utf8PathBuf>,

    /// Resolved version descriptor.
    pub version: Version,
}

/// Version stamp exported to the build as `version_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Source revision identifier, typically a short commit hash.
    pub revision: String,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}",
            self.major, self.minor, self.patch, self.revision
        )
    }
}

/// A build variant such as `x64` or `user`.
///
/// Two targets are the same node when their names and variables match; the
/// dependency files are merged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Variant name; also the name of its build directory.
    pub name: String,

    /// Target-scoped build variables in declaration order.
    #[serde(default)]
    pub variables: IndexMap<String, String>,

    /// Files the target descriptor was loaded from.
    #[serde(default)]
    pub depfiles: Vec<Utf8PathBuf>,
}

/// What a module's link step produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// A linked program.
    #[default]
    Executable,
    /// A static archive linked into executables that depend on it.
    Library,
    /// Headers only; no link step.
    Headers,
}

/// A named unit of sources built for one or more targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Module {
    /// Unique module name, e.g. `drivers.net`.
    pub name: String,

    /// Link product kind.
    #[serde(default)]
    pub kind: ModuleKind,

    /// Directory holding the sources, relative to the source root.
    #[serde(default)]
    pub root: Utf8PathBuf,

    /// Descriptor file the module was loaded from.
    #[serde(default)]
    pub descriptor: Option<Utf8PathBuf>,

    /// Names of the targets this module is built for.
    #[serde(default)]
    pub targets: Vec<String>,

    /// Sources in declaration order.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,

    /// Whether the module publishes its headers under `include/<name>`.
    #[serde(default)]
    pub public_headers: bool,

    /// Library modules linked into this one.
    #[serde(default)]
    pub deps: Vec<String>,

    /// Link output file name; see [`Module::output`].
    #[serde(default)]
    pub output: Option<String>,
}

impl Module {
    /// File name of the module's link product, if it has one.
    ///
    /// Executables default to `<name>.elf`, libraries to `lib<name>.a`.
    #[must_use]
    pub fn output(&self) -> Option<String> {
        match self.kind {
            ModuleKind::Headers => None,
            ModuleKind::Executable => Some(
                self.output
                    .clone()
                    .unwrap_or_else(|| format!("{}.elf", self.name)),
            ),
            ModuleKind::Library => Some(
                self.output
                    .clone()
                    .unwrap_or_else(|| format!("lib{}.a", self.name)),
            ),
        }
    }

    /// Whether the module is built for `target`.
    #[must_use]
    pub fn builds_for(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }
}

/// A source file as declared by a module descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Path relative to the module root.
    pub path: Utf8PathBuf,

    /// Explicit output path overriding the action's transform.
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,

    /// Extra dependencies of the produced edge.
    #[serde(default)]
    pub deps: Vec<Utf8PathBuf>,
}

/// Install destination category of a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// The kernel image.
    Kernel,
    /// The first user-space program.
    Init,
    /// A panic handler.
    Panic,
    /// A user-space service, installed into the ramdisk.
    Service,
    /// A driver, installed into the ramdisk.
    Driver,
    /// An opaque data blob, installed into the ramdisk.
    Data,
}

impl Category {
    /// Ramdisk directory for ramdisk categories.
    #[must_use]
    pub const fn ramdisk_dir(self) -> Option<&'static str> {
        match self {
            Self::Service => Some("jsix/services"),
            Self::Driver => Some("jsix/drivers"),
            Self::Data => Some("jsix/data"),
            Self::Kernel | Self::Init | Self::Panic => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kernel => "kernel",
            Self::Init => "init",
            Self::Panic => "panic",
            Self::Service => "service",
            Self::Driver => "driver",
            Self::Data => "data",
        };
        f.write_str(name)
    }
}

/// One install-worthy artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Target the artifact is built for.
    pub target: String,
    /// Module producing the artifact.
    pub module: String,
    /// Output file name of the module's link step.
    pub output: String,
    /// Install destination.
    pub category: Category,
}

/// Ramdisk image settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RamdiskSpec {
    /// File name of the packed image on the boot partition.
    #[serde(default = "default_initrd_name")]
    pub name: String,
    /// Archive format passed to the packing helper.
    #[serde(default = "default_initrd_format")]
    pub format: String,
}

impl Default for RamdiskSpec {
    fn default() -> Self {
        Self {
            name: default_initrd_name(),
            format: default_initrd_format(),
        }
    }
}

fn default_initrd_name() -> String {
    String::from("initrd.dat")
}

fn default_initrd_format() -> String {
    String::from("zstd")
}

/// Resolved install manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Boot-partition directory receiving the executables.
    #[serde(default = "default_location")]
    pub location: Utf8PathBuf,

    /// Ramdisk image settings.
    #[serde(default)]
    pub initrd: RamdiskSpec,

    /// Flags forwarded verbatim to the boot configuration.
    #[serde(default)]
    pub flags: Vec<String>,

    /// Entries in manifest order.
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

fn default_location() -> Utf8PathBuf {
    Utf8PathBuf::from("jsix")
}

impl Manifest {
    /// Entries of one category, in manifest order.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }
}

/// An auxiliary file copied next to the disk image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuxAsset {
    /// Human-readable name used as the edge description.
    pub name: String,
    /// Source path relative to the source root.
    pub source: Utf8PathBuf,
    /// File name under the build root.
    pub output: String,
}

/// Fixed asset locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Assets {
    /// Rule definitions included by the root build file.
    pub rules: Utf8PathBuf,
    /// Built bootloader, relative to the build root.
    pub bootloader: Utf8PathBuf,
    /// Bootloader destination inside the boot partition.
    pub bootloader_dest: Utf8PathBuf,
    /// Base disk image the partition is written into.
    pub disk_base: Utf8PathBuf,
    /// Ramdisk packing helper script.
    pub initrd_helper: Utf8PathBuf,
    /// Extra files copied as default targets.
    pub aux: Vec<AuxAsset>,
    /// Flags passed to the parse preprocessor.
    pub parse_flags: Vec<String>,
}

impl Default for Assets {
    fn default() -> Self {
        Self {
            rules: Utf8PathBuf::from("assets/build/rules.ninja"),
            bootloader: Utf8PathBuf::from("boot/boot.efi"),
            bootloader_dest: Utf8PathBuf::from("efi/boot/bootx64.efi"),
            disk_base: Utf8PathBuf::from("assets/diskbase.img"),
            initrd_helper: Utf8PathBuf::from("scripts/mkj6romfs.py"),
            aux: vec![
                AuxAsset {
                    name: String::from("UEFI Variables"),
                    source: Utf8PathBuf::from("assets/ovmf/x64/ovmf_vars.fd"),
                    output: String::from("ovmf_vars.fd"),
                },
                AuxAsset {
                    name: String::from("GDB Debug Helpers"),
                    source: Utf8PathBuf::from("assets/debugging/jsix.elf-gdb.py"),
                    output: String::from("jsix.elf-gdb.py"),
                },
            ],
            parse_flags: vec![
                String::from("-I"),
                String::from("${source_root}/scripts"),
                String::from("-D"),
                String::from("definitions_path=${source_root}/definitions"),
            ],
        }
    }
}

/// Resolve `path` against `root` unless it is already absolute.
#[must_use]
pub fn rooted(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn module(kind: ModuleKind, output: Option<&str>) -> Module {
        Module {
            name: "net".into(),
            kind,
            root: Utf8PathBuf::new(),
            descriptor: None,
            targets: vec!["x64".into()],
            sources: Vec::new(),
            public_headers: false,
            deps: Vec::new(),
            output: output.map(str::to_owned),
        }
    }

    #[rstest]
    #[case(ModuleKind::Executable, None, Some("net.elf"))]
    #[case(ModuleKind::Executable, Some("net.sys"), Some("net.sys"))]
    #[case(ModuleKind::Library, None, Some("libnet.a"))]
    #[case(ModuleKind::Headers, Some("ignored"), None)]
    fn module_output_defaults(
        #[case] kind: ModuleKind,
        #[case] output: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(module(kind, output).output().as_deref(), expected);
    }

    #[rstest]
    fn version_displays_with_revision() {
        let version = Version {
            major: 0,
            minor: 8,
            patch: 1,
            revision: "4c1d9a2".into(),
        };
        assert_eq!(version.to_string(), "0.8.1-4c1d9a2");
    }

    #[rstest]
    #[case(Category::Kernel, None)]
    #[case(Category::Panic, None)]
    #[case(Category::Driver, Some("jsix/drivers"))]
    #[case(Category::Data, Some("jsix/data"))]
    fn category_destinations(#[case] category: Category, #[case] dir: Option<&str>) {
        assert_eq!(category.ramdisk_dir(), dir);
    }

    #[rstest]
    fn rooted_keeps_absolute_paths() {
        let root = Utf8Path::new("/src");
        assert_eq!(rooted(root, Utf8Path::new("/etc/x")), "/etc/x");
        assert_eq!(rooted(root, Utf8Path::new("a/b")), "/src/a/b");
    }
}
