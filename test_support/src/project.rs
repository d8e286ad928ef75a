//! Sample project fixtures.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bootgraph::model::{self, ProjectModel};
use camino::{Utf8Path, Utf8PathBuf};

/// A small but complete project: a bootloader, a kernel with a panic
/// handler, a library with public headers, an init program and a driver.
pub const JSIX_MODEL: &str = r"
project:
  name: jsix
  version: { major: 0, minor: 8, patch: 1, revision: 4c1d9a2 }
targets:
  - name: boot
    variables: { arch: x86_64, cflags: -ffreestanding }
  - name: kernel
    variables: { arch: x86_64 }
  - name: user
    variables: { arch: x86_64 }
modules:
  - name: boot
    targets: [boot]
    root: src/boot
    output: boot.efi
    sources: [{ path: main.c }, { path: loader.cpp }]
  - name: kernel
    targets: [kernel]
    root: src/kernel
    output: jsix.elf
    sources: [{ path: main.cpp }, { path: apic.cpp }, { path: syscalls.inc.cog }]
  - name: panic.serial
    targets: [kernel]
    root: src/kernel/panic.serial
    sources: [{ path: main.cpp }]
  - name: j6
    kind: library
    targets: [user]
    root: src/libraries/j6
    public_headers: true
    sources: [{ path: include/j6/types.h }, { path: init.cpp }]
  - name: srv.init
    targets: [user]
    root: src/user/srv.init
    deps: [j6]
    sources: [{ path: main.cpp }, { path: loader.cpp }]
  - name: drv.uart
    targets: [user]
    root: src/user/drv.uart
    deps: [j6]
    sources: [{ path: main.cpp }]
manifest:
  flags: [debug]
  entries:
    - { target: kernel, module: kernel, output: jsix.elf, category: kernel }
    - { target: user, module: srv.init, output: srv.init.elf, category: init }
    - { target: kernel, module: panic.serial, output: panic.serial.elf, category: panic }
    - { target: user, module: drv.uart, output: drv.uart.elf, category: driver }
";

/// Source and asset files [`JSIX_MODEL`] refers to, relative to the
/// project root.
pub const JSIX_FILES: &[&str] = &[
    "src/boot/main.c",
    "src/boot/loader.cpp",
    "src/kernel/main.cpp",
    "src/kernel/apic.cpp",
    "src/kernel/syscalls.inc.cog",
    "src/kernel/panic.serial/main.cpp",
    "src/libraries/j6/include/j6/types.h",
    "src/libraries/j6/init.cpp",
    "src/user/srv.init/main.cpp",
    "src/user/srv.init/loader.cpp",
    "src/user/drv.uart/main.cpp",
    "assets/diskbase.img",
    "assets/ovmf/x64/ovmf_vars.fd",
    "assets/debugging/jsix.elf-gdb.py",
    "scripts/mkj6romfs.py",
];

/// Rules every generated build file may reference.
const RULES: &[&str] = &[
    "compile_c",
    "compile_cxx",
    "compile_asm",
    "parse_cog",
    "exe",
    "lib",
    "dump",
    "strip",
    "cp",
    "touch",
    "makest",
    "makeinitrd",
    "makefat",
    "compdb",
    "dump_c_defs",
    "dump_c_run",
    "dump_cpp_defs",
    "dump_cpp_run",
];

/// Parse [`JSIX_MODEL`].
///
/// # Panics
///
/// Panics if the fixture no longer parses.
#[must_use]
pub fn load_model() -> ProjectModel {
    model::from_str(JSIX_MODEL).expect("fixture model parses")
}

/// Write the sample project into `root`: the model as `bootgraph.yaml`,
/// an empty file for every source and asset, and a rule file whose rules
/// only touch their outputs.
///
/// Returns the model path.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
pub fn write_project(root: &Path) -> Result<Utf8PathBuf> {
    let root = Utf8Path::from_path(root).context("temporary directory is not UTF-8")?;
    for file in JSIX_FILES {
        write(&root.join(file), "")?;
    }
    let rules: String = RULES
        .iter()
        .map(|rule| format!("rule {rule}\n  command = touch $out\n\n"))
        .collect();
    write(&root.join("assets/build/rules.ninja"), &rules)?;

    let model = root.join("bootgraph.yaml");
    write(&model, JSIX_MODEL)?;
    Ok(model)
}

fn write(path: &Utf8Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create directory {parent}"))?;
    }
    fs::write(path, contents).with_context(|| format!("write {path}"))
}
