//! Library-level tests assembling and committing the sample project.

use anyhow::{Context, Result, ensure};
use bootgraph::action::ActionRegistry;
use bootgraph::assemble::{GenerateError, GraphAssembler};
use bootgraph::model::ProjectModel;
use bootgraph::output;
use camino::Utf8Path;
use rstest::{fixture, rstest};
use tempfile::tempdir;
use test_support::load_model;

#[fixture]
fn model() -> ProjectModel {
    load_model()
}

fn assembler<'a>(model: &'a ProjectModel, registry: &'a ActionRegistry) -> GraphAssembler<'a> {
    GraphAssembler::new(model, registry, "/src/jsix", "/src/jsix/build")
        .with_model_file("/src/jsix/bootgraph.yaml")
        .with_command(["bootgraph", "generate"])
}

#[rstest]
fn every_module_gets_its_own_files(model: ProjectModel) -> Result<()> {
    let registry = ActionRegistry::standard();
    let plan = assembler(&model, &registry).assemble()?;
    for module in &model.modules {
        let name = &module.name;
        ensure!(plan.build_file(&format!("module.{name}.ninja")).is_some(), "module.{name}.ninja");
        ensure!(plan.build_file(&format!("headers.{name}.ninja")).is_some(), "headers.{name}.ninja");
    }
    // root, three targets, two files per module, boot.conf
    ensure!(plan.rendered().len() == 1 + 3 + 2 * model.modules.len() + 1, "file count");
    Ok(())
}

#[rstest]
fn root_file_wires_install_pipeline(model: ProjectModel) -> Result<()> {
    let registry = ActionRegistry::standard();
    let plan = assembler(&model, &registry).assemble()?;
    let root = plan.build_file("build.ninja").context("root file")?.to_string();
    for needle in [
        "include ${source_root}/assets/build/rules.ninja",
        "build ${build_root}/fatroot/jsix/jsix.elf: cp",
        "build ${build_root}/initrd_root/jsix/drivers/drv.uart.elf: cp",
        "build ${build_root}/jsix.img: makefat",
        "build build.ninja | ",
        "default ${build_root}/jsix.img",
    ] {
        ensure!(root.contains(needle), "missing `{needle}` in:\n{root}");
    }
    Ok(())
}

#[rstest]
fn library_is_linked_into_dependents(model: ProjectModel) -> Result<()> {
    let registry = ActionRegistry::standard();
    let plan = assembler(&model, &registry).assemble()?;
    let driver = plan
        .build_file("module.drv.uart.ninja")
        .context("driver file")?
        .to_string();
    ensure!(driver.contains("${target_dir}/libj6.a"), "got:\n{driver}");
    Ok(())
}

#[rstest]
fn commit_is_idempotent(model: ProjectModel) -> Result<()> {
    let registry = ActionRegistry::standard();
    let plan = assembler(&model, &registry).assemble()?;
    let temp = tempdir().context("create temp dir")?;
    let root = Utf8Path::from_path(temp.path()).context("utf-8 temp dir")?;

    let first = output::commit(&plan, root)?;
    ensure!(first.written.len() == plan.rendered().len(), "first commit writes all");
    ensure!(first.unchanged.is_empty(), "nothing is unchanged on first commit");

    let second = output::commit(&plan, root)?;
    ensure!(second.written.is_empty(), "second commit writes nothing");
    ensure!(second.unchanged.len() == plan.rendered().len(), "all unchanged");
    Ok(())
}

#[rstest]
fn unknown_dependency_is_reported(mut model: ProjectModel) -> Result<()> {
    let registry = ActionRegistry::standard();
    let driver = model
        .modules
        .iter_mut()
        .find(|m| m.name == "drv.uart")
        .context("driver module")?;
    driver.deps = vec![String::from("j7")];
    let err = assembler(&model, &registry)
        .assemble()
        .err()
        .context("assembly should fail")?;
    ensure!(
        matches!(err, GenerateError::UnknownDependency { ref dependency, .. } if dependency == "j7"),
        "unexpected error: {err}"
    );
    Ok(())
}
