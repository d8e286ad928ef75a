//! Unit tests for the runner module's path resolution helpers.

use super::*;
use crate::model::from_str;
use camino::Utf8Path;
use rstest::rstest;

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from_with_default(args.iter().copied()).expect("parse")
}

#[rstest]
#[case(&["bootgraph"], "/work/bootgraph.yaml", "/work/build")]
#[case(&["bootgraph", "-C", "jsix"], "/work/jsix/bootgraph.yaml", "/work/jsix/build")]
#[case(
    &["bootgraph", "-C", "jsix", "-f", "/models/x.yaml", "-o", "out"],
    "/models/x.yaml",
    "/work/jsix/out"
)]
fn paths_resolve_against_directory(
    #[case] args: &[&str],
    #[case] model: &str,
    #[case] output: &str,
) {
    let paths = RunPaths::resolve(&cli(args), Utf8Path::new("/work")).expect("resolve");
    assert_eq!(paths.model.as_str(), model);
    assert_eq!(paths.output.as_str(), output);
}

#[rstest]
#[case(None, "/work/jsix")]
#[case(Some(".."), "/work/jsix/..")]
#[case(Some("/src/jsix"), "/src/jsix")]
fn source_root_follows_model_file(#[case] root: Option<&str>, #[case] expected: &str) {
    let paths = RunPaths::resolve(&cli(&["bootgraph", "-f", "jsix/bootgraph.yaml"]), Utf8Path::new("/work"))
        .expect("resolve");
    let mut model = from_str(
        "project: { name: jsix, version: { major: 0, minor: 1, patch: 0, revision: x } }\nmodules: []\nmanifest: {}\n",
    )
    .expect("model");
    model.project.root = root.map(Into::into);
    assert_eq!(paths.source_root(&model).as_str(), expected);
}

#[rstest]
fn regeneration_argv_is_absolute() {
    let paths = RunPaths::resolve(&cli(&["bootgraph", "-C", "jsix"]), Utf8Path::new("/work"))
        .expect("resolve");
    assert_eq!(
        paths.regeneration_argv("/usr/bin/bootgraph"),
        [
            "/usr/bin/bootgraph",
            "-f",
            "/work/jsix/bootgraph.yaml",
            "-o",
            "/work/jsix/build",
            "generate",
        ]
    );
}

#[rstest]
fn missing_model_is_reported() {
    let paths = RunPaths::resolve(&cli(&["bootgraph"]), Utf8Path::new("/nonexistent/bootgraph"))
        .expect("resolve");
    let err = paths.ensure_model_exists().expect_err("missing");
    assert!(matches!(err, RunnerError::ModelNotFound { .. }));
}
