//! Renders the `bootgraph(1)` manual page from the clap definition.

use clap::CommandFactory;
use clap_mangen::Man;
use std::{env, fs, path::PathBuf};

#[path = "src/cli.rs"]
#[expect(
    dead_code,
    reason = "only the clap definitions are needed to render the manual"
)]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_DESCRIPTION");

    let out_dir = PathBuf::from("target/generated-man");
    fs::create_dir_all(&out_dir)?;

    let cmd = cli::Cli::command();
    let name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| cmd.get_name().to_owned());
    if cmd.get_name() != name {
        return Err(format!(
            "command is named '{}' but the package is '{name}'",
            cmd.get_name()
        )
        .into());
    }

    let mut page = Vec::new();
    Man::new(cmd).render(&mut page)?;
    fs::write(out_dir.join(format!("{name}.1")), page)?;
    Ok(())
}
