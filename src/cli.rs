//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands. It is
//! also compiled by the build script to render the manual page, so it
//! depends on nothing but `clap` and the standard library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Generate Ninja build files for multi-target kernel and OS images.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the project model to generate from.
    #[arg(short, long, value_name = "FILE", default_value = "bootgraph.yaml")]
    pub file: PathBuf,

    /// Directory receiving the generated build files.
    #[arg(short, long, value_name = "DIR", default_value = "build")]
    pub output: PathBuf,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Optional subcommand to execute; defaults to `generate` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Parse command-line arguments, providing `generate` as the default
    /// command.
    #[must_use]
    pub fn parse_with_default() -> Self {
        Self::parse().with_default_command()
    }

    /// Parse the provided arguments, applying the default command when
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns the clap error when the arguments are invalid.
    pub fn try_parse_from_with_default<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args).map(Self::with_default_command)
    }

    /// Apply the default command if none was specified.
    #[must_use]
    fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Generate);
        }
        self
    }
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Write every build file and the boot configuration (default).
    Generate,

    /// Assemble the build graph and report errors without writing anything.
    Check,

    /// Print one generated file to standard output.
    Show {
        /// Generated file to print, relative to the output directory, e.g.
        /// `build.ninja` or `x64/target.ninja`.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}
