//! Bootgraph core library.
//!
//! This library compiles a resolved project model (modules, target
//! variants and an install manifest) into Ninja build files that compile
//! every module per target, install the results into boot-partition and
//! ramdisk staging trees, pack the disk image and regenerate themselves.

pub mod action;
pub mod assemble;
pub mod cli;
pub mod hasher;
pub mod install;
pub mod ir;
pub mod model;
pub mod ninja_gen;
pub mod output;
pub mod regen;
pub mod runner;
pub mod source;
