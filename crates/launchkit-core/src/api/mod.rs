//! API implementation submodules.
//!
//! Each submodule contains `impl LauncherApi` blocks that extend the public
//! API. The struct definition remains in `lib.rs`.

mod builder;
mod files;
mod process;

pub use builder::LauncherApiBuilder;
