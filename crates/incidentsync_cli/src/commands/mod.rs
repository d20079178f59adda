//! CLI command implementations.

pub mod reconcile;
pub mod run;
pub mod seed;
pub mod status;
pub mod sync_once;

/// Prints version information.
pub fn print_version() {
    println!("IncidentSync CLI v{}", env!("CARGO_PKG_VERSION"));
}
