//! Library half of the `delve` binary: environment wiring and the HTTP surface.

pub mod config;
pub mod server;

pub use config::Services;
pub use server::{research_stream, router, AppState};
