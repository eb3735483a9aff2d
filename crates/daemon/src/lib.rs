pub mod config;
mod server;

pub use server::{build_router, AppState};
