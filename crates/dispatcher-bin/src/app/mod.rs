//! Application wiring and lifecycle management.

mod init;
mod routes;
mod state;
mod ticker;

pub use init::{drain, serve};
pub use routes::router;
pub use state::AppState;
