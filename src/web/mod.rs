//! Admin HTTP gateway over the enterprise core.

pub mod auth;
pub mod server;
pub mod types;

pub use auth::AuthState;
pub use server::{GatewayState, ServerHandle, router, start_server};
