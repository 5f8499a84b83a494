pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod hub;
pub mod server;
pub mod shutdown;

pub use config::{allow_all_origins, allow_origins, OriginPolicy, ServerConfig};
pub use error::ApiError;
pub use hub::{Hub, HubConfig, HubError};
pub use server::{build_router, start, AppState, ServerHandle};
