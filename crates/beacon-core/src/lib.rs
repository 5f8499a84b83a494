pub mod ids;
pub mod message;
pub mod principal;

pub use ids::ConnectionId;
pub use message::OutboundMessage;
pub use principal::{Principal, Role};
