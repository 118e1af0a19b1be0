mod caching_session;
mod gateway_client;

pub use caching_session::{CachingConnector, CachingSession};
pub use gateway_client::{GatewayConnector, GatewaySession, GatewaySettings, DEFAULT_GATEWAY_PORT};
