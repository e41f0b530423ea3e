pub mod config;
pub mod connection;
pub mod ws_actor;

pub use config::{ClientConfig, ConfigError, DEFAULT_WS_URL};
pub use connection::{spawn, EngineConnection, EngineEvents};
pub use ws_actor::{ActorCommand, ConnectionStatus, EngineEvent};
