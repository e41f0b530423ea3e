mod engine_loop;
mod engine_state;
mod net;
mod protocol;

pub use engine_loop::EngineLoop;
pub use engine_state::{EngineState, Rejection, DEMO_IMPULSE_PROPERTY, DEMO_REVERB_URI};
pub use net::{BindError, NetworkThread, DEFAULT_ADDR};
pub use protocol::{InboundMsg, OutboundMsg, INBOUND_CAP, OUTBOUND_CAP};
