use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub enum InboundMsg {
    ClientConnected {
        socket_addr: SocketAddr,
        session_token: String,
    },
    ClientDisconnected,
    Command {
        request_id: RequestId,
        cmd: ClientCommand,
    },
}

pub enum OutboundMsg {
    Send { msg: ServerMessage },
}

pub use pedal_protocol::{
    ClientCommand, ClientEnvelope, ErrorCode, InstanceId, ReplyPayload, RequestId, ServerMessage,
};
