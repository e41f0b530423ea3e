use crate::config::ClientConfig;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pedal_core::error::RemoteError;
use pedal_protocol::{
    ClientCommand, ClientEnvelope, InstanceId, Pedalboard, PresetIndex, ReplyPayload, RequestId,
    ServerMessage,
};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub type ReplySender = oneshot::Sender<Result<ReplyPayload, RemoteError>>;

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug)]
pub enum ActorCommand {
    Connect,
    Disconnect,
    Request {
        command: ClientCommand,
        reply: ReplySender,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected { retry_in: Option<u64> },
}

/// Everything the engine tells the UI thread outside of request replies.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Status(ConnectionStatus),
    Handshake {
        presets: PresetIndex,
        pedalboard: Pedalboard,
    },
    StateChanged(InstanceId),
    PresetsChanged(PresetIndex),
    PedalboardChanged(Pedalboard),
    Alert(String),
}

struct Outgoing {
    command: ClientCommand,
    reply: ReplySender,
}

/// Owns the socket. Requests received before the handshake are held and
/// sent once the session token is known; on disconnect every outstanding
/// request fails with `RemoteError::Disconnected`.
pub async fn run(
    config: ClientConfig,
    mut rx: mpsc::Receiver<ActorCommand>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    let mut desired_connected = true;
    let mut backoff = Backoff::new(config.backoff.clone());
    let mut backlog: VecDeque<ActorCommand> = VecDeque::new();

    loop {
        if !desired_connected {
            emit_status(&events, ConnectionStatus::Disconnected { retry_in: None });
            match recv_or_backlog(&mut rx, &mut backlog).await {
                Some(ActorCommand::Connect) => desired_connected = true,
                Some(ActorCommand::Disconnect) => {}
                Some(ActorCommand::Request { reply, .. }) => {
                    let _ = reply.send(Err(RemoteError::Disconnected));
                }
                None => return,
            }
            continue;
        }

        emit_status(&events, ConnectionStatus::Connecting);
        let socket = match tokio_tungstenite::connect_async(config.ws_url.as_str()).await {
            Ok((socket, _)) => {
                backoff.reset();
                info!("connected to {}", config.ws_url);
                emit_status(&events, ConnectionStatus::Connected);
                Some(socket)
            }
            Err(e) => {
                warn!("connect to {} failed: {e}", config.ws_url);
                None
            }
        };

        if let Some(socket) = socket {
            let (mut write, mut read) = socket.split();
            let mut session_token: Option<String> = None;
            let mut next_request_id: RequestId = 1;
            let mut pending: HashMap<RequestId, ReplySender> = HashMap::new();
            let mut queued: VecDeque<Outgoing> = VecDeque::new();

            'conn: loop {
                tokio::select! {
                    next = recv_or_backlog(&mut rx, &mut backlog) => {
                        let Some(cmd) = next else {
                            fail_all(pending.drain().map(|(_, r)| r), queued.drain(..).map(|o| o.reply));
                            return;
                        };
                        match cmd {
                            ActorCommand::Connect => {}
                            ActorCommand::Disconnect => {
                                desired_connected = false;
                                let _ = write.send(Message::Close(None)).await;
                                break 'conn;
                            }
                            ActorCommand::Request { command, reply } => {
                                let (outgoing, superseded) =
                                    coalesce_update_presets(Outgoing { command, reply }, &mut rx, &mut backlog);
                                for reply in superseded {
                                    let _ = reply.send(Ok(ReplyPayload::Done));
                                }
                                match session_token.as_deref() {
                                    Some(token) => {
                                        if send_request(&mut write, token, &mut next_request_id, &mut pending, outgoing)
                                            .await
                                            .is_err()
                                        {
                                            break 'conn;
                                        }
                                    }
                                    None => queued.push_back(outgoing),
                                }
                            }
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(msg)) => {
                                if msg.is_close() {
                                    break 'conn;
                                }
                                let Ok(text) = msg.into_text() else { continue };
                                if text.is_empty() {
                                    continue;
                                }
                                let server_msg = match serde_json::from_str::<ServerMessage>(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        warn!("unreadable engine message: {e}");
                                        continue;
                                    }
                                };
                                match server_msg {
                                    ServerMessage::Handshake { session_token: token, presets, pedalboard } => {
                                        if send_envelope(&mut write, &token, 0, ClientCommand::HandshakeAck).await.is_err() {
                                            break 'conn;
                                        }
                                        let _ = events.send(EngineEvent::Handshake { presets, pedalboard });
                                        while let Some(outgoing) = queued.pop_front() {
                                            if send_request(&mut write, &token, &mut next_request_id, &mut pending, outgoing)
                                                .await
                                                .is_err()
                                            {
                                                break 'conn;
                                            }
                                        }
                                        session_token = Some(token);
                                    }
                                    ServerMessage::Reply { request_id, payload } => {
                                        match pending.remove(&request_id) {
                                            Some(reply) => {
                                                let _ = reply.send(Ok(payload));
                                            }
                                            None => debug!("reply for unknown request {request_id}"),
                                        }
                                    }
                                    ServerMessage::Error { request_id, msg, code } => {
                                        match request_id.and_then(|id| pending.remove(&id)) {
                                            Some(reply) => {
                                                let _ = reply.send(Err(RemoteError::Engine { code, msg }));
                                            }
                                            None => {
                                                warn!("engine error ({code:?}): {msg}");
                                                let _ = events.send(EngineEvent::Alert(msg));
                                            }
                                        }
                                    }
                                    ServerMessage::StateChanged { instance_id } => {
                                        let _ = events.send(EngineEvent::StateChanged(instance_id));
                                    }
                                    ServerMessage::PresetsChanged { presets } => {
                                        let _ = events.send(EngineEvent::PresetsChanged(presets));
                                    }
                                    ServerMessage::PedalboardChanged { pedalboard } => {
                                        let _ = events.send(EngineEvent::PedalboardChanged(pedalboard));
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                warn!("engine socket error: {e}");
                                break 'conn;
                            }
                            None => break 'conn,
                        }
                    }
                }
            }

            info!("connection to {} closed", config.ws_url);
            fail_all(
                pending.drain().map(|(_, r)| r),
                queued.drain(..).map(|o| o.reply),
            );
        }

        if !desired_connected {
            continue;
        }

        let retry = backoff.next_delay();
        emit_status(
            &events,
            ConnectionStatus::Disconnected {
                retry_in: Some(retry.as_secs()),
            },
        );
        if !wait_retry(retry, &mut rx, &mut backlog, &mut desired_connected).await {
            return;
        }
    }
}

/// Sleeps out a reconnect delay. Requests arriving meanwhile fail fast.
/// Returns false when the command channel is closed.
async fn wait_retry(
    delay: Duration,
    rx: &mut mpsc::Receiver<ActorCommand>,
    backlog: &mut VecDeque<ActorCommand>,
    desired_connected: &mut bool,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            next = recv_or_backlog(rx, backlog) => match next {
                Some(ActorCommand::Connect) => return true,
                Some(ActorCommand::Disconnect) => {
                    *desired_connected = false;
                    return true;
                }
                Some(ActorCommand::Request { command, reply }) => {
                    debug!("{} rejected while disconnected", command.name());
                    let _ = reply.send(Err(RemoteError::Disconnected));
                }
                None => return false,
            }
        }
    }
}

fn fail_all(pending: impl Iterator<Item = ReplySender>, queued: impl Iterator<Item = ReplySender>) {
    for reply in pending.chain(queued) {
        let _ = reply.send(Err(RemoteError::Disconnected));
    }
}

/// Collapses a run of `UpdatePresets` requests waiting in the channel into
/// the last one. Each full index supersedes the previous, so the earlier
/// requests are returned to be answered without being sent.
fn coalesce_update_presets(
    first: Outgoing,
    rx: &mut mpsc::Receiver<ActorCommand>,
    backlog: &mut VecDeque<ActorCommand>,
) -> (Outgoing, Vec<ReplySender>) {
    if !matches!(first.command, ClientCommand::UpdatePresets { .. }) {
        return (first, Vec::new());
    }

    let mut last = first;
    let mut superseded = Vec::new();
    while let Ok(next) = rx.try_recv() {
        match next {
            ActorCommand::Request { command, reply }
                if matches!(command, ClientCommand::UpdatePresets { .. }) =>
            {
                let previous = std::mem::replace(&mut last, Outgoing { command, reply });
                superseded.push(previous.reply);
            }
            other => {
                backlog.push_back(other);
                break;
            }
        }
    }
    if !superseded.is_empty() {
        debug!("coalesced {} preset update(s)", superseded.len());
    }
    (last, superseded)
}

async fn send_request(
    write: &mut WsWrite,
    session_token: &str,
    next_request_id: &mut RequestId,
    pending: &mut HashMap<RequestId, ReplySender>,
    outgoing: Outgoing,
) -> Result<(), ()> {
    let request_id = *next_request_id;
    *next_request_id += 1;
    let name = outgoing.command.name();
    pending.insert(request_id, outgoing.reply);
    debug!("-> {name} #{request_id}");
    let sent = send_envelope(write, session_token, request_id, outgoing.command).await;
    if sent.is_err() {
        if let Some(reply) = pending.remove(&request_id) {
            let _ = reply.send(Err(RemoteError::Disconnected));
        }
    }
    sent
}

async fn send_envelope(
    write: &mut WsWrite,
    session_token: &str,
    request_id: RequestId,
    command: ClientCommand,
) -> Result<(), ()> {
    let envelope = ClientEnvelope {
        session_token: session_token.to_string(),
        request_id,
        command,
    };
    let payload = serde_json::to_string(&envelope).map_err(|_| ())?;
    write
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

async fn recv_or_backlog(
    rx: &mut mpsc::Receiver<ActorCommand>,
    backlog: &mut VecDeque<ActorCommand>,
) -> Option<ActorCommand> {
    if let Some(cmd) = backlog.pop_front() {
        return Some(cmd);
    }
    rx.recv().await
}

fn emit_status(events: &mpsc::UnboundedSender<EngineEvent>, status: ConnectionStatus) {
    let _ = events.send(EngineEvent::Status(status));
}

struct Backoff {
    delays: Vec<Duration>,
    idx: usize,
}

impl Backoff {
    fn new(delays: Vec<Duration>) -> Self {
        Self { delays, idx: 0 }
    }

    fn reset(&mut self) {
        self.idx = 0;
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self
            .delays
            .get(self.idx)
            .or(self.delays.last())
            .copied()
            .unwrap_or(Duration::from_secs(1));
        self.idx = (self.idx + 1).min(self.delays.len());
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedal_protocol::PresetIndexEntry;

    fn update(name: &str) -> (ActorCommand, oneshot::Receiver<Result<ReplyPayload, RemoteError>>) {
        let (reply, rx) = oneshot::channel();
        let presets = PresetIndex {
            selected_instance_id: None,
            presets: vec![PresetIndexEntry {
                instance_id: 1,
                name: name.to_string(),
            }],
        };
        (
            ActorCommand::Request {
                command: ClientCommand::UpdatePresets { presets },
                reply,
            },
            rx,
        )
    }

    fn into_outgoing(cmd: ActorCommand) -> Outgoing {
        match cmd {
            ActorCommand::Request { command, reply } => Outgoing { command, reply },
            _ => panic!("not a request"),
        }
    }

    #[test]
    fn backoff_steps_then_repeats_last_delay() {
        let mut backoff = Backoff::new(ClientConfig::default().backoff);
        let secs: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(secs, [1, 2, 5, 10, 10, 10]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn trailing_preset_updates_collapse_into_the_last() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut backlog = VecDeque::new();

        let (first, mut first_rx) = update("one");
        let (second, mut second_rx) = update("two");
        let (third, _third_rx) = update("three");
        tx.try_send(second).unwrap();
        tx.try_send(third).unwrap();
        tx.try_send(ActorCommand::Disconnect).unwrap();

        let (last, superseded) = coalesce_update_presets(into_outgoing(first), &mut rx, &mut backlog);
        match &last.command {
            ClientCommand::UpdatePresets { presets } => assert_eq!(presets.presets[0].name, "three"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(superseded.len(), 2);
        for reply in superseded {
            reply.send(Ok(ReplyPayload::Done)).unwrap();
        }
        assert_eq!(first_rx.try_recv().unwrap(), Ok(ReplyPayload::Done));
        assert_eq!(second_rx.try_recv().unwrap(), Ok(ReplyPayload::Done));
        assert!(matches!(backlog.pop_front(), Some(ActorCommand::Disconnect)));
    }

    #[test]
    fn other_commands_are_not_coalesced() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut backlog = VecDeque::new();
        let (queued, _queued_rx) = update("later");
        tx.try_send(queued).unwrap();

        let (reply, _reply_rx) = oneshot::channel();
        let load = Outgoing {
            command: ClientCommand::LoadPreset { instance_id: 1 },
            reply,
        };
        let (out, superseded) = coalesce_update_presets(load, &mut rx, &mut backlog);
        assert_eq!(out.command, ClientCommand::LoadPreset { instance_id: 1 });
        assert!(superseded.is_empty());
        assert!(backlog.is_empty());
        assert!(rx.try_recv().is_ok());
    }
}
