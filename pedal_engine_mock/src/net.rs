use crate::protocol::{ClientEnvelope, ErrorCode, InboundMsg, OutboundMsg, RequestId, ServerMessage};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message;
use tungstenite::WebSocket;

pub const DEFAULT_ADDR: &str = "127.0.0.1:9001";
const SESSION_TOKEN_LEN: usize = 32;
const READ_TIMEOUT: Duration = Duration::from_millis(30);
const WRITE_TIMEOUT: Duration = Duration::from_millis(200);
const IDLE_SLEEP: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum BindError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("listener setup failed: {0}")]
    Setup(#[from] std::io::Error),
}

/// Websocket front end of the mock engine, running on its own thread.
pub struct NetworkThread {
    listen_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkThread {
    pub fn spawn(
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
    ) -> Result<Self, BindError> {
        Self::spawn_with_addr(DEFAULT_ADDR, in_tx, out_rx)
    }

    /// Binds before returning, so `listen_addr` is valid immediately (also for port 0).
    pub fn spawn_with_addr(
        addr: &str,
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
    ) -> Result<Self, BindError> {
        let listener = TcpListener::bind(addr).map_err(|source| BindError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let listen_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let server = Server {
            listener,
            in_tx,
            out_rx,
            active: None,
        };
        let stop = Arc::clone(&shutdown);
        let join_handle = thread::spawn(move || server.run(&stop));
        info!(%listen_addr, "engine websocket listening");

        Ok(Self {
            listen_addr,
            shutdown,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = self.join_handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Client {
    ws: WebSocket<TcpStream>,
    session_token: String,
    socket_addr: SocketAddr,
}

/// What the server should do with the client after handling a frame.
enum Verdict {
    Keep,
    Drop,
}

struct Server {
    listener: TcpListener,
    in_tx: Sender<InboundMsg>,
    out_rx: Receiver<OutboundMsg>,
    active: Option<Client>,
}

impl Server {
    fn run(mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            self.accept_pending();
            if !self.flush_outbound() {
                break;
            }
            if self.active.is_some() {
                self.read_one();
            } else {
                thread::sleep(IDLE_SLEEP);
            }
        }
        if let Some(mut client) = self.active.take() {
            let _ = client.ws.close(None);
        }
    }

    /// Only one client at a time: a new connection replaces the old one.
    fn accept_pending(&mut self) {
        loop {
            let (stream, socket_addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!("accept failed: {e}");
                    return;
                }
            };
            let _ = stream.set_nonblocking(false);
            let _ = stream.set_nodelay(true);
            let _ = stream.set_read_timeout(Some(READ_TIMEOUT));
            let _ = stream.set_write_timeout(Some(WRITE_TIMEOUT));

            let mut ws = match tungstenite::accept(stream) {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(addr = %socket_addr, "websocket upgrade failed: {e}");
                    continue;
                }
            };

            if let Some(previous) = self.active.as_ref() {
                debug!(addr = %previous.socket_addr, "replacing active client");
                self.drop_client();
            }

            let session_token = new_session_token();
            let connected = InboundMsg::ClientConnected {
                socket_addr,
                session_token: session_token.clone(),
            };
            if self.in_tx.try_send(connected).is_err() {
                let _ = send(&mut ws, &error(None, ErrorCode::Busy, "server busy"));
                let _ = ws.close(None);
                continue;
            }

            info!(addr = %socket_addr, "client connected");
            self.active = Some(Client {
                ws,
                session_token,
                socket_addr,
            });
        }
    }

    /// Returns false once the engine loop has gone away.
    fn flush_outbound(&mut self) -> bool {
        loop {
            let msg = match self.out_rx.try_recv() {
                Ok(OutboundMsg::Send { msg }) => msg,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            };
            let Some(client) = self.active.as_mut() else {
                debug!("no client; dropping outbound message");
                continue;
            };
            if send(&mut client.ws, &msg).is_err() {
                self.drop_client();
            }
        }
    }

    /// Reads at most one frame; the socket read timeout keeps the loop turning.
    fn read_one(&mut self) {
        let Some(client) = self.active.as_mut() else {
            return;
        };
        let verdict = match client.ws.read() {
            Ok(msg) => handle_frame(&self.in_tx, client, msg),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Verdict::Keep
            }
            Err(e) => {
                debug!("client dropped: {e}");
                Verdict::Drop
            }
        };
        if matches!(verdict, Verdict::Drop) {
            self.drop_client();
        }
    }

    fn drop_client(&mut self) {
        if let Some(mut client) = self.active.take() {
            let _ = client.ws.close(None);
            let _ = self.in_tx.try_send(InboundMsg::ClientDisconnected);
        }
    }
}

fn handle_frame(in_tx: &Sender<InboundMsg>, client: &mut Client, msg: Message) -> Verdict {
    let text = match msg {
        Message::Text(text) => text,
        Message::Ping(payload) => {
            let _ = client.ws.send(Message::Pong(payload));
            return Verdict::Keep;
        }
        Message::Close(_) => return Verdict::Drop,
        Message::Binary(_) | Message::Pong(_) | Message::Frame(_) => return Verdict::Keep,
    };

    let envelope: ClientEnvelope = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("rejecting frame: {e}");
            let _ = send(
                &mut client.ws,
                &error(None, ErrorCode::InvalidCommand, "invalid json"),
            );
            return Verdict::Keep;
        }
    };

    let request_id = envelope.request_id;
    if envelope.session_token != client.session_token {
        let _ = send(
            &mut client.ws,
            &error(Some(request_id), ErrorCode::Unauthorized, "unauthorized"),
        );
        return Verdict::Keep;
    }

    let command = InboundMsg::Command {
        request_id,
        cmd: envelope.command,
    };
    if in_tx.try_send(command).is_err() {
        let _ = send(
            &mut client.ws,
            &error(Some(request_id), ErrorCode::Busy, "server busy"),
        );
    }
    Verdict::Keep
}

fn new_session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn error(request_id: Option<RequestId>, code: ErrorCode, msg: &str) -> ServerMessage {
    ServerMessage::Error {
        request_id,
        msg: msg.to_string(),
        code,
    }
}

fn send(ws: &mut WebSocket<TcpStream>, msg: &ServerMessage) -> Result<(), tungstenite::Error> {
    let payload = serde_json::to_string(msg)
        .map_err(|e| tungstenite::Error::Io(std::io::Error::new(ErrorKind::InvalidData, e)))?;
    ws.send(Message::Text(payload))
}
