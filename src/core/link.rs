use crate::core::distribution::{create_distribution, Distribution};
use crate::core::error::{Diagnostics, ReturnCode};
use crate::core::protocols::{create_protocol, Payload, Protocol, Reply, Request, Wire};
use crate::core::settings::{PoolSettings, ServerAddress};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Everything the links of one pool share
pub struct LinkContext {
    pub settings: PoolSettings,
    pub protocol: Box<dyn Protocol>,
    pub distribution: Box<dyn Distribution>,
}

impl LinkContext {
    pub fn new(settings: PoolSettings) -> Self {
        let protocol = create_protocol(settings.binary_protocol);
        let distribution = create_distribution(settings.distribution, &settings.servers);
        Self {
            settings,
            protocol,
            distribution,
        }
    }
}

impl std::fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkContext")
            .field("settings", &self.settings)
            .field("protocol", &self.protocol.name())
            .field("distribution", &self.distribution.name())
            .finish()
    }
}

/// Socket to one server, opened on first use
struct ServerSocket {
    address: ServerAddress,
    wire: Option<Wire<TcpStream>>,
}

/// One handle onto every configured server
///
/// A link is what the pool hands out. It is not thread-safe on its own; the
/// pool guarantees a single owner at a time.
pub struct Link {
    id: usize,
    context: Arc<LinkContext>,
    sockets: Vec<ServerSocket>,
    last_error: String,
}

impl Link {
    pub fn new(id: usize, context: Arc<LinkContext>) -> Self {
        let sockets = context
            .settings
            .servers
            .iter()
            .cloned()
            .map(|address| ServerSocket {
                address,
                wire: None,
            })
            .collect();
        Self {
            id,
            context,
            sockets,
            last_error: String::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of server sockets currently open
    pub fn open_sockets(&self) -> usize {
        self.sockets.iter().filter(|s| s.wire.is_some()).count()
    }

    /// Run a keyed request against the server owning its key
    pub fn execute(&mut self, request: &Request<'_>) -> Reply {
        let index = match request.key() {
            Some(key) => {
                let code = self.context.protocol.validate_key(key);
                if !code.is_success() {
                    return self.record(Reply::status(code));
                }
                self.context.distribution.select(key)
            }
            None => 0,
        };
        let reply = self.execute_on(index, request);
        self.record(reply)
    }

    /// Run a request against every server, stopping at the first failure
    pub fn broadcast(&mut self, request: &Request<'_>) -> Reply {
        let mut last = Reply::status(ReturnCode::NoServers);
        for index in 0..self.sockets.len() {
            last = self.execute_on(index, request);
            if !last.code.is_success() {
                break;
            }
        }
        self.record(last)
    }

    /// Version request to every server
    pub fn ping(&mut self) -> bool {
        let reply = self.broadcast(&Request::Version);
        matches!(
            (reply.code, reply.payload),
            (ReturnCode::Success, Some(Payload::Version(_)))
        )
    }

    fn record(&mut self, reply: Reply) -> Reply {
        if !reply.code.is_success() {
            self.last_error = reply.message.clone();
        }
        reply
    }

    fn execute_on(&mut self, index: usize, request: &Request<'_>) -> Reply {
        let context = Arc::clone(&self.context);
        let Some(socket) = self.sockets.get_mut(index) else {
            return Reply::status(ReturnCode::NoServers);
        };

        if socket.wire.is_none() {
            match connect(&socket.address, &context.settings) {
                Ok(stream) => {
                    tracing::debug!(link = self.id, server = %socket.address.endpoint(), "connected");
                    socket.wire = Some(Wire::new(stream));
                }
                Err((code, message)) => {
                    tracing::warn!(
                        link = self.id,
                        server = %socket.address.endpoint(),
                        "connect failed: {}",
                        message
                    );
                    return Reply::failure(code, message);
                }
            }
        }

        let Some(wire) = socket.wire.as_mut() else {
            return Reply::status(ReturnCode::ConnectionFailure);
        };
        match context.protocol.execute(wire, request) {
            Ok(reply) => reply,
            Err(e) => {
                // Stream position is unknown after a failed exchange
                tracing::warn!(
                    link = self.id,
                    server = %socket.address.endpoint(),
                    "closing socket: {}",
                    e
                );
                socket.wire = None;
                Reply::failure(e.return_code(), e.to_string())
            }
        }
    }
}

impl Diagnostics for Link {
    fn last_error_message(&self) -> String {
        self.last_error.clone()
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("servers", &self.sockets.len())
            .field("open_sockets", &self.open_sockets())
            .finish()
    }
}

fn connect(
    address: &ServerAddress,
    settings: &PoolSettings,
) -> Result<TcpStream, (ReturnCode, String)> {
    let endpoint = address.endpoint();
    let candidates: Vec<SocketAddr> = endpoint
        .to_socket_addrs()
        .map_err(|e| (ReturnCode::HostLookupFailure, format!("{}: {}", endpoint, e)))?
        .collect();
    if candidates.is_empty() {
        return Err((
            ReturnCode::HostLookupFailure,
            format!("{}: no addresses", endpoint),
        ));
    }

    let mut last_error = None;
    for candidate in candidates {
        let attempt = match settings.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                configure_socket(&stream, settings)
                    .map_err(|e| (ReturnCode::ConnectionFailure, e.to_string()))?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    let error = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err((ReturnCode::ConnectionFailure, format!("{}: {}", endpoint, error)))
}

/// Apply timeouts and socket options after connect
fn configure_socket(stream: &TcpStream, settings: &PoolSettings) -> io::Result<()> {
    stream.set_read_timeout(settings.read_timeout)?;
    stream.set_write_timeout(settings.write_timeout)?;
    if settings.tcp_nodelay {
        stream.set_nodelay(true)?;
    }

    let socket = socket2::SockRef::from(stream);
    if settings.tcp_keepalive {
        let keepalive = socket2::TcpKeepalive::new().with_time(Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    // 32KB buffers balance latency vs throughput for cache operations
    let _ = socket.set_send_buffer_size(32768);
    let _ = socket.set_recv_buffer_size(32768);
    Ok(())
}
