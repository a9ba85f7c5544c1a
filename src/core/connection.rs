use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::core::builder::AdminConfig;
use crate::core::command::{self, Cmd};
use crate::core::transport::Transport;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const READ_CHUNK: usize = 4096;

/// A RESP connection over any byte stream.
///
/// Handles frame encoding and incremental decoding; one request is in
/// flight at a time.
pub struct Connection<S> {
    stream: S,
    decoder: Decoder,
    encoder: Encoder,
    read_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection with no read timeout.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            read_timeout: None,
        }
    }

    /// Sets the maximum time [`read_frame`](Connection::read_frame) waits.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Encodes and writes a frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.encoder.encode(frame);
        let data = self.encoder.take();
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads the next complete frame.
    ///
    /// # Errors
    ///
    /// Fails on IO errors, invalid RESP, a peer that closes the stream, or
    /// when the read timeout elapses.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_frame_inner())
                .await
                .map_err(|_| Error::Io {
                    source: io::Error::new(io::ErrorKind::TimedOut, "read timed out"),
                })?,
            None => self.read_frame_inner().await,
        }
    }

    async fn read_frame_inner(&mut self) -> Result<Frame> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(frame);
            }
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(Error::Io {
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    ),
                });
            }
            self.decoder.append(&buf[..n]);
        }
    }

    /// Writes `frame` and reads the reply.
    pub async fn request(&mut self, frame: &Frame) -> Result<Frame> {
        self.write_frame(frame).await?;
        self.read_frame().await
    }

    /// Shuts down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl<S> fmt::Debug for Connection<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.stream)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

enum State {
    Open(Connection<TcpStream>),
    // a request failed halfway; replies can no longer be matched
    Broken,
    Closed,
}

/// A TCP connection to one cluster member.
///
/// Cheap to clone; clones share the underlying socket and requests are
/// serialized.
#[derive(Clone)]
pub struct NodeConnection {
    address: Arc<str>,
    state: Arc<Mutex<State>>,
}

impl NodeConnection {
    /// Connects to `address` (`host:port`) and authenticates when the
    /// config carries a password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the connection cannot be established in
    /// time and [`Error::Auth`] if the password is rejected.
    #[instrument(skip(config), level = "debug")]
    pub async fn connect(address: &str, config: &AdminConfig) -> Result<Self> {
        let connect = TcpStream::connect(address);
        let stream = match config.connection_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| Error::Io {
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })??,
            None => connect.await?,
        };
        stream.set_nodelay(true)?;

        let mut connection = Connection::new(stream).with_read_timeout(config.read_timeout);
        if let Some(password) = &config.password {
            let reply = connection
                .request(&command::auth(password.clone()).into_frame())
                .await?;
            if let Frame::Error(message) = reply {
                warn!(address, reply = %String::from_utf8_lossy(&message), "AUTH rejected");
                return Err(Error::Auth);
            }
        }
        debug!(address, "connected");

        Ok(Self {
            address: Arc::from(address),
            state: Arc::new(Mutex::new(State::Open(connection))),
        })
    }
}

impl Transport for NodeConnection {
    fn address(&self) -> &str {
        &self.address
    }

    #[instrument(skip(self, cmd), fields(address = %self.address), level = "debug")]
    async fn send(&self, cmd: Cmd) -> Result<Frame> {
        let mut state = self.state.lock().await;
        let connection = match &mut *state {
            State::Open(connection) => connection,
            State::Broken => {
                return Err(Error::Io {
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "connection is broken"),
                })
            }
            State::Closed => return Err(Error::Closed),
        };

        debug!(%cmd, "sending command");
        match connection.request(&cmd.into_frame()).await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!(error = %e, "request failed, dropping connection");
                *state = State::Broken;
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let State::Open(mut connection) = std::mem::replace(&mut *state, State::Closed) {
            debug!(address = %self.address, "closing connection");
            // the peer may already be gone
            let _ = connection.shutdown().await;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConnection")
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_connection_request_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let barrier_cloned = barrier.clone();
        let server = async move {
            barrier_cloned.wait().await;
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let frame = conn.read_frame().await.unwrap();
            assert_eq!(
                frame,
                Frame::Array(vec![Frame::bulk("CLUSTER"), Frame::bulk("INFO")])
            );
            conn.write_frame(&Frame::bulk("cluster_state:ok\r\n"))
                .await
                .unwrap();
        };

        let client = async {
            barrier.wait().await;
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut conn = Connection::new(stream);
            let reply = conn
                .request(&Cmd::new("CLUSTER").arg("INFO").into_frame())
                .await
                .unwrap();
            assert_eq!(reply.into_text().unwrap(), "cluster_state:ok\r\n");
        };

        tokio::join!(server, client);
    }

    #[tokio::test]
    async fn test_read_frame_peer_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut conn = Connection::new(client);
        assert!(matches!(conn.read_frame().await, Err(Error::Io { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_frame_timeout() {
        let (client, _server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client).with_read_timeout(Some(Duration::from_millis(50)));
        match conn.read_frame().await {
            Err(Error::Io { source }) => assert_eq!(source.kind(), io::ErrorKind::TimedOut),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_node_connection_auth_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let auth = conn.read_frame().await.unwrap();
            assert_eq!(
                auth,
                Frame::Array(vec![Frame::bulk("AUTH"), Frame::bulk("secret")])
            );
            conn.write_frame(&Frame::SimpleString(b"OK".to_vec()))
                .await
                .unwrap();
            let _ping = conn.read_frame().await.unwrap();
            conn.write_frame(&Frame::SimpleString(b"PONG".to_vec()))
                .await
                .unwrap();
        });

        let config = AdminConfig {
            password: Some("secret".to_string()),
            ..AdminConfig::default()
        };
        let node = NodeConnection::connect(&addr, &config).await.unwrap();
        assert_eq!(node.address(), addr);
        let reply = node.send(command::ping()).await.unwrap();
        assert_eq!(reply, Frame::SimpleString(b"PONG".to_vec()));

        node.close().await.unwrap();
        assert!(matches!(node.send(command::ping()).await, Err(Error::Closed)));
        // closing twice is fine
        node.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_node_connection_auth_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let _auth = conn.read_frame().await.unwrap();
            conn.write_frame(&Frame::Error(b"WRONGPASS invalid password".to_vec()))
                .await
                .unwrap();
        });

        let config = AdminConfig {
            password: Some("nope".to_string()),
            ..AdminConfig::default()
        };
        let result = NodeConnection::connect(&addr, &config).await;
        assert!(matches!(result, Err(Error::Auth)));
        server.await.unwrap();
    }
}
