//! A small async client for the lobby protocol.

use matchhall_protocol::{Codec, JsonCodec, Request, Response};
use matchhall_transport::{DEFAULT_MAX_FRAME_LEN, TransportError, read_frame, write_frame};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::LobbyError;

/// One connection to a lobby server.
///
/// Requests are answered in order, so every call waits for its own
/// response before returning.
///
/// ```rust,no_run
/// use matchhall::LobbyClient;
/// use serde_json::json;
///
/// # async fn run() -> Result<(), matchhall::LobbyError> {
/// let mut client = LobbyClient::connect("127.0.0.1:8888").await?;
/// client.login("alice", "pw").await?;
/// let rooms = client.request("get_room_list", json!({})).await?;
/// println!("{:?}", rooms.data);
/// # Ok(())
/// # }
/// ```
pub struct LobbyClient {
    stream: TcpStream,
    codec: JsonCodec,
    max_frame_len: usize,
}

impl LobbyClient {
    /// Connects to a lobby.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, LobbyError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(Self {
            stream,
            codec: JsonCodec,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Sends a player request and waits for the response.
    pub async fn request(&mut self, action: &str, data: Value) -> Result<Response, LobbyError> {
        self.send(&Request::new(action, data)).await
    }

    /// Sends an arbitrary request record and waits for the response.
    pub async fn send(&mut self, request: &Request) -> Result<Response, LobbyError> {
        let payload = self.codec.encode(request)?;
        self.send_raw(&payload).await?;
        self.recv()
            .await?
            .ok_or(LobbyError::ConnectionClosed)
    }

    /// Writes `payload` as one frame without waiting for a reply.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<(), LobbyError> {
        write_frame(&mut self.stream, payload, self.max_frame_len).await?;
        Ok(())
    }

    /// Reads the next response. `Ok(None)` means the server closed the
    /// connection.
    pub async fn recv(&mut self) -> Result<Option<Response>, LobbyError> {
        match read_frame(&mut self.stream, self.max_frame_len).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// `register` with a username and password.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<Response, LobbyError> {
        self.request(
            "register",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// `login` with a username and password.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Response, LobbyError> {
        self.request("login", json!({ "username": username, "password": password }))
            .await
    }

    /// Shuts down the write side; the server sees a clean disconnect.
    pub async fn close(mut self) -> Result<(), LobbyError> {
        self.stream
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }
}
