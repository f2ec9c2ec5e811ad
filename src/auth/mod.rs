//! The authentication client (`spec.md` §4.5): a short-lived RPC to the
//! auth server that validates credentials and resolves group memberships.

mod wire;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result, Status};

/// Fixed length of the encrypted credential blob (`spec.md` §4.5).
pub const TOKEN_LEN: usize = 128;

/// Timeout for the whole authenticate/which-groups exchange (`spec.md` §4.5, §5).
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(8);

/// The legacy default authentication service port.
pub const DEFAULT_AUTH_PORT: u16 = 9094;

/// A connection to the authentication server, opened fresh per exchange —
/// unlike the file-service [`crate::rpc::Transport`], this client keeps no
/// persistent socket (`spec.md` §4.5: "authentication client ... one
/// request/response exchange over a fresh TCP connection").
pub struct AuthClient {
    addr: SocketAddr,
}

impl AuthClient {
    pub fn new(addr: SocketAddr) -> Self {
        AuthClient { addr }
    }

    /// Validates `user`'s credential. Any timeout or socket error is
    /// reported as authentication failure (`spec.md` §4.5).
    pub async fn authenticate(&self, user: &str, token: &[u8; TOKEN_LEN]) -> Result<()> {
        timeout(AUTH_TIMEOUT, self.authenticate_inner(user, token))
            .await
            .map_err(|_| Error::Status(Status::HostUnreachable))?
    }

    async fn authenticate_inner(&self, user: &str, token: &[u8; TOKEN_LEN]) -> Result<()> {
        let mut stream = TcpStream::connect(self.addr).await.map_err(|_| {
            Error::Status(Status::HostUnreachable)
        })?;
        wire::send_authenticate(&mut stream, user, token).await?;
        wire::recv_authenticate_reply(&mut stream).await
    }

    /// Resolves the groups `user` belongs to. The server sends a status
    /// prefix per group and terminates the sequence with a non-`ok` status
    /// (`spec.md` §4.5).
    pub async fn which_groups(&self, user: &str) -> Result<Vec<String>> {
        timeout(AUTH_TIMEOUT, self.which_groups_inner(user))
            .await
            .map_err(|_| Error::Status(Status::HostUnreachable))?
    }

    async fn which_groups_inner(&self, user: &str) -> Result<Vec<String>> {
        let mut stream = TcpStream::connect(self.addr).await.map_err(|_| {
            Error::Status(Status::HostUnreachable)
        })?;
        wire::send_which_groups(&mut stream, user).await?;
        wire::recv_which_groups_reply(&mut stream).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn authenticate_succeeds_against_accepting_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 13];
            socket.read_exact(&mut header).await.unwrap();
            let mut len_buf = [0u8; 4];
            socket.read_exact(&mut len_buf).await.unwrap();
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            socket.read_exact(&mut body).await.unwrap();

            let mut reply = Vec::new();
            reply.extend_from_slice(crate::wire::frame::SIGNATURE);
            reply.extend_from_slice(&0u32.to_le_bytes());
            reply.extend_from_slice(&4u32.to_le_bytes());
            reply.extend_from_slice(&0i32.to_le_bytes());
            socket.write_all(&reply).await.unwrap();
        });

        let client = AuthClient::new(addr);
        let result = client.authenticate("alice", &[0u8; TOKEN_LEN]).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn authenticate_fails_when_peer_closes_without_replying() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket); // closes immediately, mid-exchange
        });

        let client = AuthClient::new(addr);
        let result = client.authenticate("alice", &[0u8; TOKEN_LEN]).await;
        assert!(result.is_err());
    }
}
