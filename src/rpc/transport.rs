//! The client-side transport (`spec.md` §4.2): a persistent connection
//! multiplexing concurrent calls by XID, with bounded retry and a
//! reconnect inserted between the second and third attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::warn;

use crate::error::{Error, Result, Status};
use crate::wire::command::Command;
use crate::wire::frame::{read_frame, write_frame};
use crate::wire::request;
use crate::wire::response::{self, Response};
use crate::wire::Arg;

/// Per-call timeout (`spec.md` §4.2, §5).
const CALL_TIMEOUT: Duration = Duration::from_millis(2500);
/// Total send attempts before giving up (`spec.md` §4.2: "retried up to
/// four times with a reconnect between the second and third attempt").
const MAX_ATTEMPTS: u32 = 4;
/// The attempt number (1-based) after which a reconnect is attempted.
const RECONNECT_AFTER_ATTEMPT: u32 = 2;

type PendingMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Response>>>>;

/// Guards reconnection so a flood of simultaneously-timing-out callers
/// reconnects at most once per failure: each caller remembers the epoch
/// it last saw, and only reconnects if the epoch under the lock hasn't
/// already moved past it (`spec.md` §8: XID demultiplexing / reconnect
/// scenarios).
struct ReconnectGate {
    lock: Mutex<()>,
    epoch: AtomicU64,
}

/// A connection to the file-service port, reconnectable and shared by any
/// number of concurrent callers.
pub struct Transport {
    addr: std::net::SocketAddr,
    write_half: Mutex<tokio::net::tcp::OwnedWriteHalf>,
    pending: PendingMap,
    next_xid: AtomicU32,
    reconnect: ReconnectGate,
}

impl Transport {
    pub async fn connect(addr: std::net::SocketAddr) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(addr).await.map_err(|_| Error::Status(Status::HostUnreachable))?;
        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        spawn_reader(read_half, pending.clone());

        Ok(Arc::new(Transport {
            addr,
            write_half: Mutex::new(write_half),
            pending,
            next_xid: AtomicU32::new(1),
            reconnect: ReconnectGate { lock: Mutex::new(()), epoch: AtomicU64::new(0) },
        }))
    }

    fn allocate_xid(&self) -> u32 {
        self.next_xid.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends `command(args)` and waits for its correlated reply, retrying
    /// across reconnects per `spec.md` §4.2.
    pub async fn call(&self, command: Command, args: &[Arg]) -> Result<Vec<u8>> {
        let xid = self.allocate_xid();
        let body = request::encode(command, args, xid)?;

        let mut last_error = Error::Status(Status::HostUnreachable);
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > RECONNECT_AFTER_ATTEMPT {
                self.reconnect_if_needed().await?;
            }

            let (tx, rx) = oneshot::channel();
            self.pending.lock().await.insert(xid, tx);

            if let Err(error) = self.send_frame(xid, &body).await {
                self.pending.lock().await.remove(&xid);
                last_error = error;
                continue;
            }

            match timeout(CALL_TIMEOUT, rx).await {
                Ok(Ok(response)) => {
                    return if response.status == 0 {
                        Ok(response.payload)
                    } else {
                        Err(Error::Status(Status::from_wire(response.status)))
                    };
                }
                Ok(Err(_)) => {
                    last_error = Error::Protocol;
                }
                Err(_) => {
                    self.pending.lock().await.remove(&xid);
                    last_error = Error::Status(Status::HostUnreachable);
                    warn!(xid, attempt, "call timed out");
                }
            }
        }
        Err(last_error)
    }

    async fn send_frame(&self, xid: u32, body: &[u8]) -> Result<()> {
        let mut write_half = self.write_half.lock().await;
        write_frame(&mut *write_half, xid, body).await
    }

    /// Sends `command(args)` without waiting for a reply. The only client
    /// use is `Write`: the server never acknowledges an individual
    /// gathered-write chunk, so waiting here would just burn the call
    /// timeout (`spec.md` §4.7.1). A failed chunk surfaces later, at the
    /// `Commit` call's status.
    pub async fn send_only(&self, command: Command, args: &[Arg]) -> Result<()> {
        let xid = self.allocate_xid();
        let body = request::encode(command, args, xid)?;
        self.send_frame(xid, &body).await
    }

    async fn reconnect_if_needed(&self) -> Result<()> {
        let seen_epoch = self.reconnect.epoch.load(Ordering::Acquire);
        let _guard = self.reconnect.lock.lock().await;
        if self.reconnect.epoch.load(Ordering::Acquire) != seen_epoch {
            return Ok(()); // another caller already reconnected for this failure
        }

        let stream = TcpStream::connect(self.addr).await.map_err(|_| Error::Status(Status::HostUnreachable))?;
        let (read_half, new_write_half) = stream.into_split();
        spawn_reader(read_half, self.pending.clone());
        *self.write_half.lock().await = new_write_half;
        self.reconnect.epoch.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

fn spawn_reader(mut read_half: tokio::net::tcp::OwnedReadHalf, pending: PendingMap) {
    tokio::spawn(async move {
        loop {
            let frame = match read_frame(&mut read_half).await {
                Ok(frame) => frame,
                Err(_) => break,
            };
            let response = match response::decode(&frame.body) {
                Ok(response) => response,
                Err(_) => continue,
            };
            if let Some(sender) = pending.lock().await.remove(&response.xid) {
                let _ = sender.send(response);
            }
        }
    });
}

impl Transport {
    /// Forces a write-half shutdown; used by tests and graceful client exit.
    pub async fn close(&self) {
        let _ = self.write_half.lock().await.shutdown().await;
    }
}
