//! The session layer (`spec.md` §4.3): one TCP connection per session, a
//! single in-flight request/reply loop, and the fan-out cap and reload
//! bookkeeping that ties every open connection back to the share table.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::auth::AuthClient;
use crate::error::{Error, Result, Status};
use crate::handlers::{self, HandlerState};
use crate::index::IndexRegistry;
use crate::lock::PriorityLock;
use crate::principal::Principal;
use crate::share::{compute_rights, Rights, ShareTable};
use crate::vnode::VnodeCache;
use crate::wire::command::Command;
use crate::wire::frame::{read_frame, write_frame};
use crate::wire::request;
use crate::wire::response;
use crate::writeblock::WriteBlocks;

/// Sessions beyond this count are refused at accept time (`spec.md` §4.3,
/// §5: "fan-out limit, default 100").
pub const DEFAULT_FAN_OUT_LIMIT: usize = 100;

/// A live session's share binding, kept outside the per-connection task so
/// [`ShareTable::reload`]'s outcome can rebind or kill it from the outside.
struct SessionHandle {
    id: u64,
    addr: SocketAddr,
    share_index: Arc<AtomicUsize>,
    killed: Arc<AtomicBool>,
}

/// The set of sessions currently mounted against this process's shares.
#[derive(Default)]
pub struct SessionList {
    sessions: PriorityLock<Vec<SessionHandle>>,
    next_id: AtomicUsize,
}

impl SessionList {
    pub fn new() -> Self {
        SessionList { sessions: PriorityLock::new(Vec::new()), next_id: AtomicUsize::new(1) }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Registers a new session bound to `share_index`, returning the shared
    /// state the connection task holds for the rest of its life.
    pub(crate) async fn register(
        &self,
        addr: SocketAddr,
        share_index: usize,
    ) -> (u64, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) as u64;
        let share_index = Arc::new(AtomicUsize::new(share_index));
        let killed = Arc::new(AtomicBool::new(false));
        self.sessions.write().await.push(SessionHandle {
            id,
            addr,
            share_index: share_index.clone(),
            killed: killed.clone(),
        });
        (id, share_index, killed)
    }

    async fn unregister(&self, id: u64) {
        self.sessions.write().await.retain(|s| s.id != id);
    }

    /// Peer addresses of every currently live session, used by the
    /// discovery responder's `HostUsers` probe (`spec.md` §4.8, §3).
    pub async fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.sessions.read().await.iter().map(|s| s.addr).collect()
    }

    /// Applies a reload's diff: rebound shares get their index updated in
    /// place, removed shares get their sessions flagged `killed` so the
    /// next request/reply cycle notices and disconnects (`spec.md` §4.4).
    pub async fn apply_reload(&self, rebinds: &[(usize, usize)], removed: &[usize]) {
        let sessions = self.sessions.read().await;
        for session in sessions.iter() {
            let current = session.share_index.load(Ordering::Relaxed);
            if let Some((_, new_index)) = rebinds.iter().find(|(old, _)| *old == current) {
                session.share_index.store(*new_index, Ordering::Relaxed);
            }
            if removed.contains(&current) {
                session.killed.store(true, Ordering::Relaxed);
            }
        }
    }
}

/// Accepts connections on `listener` forever, refusing beyond the fan-out
/// limit and spawning one task per admitted connection (`spec.md` §4.3).
pub async fn accept_loop(
    listener: tokio::net::TcpListener,
    shares: Arc<ShareTable>,
    sessions: Arc<SessionList>,
    vnodes: Arc<VnodeCache>,
    fan_out_limit: usize,
) -> Result<()> {
    let indexes = Arc::new(IndexRegistry::new());
    loop {
        let (mut stream, addr) = listener.accept().await.map_err(|_| Error::Status(Status::HostUnreachable))?;
        if sessions.len().await >= fan_out_limit {
            warn!(%addr, "refusing connection: fan-out limit reached");
            reject_busy(&mut stream).await;
            continue;
        }

        let shares = shares.clone();
        let sessions = sessions.clone();
        let vnodes = vnodes.clone();
        let indexes = indexes.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, addr, shares, sessions, vnodes, indexes).await {
                info!(%addr, ?error, "session ended");
            }
        });
    }
}

/// Replies to a connection refused for being over the fan-out limit with a
/// `busy` status frame before closing it (`spec.md` §4.3: "Otherwise return
/// a frame carrying a 'busy' status and close"). The client hasn't sent
/// anything we've read yet, so the reply's xid echoes whatever the peer's
/// first frame carries; if even that can't be read, the connection is just
/// dropped, same as any other malformed-frame case.
async fn reject_busy(stream: &mut TcpStream) {
    let xid = match read_frame(stream).await {
        Ok(frame) => frame.xid,
        Err(_) => return,
    };
    if let Ok(body) = response::encode_err(xid, Status::Busy) {
        let _ = write_frame(stream, xid, &body).await;
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    shares: Arc<ShareTable>,
    sessions: Arc<SessionList>,
    vnodes: Arc<VnodeCache>,
    indexes: Arc<IndexRegistry>,
) -> Result<()> {
    let frame = read_frame(&mut stream).await?;
    let req = request::decode(&frame.body)?;
    if req.command != Command::Mount {
        let body = response::encode_err(frame.xid, Status::NotSupported)?;
        write_frame(&mut stream, frame.xid, &body).await?;
        return Ok(());
    }

    let share_name = req.args[0].as_str()?.to_string();
    let user = req.args[1].as_str()?.to_string();
    let token_bytes = req.args[2].as_bytes()?;
    let token: Option<[u8; 128]> = token_bytes.try_into().ok();

    let (share_index, share) = match shares.find_by_name(&share_name).await {
        Some(found) => found,
        None => {
            let body = response::encode_err(frame.xid, Status::NoEntry)?;
            write_frame(&mut stream, frame.xid, &body).await?;
            return Ok(());
        }
    };

    let auth_server = shares.auth_server().await;
    let auth_client = auth_server.map(AuthClient::new);
    let (rights, _principal): (Rights, Principal) =
        match compute_rights(&share, &user, token.as_ref(), auth_client.as_ref()).await {
            Ok(result) => result,
            Err(error) => {
                let body = response::encode_err(frame.xid, error.status())?;
                write_frame(&mut stream, frame.xid, &body).await?;
                return Ok(());
            }
        };

    let root_vnid = vnodes.allocate_vnid();
    vnodes.add_handle(0, root_vnid, &share.name).await;

    let mut reply = Vec::new();
    crate::wire::primitive::write_u64(&mut reply, root_vnid)?;
    let body = response::encode_ok(frame.xid, &reply)?;
    write_frame(&mut stream, frame.xid, &body).await?;

    let (id, share_index_cell, killed) = sessions.register(addr, share_index).await;
    let index_table = indexes.get_or_create(&share.local_path).await;
    let mut state = HandlerState {
        share_root: share.local_path.clone(),
        read_only: share.read_only,
        vnodes,
        write_blocks: WriteBlocks::new(),
        indexes: index_table,
    };

    let result =
        request_reply_loop(&mut stream, &shares, &indexes, &mut state, rights, &share_index_cell, &killed).await;
    sessions.unregister(id).await;
    result
}

async fn request_reply_loop(
    stream: &mut TcpStream,
    shares: &ShareTable,
    indexes: &IndexRegistry,
    state: &mut HandlerState,
    rights: Rights,
    share_index: &AtomicUsize,
    killed: &AtomicBool,
) -> Result<()> {
    loop {
        if killed.load(Ordering::Relaxed) {
            return Ok(());
        }

        let frame = read_frame(stream).await?;
        let req = match request::decode(&frame.body) {
            Ok(req) => req,
            Err(error) => {
                let body = response::encode_err(frame.xid, error.status())?;
                write_frame(stream, frame.xid, &body).await?;
                continue;
            }
        };

        if req.command == Command::Quit {
            return Ok(());
        }

        if let Some(current_share) = shares.get(share_index.load(Ordering::Relaxed)).await {
            if current_share.local_path != state.share_root {
                state.indexes = indexes.get_or_create(&current_share.local_path).await;
            }
            state.share_root = current_share.local_path;
        }

        if req.command.requires_write() && !rights.contains(Rights::WRITE) {
            if req.command == Command::Write {
                continue; // no reply frame either way (`spec.md` §4.7.1)
            }
            let body = response::encode_err(frame.xid, Status::Access)?;
            write_frame(stream, frame.xid, &body).await?;
            continue;
        }
        if !req.command.requires_write() && !rights.contains(Rights::READ) {
            let body = response::encode_err(frame.xid, Status::Access)?;
            write_frame(stream, frame.xid, &body).await?;
            continue;
        }

        // Gathered-write chunks are acknowledged implicitly; any failure
        // surfaces later, at `Commit` (`spec.md` §4.7.1, §9).
        if req.command == Command::Write {
            if let Err(error) = handlers::dispatch(state, req.command, &req.args).await {
                warn!(?error, "gathered write chunk dropped");
            }
            continue;
        }

        let body = match handlers::dispatch(state, req.command, &req.args).await {
            Ok(payload) => response::encode_ok(frame.xid, &payload)?,
            Err(error) => response::encode_err(frame.xid, error.status())?,
        };
        write_frame(stream, frame.xid, &body).await?;
    }
}
