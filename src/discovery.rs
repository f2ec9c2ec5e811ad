//! The discovery responder (`spec.md` §4.8): a UDP socket on the
//! companion port answering broadcast probes. `spec.md` leaves the probe
//! request's own framing unspecified beyond its four named kinds, so this
//! crate reuses the main protocol's signature byte string plus a single
//! command byte and a fixed share-name field (`DESIGN.md` records this as
//! a resolved Open Question, not a literal wire fact from `spec.md`).

use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::session::SessionList;
use crate::share::ShareTable;
use crate::wire::frame::SIGNATURE;

/// The legacy default discovery service port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 9093;

const CMD_HOST_PROBE: u8 = 0;
const CMD_SHARE_PROBE: u8 = 1;
const CMD_HOST_INFO: u8 = 2;
const CMD_HOST_USERS: u8 = 3;

const SHARE_NAME_FIELD_LEN: usize = 32;
const RESOURCE_RECORD_NAME_LEN: usize = 256;
const REQUEST_LEN: usize = 5 + 1 + SHARE_NAME_FIELD_LEN;

/// Runs forever, answering probes on `socket` (`spec.md` §4.8: "unknown
/// commands are ignored; replies are unicast to the sender").
pub async fn respond_forever(
    socket: UdpSocket,
    shares: Arc<ShareTable>,
    sessions: Arc<SessionList>,
    max_connections: usize,
) -> std::io::Result<()> {
    let mut buf = [0u8; REQUEST_LEN];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        if len < 6 || &buf[..5] != SIGNATURE {
            continue;
        }

        let reply = match buf[5] {
            CMD_HOST_PROBE => Some(host_probe_reply()),
            CMD_SHARE_PROBE => Some(share_probe_reply(&shares).await),
            CMD_HOST_INFO => Some(host_info_reply(&sessions, max_connections).await),
            CMD_HOST_USERS => Some(host_users_reply(&sessions).await),
            other => {
                debug!(command = other, "discovery: unknown probe ignored");
                None
            }
        };

        if let Some(reply) = reply {
            if let Err(error) = socket.send_to(&reply, peer).await {
                warn!(%peer, ?error, "discovery: reply send failed");
            }
        }
    }
}

fn host_probe_reply() -> Vec<u8> {
    let hostname = hostname_or_default();
    hostname.into_bytes()
}

fn hostname_or_default() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn write_fixed_str(out: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    out.extend_from_slice(&bytes[..n]);
    out.extend(std::iter::repeat(0u8).take(len - n));
}

/// One `{type:4 LE, name:256}` resource record (`spec.md` §4.8).
async fn share_probe_reply(shares: &ShareTable) -> Vec<u8> {
    let mut out = Vec::new();
    let mut index = 0;
    while let Some(share) = shares.get(index).await {
        out.extend_from_slice(&1u32.to_le_bytes());
        write_fixed_str(&mut out, &share.name, RESOURCE_RECORD_NAME_LEN);
        index += 1;
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // terminator record
    out.extend(std::iter::repeat(0u8).take(RESOURCE_RECORD_NAME_LEN));
    out
}

async fn host_info_reply(sessions: &SessionList, max_connections: usize) -> Vec<u8> {
    let mut out = Vec::new();
    write_fixed_str(&mut out, std::env::consts::OS, 64);
    write_fixed_str(&mut out, env!("CARGO_PKG_VERSION"), 64);
    write_fixed_str(&mut out, std::env::consts::ARCH, 64);
    out.extend_from_slice(&(num_cpus() as u32).to_le_bytes());
    out.extend_from_slice(&(sessions.len().await as u32).to_le_bytes());
    out.extend_from_slice(&(max_connections as u32).to_le_bytes());
    out
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// NUL-separated list of peer IP addresses of active sessions, double-NUL
/// terminated (`spec.md` §4.8).
async fn host_users_reply(sessions: &SessionList) -> Vec<u8> {
    let mut out = Vec::new();
    for addr in sessions.peer_addrs().await {
        out.extend_from_slice(addr.ip().to_string().as_bytes());
        out.push(0u8);
    }
    out.push(0u8);
    out
}
