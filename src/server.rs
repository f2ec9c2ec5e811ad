//! Process wiring (`spec.md` §4, §5): load the share table once, then run
//! the file-service accept loop, the discovery responder, and the
//! reload-on-signal task side by side until one of them exits.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info};

use crate::config;
use crate::discovery;
use crate::session::{self, SessionList, DEFAULT_FAN_OUT_LIMIT};
use crate::share::ShareTable;
use crate::vnode::VnodeCache;

/// The legacy default file-service port (`spec.md` §4, §6).
pub const DEFAULT_SERVICE_PORT: u16 = 9092;

/// Runtime knobs a binary entrypoint collects from its CLI/environment.
pub struct ServerConfig {
    pub config_path: std::path::PathBuf,
    pub service_addr: SocketAddr,
    pub discovery_addr: SocketAddr,
    pub fan_out_limit: usize,
}

/// Loads the share table from `config_path`, binds both sockets, and runs
/// forever. Returns only on a fatal bind/accept error; a reload or a
/// single session ending is not fatal.
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let shares = Arc::new(load_initial_shares(&config.config_path).await?);
    let sessions = Arc::new(SessionList::new());
    let vnodes = Arc::new(VnodeCache::new());

    let service_listener = TcpListener::bind(config.service_addr).await?;
    let discovery_socket = UdpSocket::bind(config.discovery_addr).await?;
    info!(service = %config.service_addr, discovery = %config.discovery_addr, "listening");

    let accept_task = {
        let shares = shares.clone();
        let sessions = sessions.clone();
        let vnodes = vnodes.clone();
        tokio::spawn(async move {
            if let Err(error) = session::accept_loop(service_listener, shares, sessions, vnodes, config.fan_out_limit).await
            {
                error!(?error, "accept loop exited");
            }
        })
    };

    let discovery_task = {
        let shares = shares.clone();
        let sessions = sessions.clone();
        let fan_out_limit = config.fan_out_limit;
        tokio::spawn(async move {
            if let Err(error) = discovery::respond_forever(discovery_socket, shares, sessions, fan_out_limit).await {
                error!(?error, "discovery responder exited");
            }
        })
    };

    let reload_task = {
        let shares = shares.clone();
        let sessions = sessions.clone();
        let config_path = config.config_path.clone();
        tokio::spawn(async move { reload_on_sighup(&shares, &sessions, &config_path).await })
    };

    let _ = tokio::join!(accept_task, discovery_task, reload_task);
    Ok(())
}

/// Reloads the share table every time the process receives `SIGHUP`
/// (`original_source`'s `beserved_server.c` wires the same signal to its
/// own config reread; `spec.md` §4.4 only names the trigger as "a reload
/// signal" without picking one).
async fn reload_on_sighup(shares: &ShareTable, sessions: &SessionList, config_path: &Path) {
    let Ok(mut hangup) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) else {
        error!("could not install SIGHUP handler; config reload is unavailable");
        return;
    };
    loop {
        hangup.recv().await;
        info!("SIGHUP received, reloading share table");
        if let Err(error) = reload(shares, sessions, config_path).await {
            error!(?error, "share table reload failed");
        }
    }
}

/// Reloads the share table from `config_path`, applying the diff to every
/// live session (`spec.md` §4.4). Exposed separately from [`run`] so a
/// binary can wire it to a reload signal (e.g. `SIGHUP`) or an admin call.
pub async fn reload(shares: &ShareTable, sessions: &SessionList, config_path: &Path) -> std::io::Result<()> {
    let snapshot = read_config(config_path).await?;
    let outcome = shares.reload(snapshot).await;
    sessions.apply_reload(&outcome.rebinds, &outcome.removed).await;
    info!(rebinds = outcome.rebinds.len(), removed = outcome.removed.len(), "share table reloaded");
    Ok(())
}

async fn load_initial_shares(config_path: &Path) -> std::io::Result<ShareTable> {
    let snapshot = read_config(config_path).await?;
    Ok(ShareTable::new(snapshot))
}

async fn read_config(config_path: &Path) -> std::io::Result<crate::share::SharesSnapshot> {
    let source = tokio::fs::read_to_string(config_path).await?;
    config::load(&source, crate::auth::DEFAULT_AUTH_PORT)
        .await
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_initial_shares_rejects_missing_config_file() {
        let result = load_initial_shares(Path::new("/nonexistent/bt-share.conf")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reload_applies_empty_diff_against_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bt-share.conf");
        tokio::fs::write(&config_path, "").await.unwrap();

        let shares = ShareTable::new(crate::share::SharesSnapshot::default());
        let sessions = SessionList::new();
        assert!(reload(&shares, &sessions, &config_path).await.is_ok());
    }
}
