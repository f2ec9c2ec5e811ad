use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bt_share::rpc::Transport;
use bt_share::session::{accept_loop, SessionList, DEFAULT_FAN_OUT_LIMIT};
use bt_share::share::ShareTable;
use bt_share::vnode::VnodeCache;
use bt_share::wire::{primitive, Arg, Command};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A running service bound to a loopback port, backed by a temp-dir share
/// root, plus the handles a test needs to mount, reload, or inspect it.
pub struct Fixture {
    pub tempdir: TempDir,
    pub shares: Arc<ShareTable>,
    pub sessions: Arc<SessionList>,
    pub addr: SocketAddr,
}

impl Fixture {
    /// `config_template` may contain the literal `{path}` placeholder,
    /// substituted with the fixture's generated share root.
    pub async fn new(config_template: &str) -> Self {
        Self::with_fan_out_limit(config_template, DEFAULT_FAN_OUT_LIMIT).await
    }

    pub async fn with_fan_out_limit(config_template: &str, fan_out_limit: usize) -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let share_path = tempdir.path().join("share");
        std::fs::create_dir(&share_path).expect("create share root");

        let source = config_template.replace("{path}", &share_path.display().to_string());
        let snapshot = bt_share::config::load(&source, bt_share::auth::DEFAULT_AUTH_PORT)
            .await
            .expect("config loads");

        let shares = Arc::new(ShareTable::new(snapshot));
        let sessions = Arc::new(SessionList::new());
        let vnodes = Arc::new(VnodeCache::new());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("local addr");

        let accept_shares = shares.clone();
        let accept_sessions = sessions.clone();
        tokio::spawn(async move {
            let _ = accept_loop(listener, accept_shares, accept_sessions, vnodes, fan_out_limit).await;
        });

        Fixture { tempdir, shares, sessions, addr }
    }

    pub fn share_root(&self) -> PathBuf {
        self.tempdir.path().join("share")
    }

    /// Mounts `share_name` with no credentials, returning the transport and
    /// the share root's vnid.
    pub async fn mount(&self, share_name: &str) -> (Arc<Transport>, u64) {
        let transport = Transport::connect(self.addr).await.expect("connect");
        let payload = transport
            .call(
                Command::Mount,
                &[Arg::Str(share_name.to_string()), Arg::Str("tester".to_string()), Arg::Bytes(vec![0u8; 128])],
            )
            .await
            .expect("mount succeeds");
        let mut cursor = Cursor::new(payload);
        let root_vnid = primitive::u64(&mut cursor).expect("decode root vnid");
        (transport, root_vnid)
    }
}
