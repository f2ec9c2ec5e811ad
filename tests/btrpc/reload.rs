use std::time::Duration;

use bt_share::error::Status;
use bt_share::share::SharesSnapshot;
use bt_share::wire::{Arg, Command};

use super::common::Fixture;

#[tokio::test]
async fn reload_removing_a_share_disconnects_its_sessions() {
    let fixture = Fixture::new("share \"{path}\" as \"pub\"\n").await;
    let (transport, root_vnid) = fixture.mount("pub").await;

    // One request while the session is still live: answered normally.
    transport.call(Command::Stat, &[Arg::UInt64(root_vnid)]).await.expect("stat succeeds before reload");

    // Drop the share entirely and apply the diff, the same way `server::reload`
    // would after reading a changed config file (`spec.md` §4.4).
    let outcome = fixture.shares.reload(SharesSnapshot::default()).await;
    assert_eq!(outcome.removed, vec![0]);
    fixture.sessions.apply_reload(&outcome.rebinds, &outcome.removed).await;

    // A second in-flight request is still answered (the server only notices
    // `killed` at the top of its next loop iteration), but the one after
    // that finds the connection torn down and the client has to reconnect,
    // landing on a fresh, unmounted connection that rejects anything but
    // `Mount` (`spec.md` §4.3).
    transport.call(Command::Stat, &[Arg::UInt64(root_vnid)]).await.expect("stat succeeds one more time");

    let result = tokio::time::timeout(
        Duration::from_secs(15),
        transport.call(Command::Stat, &[Arg::UInt64(root_vnid)]),
    )
    .await
    .expect("call eventually resolves instead of hanging forever");
    assert_eq!(result.unwrap_err().status(), Status::NotSupported);
}
