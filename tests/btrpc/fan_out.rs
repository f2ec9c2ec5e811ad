use std::time::Duration;

use bt_share::error::Status;
use bt_share::rpc::Transport;
use bt_share::wire::{Arg, Command};

use super::common::Fixture;

#[tokio::test]
async fn connection_beyond_fan_out_limit_is_refused() {
    let fixture = Fixture::with_fan_out_limit("share \"{path}\" as \"pub\"\n", 1).await;

    let (_first, _root_vnid) = fixture.mount("pub").await;
    // Give the accepted connection's task a moment to finish registering
    // itself in the session list before the next connect races the check.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = Transport::connect(fixture.addr).await.expect("tcp connect succeeds");
    let result = tokio::time::timeout(
        Duration::from_secs(15),
        second.call(Command::Mount, &[Arg::Str("pub".to_string()), Arg::Str("tester".to_string()), Arg::Bytes(vec![0u8; 128])]),
    )
    .await
    .expect("call eventually resolves instead of hanging forever");

    // The listener replies with a busy status and closes rather than
    // dropping the connection silently (`spec.md` §4.3, §5, §8).
    assert_eq!(result.unwrap_err().status(), Status::Busy);
}
