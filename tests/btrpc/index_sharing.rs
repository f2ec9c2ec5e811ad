use bt_share::wire::{Arg, Command};

use super::common::Fixture;

/// `SPEC_FULL.md` §4.7: indices are a per-share feature. An index created
/// by one mounted session must be visible to a second session mounting
/// the same share, not just to the connection that created it.
#[tokio::test]
async fn index_created_by_one_session_is_visible_to_another() {
    let fixture = Fixture::new("share \"{path}\" as \"docs\"\nset \"docs\" read-write\n").await;

    let (first, _root_vnid) = fixture.mount("docs").await;
    first
        .call(Command::CreateIndex, &[Arg::Str("owner".to_string()), Arg::UInt32(2)])
        .await
        .expect("create index succeeds");

    let (second, _root_vnid2) = fixture.mount("docs").await;
    let reply = second.call(Command::ReadIndexDir, &[Arg::UInt64(0)]).await.expect("read index dir succeeds");

    let mut cursor = std::io::Cursor::new(reply);
    let count = bt_share::wire::primitive::u32(&mut cursor).unwrap();
    assert_eq!(count, 1);
    let name = bt_share::wire::primitive::string(&mut cursor, 64).unwrap();
    assert_eq!(name, "owner");
}
