use std::io::Cursor;

use bt_share::error::Status;
use bt_share::wire::{primitive, Arg, Command};

use super::common::Fixture;

#[tokio::test]
async fn chunked_write_then_commit_is_visible_on_read_back() {
    let fixture = Fixture::new("share \"{path}\" as \"docs\"\nset \"docs\" read-write\n").await;
    let (transport, root_vnid) = fixture.mount("docs").await;

    let create_payload = transport
        .call(Command::Create, &[Arg::UInt64(root_vnid), Arg::Str("report.txt".to_string()), Arg::UInt32(0), Arg::UInt32(0o644)])
        .await
        .expect("create succeeds");
    let vnid = primitive::u64(&mut Cursor::new(create_payload)).unwrap();

    // First chunk opens the block (totalLen > 0); second appends (totalLen == 0).
    // Neither gets a reply -- only `Commit` does (`spec.md` §4.7.1).
    transport
        .send_only(Command::Write, &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(3), Arg::UInt32(6), Arg::Bytes(b"foo".to_vec())])
        .await
        .expect("first chunk sent");
    transport
        .send_only(Command::Write, &[Arg::UInt64(vnid), Arg::UInt64(3), Arg::UInt32(3), Arg::UInt32(0), Arg::Bytes(b"bar".to_vec())])
        .await
        .expect("second chunk sent");

    transport.call(Command::Commit, &[Arg::UInt64(vnid)]).await.expect("commit succeeds");

    let read_payload = transport
        .call(Command::Read, &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(6)])
        .await
        .expect("read succeeds");
    let data = primitive::bytes(&mut Cursor::new(read_payload), 6).unwrap();
    assert_eq!(data, b"foobar");

    let second_commit = transport.call(Command::Commit, &[Arg::UInt64(vnid)]).await;
    assert_eq!(second_commit.unwrap_err().status(), Status::NoEntry);
}
