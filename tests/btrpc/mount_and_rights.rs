use std::io::Cursor;

use bt_share::error::Status;
use bt_share::wire::{primitive, Arg, Command};

use super::common::Fixture;

#[tokio::test]
async fn unauthenticated_read_only_share_allows_read_and_denies_write() {
    let fixture = Fixture::new("share \"{path}\" as \"pub\"\n").await;
    std::fs::write(fixture.share_root().join("hello.txt"), b"hello world").unwrap();

    let (transport, root_vnid) = fixture.mount("pub").await;

    let lookup_payload = transport
        .call(Command::Lookup, &[Arg::UInt64(root_vnid), Arg::Str("hello.txt".to_string())])
        .await
        .expect("lookup succeeds");
    let file_vnid = primitive::u64(&mut Cursor::new(lookup_payload)).unwrap();

    let read_payload = transport
        .call(Command::Read, &[Arg::UInt64(file_vnid), Arg::UInt64(0), Arg::UInt32(64)])
        .await
        .expect("read succeeds");
    let data = primitive::bytes(&mut Cursor::new(read_payload), 64).unwrap();
    assert_eq!(data, b"hello world");

    let create_result = transport
        .call(Command::Create, &[Arg::UInt64(root_vnid), Arg::Str("new.txt".to_string()), Arg::UInt32(0), Arg::UInt32(0o644)])
        .await;
    assert_eq!(create_result.unwrap_err().status(), Status::Access);
}

#[tokio::test]
async fn mounting_unknown_share_fails() {
    let fixture = Fixture::new("share \"{path}\" as \"pub\"\n").await;
    let transport = bt_share::rpc::Transport::connect(fixture.addr).await.unwrap();
    let result = transport
        .call(Command::Mount, &[Arg::Str("nope".to_string()), Arg::Str("tester".to_string()), Arg::Bytes(vec![0u8; 128])])
        .await;
    assert_eq!(result.unwrap_err().status(), Status::NoEntry);
}
