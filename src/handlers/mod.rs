//! Per-request handlers (`spec.md` §4.7): each takes the validated argument
//! vector the session loop already checked against [`crate::wire::command::spec_for`]
//! and returns an encoded reply payload.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result, Status};
use crate::index::IndexTable;
use crate::vnode::VnodeCache;
use crate::wire::arg::Arg;
use crate::wire::command::Command;
use crate::wire::primitive;
use crate::wire::stat;
use crate::writeblock::WriteBlocks;

/// Everything a handler needs beyond the request's own arguments: the
/// mounted share's local root, the process-wide vnode cache, and this
/// session's gathered-write state. `indexes` is shared with every other
/// session mounting the same share (`crate::index::IndexRegistry`), not
/// owned by this session.
pub struct HandlerState {
    pub share_root: PathBuf,
    pub read_only: bool,
    pub vnodes: Arc<VnodeCache>,
    pub write_blocks: WriteBlocks,
    pub indexes: Arc<IndexTable>,
}

impl HandlerState {
    async fn resolve_dir(&self, vnid: u64) -> Result<PathBuf> {
        self.vnodes
            .render_path(&self.share_root, vnid)
            .await
            .ok_or(Error::Status(Status::NoEntry))
    }
}

/// Dispatches one already-rights-checked request, returning the raw reply
/// payload (`spec.md` §4.1: "payload ... present only on success").
pub async fn dispatch(state: &mut HandlerState, command: Command, args: &[Arg]) -> Result<Vec<u8>> {
    match command {
        Command::PreMount => Ok(Vec::new()),
        Command::FsInfo => fs_info(state).await,
        Command::Lookup => lookup(state, args).await,
        Command::Stat => stat_handler(state, args).await,
        Command::ReadDir => read_dir(state, args).await,
        Command::Read => read(state, args).await,
        Command::Write => write(state, args).await,
        Command::Create => create(state, args).await,
        Command::Truncate => truncate(state, args).await,
        Command::MkDir => mkdir(state, args).await,
        Command::RmDir => rmdir(state, args).await,
        Command::Rename => rename(state, args).await,
        Command::Unlink => unlink(state, args).await,
        Command::ReadLink => read_link(state, args).await,
        Command::SymLink => symlink(state, args).await,
        Command::WStat => wstat(state, args).await,
        Command::ReadAttrib => read_attrib(state, args).await,
        Command::WriteAttrib => write_attrib(state, args).await,
        Command::ReadAttribDir => read_attrib_dir(state, args).await,
        Command::RemoveAttrib => remove_attrib(state, args).await,
        Command::StatAttrib => stat_attrib(state, args).await,
        Command::ReadIndexDir => read_index_dir(state).await,
        Command::CreateIndex => create_index(state, args).await,
        Command::RemoveIndex => remove_index(state, args).await,
        Command::StatIndex => stat_index(state, args).await,
        Command::ReadQuery => read_query(state, args).await,
        Command::Commit => commit(state, args).await,
        Command::Mount | Command::Quit => {
            // Handled by the session loop itself, never reaches dispatch.
            Err(Error::Status(Status::NotSupported))
        }
    }
}

async fn vnid_for(state: &HandlerState, parent_vnid: u64, name: &str, path: &std::path::Path) -> Result<u64> {
    if let Some(existing) = state.vnodes.lookup_child(parent_vnid, name).await {
        return Ok(existing);
    }
    let vnid = state.vnodes.allocate_vnid();
    state.vnodes.add_handle(parent_vnid, vnid, name).await;
    let _ = path;
    Ok(vnid)
}

async fn fs_info(_state: &mut HandlerState) -> Result<Vec<u8>> {
    // Block size and free-space figures are informational only; this crate
    // has no quota model, so it reports a fixed nominal block size.
    let mut out = Vec::new();
    primitive::write_u32(&mut out, 4096)?;
    Ok(out)
}

async fn lookup(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let parent_vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let dir = state.resolve_dir(parent_vnid).await?;
    let path = crate::fs::lookup(&dir, name).await?;
    let vnid = vnid_for(state, parent_vnid, name, &path).await?;
    let stat = crate::fs::stat(&path).await?;

    let mut out = Vec::new();
    primitive::write_u64(&mut out, vnid)?;
    stat::encode(&mut out, &stat)?;
    Ok(out)
}

async fn stat_handler(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let stat = crate::fs::stat(&path).await?;
    let mut out = Vec::new();
    stat::encode(&mut out, &stat)?;
    Ok(out)
}

/// `ReadDir(vnid, cookie)` (`spec.md` §4.7): each of up to 32 records
/// carries `{vnid, name, newCookie, stat}` so a client can populate a
/// directory listing without a follow-up `Stat` per entry. `newCookie` is
/// the cookie that resumes the listing right after this entry, so a client
/// that gives up partway through a page can still resume from where it
/// stopped.
async fn read_dir(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let cookie = args[1].as_u64()?;
    let dir = state.resolve_dir(vnid).await?;
    let (names, next_cookie) = crate::fs::read_dir(&dir, cookie).await?;

    let mut out = Vec::new();
    primitive::write_u32(&mut out, names.len() as u32)?;
    for (i, name) in names.iter().enumerate() {
        let child_path = dir.join(name);
        let child_vnid = vnid_for(state, vnid, name, &child_path).await?;
        let entry_cookie = cookie + i as u64 + 1;
        let stat = crate::fs::stat(&child_path).await?;
        primitive::write_u64(&mut out, child_vnid)?;
        primitive::write_string(&mut out, name)?;
        primitive::write_u64(&mut out, entry_cookie)?;
        stat::encode(&mut out, &stat)?;
    }
    primitive::write_u64(&mut out, next_cookie.unwrap_or(0))?;
    primitive::write_u8(&mut out, next_cookie.is_some() as u8)?;
    Ok(out)
}

async fn read(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let offset = args[1].as_u64()?;
    let len = args[2].as_u32()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let data = crate::fs::read(&path, offset, len).await?;
    let mut out = Vec::new();
    primitive::write_bytes(&mut out, &data)?;
    Ok(out)
}

/// `Write(vnid, pos, chunkLen, totalLen, bytes)` (`spec.md` §4.7.1):
/// `totalLen > 0` opens a new block at `pos`; `totalLen == 0` appends to
/// the block already open for `vnid`. Never produces a reply — the
/// session loop drops this handler's result on the floor for `Write`
/// specifically (`spec.md` §4.7.1, §9: "no per-chunk acknowledgement").
async fn write(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let pos = args[1].as_u64()?;
    let _chunk_len = args[2].as_u32()?;
    let total_len = args[3].as_u32()?;
    let data = args[4].as_bytes()?;

    if total_len > 0 {
        state.write_blocks.begin(vnid, pos, total_len as u64)?;
    }
    state.write_blocks.append(vnid, data)?;
    Ok(Vec::new())
}

async fn create(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let parent_vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let flags = args[2].as_u32()?;
    let mode = args[3].as_u32()?;
    let exclusive = flags & 0x1 != 0;

    let dir = state.resolve_dir(parent_vnid).await?;
    let path = crate::fs::create(&dir, name, mode, exclusive).await?;
    let vnid = vnid_for(state, parent_vnid, name, &path).await?;
    let stat = crate::fs::stat(&path).await?;

    let mut out = Vec::new();
    primitive::write_u64(&mut out, vnid)?;
    stat::encode(&mut out, &stat)?;
    Ok(out)
}

async fn truncate(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let len = args[1].as_u64()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    crate::fs::truncate(&path, len).await?;
    Ok(Vec::new())
}

async fn mkdir(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let parent_vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let mode = args[2].as_u32()?;
    let dir = state.resolve_dir(parent_vnid).await?;
    let path = crate::fs::mkdir(&dir, name, mode).await?;
    let vnid = vnid_for(state, parent_vnid, name, &path).await?;
    let stat = crate::fs::stat(&path).await?;

    let mut out = Vec::new();
    primitive::write_u64(&mut out, vnid)?;
    stat::encode(&mut out, &stat)?;
    Ok(out)
}

async fn rmdir(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let parent_vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let dir = state.resolve_dir(parent_vnid).await?;
    crate::fs::rmdir(&dir, name).await?;
    if let Some(child_vnid) = state.vnodes.lookup_child(parent_vnid, name).await {
        state.vnodes.purge_subtree(child_vnid).await;
    }
    Ok(Vec::new())
}

async fn rename(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let from_parent = args[0].as_u64()?;
    let from_name = args[1].as_str()?;
    let to_parent = args[2].as_u64()?;
    let to_name = args[3].as_str()?;

    let from_dir = state.resolve_dir(from_parent).await?;
    let to_dir = state.resolve_dir(to_parent).await?;
    crate::fs::rename(&from_dir, from_name, &to_dir, to_name).await?;

    if let Some(vnid) = state.vnodes.lookup_child(from_parent, from_name).await {
        state.vnodes.remove_handle(vnid).await;
    }
    Ok(Vec::new())
}

async fn unlink(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let parent_vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let dir = state.resolve_dir(parent_vnid).await?;
    crate::fs::unlink(&dir, name).await?;
    if let Some(vnid) = state.vnodes.lookup_child(parent_vnid, name).await {
        state.vnodes.remove_handle(vnid).await;
    }
    Ok(Vec::new())
}

async fn read_link(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let target = crate::fs::read_link(&path).await?;
    let mut out = Vec::new();
    primitive::write_string(&mut out, &target)?;
    Ok(out)
}

async fn symlink(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let parent_vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let target = args[2].as_str()?;
    let dir = state.resolve_dir(parent_vnid).await?;
    let path = crate::fs::symlink(&dir, name, target).await?;
    let vnid = vnid_for(state, parent_vnid, name, &path).await?;
    let mut out = Vec::new();
    primitive::write_u64(&mut out, vnid)?;
    Ok(out)
}

async fn wstat(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let mode = args[1].as_u32()?;
    let mask = args[2].as_u32()?;
    let _uid = args[3].as_u32()?;
    let _gid = args[4].as_u32()?;
    let atime = args[5].as_u64()? as u32;
    let mtime = args[6].as_u64()? as u32;
    let _ctime = args[7].as_u64()?;

    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;

    const MASK_MODE: u32 = 0x1;
    const MASK_ATIME: u32 = 0x2;
    const MASK_MTIME: u32 = 0x4;
    crate::fs::wstat(
        &path,
        (mask & MASK_MODE != 0).then_some(mode),
        (mask & MASK_ATIME != 0).then_some(atime),
        (mask & MASK_MTIME != 0).then_some(mtime),
    )
    .await?;
    Ok(Vec::new())
}

/// Names starting with `_trk/` are a legacy client convenience the original
/// Tracker file manager relied on; this crate keeps filtering them out of
/// attribute listings rather than exposing them as ordinary attributes.
const TRACKER_PREFIX: &str = "_trk/";

async fn read_attrib(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let _type = args[2].as_u32()?;
    let _offset = args[3].as_u64()?;
    let _len = args[4].as_u32()?;
    if name.starts_with(TRACKER_PREFIX) {
        return Err(Error::Status(Status::NoEntry));
    }
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let data = crate::fs::read_attrib(&path, name).await?;
    let mut out = Vec::new();
    primitive::write_bytes(&mut out, &data)?;
    Ok(out)
}

async fn write_attrib(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let _type = args[2].as_u32()?;
    let data = args[3].as_bytes()?;
    let _offset = args[4].as_u64()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let written = crate::fs::write_attrib(&path, name, data).await?;
    let mut out = Vec::new();
    primitive::write_u32(&mut out, written)?;
    Ok(out)
}

async fn read_attrib_dir(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let cookie = args[1].as_u64()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let (names, next_cookie) = crate::fs::read_attrib_dir(&path, cookie).await?;
    let names: Vec<String> = names.into_iter().filter(|n| !n.starts_with(TRACKER_PREFIX)).collect();

    let mut out = Vec::new();
    primitive::write_u32(&mut out, names.len() as u32)?;
    for name in names {
        primitive::write_string(&mut out, &name)?;
    }
    primitive::write_u64(&mut out, next_cookie.unwrap_or(0))?;
    primitive::write_u8(&mut out, next_cookie.is_some() as u8)?;
    Ok(out)
}

async fn remove_attrib(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    crate::fs::remove_attrib(&path, name).await?;
    Ok(Vec::new())
}

async fn stat_attrib(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let name = args[1].as_str()?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    let data = crate::fs::read_attrib(&path, name).await?;
    let mut out = Vec::new();
    primitive::write_u32(&mut out, data.len() as u32)?;
    Ok(out)
}

async fn read_index_dir(state: &mut HandlerState) -> Result<Vec<u8>> {
    let names = state.indexes.list().await;
    let mut out = Vec::new();
    primitive::write_u32(&mut out, names.len() as u32)?;
    for name in names {
        primitive::write_string(&mut out, &name)?;
    }
    Ok(out)
}

async fn create_index(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let name = args[0].as_str()?;
    let type_tag = args[1].as_u32()?;
    let type_name = match type_tag {
        0 => "int32",
        1 => "int64",
        2 => "float",
        3 => "double",
        4 => "string",
        _ => return Err(Error::Status(Status::InvalidArgument)),
    };
    state.indexes.create(name, type_name).await?;
    Ok(Vec::new())
}

async fn remove_index(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let name = args[0].as_str()?;
    state.indexes.remove(name).await?;
    Ok(Vec::new())
}

async fn stat_index(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let name = args[0].as_str()?;
    let type_name = state.indexes.stat(name).await?;
    let mut out = Vec::new();
    primitive::write_string(&mut out, type_name)?;
    Ok(out)
}

async fn read_query(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let query = args[1].as_str()?;
    let dir = state.resolve_dir(vnid).await?;
    let names = crate::index::evaluate(&dir, query).await?;

    let mut out = Vec::new();
    primitive::write_u32(&mut out, names.len() as u32)?;
    for name in names {
        primitive::write_string(&mut out, &name)?;
    }
    Ok(out)
}

/// Flushes the gathered write block accumulated by prior `Write` chunks to
/// disk and replies — the only point in the protocol where a gathered
/// write gets an acknowledgement (`spec.md` §4.7.1).
async fn commit(state: &mut HandlerState, args: &[Arg]) -> Result<Vec<u8>> {
    let vnid = args[0].as_u64()?;
    let (start_offset, data) = state.write_blocks.take(vnid)?;
    let path = state
        .vnodes
        .render_path(&state.share_root, vnid)
        .await
        .ok_or(Error::Status(Status::NoEntry))?;
    crate::fs::write(&path, start_offset, &data).await?;
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(root: PathBuf) -> HandlerState {
        HandlerState {
            share_root: root,
            read_only: false,
            vnodes: Arc::new(VnodeCache::new()),
            write_blocks: WriteBlocks::new(),
            indexes: Arc::new(IndexTable::new()),
        }
    }

    async fn mount_root(state: &HandlerState) -> u64 {
        let vnid = state.vnodes.allocate_vnid();
        state.vnodes.add_handle(0, vnid, "root").await;
        vnid
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips_vnid() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        let reply =
            dispatch(&mut st, Command::Create, &[Arg::UInt64(root), Arg::Str("a.txt".into()), Arg::UInt32(0), Arg::UInt32(0o644)])
                .await
                .unwrap();
        let created_vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());

        let reply = dispatch(&mut st, Command::Lookup, &[Arg::UInt64(root), Arg::Str("a.txt".into())]).await.unwrap();
        let looked_up_vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());
        assert_eq!(created_vnid, looked_up_vnid);
    }

    #[tokio::test]
    async fn write_then_read_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        let reply =
            dispatch(&mut st, Command::Create, &[Arg::UInt64(root), Arg::Str("a.txt".into()), Arg::UInt32(0), Arg::UInt32(0o644)])
                .await
                .unwrap();
        let vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());

        dispatch(
            &mut st,
            Command::Write,
            &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(2), Arg::UInt32(2), Arg::Bytes(b"hi".to_vec())],
        )
        .await
        .unwrap();
        dispatch(&mut st, Command::Commit, &[Arg::UInt64(vnid)]).await.unwrap();

        let reply = dispatch(&mut st, Command::Read, &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(16)]).await.unwrap();
        let mut cursor = Cursor::new(reply);
        let data = primitive::bytes(&mut cursor, 64).unwrap();
        assert_eq!(data, b"hi");
    }

    #[tokio::test]
    async fn gathered_write_assembles_chunks_in_order_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        let reply =
            dispatch(&mut st, Command::Create, &[Arg::UInt64(root), Arg::Str("a.txt".into()), Arg::UInt32(0), Arg::UInt32(0o644)])
                .await
                .unwrap();
        let vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());

        dispatch(
            &mut st,
            Command::Write,
            &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(3), Arg::UInt32(6), Arg::Bytes(b"foo".to_vec())],
        )
        .await
        .unwrap();
        dispatch(
            &mut st,
            Command::Write,
            &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(3), Arg::UInt32(0), Arg::Bytes(b"bar".to_vec())],
        )
        .await
        .unwrap();
        dispatch(&mut st, Command::Commit, &[Arg::UInt64(vnid)]).await.unwrap();

        let reply = dispatch(&mut st, Command::Read, &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(16)]).await.unwrap();
        let mut cursor = Cursor::new(reply);
        assert_eq!(primitive::bytes(&mut cursor, 64).unwrap(), b"foobar");
    }

    #[tokio::test]
    async fn second_commit_after_success_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        let reply =
            dispatch(&mut st, Command::Create, &[Arg::UInt64(root), Arg::Str("a.txt".into()), Arg::UInt32(0), Arg::UInt32(0o644)])
                .await
                .unwrap();
        let vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());

        dispatch(
            &mut st,
            Command::Write,
            &[Arg::UInt64(vnid), Arg::UInt64(0), Arg::UInt32(1), Arg::UInt32(1), Arg::Bytes(b"x".to_vec())],
        )
        .await
        .unwrap();
        dispatch(&mut st, Command::Commit, &[Arg::UInt64(vnid)]).await.unwrap();
        assert!(dispatch(&mut st, Command::Commit, &[Arg::UInt64(vnid)]).await.is_err());
    }

    #[tokio::test]
    async fn read_attrib_forces_not_found_for_tracker_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        let reply =
            dispatch(&mut st, Command::Create, &[Arg::UInt64(root), Arg::Str("a.txt".into()), Arg::UInt32(0), Arg::UInt32(0o644)])
                .await
                .unwrap();
        let vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());

        let err = dispatch(
            &mut st,
            Command::ReadAttrib,
            &[Arg::UInt64(vnid), Arg::Str("_trk/thumbnail".into()), Arg::UInt32(3), Arg::UInt64(0), Arg::UInt32(16)],
        )
        .await
        .unwrap_err();
        assert_eq!(err, Error::Status(Status::NoEntry));
    }

    #[tokio::test]
    async fn rmdir_purges_cached_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        dispatch(&mut st, Command::MkDir, &[Arg::UInt64(root), Arg::Str("d".into()), Arg::UInt32(0o755)]).await.unwrap();
        let child = st.vnodes.lookup_child(root, "d").await.unwrap();

        dispatch(&mut st, Command::RmDir, &[Arg::UInt64(root), Arg::Str("d".into())]).await.unwrap();
        assert!(st.vnodes.lookup_by_vnid(child).await.is_none());
    }

    #[tokio::test]
    async fn attribute_round_trips_through_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = state(dir.path().to_path_buf());
        let root = mount_root(&st).await;

        let reply =
            dispatch(&mut st, Command::Create, &[Arg::UInt64(root), Arg::Str("a.txt".into()), Arg::UInt32(0), Arg::UInt32(0o644)])
                .await
                .unwrap();
        let vnid = u64::from_le_bytes(reply[0..8].try_into().unwrap());

        let reply = dispatch(
            &mut st,
            Command::WriteAttrib,
            &[Arg::UInt64(vnid), Arg::Str("tag".into()), Arg::UInt32(3), Arg::Bytes(b"v1".to_vec()), Arg::UInt64(0)],
        )
        .await
        .unwrap();
        assert_eq!(u32::from_le_bytes(reply[0..4].try_into().unwrap()), 2);

        let reply = dispatch(
            &mut st,
            Command::ReadAttrib,
            &[Arg::UInt64(vnid), Arg::Str("tag".into()), Arg::UInt32(3), Arg::UInt64(0), Arg::UInt32(16)],
        )
        .await
        .unwrap();
        let mut cursor = Cursor::new(reply);
        assert_eq!(primitive::bytes(&mut cursor, 64).unwrap(), b"v1");
    }
}
