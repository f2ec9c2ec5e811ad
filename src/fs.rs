//! The local filesystem backend (`spec.md` §4.7): every handler bottoms
//! out here rather than touching `tokio::fs` directly, so path resolution,
//! attribute storage, and error mapping live in one place.
//!
//! Extended attributes and the index/query family have no equivalent in
//! `std`/`tokio` without a new syscall-binding dependency, so both are
//! backed by a sidecar file (`.btattr.<name>`) next to the node they
//! describe — plain files, read and written through the same `tokio::fs`
//! calls as everything else (see `DESIGN.md`).

use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tokio::fs;

use crate::error::{Error, Result, Status};
use crate::wire::stat::Stat;

/// Attribute sidecar files are prefixed so a directory listing can filter
/// them out of `ReadDir` without maintaining a separate index.
const ATTR_PREFIX: &str = ".btattr.";

pub async fn stat(path: &Path) -> Result<Stat> {
    let metadata = fs::symlink_metadata(path).await?;
    Ok(to_wire_stat(&metadata))
}

fn to_wire_stat(metadata: &std::fs::Metadata) -> Stat {
    Stat {
        nlink: metadata.nlink() as u32,
        uid: metadata.uid(),
        gid: metadata.gid(),
        size: metadata.len(),
        blksize: metadata.blksize() as u32,
        rdev: metadata.rdev() as u32,
        ino: metadata.ino(),
        mode: metadata.mode(),
        atime: metadata.atime() as u32,
        mtime: metadata.mtime() as u32,
        ctime: metadata.ctime() as u32,
    }
}

pub async fn lookup(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::symlink_metadata(&path).await?;
    Ok(path)
}

/// Lists non-attribute directory entries in name order, starting after
/// `cookie` entries and returning at most `MAX_PAGE` (`spec.md` §4.7.2).
pub const MAX_PAGE: usize = 32;

pub async fn read_dir(path: &Path, cookie: u64) -> Result<(Vec<String>, Option<u64>)> {
    let mut entries = Vec::new();
    let mut dir = fs::read_dir(path).await?;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(ATTR_PREFIX) {
            entries.push(name);
        }
    }
    entries.sort();

    let start = cookie as usize;
    if start > entries.len() {
        return Err(Error::Status(Status::RangeError));
    }
    let page: Vec<String> = entries[start..].iter().take(MAX_PAGE).cloned().collect();
    let next_cookie = if start + page.len() < entries.len() { Some((start + page.len()) as u64) } else { None };
    Ok((page, next_cookie))
}

pub async fn read(path: &Path, offset: u64, len: u32) -> Result<Vec<u8>> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    let mut file = fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len as usize];
    let n = file.read(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}

pub async fn write(path: &Path, offset: u64, data: &[u8]) -> Result<u32> {
    use tokio::io::{AsyncSeekExt, AsyncWriteExt};
    let mut file = fs::OpenOptions::new().write(true).open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    file.write_all(data).await?;
    Ok(data.len() as u32)
}

pub async fn create(dir: &Path, name: &str, mode: u32, exclusive: bool) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true);
    if exclusive {
        options.create_new(true);
    } else {
        options.truncate(true);
    }
    drop(options.open(&path).await?);
    fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(path)
}

pub async fn truncate(path: &Path, len: u64) -> Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    Ok(())
}

pub async fn mkdir(dir: &Path, name: &str, mode: u32) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::create_dir(&path).await?;
    fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(path)
}

pub async fn rmdir(dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    let mut entries = fs::read_dir(&path).await?;
    if entries.next_entry().await?.is_some() {
        return Err(Error::Status(Status::NotEmpty));
    }
    fs::remove_dir(&path).await.map_err(Error::from)
}

pub async fn rename(from_dir: &Path, from_name: &str, to_dir: &Path, to_name: &str) -> Result<()> {
    fs::rename(from_dir.join(from_name), to_dir.join(to_name)).await.map_err(Error::from)
}

pub async fn unlink(dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    let metadata = fs::symlink_metadata(&path).await?;
    if metadata.is_dir() {
        return Err(Error::Status(Status::IsDir));
    }
    fs::remove_file(&path).await.map_err(Error::from)
}

pub async fn read_link(path: &Path) -> Result<String> {
    let target = fs::read_link(path).await?;
    Ok(target.to_string_lossy().into_owned())
}

pub async fn symlink(dir: &Path, name: &str, target: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    tokio::fs::symlink(target, &path).await?;
    Ok(path)
}

/// Applies the subset of stat fields a client may set (`spec.md` §4.7:
/// "WStat ... mode, uid, gid, atime, mtime").
pub async fn wstat(path: &Path, mode: Option<u32>, atime: Option<u32>, mtime: Option<u32>) -> Result<()> {
    if let Some(mode) = mode {
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    if atime.is_some() || mtime.is_some() {
        let metadata = fs::symlink_metadata(path).await?;
        let current_atime = filetime::FileTime::from_unix_time(metadata.atime(), 0);
        let current_mtime = filetime::FileTime::from_unix_time(metadata.mtime(), 0);
        let new_atime = atime
            .map(|t| filetime::FileTime::from_unix_time(t as i64, 0))
            .unwrap_or(current_atime);
        let new_mtime = mtime
            .map(|t| filetime::FileTime::from_unix_time(t as i64, 0))
            .unwrap_or(current_mtime);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_times(&path, new_atime, new_mtime))
            .await
            .map_err(|_| Error::Status(Status::InvalidArgument))?
            .map_err(Error::from)?;
    }
    Ok(())
}

fn attr_sidecar(path: &Path, name: &str) -> PathBuf {
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!("{ATTR_PREFIX}{file_name}.{name}"))
}

pub async fn read_attrib(path: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(attr_sidecar(path, name)).await.map_err(Error::from)
}

pub async fn write_attrib(path: &Path, name: &str, data: &[u8]) -> Result<u32> {
    fs::write(attr_sidecar(path, name), data).await.map_err(Error::from)?;
    Ok(data.len() as u32)
}

pub async fn remove_attrib(path: &Path, name: &str) -> Result<()> {
    fs::remove_file(attr_sidecar(path, name)).await.map_err(Error::from)
}

/// Lists attribute names set on `path`, scanning its parent for matching
/// sidecar files, paginated the same way as [`read_dir`]: up to [`MAX_PAGE`]
/// names starting after `cookie`, with the cookie to resume at if more
/// remain (`spec.md` §4.7.2: "Both `ReadDir` and `ReadAttribDir` ... embed
/// an opaque cookie that the server hands back unchanged except for a
/// counter it uses to resume").
pub async fn read_attrib_dir(path: &Path, cookie: u64) -> Result<(Vec<String>, Option<u64>)> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let prefix = format!("{ATTR_PREFIX}{file_name}.");

    let mut names = Vec::new();
    let mut dir = fs::read_dir(parent).await?;
    while let Some(entry) = dir.next_entry().await? {
        let entry_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(attr_name) = entry_name.strip_prefix(&prefix) {
            names.push(attr_name.to_string());
        }
    }
    names.sort();

    let start = cookie as usize;
    if start > names.len() {
        return Err(Error::Status(Status::RangeError));
    }
    let page: Vec<String> = names[start..].iter().take(MAX_PAGE).cloned().collect();
    let next_cookie = if start + page.len() < names.len() { Some((start + page.len()) as u64) } else { None };
    Ok((page, next_cookie))
}

/// The `atime`/`utime` metadata is exposed in seconds, but Unix epoch
/// timestamps in a `u32` roll over in 2106 — outside this crate's scope
/// (`spec.md`'s wire format is itself 32-bit).
pub fn now_unix() -> u32 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
