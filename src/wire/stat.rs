//! The fixed stat tuple carried by `Lookup`, `Stat`, `Create`, `MkDir`
//! (`spec.md` §4.1): eleven integers in a fixed order.

use std::io::{Read, Write};

use crate::error::Result;
use crate::wire::primitive;

/// `{nlink, uid, gid, size:64, blksize, rdev, ino:64, mode, atime, mtime, ctime}`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stat {
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blksize: u32,
    pub rdev: u32,
    pub ino: u64,
    pub mode: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

pub fn decode(src: &mut impl Read) -> Result<Stat> {
    Ok(Stat {
        nlink: primitive::u32(src)?,
        uid: primitive::u32(src)?,
        gid: primitive::u32(src)?,
        size: primitive::u64(src)?,
        blksize: primitive::u32(src)?,
        rdev: primitive::u32(src)?,
        ino: primitive::u64(src)?,
        mode: primitive::u32(src)?,
        atime: primitive::u32(src)?,
        mtime: primitive::u32(src)?,
        ctime: primitive::u32(src)?,
    })
}

pub fn encode(dest: &mut impl Write, stat: &Stat) -> Result<()> {
    primitive::write_u32(dest, stat.nlink)?;
    primitive::write_u32(dest, stat.uid)?;
    primitive::write_u32(dest, stat.gid)?;
    primitive::write_u64(dest, stat.size)?;
    primitive::write_u32(dest, stat.blksize)?;
    primitive::write_u32(dest, stat.rdev)?;
    primitive::write_u64(dest, stat.ino)?;
    primitive::write_u32(dest, stat.mode)?;
    primitive::write_u32(dest, stat.atime)?;
    primitive::write_u32(dest, stat.mtime)?;
    primitive::write_u32(dest, stat.ctime)
}
