//! Little-endian scalar encodings shared by every frame on the wire
//! (`spec.md` §4.1: "Scalar encodings are little-endian").

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result, Status};

/// Reads a `u8` from the source.
pub fn u8(src: &mut impl Read) -> Result<u8> {
    src.read_u8().map_err(|_| Error::Protocol)
}

/// Reads a `u32` in little-endian order.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<LittleEndian>().map_err(|_| Error::Protocol)
}

/// Reads an `i32` in little-endian order.
pub fn i32(src: &mut impl Read) -> Result<i32> {
    src.read_i32::<LittleEndian>().map_err(|_| Error::Protocol)
}

/// Reads a `u64` in little-endian order.
pub fn u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<LittleEndian>().map_err(|_| Error::Protocol)
}

/// Reads a length-prefixed string: 4-byte LE length, raw UTF-8 bytes, no NUL.
pub fn string(src: &mut impl Read, max_len: usize) -> Result<String> {
    let bytes = bytes(src, max_len)?;
    String::from_utf8(bytes).map_err(|_| Error::Status(Status::InvalidArgument))
}

/// Reads a length-prefixed byte buffer, rejecting lengths above `max_len`.
pub fn bytes(src: &mut impl Read, max_len: usize) -> Result<Vec<u8>> {
    let len = u32(src)? as usize;
    if len > max_len {
        return Err(Error::Status(Status::InvalidArgument));
    }
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf).map_err(|_| Error::Protocol)?;
    Ok(buf)
}

/// Reads a fixed-size byte array (used for the 128-byte auth token).
pub fn array<const N: usize>(src: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).map_err(|_| Error::Protocol)?;
    Ok(buf)
}

/// Writes a `u8`.
pub fn write_u8(dest: &mut impl Write, v: u8) -> Result<()> {
    dest.write_u8(v).map_err(|_| Error::Status(Status::NoMemory))
}

/// Writes a `u32` in little-endian order.
pub fn write_u32(dest: &mut impl Write, v: u32) -> Result<()> {
    dest.write_u32::<LittleEndian>(v).map_err(|_| Error::Status(Status::NoMemory))
}

/// Writes an `i32` in little-endian order.
pub fn write_i32(dest: &mut impl Write, v: i32) -> Result<()> {
    dest.write_i32::<LittleEndian>(v).map_err(|_| Error::Status(Status::NoMemory))
}

/// Writes a `u64` in little-endian order.
pub fn write_u64(dest: &mut impl Write, v: u64) -> Result<()> {
    dest.write_u64::<LittleEndian>(v).map_err(|_| Error::Status(Status::NoMemory))
}

/// Writes a length-prefixed string.
pub fn write_string(dest: &mut impl Write, s: &str) -> Result<()> {
    write_bytes(dest, s.as_bytes())
}

/// Writes a length-prefixed byte buffer.
pub fn write_bytes(dest: &mut impl Write, bytes: &[u8]) -> Result<()> {
    write_u32(dest, bytes.len() as u32)?;
    dest.write_all(bytes).map_err(|_| Error::Status(Status::NoMemory))
}

/// Writes a fixed-size byte array verbatim (no length prefix).
pub fn write_array(dest: &mut impl Write, bytes: &[u8]) -> Result<()> {
    dest.write_all(bytes).map_err(|_| Error::Status(Status::NoMemory))
}
