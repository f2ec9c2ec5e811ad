//! A single tagged request argument (`spec.md` §4.1: `{type:4 LE, length:4
//! LE, bytes:length}`).

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::wire::command::ArgType;
use crate::wire::primitive;

/// One decoded argument, still tagged with the wire type it arrived as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    UInt32(u32),
    UInt64(u64),
    Int32(i32),
    Str(String),
    Bytes(Vec<u8>),
}

impl Arg {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::UInt32(_) => ArgType::UInt32,
            Arg::UInt64(_) => ArgType::UInt64,
            Arg::Int32(_) => ArgType::Int32,
            Arg::Str(_) => ArgType::String,
            Arg::Bytes(_) => ArgType::Bytes,
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match self {
            Arg::UInt32(v) => Ok(*v),
            _ => Err(Error::Status(crate::error::Status::InvalidArgument)),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self {
            Arg::UInt64(v) => Ok(*v),
            _ => Err(Error::Status(crate::error::Status::InvalidArgument)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Arg::Str(v) => Ok(v.as_str()),
            _ => Err(Error::Status(crate::error::Status::InvalidArgument)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Arg::Bytes(v) => Ok(v.as_slice()),
            _ => Err(Error::Status(crate::error::Status::InvalidArgument)),
        }
    }
}

/// Maximum payload length for any single argument; bounded by the overall
/// frame cap since an argument can never outgrow its frame.
const MAX_ARG_LEN: usize = crate::wire::frame::MAX_BODY_LEN;

pub fn read_arg(src: &mut impl Read, expected: ArgType) -> Result<Arg> {
    let tag = primitive::u32(src)?;
    let tag: ArgType = num_traits::FromPrimitive::from_u32(tag)
        .ok_or(Error::Status(crate::error::Status::InvalidArgument))?;
    if tag != expected {
        return Err(Error::Status(crate::error::Status::InvalidArgument));
    }

    let len = primitive::u32(src)? as usize;
    if len > MAX_ARG_LEN {
        return Err(Error::Status(crate::error::Status::InvalidArgument));
    }
    let mut bytes = vec![0u8; len];
    std::io::Read::read_exact(src, &mut bytes).map_err(|_| Error::Protocol)?;

    let mut cursor = std::io::Cursor::new(bytes);
    Ok(match tag {
        ArgType::UInt32 => Arg::UInt32(primitive::u32(&mut cursor)?),
        ArgType::UInt64 => Arg::UInt64(primitive::u64(&mut cursor)?),
        ArgType::Int32 => Arg::Int32(primitive::i32(&mut cursor)?),
        ArgType::String => {
            Arg::Str(String::from_utf8(cursor.into_inner()).map_err(|_| Error::Status(crate::error::Status::InvalidArgument))?)
        }
        ArgType::Bytes => Arg::Bytes(cursor.into_inner()),
    })
}

pub fn write_arg(dest: &mut impl Write, arg: &Arg) -> Result<()> {
    let mut payload = Vec::new();
    match arg {
        Arg::UInt32(v) => primitive::write_u32(&mut payload, *v)?,
        Arg::UInt64(v) => primitive::write_u64(&mut payload, *v)?,
        Arg::Int32(v) => primitive::write_i32(&mut payload, *v)?,
        Arg::Str(v) => payload.extend_from_slice(v.as_bytes()),
        Arg::Bytes(v) => payload.extend_from_slice(v),
    }

    primitive::write_u32(dest, arg.arg_type() as u32)?;
    primitive::write_u32(dest, payload.len() as u32)?;
    primitive::write_array(dest, &payload)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn round_trips_string_arg() {
        let arg = Arg::Str("hello.txt".to_string());
        let mut buf = Vec::new();
        write_arg(&mut buf, &arg).unwrap();

        let decoded = read_arg(&mut Cursor::new(buf), ArgType::String).unwrap();
        assert_eq!(decoded, arg);
    }

    #[test]
    fn round_trips_u64_arg() {
        let arg = Arg::UInt64(0x0102_0304_0506_0708);
        let mut buf = Vec::new();
        write_arg(&mut buf, &arg).unwrap();

        let decoded = read_arg(&mut Cursor::new(buf), ArgType::UInt64).unwrap();
        assert_eq!(decoded, arg);
    }

    #[test]
    fn mismatched_type_tag_rejected() {
        let arg = Arg::UInt32(7);
        let mut buf = Vec::new();
        write_arg(&mut buf, &arg).unwrap();

        assert!(read_arg(&mut Cursor::new(buf), ArgType::String).is_err());
    }
}
