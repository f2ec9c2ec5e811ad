//! The POSIX-style status codes carried on the wire (`spec.md` §6) and the
//! internal [`Error`] type that every fallible boundary in this crate
//! converts into one of them.

use std::fmt;
use std::io;

/// Status code written into a response body's `status` field.
///
/// `Ok` serializes as `0`; every other variant serializes as the negative
/// of its POSIX errno-like value, matching the legacy wire's "signed error
/// code (0 = success)" convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    /// EACCES — insufficient rights, authentication rejected.
    Access = 13,
    /// EEXIST — create with an exclusive mode against an existing name.
    Exist = 17,
    /// EINVAL — malformed argument, bad argc/type tag.
    InvalidArgument = 22,
    /// ENOENT — share, vnode, or name not found.
    NoEntry = 2,
    /// ENOMEM — allocation failure while building a reply.
    NoMemory = 12,
    /// ENOTDIR — path component expected a directory.
    NotDir = 20,
    /// EISDIR — operation not valid on a directory.
    IsDir = 21,
    /// EOPNOTSUPP — recognized but unsupported command.
    NotSupported = 95,
    /// EBUSY — session fan-out limit reached.
    Busy = 16,
    /// EHOSTUNREACH — auth server unreachable.
    HostUnreachable = 113,
    /// ERANGE — cookie or buffer out of range.
    RangeError = 34,
    /// ENOTEMPTY — rmdir on a non-empty directory.
    NotEmpty = 39,
}

impl Status {
    pub fn to_wire(self) -> i32 {
        match self {
            Status::Ok => 0,
            other => -(other as i32),
        }
    }

    /// Inverse of [`Status::to_wire`], used by the client transport to turn
    /// a response's signed status back into a [`Status`]. An unrecognized
    /// negative code still needs a variant, so it falls back to
    /// `InvalidArgument` rather than panicking.
    pub fn from_wire(code: i32) -> Status {
        match -code {
            0 => Status::Ok,
            13 => Status::Access,
            17 => Status::Exist,
            22 => Status::InvalidArgument,
            2 => Status::NoEntry,
            12 => Status::NoMemory,
            20 => Status::NotDir,
            21 => Status::IsDir,
            95 => Status::NotSupported,
            16 => Status::Busy,
            113 => Status::HostUnreachable,
            34 => Status::RangeError,
            39 => Status::NotEmpty,
            _ => Status::InvalidArgument,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Internal error type. Every variant maps onto a [`Status`]; handlers and
/// the codec both return `Result<T, Error>` and the dispatcher is the only
/// place that encodes it onto the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    Status(Status),
    /// The frame header had an unrecognized signature or an oversize body;
    /// not representable as a reply — the connection must be dropped.
    Protocol,
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Status(status)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind::*;
        let status = match err.kind() {
            NotFound => Status::NoEntry,
            PermissionDenied => Status::Access,
            AlreadyExists => Status::Exist,
            InvalidInput | InvalidData => Status::InvalidArgument,
            _ => Status::InvalidArgument,
        };
        Error::Status(status)
    }
}

impl Error {
    pub fn status(self) -> Status {
        match self {
            Error::Status(status) => status,
            Error::Protocol => Status::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
