//! Request body: `command | argc | args | xid | terminator` (`spec.md` §4.1).

use std::io::{Cursor, Write};

use num_traits::FromPrimitive;

use crate::error::{Error, Result, Status};
use crate::wire::arg::{read_arg, write_arg, Arg};
use crate::wire::command::{spec_for, Command, MAX_COMMAND_ARGS};
use crate::wire::primitive;

/// The literal byte that terminates every request body.
pub const TERMINATOR: u8 = 0x0D;

/// A fully decoded request: the command, its validated argument vector, and
/// the inner (legacy, otherwise-ignored) copy of the xid.
pub struct Request {
    pub command: Command,
    pub args: Vec<Arg>,
    /// Written by every implementation, per `spec.md` §9's open question;
    /// this crate never reads it back for correlation — the outer frame
    /// xid is authoritative.
    pub inner_xid: u32,
}

/// Decodes a request body, validating `argc` and each argument's type tag
/// against the command's declared shape (`spec.md` §4.3). A command the
/// dispatch table does not recognize decodes successfully as `Err` so the
/// session loop can still reply with a status rather than dropping the
/// connection.
pub fn decode(body: &[u8]) -> Result<Request> {
    let mut src = Cursor::new(body);

    let command_byte = primitive::u8(&mut src)?;
    let command =
        Command::from_u8(command_byte).ok_or(Error::Status(Status::NotSupported))?;

    let argc = primitive::u8(&mut src)? as usize;
    if argc > MAX_COMMAND_ARGS {
        return Err(Error::Status(Status::InvalidArgument));
    }

    let spec = spec_for(command);
    if !spec.supported {
        return Err(Error::Status(Status::NotSupported));
    }
    if argc != spec.arg_types.len() {
        return Err(Error::Status(Status::InvalidArgument));
    }

    let mut args = Vec::with_capacity(argc);
    for expected in spec.arg_types {
        args.push(read_arg(&mut src, *expected)?);
    }

    let inner_xid = primitive::u32(&mut src)?;

    let terminator = primitive::u8(&mut src)?;
    if terminator != TERMINATOR {
        return Err(Error::Status(Status::InvalidArgument));
    }

    Ok(Request { command, args, inner_xid })
}

/// Encodes a request body (used by the client-facing [`crate::rpc`] transport).
pub fn encode(command: Command, args: &[Arg], xid: u32) -> Result<Vec<u8>> {
    if args.len() > MAX_COMMAND_ARGS {
        return Err(Error::Status(Status::InvalidArgument));
    }

    let mut out = Vec::new();
    primitive::write_u8(&mut out, command as u8)?;
    primitive::write_u8(&mut out, args.len() as u8)?;
    for arg in args {
        write_arg(&mut out, arg)?;
    }
    primitive::write_u32(&mut out, xid)?;
    write_terminator(&mut out)?;
    Ok(out)
}

fn write_terminator(dest: &mut impl Write) -> Result<()> {
    primitive::write_u8(dest, TERMINATOR)
}
