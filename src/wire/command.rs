//! The request opcode and its per-argument type tags (`spec.md` §4.1, §4.3,
//! §9 "Dynamic dispatch").
//!
//! The wire opcode is a `u8`; internally it is converted to this sum type
//! at the framing boundary, per the spec's design note that a reimplementation
//! should "represent commands as a sum type and express the table as a match".

use num_derive::{FromPrimitive, ToPrimitive};

/// Every request command, with its legacy wire opcode preserved as the
/// discriminant so encode/decode is a single `as u8` / `FromPrimitive` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum Command {
    PreMount = 0,
    Mount = 1,
    FsInfo = 2,
    Lookup = 3,
    Stat = 4,
    ReadDir = 5,
    Read = 6,
    Write = 7,
    Create = 8,
    Truncate = 9,
    MkDir = 10,
    RmDir = 11,
    Rename = 12,
    Unlink = 13,
    ReadLink = 14,
    SymLink = 15,
    WStat = 16,
    ReadAttrib = 50,
    WriteAttrib = 51,
    ReadAttribDir = 52,
    RemoveAttrib = 53,
    StatAttrib = 54,
    ReadIndexDir = 60,
    CreateIndex = 61,
    RemoveIndex = 62,
    StatIndex = 63,
    ReadQuery = 70,
    Commit = 80,
    Quit = 255,
}

impl Command {
    /// A short name used only in `tracing` fields — never written to the wire.
    pub fn name(self) -> &'static str {
        match self {
            Command::PreMount => "pre_mount",
            Command::Mount => "mount",
            Command::FsInfo => "fs_info",
            Command::Lookup => "lookup",
            Command::Stat => "stat",
            Command::ReadDir => "read_dir",
            Command::Read => "read",
            Command::Write => "write",
            Command::Create => "create",
            Command::Truncate => "truncate",
            Command::MkDir => "mk_dir",
            Command::RmDir => "rm_dir",
            Command::Rename => "rename",
            Command::Unlink => "unlink",
            Command::ReadLink => "read_link",
            Command::SymLink => "sym_link",
            Command::WStat => "wstat",
            Command::ReadAttrib => "read_attrib",
            Command::WriteAttrib => "write_attrib",
            Command::ReadAttribDir => "read_attrib_dir",
            Command::RemoveAttrib => "remove_attrib",
            Command::StatAttrib => "stat_attrib",
            Command::ReadIndexDir => "read_index_dir",
            Command::CreateIndex => "create_index",
            Command::RemoveIndex => "remove_index",
            Command::StatIndex => "stat_index",
            Command::ReadQuery => "read_query",
            Command::Commit => "commit",
            Command::Quit => "quit",
        }
    }

    /// Whether this handler must see `rights & WRITE` before running
    /// (`spec.md` §4.3: "Rights are enforced at the handler boundary").
    pub fn requires_write(self) -> bool {
        matches!(
            self,
            Command::Write
                | Command::Create
                | Command::Truncate
                | Command::MkDir
                | Command::RmDir
                | Command::Rename
                | Command::Unlink
                | Command::SymLink
                | Command::WStat
                | Command::WriteAttrib
                | Command::RemoveAttrib
                | Command::CreateIndex
                | Command::RemoveIndex
                | Command::Commit
        )
    }
}

/// Type tag accompanying each argument (`type:4 LE` in `spec.md` §4.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ArgType {
    UInt32 = 0,
    UInt64 = 1,
    Int32 = 2,
    String = 3,
    Bytes = 4,
}

/// The maximum number of arguments a request may carry (`spec.md` §4.1).
pub const MAX_COMMAND_ARGS: usize = 10;

/// One dispatch-table entry: whether the opcode is implemented and the
/// exact argument shape a valid request must present.
pub struct CommandSpec {
    pub supported: bool,
    pub arg_types: &'static [ArgType],
}

impl CommandSpec {
    pub const fn new(arg_types: &'static [ArgType]) -> Self {
        CommandSpec { supported: true, arg_types }
    }
}

/// Returns the declared shape for `command`, used by the session loop to
/// validate `argc` and per-arg type tags before invoking the handler
/// (`spec.md` §4.3).
pub fn spec_for(command: Command) -> CommandSpec {
    use ArgType::*;
    match command {
        Command::PreMount => CommandSpec::new(&[String]),
        Command::Mount => CommandSpec::new(&[String, String, Bytes]),
        Command::FsInfo => CommandSpec::new(&[UInt64]),
        Command::Lookup => CommandSpec::new(&[UInt64, String]),
        Command::Stat => CommandSpec::new(&[UInt64]),
        Command::ReadDir => CommandSpec::new(&[UInt64, UInt64]),
        Command::Read => CommandSpec::new(&[UInt64, UInt64, UInt32]),
        Command::Write => CommandSpec::new(&[UInt64, UInt64, UInt32, UInt32, Bytes]),
        Command::Create => CommandSpec::new(&[UInt64, String, UInt32, UInt32]),
        Command::Truncate => CommandSpec::new(&[UInt64, UInt64]),
        Command::MkDir => CommandSpec::new(&[UInt64, String, UInt32]),
        Command::RmDir => CommandSpec::new(&[UInt64, String]),
        Command::Rename => CommandSpec::new(&[UInt64, String, UInt64, String]),
        Command::Unlink => CommandSpec::new(&[UInt64, String]),
        Command::ReadLink => CommandSpec::new(&[UInt64]),
        Command::SymLink => CommandSpec::new(&[UInt64, String, String]),
        Command::WStat => {
            CommandSpec::new(&[UInt64, UInt32, UInt32, UInt32, UInt32, UInt64, UInt64, UInt64])
        }
        Command::ReadAttrib => CommandSpec::new(&[UInt64, String, UInt32, UInt64, UInt32]),
        Command::WriteAttrib => CommandSpec::new(&[UInt64, String, UInt32, Bytes, UInt64]),
        Command::ReadAttribDir => CommandSpec::new(&[UInt64, UInt64]),
        Command::RemoveAttrib => CommandSpec::new(&[UInt64, String]),
        Command::StatAttrib => CommandSpec::new(&[UInt64, String]),
        Command::ReadIndexDir => CommandSpec::new(&[UInt64]),
        Command::CreateIndex => CommandSpec::new(&[String, UInt32]),
        Command::RemoveIndex => CommandSpec::new(&[String]),
        Command::StatIndex => CommandSpec::new(&[String]),
        Command::ReadQuery => CommandSpec::new(&[UInt64, String]),
        Command::Commit => CommandSpec::new(&[UInt64]),
        Command::Quit => CommandSpec::new(&[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn opcode_round_trips() {
        assert_eq!(Command::from_u8(3), Some(Command::Lookup));
        assert_eq!(Command::from_u8(255), Some(Command::Quit));
        assert_eq!(Command::from_u8(254), None);
    }

    #[test]
    fn write_requires_write_rights() {
        assert!(Command::Write.requires_write());
        assert!(!Command::Read.requires_write());
        assert!(!Command::Lookup.requires_write());
    }

    #[test]
    fn max_command_args_matches_spec() {
        assert_eq!(MAX_COMMAND_ARGS, 10);
        for cmd in [Command::Write, Command::WStat, Command::Mount] {
            assert!(spec_for(cmd).arg_types.len() <= MAX_COMMAND_ARGS);
        }
    }
}
