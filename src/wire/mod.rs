//! Framing codec (`spec.md` §4.1): length-prefixed packets carrying typed
//! arguments, shared by the server, the client transport, and the
//! authentication peer.

pub mod arg;
pub mod command;
pub mod frame;
pub mod primitive;
pub mod request;
pub mod response;
pub mod stat;

pub use arg::Arg;
pub use command::Command;
pub use frame::Frame;
