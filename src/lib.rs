//! A reimplementation of the legacy `btRPC` network file-sharing protocol
//! (`spec.md`): framed RPC transport, a session/share engine backed by a
//! process-wide vnode cache, local filesystem handlers, an authentication
//! client, and a UDP discovery responder.

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fs;
pub mod handlers;
pub mod index;
pub mod lock;
pub mod principal;
pub mod rpc;
pub mod server;
pub mod session;
pub mod share;
pub mod vnode;
pub mod wire;
pub mod writeblock;

pub use error::{Error, Result, Status};
pub use server::{run, ServerConfig};
