//! The client-side RPC transport (`spec.md` §4.2, §5): everything a caller
//! needs to mount a share and issue `btRPC` calls against it.

pub mod transport;

pub use transport::Transport;
