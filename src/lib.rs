//! Run commands on the host system from inside a sandbox.
//!
//! A sandboxed process has no way to exec on the host directly, but the
//! Flatpak session helper will do it on our behalf: `HostCommand` over
//! the session bus spawns the process, `HostCommandExited` reports its
//! wait status, and `HostCommandSignal` lets us relay signals. This
//! crate wraps that protocol with optional pseudo-terminal forwarding
//! so interactive programs behave as if they were run on the host
//! directly.
//!
//! The flow for one invocation:
//! 1. The CLI layer ([`cli`]) builds a [`HostCommand`] descriptor from
//!    flags or from a shim-style invocation.
//! 2. [`HostCommand::spawn_and_wait`] connects to the bus, subscribes
//!    to exit notifications, allocates a [`pty::Pty`] when requested,
//!    and issues the spawn call.
//! 3. An event loop forwards local signals and window resizes until the
//!    exit notification arrives, which is decoded into an
//!    [`ExitOutcome`].

pub mod cli;
pub mod command;
pub mod error;
pub mod pty;
pub mod session;
pub mod status;

pub use command::HostCommand;
pub use error::Error;
pub use status::{ExitOutcome, FAILURE_EXIT_CODE};
