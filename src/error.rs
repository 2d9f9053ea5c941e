//! Error taxonomy for the core execution path.
//!
//! Every variant here aborts the invocation; nothing is retried.
//! Best-effort failures (signal forwarding, window-size propagation,
//! terminal attribute restoration) are logged and swallowed instead of
//! appearing in this enum, because no corrective action exists for
//! them.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to the session bus: {0}")]
    Connection(zbus::Error),

    #[error("failed to subscribe to host command exit notifications: {0}")]
    Subscription(zbus::Error),

    /// The HostCommand call itself failed, typically "command not
    /// found" on the host side.
    #[error("host command spawn failed: {0}")]
    Spawn(zbus::Error),

    #[error("failed to allocate a pseudo-terminal: {0}")]
    TerminalAllocation(nix::Error),

    #[error("failed to set up pseudo-terminal forwarding: {0}")]
    TerminalSetup(std::io::Error),

    #[error("failed to install the signal listener: {0}")]
    SignalListener(std::io::Error),

    /// The bus connection dropped before the host command exited.
    #[error("lost connection to the session bus before the host command exited")]
    Disconnected,
}
