//! Session-bus client for the host command service.
//!
//! The Flatpak session helper exposes process creation on the host via
//! `org.freedesktop.Flatpak.Development`. The proxy below is the
//! request/response stub; exit notifications arrive on a separate
//! signal stream obtained from it, which callers hold (and drop)
//! independently of the proxy itself.

use std::collections::HashMap;
use std::os::unix::ffi::OsStrExt;

use log::debug;
use zbus::zvariant::Fd;
use zbus::{proxy, Connection};

use crate::command::HostCommand;
use crate::error::Error;

#[proxy(
    interface = "org.freedesktop.Flatpak.Development",
    default_service = "org.freedesktop.Flatpak",
    default_path = "/org/freedesktop/Flatpak/Development",
    gen_blocking = false
)]
pub trait Development {
    /// Spawns a command on the host and returns its pid there.
    fn host_command(
        &self,
        cwd_path: &[u8],
        argv: &[Vec<u8>],
        fds: HashMap<u32, Fd<'_>>,
        envs: &HashMap<String, String>,
        flags: u32,
    ) -> zbus::Result<u32>;

    /// Delivers a signal to a previously spawned host command.
    fn host_command_signal(&self, pid: u32, signal: u32, to_process_group: bool)
        -> zbus::Result<()>;

    /// Emitted once per host command, carrying its raw wait status.
    #[zbus(signal)]
    fn host_command_exited(&self, pid: u32, wait_status: u32) -> zbus::Result<()>;
}

/// Connection to the host command service for a single invocation.
pub struct RemoteSession {
    proxy: DevelopmentProxy<'static>,
}

impl RemoteSession {
    /// Connects to the per-user session bus.
    pub async fn connect() -> Result<Self, Error> {
        let connection = Connection::session().await.map_err(Error::Connection)?;
        let proxy = DevelopmentProxy::new(&connection)
            .await
            .map_err(Error::Connection)?;

        Ok(Self { proxy })
    }

    /// The request/response stub. Callers use this to subscribe to exit
    /// notifications before issuing `spawn`; subscribing afterwards
    /// risks losing the notification of a fast-exiting command.
    pub fn proxy(&self) -> &DevelopmentProxy<'static> {
        &self.proxy
    }

    /// Issues the spawn call and returns the host-side pid.
    ///
    /// The wire format wants the working directory and each argv entry
    /// as null-terminated byte strings; `flags` is reserved and always
    /// zero. Failure here is typically "command not found" and is never
    /// retried.
    pub async fn spawn(&self, command: &HostCommand, fds: HashMap<u32, Fd<'_>>) -> Result<u32, Error> {
        let cwd = null_terminated(command.working_directory.as_os_str().as_bytes());
        let argv: Vec<Vec<u8>> = command
            .args
            .iter()
            .map(|arg| null_terminated(arg.as_bytes()))
            .collect();

        self.proxy
            .host_command(&cwd, &argv, fds, &command.env, 0)
            .await
            .map_err(Error::Spawn)
    }

    /// Best-effort signal delivery to the host command. There is no
    /// recovery action for a failed delivery, so errors are discarded.
    pub async fn signal(&self, pid: u32, signal: i32, to_process_group: bool) {
        if let Err(err) = self
            .proxy
            .host_command_signal(pid, signal as u32, to_process_group)
            .await
        {
            debug!("failed to forward signal {signal} to host pid {pid}: {err}");
        }
    }
}

fn null_terminated(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_terminated_appends_exactly_one_nul() {
        assert_eq!(null_terminated(b"/home/user"), b"/home/user\0");
        assert_eq!(null_terminated(b""), b"\0");
        assert_eq!(null_terminated(b"a\0b"), b"a\0b\0");
    }
}
