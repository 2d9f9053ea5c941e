//! Pseudo-terminal allocation and forwarding.
//!
//! The host command gets the slave side of the pair as all three stdio
//! descriptors, while we bridge the master side to our own terminal:
//! stdin is switched to raw mode so keystrokes reach the host process
//! unmangled, two detached threads shuttle bytes in each direction, and
//! the local window size is mirrored onto the master on every SIGWINCH.

use std::fs::File;
use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::thread;

use log::{debug, warn};
use nix::errno::Errno;
use nix::pty::{openpty, Winsize};
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};

use crate::error::Error;

pub struct Pty {
    master: OwnedFd,
    slave: OwnedFd,
    /// Present only if stdin was a terminal when `start` ran.
    saved_termios: Option<Termios>,
}

impl Pty {
    /// Allocates a fresh master/slave device pair.
    pub fn open() -> Result<Self, Error> {
        let pair = openpty(None::<&Winsize>, None::<&Termios>).map_err(Error::TerminalAllocation)?;

        Ok(Self {
            master: pair.master,
            slave: pair.slave,
            saved_termios: None,
        })
    }

    /// Switches stdin to raw mode, starts the two copy threads, and
    /// seeds the pair with the current window size.
    ///
    /// A stdin that is not a terminal (piped input, shim invocations
    /// forced to use a pty) is left untouched; everything still works,
    /// minus local echo suppression.
    pub fn start(&mut self) -> Result<(), Error> {
        self.saved_termios = make_raw(io::stdin());

        // One thread per direction. Neither is joined: the host command's
        // descriptors keep the pair open from its side, so the copies do
        // not reliably observe EOF when `terminate` closes ours. The
        // threads are reclaimed at process exit, and shutdown must not
        // block on them.
        let mut master_writer = File::from(self.master.try_clone().map_err(Error::TerminalSetup)?);
        thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            let mut stdin = io::stdin();
            loop {
                match stdin.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if master_writer.write_all(&buffer[..n]).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });

        let mut master_reader = File::from(self.master.try_clone().map_err(Error::TerminalSetup)?);
        thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            let mut stdout = io::stdout();
            loop {
                match master_reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdout.write_all(&buffer[..n]).is_err() {
                            break;
                        }
                        let _ = stdout.flush();
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });

        self.inherit_window_size();

        Ok(())
    }

    /// Copies the local stdout window geometry onto the master verbatim.
    ///
    /// Called once at startup and again for every SIGWINCH. Failure is
    /// reported but never fatal to the command being run.
    pub fn inherit_window_size(&self) {
        match window_size(libc::STDOUT_FILENO) {
            Ok(size) => {
                if let Err(err) = set_window_size(self.master.as_raw_fd(), &size) {
                    warn!("failed to propagate window size to the pty: {err}");
                }
            }
            Err(err) => debug!("failed to read local window size: {err}"),
        }
    }

    pub fn stdin(&self) -> BorrowedFd<'_> {
        self.slave.as_fd()
    }

    pub fn stdout(&self) -> BorrowedFd<'_> {
        self.slave.as_fd()
    }

    pub fn stderr(&self) -> BorrowedFd<'_> {
        self.slave.as_fd()
    }

    /// Restores the saved terminal attributes and closes both sides of
    /// the pair. The copy threads are left running (see `start`).
    pub fn terminate(mut self) {
        self.restore_stdin();
        // master and slave close on drop.
    }

    fn restore_stdin(&mut self) {
        if let Some(saved) = self.saved_termios.take() {
            restore(io::stdin(), &saved);
        }
    }
}

/// Saves the current attributes of `fd` and switches it to raw mode
/// (non-canonical, no echo, no signal generation). Returns the saved
/// attributes when raw mode was applied; a descriptor that is not a
/// terminal is left untouched and comes back as `None`.
fn make_raw(fd: impl AsFd) -> Option<Termios> {
    match tcgetattr(&fd) {
        Ok(attrs) => {
            let mut raw = attrs.clone();
            cfmakeraw(&mut raw);
            match tcsetattr(&fd, SetArg::TCSANOW, &raw) {
                Ok(()) => Some(attrs),
                Err(err) => {
                    warn!("failed to switch the terminal to raw mode: {err}");
                    None
                }
            }
        }
        Err(Errno::ENOTTY) => {
            debug!("not a terminal, skipping raw mode");
            None
        }
        Err(err) => {
            warn!("failed to read terminal attributes: {err}");
            None
        }
    }
}

/// Puts back attributes previously saved by `make_raw`.
fn restore(fd: impl AsFd, saved: &Termios) {
    if let Err(err) = tcsetattr(&fd, SetArg::TCSANOW, saved) {
        warn!("failed to restore terminal attributes: {err}");
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        // Error paths that never reach `terminate` must still leave the
        // caller's terminal usable. `restore_stdin` is a no-op once the
        // saved attributes have been taken.
        self.restore_stdin();
    }
}

fn window_size(fd: RawFd) -> io::Result<libc::winsize> {
    let mut size: libc::winsize = unsafe { mem::zeroed() };
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size)
}

fn set_window_size(fd: RawFd, size: &libc::winsize) -> io::Result<()> {
    if unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, size) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_views_share_one_descriptor() {
        let pty = Pty::open().expect("openpty");
        assert_eq!(pty.stdin().as_raw_fd(), pty.stdout().as_raw_fd());
        assert_eq!(pty.stdin().as_raw_fd(), pty.stderr().as_raw_fd());
        assert_ne!(pty.stdin().as_raw_fd(), pty.master.as_raw_fd());
    }

    #[test]
    fn test_window_size_round_trips_across_the_pair() {
        let pty = Pty::open().expect("openpty");
        let size = libc::winsize {
            ws_row: 43,
            ws_col: 132,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        set_window_size(pty.master.as_raw_fd(), &size).expect("TIOCSWINSZ");
        let seen = window_size(pty.slave.as_raw_fd()).expect("TIOCGWINSZ");
        assert_eq!((seen.ws_row, seen.ws_col), (43, 132));
    }

    #[test]
    fn test_restore_reproduces_the_pre_raw_attributes() {
        let pty = Pty::open().expect("openpty");

        let before = tcgetattr(&pty.slave).expect("slave attributes");
        let saved = make_raw(&pty.slave).expect("slave side is a terminal");

        // Raw mode must actually have changed something.
        let raw = tcgetattr(&pty.slave).expect("slave attributes");
        assert_ne!(raw.local_flags, before.local_flags);

        restore(&pty.slave, &saved);
        let after = tcgetattr(&pty.slave).expect("slave attributes");
        assert_eq!(after.input_flags, before.input_flags);
        assert_eq!(after.output_flags, before.output_flags);
        assert_eq!(after.control_flags, before.control_flags);
        assert_eq!(after.local_flags, before.local_flags);
        assert_eq!(after.control_chars, before.control_chars);
    }

    #[test]
    fn test_restore_without_saved_attributes_is_a_no_op() {
        let mut pty = Pty::open().expect("openpty");
        assert!(pty.saved_termios.is_none());
        // Must not touch the terminal or panic when nothing was saved.
        pty.restore_stdin();
        pty.terminate();
    }
}
