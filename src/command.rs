//! Host command descriptor and the spawn-and-wait event loop.
//!
//! `spawn_and_wait` is the single entry point into the core: it wires a
//! pseudo-terminal (when requested) to the spawn call, then merges two
//! event sources until the host command is gone. Locally received
//! signals are routed (resize, discard, or forward) and the one
//! `HostCommandExited` notification for our pid ends the loop. There is
//! deliberately no timeout: the host process's lifetime is
//! authoritative.

use std::collections::HashMap;
use std::io;
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::thread;

use futures_util::StreamExt;
use log::{debug, warn};
use signal_hook::consts::signal::{
    SIGALRM, SIGCONT, SIGHUP, SIGINT, SIGIO, SIGPIPE, SIGPROF, SIGQUIT, SIGTERM, SIGTSTP,
    SIGTTIN, SIGTTOU, SIGURG, SIGUSR1, SIGUSR2, SIGVTALRM, SIGWINCH,
};
use signal_hook::iterator::Signals;
use tokio::sync::mpsc;
use zbus::zvariant::Fd;

use crate::error::Error;
use crate::pty::Pty;
use crate::session::RemoteSession;
use crate::status::ExitOutcome;

/// Signals the intake thread listens for: every catchable asynchronous
/// signal. SIGKILL and SIGSTOP cannot be caught, and the synchronous
/// fault signals (SIGSEGV, SIGBUS, SIGILL, SIGFPE) must keep their
/// default disposition. Anything left out here would terminate us with
/// the host process still running, so the set errs on the wide side:
/// SIGWINCH is handled locally, SIGURG is discarded, the rest are
/// forwarded.
const ROUTED_SIGNALS: &[i32] = &[
    SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2, SIGCONT, SIGTSTP, SIGTTIN, SIGTTOU,
    SIGALRM, SIGPIPE, SIGIO, SIGVTALRM, SIGPROF, SIGWINCH, SIGURG,
];

/// Everything needed to run one command on the host. Built by the CLI
/// layer, immutable afterwards.
pub struct HostCommand {
    /// Program and arguments; never empty.
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    /// Variables to set in the host process's environment.
    pub env: HashMap<String, String>,
    pub allocate_pty: bool,
}

/// What to do with a locally received signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalDisposition {
    /// Window change: re-apply the local geometry to the pty, never
    /// forward.
    ResizePty,
    /// Runtime housekeeping noise, not user-intended: drop it.
    Discard,
    /// Anything else goes to the host process.
    Forward,
}

fn route_signal(signal: i32) -> SignalDisposition {
    match signal {
        SIGWINCH => SignalDisposition::ResizePty,
        SIGURG => SignalDisposition::Discard,
        _ => SignalDisposition::Forward,
    }
}

/// Collects the allow-listed variables that are actually set locally.
/// Unset names are omitted outright, never sent as empty strings.
pub fn passthrough_env(allow_list: &[String]) -> HashMap<String, String> {
    allow_list
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
        .collect()
}

impl HostCommand {
    pub fn new(
        args: Vec<String>,
        working_directory: PathBuf,
        env: HashMap<String, String>,
        allocate_pty: bool,
    ) -> Self {
        Self {
            args,
            working_directory,
            env,
            allocate_pty,
        }
    }

    /// Spawns the command on the host and blocks until it exits,
    /// forwarding signals and window-size changes in the meantime.
    ///
    /// Exactly one `ExitOutcome` or one error comes out of this; none
    /// of the failures are retried.
    pub async fn spawn_and_wait(&self) -> Result<ExitOutcome, Error> {
        let session = RemoteSession::connect().await?;

        // Subscribe before spawning so a fast-exiting command cannot
        // slip its notification past us.
        let mut exits = session
            .proxy()
            .receive_host_command_exited()
            .await
            .map_err(Error::Subscription)?;

        let mut signal_rx = spawn_signal_listener()?;

        let mut pty = if self.allocate_pty {
            let mut pty = Pty::open()?;
            pty.start()?;
            Some(pty)
        } else {
            None
        };

        let (stdin, stdout, stderr) = (io::stdin(), io::stdout(), io::stderr());
        let fds: HashMap<u32, Fd<'_>> = match &pty {
            Some(pty) => HashMap::from([
                (0, Fd::from(pty.stdin())),
                (1, Fd::from(pty.stdout())),
                (2, Fd::from(pty.stderr())),
            ]),
            None => HashMap::from([
                (0, Fd::from(stdin.as_fd())),
                (1, Fd::from(stdout.as_fd())),
                (2, Fd::from(stderr.as_fd())),
            ]),
        };

        let pid = session.spawn(self, fds).await?;
        debug!("host command spawned with pid {pid}");

        let outcome = loop {
            tokio::select! {
                received = signal_rx.recv() => {
                    let Some(received) = received else { continue };
                    match route_signal(received) {
                        SignalDisposition::ResizePty => {
                            if let Some(pty) = &pty {
                                pty.inherit_window_size();
                            }
                        }
                        SignalDisposition::Discard => {}
                        SignalDisposition::Forward => session.signal(pid, received, false).await,
                    }
                }
                exited = exits.next() => {
                    let Some(exited) = exited else {
                        break Err(Error::Disconnected);
                    };
                    let args = match exited.args() {
                        Ok(args) => args,
                        Err(err) => {
                            warn!("malformed HostCommandExited notification: {err}");
                            continue;
                        }
                    };
                    // The bus broadcasts an exit for every host command
                    // on this session; only ours ends the loop.
                    if *args.pid() == pid {
                        break Ok(ExitOutcome::decode(*args.wait_status()));
                    }
                }
            }
        };

        if let Some(pty) = pty.take() {
            pty.terminate();
        }

        outcome
    }
}

/// Registers the signal set and feeds deliveries into a channel the
/// async loop can select on. The intake thread blocks in the iterator
/// for the life of the process; it is never joined.
fn spawn_signal_listener() -> Result<mpsc::UnboundedReceiver<i32>, Error> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut signals = Signals::new(ROUTED_SIGNALS).map_err(Error::SignalListener)?;

    thread::spawn(move || {
        for signal in signals.forever() {
            if tx.send(signal).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
