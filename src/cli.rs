//! Command-line surface and pty-allocation policy.

use std::ffi::OsStr;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::Parser;

/// Program basenames for which pty allocation defaults to off. These
/// are one-shot desktop helpers commonly run through shim symlinks;
/// putting their output through a raw-mode terminal only garbles
/// redirection.
const NO_PTY_COMMANDS: &[&str] = &["flatpak", "gio", "notify-send", "xdg-email", "xdg-open"];

#[derive(Parser, Debug)]
#[command(name = "host-spawn", version)]
#[command(about = "Run commands on the host system from inside a sandbox", long_about = None)]
pub struct Cli {
    /// Always allocate a pseudo-terminal for the host process
    #[arg(long = "pty", conflicts_with = "no_pty")]
    pub pty: bool,

    /// Never allocate a pseudo-terminal for the host process
    #[arg(long = "no-pty")]
    pub no_pty: bool,

    /// Comma-separated environment variables to pass to the host process
    /// (only those set locally are sent)
    #[arg(long = "env", value_name = "VAR,...", value_delimiter = ',', default_value = "TERM")]
    pub env: Vec<String>,

    /// Working directory for the host process (defaults to the current
    /// directory)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Command and arguments to run on the host
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// `--pty` / `--no-pty`, or `None` when neither was given.
    pub fn forced_pty(&self) -> Option<bool> {
        if self.pty {
            Some(true)
        } else if self.no_pty {
            Some(false)
        } else {
            None
        }
    }
}

/// Decides pty allocation for `program`: an explicit flag wins,
/// otherwise a pty is used when both stdin and stdout are terminals and
/// the program is not blocklisted.
pub fn pty_requested(forced: Option<bool>, program: &str) -> bool {
    if let Some(forced) = forced {
        return forced;
    }
    if !(io::stdin().is_terminal() && io::stdout().is_terminal()) {
        return false;
    }
    !defaults_to_no_pty(program)
}

fn defaults_to_no_pty(program: &str) -> bool {
    let basename = Path::new(program)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(program);
    NO_PTY_COMMANDS.contains(&basename)
}

/// Detects shim invocations. When this binary is installed under
/// another name (a symlink like `/usr/local/bin/xdg-open`), the whole
/// invocation is the command to run on the host and none of our own
/// flags are parsed; they belong to the wrapped program.
pub fn shim_invocation(args: &[String]) -> Option<Vec<String>> {
    let arg0 = args.first()?;
    let basename = Path::new(arg0).file_name().and_then(OsStr::to_str)?;
    if basename == "host-spawn" {
        return None;
    }

    let mut command = Vec::with_capacity(args.len());
    command.push(basename.to_string());
    command.extend(args.iter().skip(1).cloned());
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_swallows_hyphenated_arguments() {
        let cli = Cli::try_parse_from(["host-spawn", "--no-pty", "ls", "-la", "--color=auto"])
            .expect("parse");
        assert_eq!(cli.command, vec!["ls", "-la", "--color=auto"]);
        assert_eq!(cli.forced_pty(), Some(false));
    }

    #[test]
    fn test_env_list_splits_on_commas() {
        let cli = Cli::try_parse_from(["host-spawn", "--env", "TERM,COLORTERM", "true"])
            .expect("parse");
        assert_eq!(cli.env, vec!["TERM", "COLORTERM"]);
    }

    #[test]
    fn test_env_defaults_to_term_only() {
        let cli = Cli::try_parse_from(["host-spawn", "true"]).expect("parse");
        assert_eq!(cli.env, vec!["TERM"]);
    }

    #[test]
    fn test_missing_command_is_rejected() {
        assert!(Cli::try_parse_from(["host-spawn", "--no-pty"]).is_err());
    }

    #[test]
    fn test_force_flags_override_everything() {
        // Forced on, even for a blocklisted program without a tty.
        assert!(pty_requested(Some(true), "xdg-open"));
        assert!(!pty_requested(Some(false), "vim"));
    }

    #[test]
    fn test_blocklisted_basenames() {
        assert!(defaults_to_no_pty("xdg-open"));
        assert!(defaults_to_no_pty("/usr/bin/xdg-open"));
        assert!(!defaults_to_no_pty("vim"));
        assert!(!defaults_to_no_pty("/usr/bin/vim"));
    }

    #[test]
    fn test_shim_invocation_uses_the_basename() {
        let args = vec![
            "/usr/local/bin/xdg-open".to_string(),
            "https://example.org".to_string(),
        ];
        assert_eq!(
            shim_invocation(&args),
            Some(vec!["xdg-open".to_string(), "https://example.org".to_string()])
        );
    }

    #[test]
    fn test_own_name_is_not_a_shim() {
        assert_eq!(shim_invocation(&["/usr/bin/host-spawn".to_string()]), None);
        assert_eq!(shim_invocation(&["host-spawn".to_string()]), None);
    }
}
