use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use host_spawn::cli::{self, Cli};
use host_spawn::{command, HostCommand, FAILURE_EXIT_CODE};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("host-spawn: {err:#}");
            ExitCode::from(FAILURE_EXIT_CODE as u8)
        }
    }
}

async fn run() -> Result<i32> {
    let args: Vec<String> = std::env::args().collect();

    let (command_args, forced_pty, allow_list, directory) = match cli::shim_invocation(&args) {
        // Shim invocations take no flags of ours; defaults apply.
        Some(command) => (command, None, vec!["TERM".to_string()], None),
        None => {
            let cli = Cli::parse();
            let forced = cli.forced_pty();
            (cli.command, forced, cli.env, cli.directory)
        }
    };

    let working_directory = match directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to determine the working directory")?,
    };

    let allocate_pty = cli::pty_requested(forced_pty, &command_args[0]);
    let env = command::passthrough_env(&allow_list);

    let host_command = HostCommand::new(command_args, working_directory, env, allocate_pty);
    let outcome = host_command.spawn_and_wait().await?;

    Ok(outcome.exit_code())
}
