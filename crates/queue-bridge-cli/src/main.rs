use queue_bridge_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("queue-bridge: {}", e);

        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::Producer(_) => 2,
            CliError::Transport(_) => 2,
            CliError::CommandFailed { .. } => 3,
            CliError::InvalidArgument { .. } => 4,
        };

        std::process::exit(exit_code);
    }
}
