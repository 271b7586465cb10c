//! Agent Orchestrator - streaming supervision of a command-line coding agent.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agent_orchestrator::agent::AgentType;
use agent_orchestrator::config::{ConfigLoader, OrchestratorConfig};
use agent_orchestrator::display;
use agent_orchestrator::supervisor::{ErrorKind, InvocationRequest, Supervisor};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentArg {
    Developer,
    ProductOwner,
    Tester,
    Security,
    Devops,
    Documentation,
}

impl From<AgentArg> for AgentType {
    fn from(arg: AgentArg) -> Self {
        match arg {
            AgentArg::Developer => AgentType::Developer,
            AgentArg::ProductOwner => AgentType::ProductOwner,
            AgentArg::Tester => AgentType::Tester,
            AgentArg::Security => AgentType::Security,
            AgentArg::Devops => AgentType::Devops,
            AgentArg::Documentation => AgentType::Documentation,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "agent-orchestrator",
    about = "Run a command-line coding agent and stream its output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Agent binary to run, overriding the config file.
    #[arg(long, global = true)]
    binary: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message to the agent and stream the response.
    Send {
        /// The message to send.
        message: String,
        /// Agent persona.
        #[arg(short, long, value_enum, default_value_t = AgentArg::Developer)]
        agent: AgentArg,
        /// Project directory the agent runs in.
        #[arg(short, long)]
        project: Option<PathBuf>,
        /// Session id to tag events with (random if omitted).
        #[arg(long)]
        session: Option<String>,
        /// Disable truncation of long values.
        #[arg(long)]
        raw: bool,
    },
    /// Check whether the agent is installed.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>, binary: Option<PathBuf>) -> Option<OrchestratorConfig> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    match loader.load() {
        Ok(config) => Some(match binary {
            Some(binary) => config.with_binary(binary),
            None => config,
        }),
        Err(e) => {
            display::print_error(&e.to_string());
            None
        }
    }
}

async fn run_send(supervisor: &Supervisor, request: InvocationRequest, raw: bool) -> ExitCode {
    let events = supervisor.events();
    let mut stream = events.stream.subscribe();
    let mut complete = events.complete.subscribe_once();
    let mut errors = events.error.subscribe();

    display::print_session_start(&request.session_id, request.agent_type.as_str(), raw);
    let session_id = supervisor.send_message(request).await;
    tracing::debug!(session_id = %session_id, "Message sent");

    loop {
        tokio::select! {
            Some(notice) = stream.recv() => display::print_stream(&notice, raw),
            Some(error) = errors.recv() => {
                display::print_error_notice(&error);
                if error.kind == ErrorKind::Spawn {
                    return ExitCode::FAILURE;
                }
            }
            Some(record) = complete.recv() => {
                // Stream notices are emitted before the completion.
                while let Some(notice) = stream.try_recv() {
                    display::print_stream(&notice, raw);
                }
                display::print_completion(&record, raw);
                return if record.exit_code == Some(0) {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                };
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling agent");
                supervisor.cleanup();
                return ExitCode::from(130);
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(config) = load_config(cli.config, cli.binary) else {
        return ExitCode::FAILURE;
    };

    let supervisor = match Supervisor::new(config) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let code = match cli.command {
        Commands::Send {
            message,
            agent,
            project,
            session,
            raw,
        } => {
            let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut request = InvocationRequest::new(session_id, message).with_agent(agent.into());
            request.project_path = project;
            run_send(&supervisor, request, raw).await
        }
        Commands::Status { json } => {
            let status = supervisor.check_status().await;
            if json {
                match serde_json::to_string_pretty(&status) {
                    Ok(out) => println!("{out}"),
                    Err(e) => display::print_error(&e.to_string()),
                }
            } else {
                display::print_status(&status);
            }
            ExitCode::SUCCESS
        }
    };

    supervisor.cleanup();
    code
}
