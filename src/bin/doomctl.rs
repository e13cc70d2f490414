//! doomctl: plan and apply Doom play sessions from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use doom_provider::{
    Action, DoomProvider, Driver, ProviderConfig, SessionConfig, SessionModel, StateStore,
    DEFAULT_ADDRESS, VERSION,
};

#[derive(Parser)]
#[command(name = "doomctl", version = VERSION, about = "Declarative lifecycle management for Doom play sessions")]
struct Cli {
    /// State file (defaults to the user cache directory)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Resource address within the state file
    #[arg(long, global = true, default_value = DEFAULT_ADDRESS)]
    address: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ProviderArgs {
    /// Path to Doom executable, or a name to search for in $PATH
    #[arg(long, env = "DOOM_PATH")]
    path: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show what apply would do
    Plan {
        #[command(flatten)]
        provider: ProviderArgs,
        /// WAD file to load, e.g. freedoom1.wad
        #[arg(long)]
        wad: String,
    },
    /// Start, keep or replace the session so it matches the declaration
    Apply {
        #[command(flatten)]
        provider: ProviderArgs,
        /// WAD file to load, e.g. freedoom1.wad
        #[arg(long)]
        wad: String,
    },
    /// Check every recorded session and drop those that are gone
    Refresh {
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Kill the session and remove it from state
    Destroy {
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Print recorded state without touching any process
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doom_provider=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}: {}", e.summary(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> doom_provider::Result<()> {
    let store = StateStore::new(cli.state.unwrap_or_else(StateStore::default_path));
    let address = cli.address.as_str();

    match cli.command {
        Command::Show => {
            let doc = store.load()?;
            if doc.resources.is_empty() {
                println!("No sessions in {}", store.path().display());
            }
            for (address, state) in &doc.resources {
                print_state(address, Some(state));
            }
        }
        Command::Plan { provider, wad } => {
            let driver = connect(&provider, store)?;
            let action = driver.plan(address, Some(&SessionConfig::new(wad))).await?;
            println!("{}: {}", address, action);
        }
        Command::Apply { provider, wad } => {
            let driver = connect(&provider, store)?;
            let report = driver.apply(address, Some(&SessionConfig::new(wad))).await?;
            println!("{}: {}", address, report.action);
            print_state(address, report.state.as_ref());
        }
        Command::Refresh { provider } => {
            let driver = connect(&provider, store)?;
            let sessions = driver.refresh_all().await?;
            if sessions.is_empty() {
                println!("No running sessions");
            }
            for (address, state) in &sessions {
                print_state(address, Some(state));
            }
        }
        Command::Destroy { provider } => {
            let driver = connect(&provider, store)?;
            let report = driver.destroy(address).await?;
            match report.action {
                Action::NoOp => println!("{}: nothing to destroy", address),
                action => println!("{}: {}", address, action),
            }
        }
    }

    Ok(())
}

fn connect(args: &ProviderArgs, store: StateStore) -> doom_provider::Result<Driver> {
    let provider = DoomProvider::new(VERSION);
    let data = provider.configure(&ProviderConfig::new(args.path.clone()))?;
    Ok(Driver::new(provider.session_resource(data), store))
}

fn print_state(address: &str, state: Option<&SessionModel>) {
    match state.and_then(|s| s.pid.map(|pid| (s, pid))) {
        Some((state, pid)) => println!("  {}  wad={}  pid={}", address, state.wad, pid),
        None => println!("  {}  (absent)", address),
    }
}
