use anyhow::Result;
use clap::{Parser, Subcommand};
use rlce_config::ConfigMode;

mod commands;

#[derive(Parser)]
#[command(name = "rlce")]
#[command(about = "Route-lock cellular enforcement operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> fleet -> vehicle ...)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail on config keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Route profile utilities
    Profile {
        #[command(subcommand)]
        cmd: ProfileCmd,
    },

    /// Event log utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },

    /// Persisted enforcement state
    State {
        #[command(subcommand)]
        cmd: StateCmd,
    },

    /// Replay a JSONL drive trace through the decision engine
    Simulate {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        profile: String,

        #[arg(long)]
        trace: String,

        /// Fail on config keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCmd {
    /// Validate a profile document
    Check {
        #[arg(long)]
        profile: String,
    },

    /// Print the authorized window of one segment
    Window {
        #[arg(long)]
        profile: String,

        #[arg(long)]
        segment: usize,

        /// Neighbouring segments on each side
        #[arg(long, default_value_t = 1)]
        grace: usize,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an event log
    Verify {
        #[arg(long)]
        path: String,
    },
}

#[derive(Subcommand)]
enum StateCmd {
    /// Print the persisted state document
    Show {
        #[arg(long)]
        path: String,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let lines = match cli.cmd {
        Commands::ConfigHash { paths, strict } => {
            let (loaded, _) = commands::load_config(&paths, ConfigMode::Enforce, strict)?;
            vec![
                format!("config_hash={}", loaded.config_hash),
                loaded.canonical_json,
            ]
        }

        Commands::Profile { cmd } => match cmd {
            ProfileCmd::Check { profile } => commands::profile::check(&profile)?,
            ProfileCmd::Window {
                profile,
                segment,
                grace,
            } => commands::profile::window(&profile, segment, grace)?,
        },

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit_verify(&path)?,
        },

        Commands::State { cmd } => match cmd {
            StateCmd::Show { path } => commands::state_show(&path)?,
        },

        Commands::Simulate {
            config_paths,
            profile,
            trace,
            strict,
        } => {
            let (_, cfg) = commands::load_config(&config_paths, ConfigMode::Simulate, strict)?;
            commands::simulate::simulate(&cfg, &profile, &trace)?
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
