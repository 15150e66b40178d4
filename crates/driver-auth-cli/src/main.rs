//! driver-auth - sign in to the driver backend and manage the stored session.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::CommandContext;
use sdk_config_and_utils::{init_logging, Config, Paths};
use std::path::PathBuf;
use tracing::debug;

/// Driver session tool.
#[derive(Parser)]
#[command(name = "driver-auth")]
#[command(about = "Sign in to the driver backend and manage the stored session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config, session and logs (default ~/.driver-auth)
    #[arg(long, global = true, env = "DRIVER_AUTH_HOME")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a code sent by SMS
    LoginSms {
        /// Phone number in international format
        #[arg(short, long)]
        phone: String,
        /// SMS code; prompted for when omitted
        #[arg(short, long)]
        code: Option<String>,
    },

    /// Request a sign-in link by email
    LoginMagic {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },

    /// Complete sign-in with the link from the email
    MagicLink {
        /// Full link URL, tracking wrappers included
        #[arg(short, long)]
        url: String,
    },

    /// Show the stored session
    Status,

    /// Print a valid access token, refreshing if needed
    Token,

    /// Check the stored session against the backend
    Validate,

    /// Clear the stored session
    Logout,
}

fn load_context(base_dir: Option<PathBuf>) -> Result<CommandContext> {
    let paths = match base_dir {
        Some(dir) => Paths::with_base_dir(dir),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;
    Ok(CommandContext { paths, config })
}

async fn run(cli: Cli, ctx: CommandContext) -> Result<()> {
    let format = cli.format;
    match cli.command {
        Commands::LoginSms { phone, code } => {
            commands::login_sms(&ctx, &phone, code, &format).await
        }
        Commands::LoginMagic { email } => commands::login_magic(&ctx, &email, &format).await,
        Commands::MagicLink { url } => commands::magic_link(&ctx, &url, &format).await,
        Commands::Status => commands::status(&ctx, &format).await,
        Commands::Token => commands::token(&ctx, &format).await,
        Commands::Validate => commands::validate(&ctx, &format).await,
        Commands::Logout => commands::logout(&ctx, &format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match load_context(cli.base_dir.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| ctx.config.log_level.clone());
    init_logging(&level, Some(ctx.paths.log_file()));
    debug!(base_dir = %ctx.paths.base_dir().display(), "Configuration loaded");

    let format = cli.format;
    if let Err(e) = run(cli, ctx).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
