use clap::{
    ArgAction, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use spotmcp::{
    cli::{self, Context, PlayerAction},
    config, error,
    spotify::Feature,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about="Spotify authorization and playback control",
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify and store the credential
    Auth(AuthOptions),

    /// Show credential and scope diagnostics
    Status,

    /// Send an authenticated request to the Web API
    Call(CallOptions),

    /// Control playback
    Player {
        #[command(subcommand)]
        action: PlayerAction,
    },

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct AuthOptions {
    /// Use the client credentials grant (no user context)
    #[clap(long)]
    app_only: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CallOptions {
    /// HTTP method, e.g. GET or PUT
    method: String,

    /// Path below the API base, e.g. /me/player
    path: String,

    /// Feature whose scopes the call needs
    #[clap(long, value_enum)]
    feature: Option<Feature>,

    /// Query parameter; can be repeated
    #[clap(
        long,
        value_parser = cli::parse_query_pair,
        action = ArgAction::Append,
        num_args = 1
    )]
    query: Vec<(String, String)>,

    /// JSON request body
    #[clap(long)]
    body: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let ctx = match Context::from_env() {
        Ok(ctx) => ctx,
        Err(e) => error!("{}", e),
    };

    let result = match cli.command {
        Command::Auth(opt) => cli::auth(&ctx, opt.app_only).await,
        Command::Status => cli::status(&ctx).await,
        Command::Call(opt) => {
            cli::call(
                &ctx,
                &opt.method,
                &opt.path,
                opt.feature,
                opt.query,
                opt.body,
            )
            .await
        }
        Command::Player { action } => cli::player(&ctx, action).await,
        Command::Completions(_) => Ok(()),
    };

    if let Err(e) = result {
        error!("{}", e);
    }
}
