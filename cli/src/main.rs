mod config;
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::CommandFactory;
use clap::FromArgMatches;
use clap::Parser;
use clap::Subcommand;
use studio_tui::AppConfig;
use studio_tui::ExitReason;
use studio_tui::HttpBackend;
use studio_tui::SessionConfig;
use url::Url;

use crate::config::ConfigStore;
use crate::config::DEFAULT_SERVER_URL;
use crate::config::FileConfig;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Attach images, write a prompt and generate images from the terminal"
)]
struct Cli {
    /// Root URL of the generation backend.
    #[arg(long, env = "IMAGE_STUDIO_SERVER")]
    server: Option<String>,

    /// Directory where downloaded images are saved.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Hide the prompt optimization control.
    #[arg(long)]
    no_optimize: bool,

    /// Render only generated text and images, without echoing the request.
    #[arg(long)]
    reduced: bool,

    /// Abort requests after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Image to attach at startup (repeatable).
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Initial prompt text.
    #[arg(long)]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum CliCommand {
    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigAction {
    /// Print the config file location.
    Path,
    /// Write a commented default config if none exists.
    Init,
}

/// Effective settings after merging flags over the config file over defaults.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
    server_url: Url,
    download_dir: PathBuf,
    session: SessionConfig,
    timeout: Option<Duration>,
}

fn resolve_settings(cli: &Cli, file: FileConfig) -> anyhow::Result<Settings> {
    let server = cli
        .server
        .clone()
        .or(file.server_url)
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let server_url =
        Url::parse(&server).with_context(|| format!("invalid server URL `{server}`"))?;

    let download_dir = cli
        .download_dir
        .clone()
        .or(file.download_dir)
        .or_else(dirs::download_dir)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let session = SessionConfig {
        include_optimization: !cli.no_optimize && file.include_optimization.unwrap_or(true),
        include_echo_sections: !cli.reduced && file.include_echo_sections.unwrap_or(true),
    };

    Ok(Settings {
        server_url,
        download_dir,
        session,
        timeout: cli
            .timeout
            .or(file.request_timeout_secs)
            .map(Duration::from_secs),
    })
}

fn parse_cli() -> Cli {
    let matches = Cli::command()
        .version(studio_tui::IMAGE_STUDIO_VERSION)
        .get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
}

fn run_config_command(store: &ConfigStore, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Path => println!("{}", store.path().display()),
        ConfigAction::Init => {
            if store.init()? {
                println!("Wrote {}", store.path().display());
            } else {
                println!("{} already exists", store.path().display());
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = parse_cli();
    let store = ConfigStore::new_default()?;

    if let Some(CliCommand::Config { action }) = cli.command.as_ref() {
        return run_config_command(&store, *action);
    }

    let home = config::studio_home()?;
    if let Err(err) = logging::init(&home.join("log")) {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let settings = resolve_settings(&cli, store.load()?)?;
    tracing::info!(
        "image-studio {} talking to {}",
        studio_tui::IMAGE_STUDIO_VERSION,
        settings.server_url
    );
    let backend = HttpBackend::new(&settings.server_url, settings.timeout)?;
    let exit_info = studio_tui::run_app(
        backend,
        AppConfig {
            session: settings.session,
            download_dir: settings.download_dir,
            initial_images: cli.images,
            initial_prompt: cli.prompt,
        },
    )
    .await?;

    tracing::info!(
        "session ended after {} request(s): {:?}",
        exit_info.generate_requests,
        exit_info.exit_reason
    );
    if let ExitReason::Fatal(message) = exit_info.exit_reason {
        anyhow::bail!(message);
    }
    Ok(())
}
