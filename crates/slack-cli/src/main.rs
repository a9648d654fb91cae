use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use slack_cli::{
    config::{ConfigError, Settings},
    dispatcher::{CommandDispatcher, Connector, Outcome},
    messages::MISSING_TOKEN_ERROR,
    slack_api::{HttpSlackApi, SlackApiError},
    status::{self, ConsoleStatus, OutputMode},
    ui::{HostUi, Presets, TerminalUi},
};

const LOG_ENV: &str = "SLACK_CLI_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Parser)]
#[command(author, version, about = "Slack workflow CLI")]
struct Cli {
    /// Output mode: human-readable status line or service envelope JSON.
    #[arg(long, value_enum, default_value_t = OutputModeArg::Text, global = true)]
    mode: OutputModeArg,
    /// Workspace to use when several are configured (name or team name).
    #[arg(long, global = true)]
    workspace: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Post a message to a channel.
    SendMessage {
        /// Message text; prompted for when omitted.
        #[arg(long)]
        text: Option<String>,
        /// Channel name or id; picked interactively when omitted.
        #[arg(long)]
        channel: Option<String>,
    },
    /// Post selected text as a code block. Reads stdin when --text is omitted.
    SendSelection {
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Snooze notifications for a number of minutes (max 1440).
    SetSnooze {
        #[arg(long)]
        minutes: Option<String>,
    },
    /// End the current snooze.
    EndSnooze,
    /// Show do-not-disturb status.
    DndInfo,
    /// Upload a file picked from a file list.
    UploadSelectedFile {
        path: PathBuf,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Upload the file open in the editor.
    UploadOpenFile {
        path: PathBuf,
        #[arg(long)]
        channel: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum OutputModeArg {
    Text,
    ServiceJson,
}

impl From<OutputModeArg> for OutputMode {
    fn from(value: OutputModeArg) -> Self {
        match value {
            OutputModeArg::Text => OutputMode::Text,
            OutputModeArg::ServiceJson => OutputMode::ServiceJson,
        }
    }
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::SendMessage { .. } => "send-message",
            Commands::SendSelection { .. } => "send-selection",
            Commands::SetSnooze { .. } => "set-snooze",
            Commands::EndSnooze => "end-snooze",
            Commands::DndInfo => "dnd-info",
            Commands::UploadSelectedFile { .. } => "upload-selected-file",
            Commands::UploadOpenFile { .. } => "upload-open-file",
        }
    }

    fn output_mode(&self) -> OutputMode {
        self.mode.into()
    }

    fn needs_selection(&self) -> bool {
        matches!(&self.command, Commands::SendSelection { text: None, .. })
    }

    fn presets(&self, piped_selection: Option<String>) -> Presets {
        let mut presets = Presets {
            workspace: self.workspace.clone(),
            ..Presets::default()
        };

        match &self.command {
            Commands::SendMessage { text, channel } => {
                presets.text = text.clone();
                presets.channel = channel.clone();
            }
            Commands::SendSelection { text, channel } => {
                presets.selection = text.clone().or(piped_selection);
                presets.channel = channel.clone();
            }
            Commands::SetSnooze { minutes } => presets.minutes = minutes.clone(),
            Commands::UploadSelectedFile { channel, .. } | Commands::UploadOpenFile { channel, .. } => {
                presets.channel = channel.clone();
            }
            Commands::EndSnooze | Commands::DndInfo => {}
        }

        presets
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    User,
    Runtime,
}

#[derive(Debug, PartialEq, Eq)]
struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    fn user(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::User,
            message: message.into(),
        }
    }

    fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            message: message.into(),
        }
    }

    fn from_config(error: ConfigError) -> Self {
        AppError::user(error.to_string())
    }

    fn from_client(error: SlackApiError) -> Self {
        AppError::runtime(format!("failed to initialize slack client: {error}"))
    }

    fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::User => 2,
            ErrorKind::Runtime => 1,
        }
    }

    fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::User => status::USER_ERROR_CODE,
            ErrorKind::Runtime => status::RUNTIME_ERROR_CODE,
        }
    }
}

fn outcome_exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Dispatched { ok: true, .. } | Outcome::Aborted => 0,
        Outcome::Dispatched { ok: false, .. } => 1,
        Outcome::Notice(_) | Outcome::MissingCredential => 2,
    }
}

/// Connects the dispatcher to the live Web API and the console.
struct HttpConnector {
    mode: OutputMode,
    command: &'static str,
}

impl Connector for HttpConnector {
    type Api = HttpSlackApi;
    type Status = ConsoleStatus;

    fn connect(&self, settings: &Settings) -> Result<(HttpSlackApi, ConsoleStatus), SlackApiError> {
        let api = HttpSlackApi::new(settings.api_base_url.clone())?;
        let status = ConsoleStatus::new(self.mode, self.command, settings.display_time_ms);
        Ok((api, status))
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let command = cli.command_name();
    let mode = cli.output_mode();

    match run(cli) {
        Ok(outcome) => {
            if outcome == Outcome::MissingCredential && mode == OutputMode::ServiceJson {
                println!(
                    "{}",
                    serialize_service_error(command, &AppError::user(MISSING_TOKEN_ERROR))
                );
            }
            std::process::exit(outcome_exit_code(outcome));
        }
        Err(error) => {
            match mode {
                OutputMode::ServiceJson => {
                    println!("{}", serialize_service_error(command, &error));
                }
                OutputMode::Text => {
                    eprintln!("error: {}", error.message);
                }
            }
            std::process::exit(error.exit_code());
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<Outcome, AppError> {
    let piped_selection = if cli.needs_selection() {
        read_piped_selection()
    } else {
        None
    };
    let ui = TerminalUi::open(cli.presets(piped_selection));
    let connector = HttpConnector {
        mode: cli.output_mode(),
        command: cli.command_name(),
    };

    run_with(cli, Settings::load, ui, connector)
}

fn read_piped_selection() -> Option<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return None;
    }

    let mut selection = String::new();
    match stdin.read_to_string(&mut selection) {
        Ok(_) => Some(selection),
        Err(error) => {
            tracing::warn!(%error, "failed to read selection from stdin");
            None
        }
    }
}

fn run_with<LoadSettings, U, C>(
    cli: Cli,
    load_settings: LoadSettings,
    ui: U,
    connector: C,
) -> Result<Outcome, AppError>
where
    LoadSettings: Fn() -> Result<Settings, ConfigError>,
    U: HostUi,
    C: Connector,
{
    let settings = load_settings().map_err(AppError::from_config)?;
    let mut dispatcher = CommandDispatcher::new(ui, connector);
    dispatcher
        .update_settings(settings)
        .map_err(AppError::from_client)?;

    let outcome = match cli.command {
        Commands::SendMessage { .. } => dispatcher.send_message(),
        Commands::SendSelection { .. } => dispatcher.send_selection(),
        Commands::SetSnooze { .. } => dispatcher.set_snooze(),
        Commands::EndSnooze => dispatcher.end_snooze(),
        Commands::DndInfo => dispatcher.dnd_info(),
        Commands::UploadSelectedFile { path, .. } => dispatcher.upload_selected_file(&path),
        Commands::UploadOpenFile { path, .. } => dispatcher.upload_open_file(&path),
    };

    tracing::debug!(?outcome, "command finished");
    Ok(outcome)
}

fn serialize_service_error(command: &'static str, error: &AppError) -> String {
    status::render_error_envelope(command, error.code(), &error.message, None)
}
