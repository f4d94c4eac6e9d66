use std::{fs, num::NonZeroU32, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console_core::{
    scripted::{ScriptedBinder, ScriptedConnector, SessionScript},
    terminal::{OutputStyle, TerminalView},
    ConnectionState, ConsoleController, ConsoleOptions,
};
use serde_json::Value;
use shared::{
    domain::{Band, EventTopic, ScanDirection, StereoMode},
    protocol::{ApiName, RadioRequest, Reply, VerbPath},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, validate_binder_url, Settings};

/// Debug console for the radio binder service.
///
/// Calls are answered by a scripted in-process session (`--script`), never by a
/// live binder; without a script every verb is rejected with `not_found`.
#[derive(Parser, Debug)]
#[command(name = "radio-console")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session script replayed in place of a live binder.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Base URL shown in question lines; no connection is made to it.
    #[arg(long)]
    binder_url: Option<String>,
    #[arg(long)]
    api: Option<ApiName>,
    /// Print the span markup a browser page would receive.
    #[arg(long, conflicts_with = "no_color")]
    html: bool,
    #[arg(long)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the session, show its events, then close it.
    Session,
    Subscribe {
        topic: EventTopic,
    },
    Unsubscribe {
        topic: EventTopic,
    },
    /// Get the current band, or select one.
    Band {
        band: Option<Band>,
    },
    BandSupported {
        band: Band,
    },
    FrequencyRange {
        band: Band,
    },
    FrequencyStep {
        band: Band,
    },
    /// Get the tuned frequency, or tune to one (Hz).
    Frequency {
        hz: Option<NonZeroU32>,
    },
    Rds,
    Start,
    Stop,
    ScanStart {
        direction: ScanDirection,
    },
    ScanStop,
    /// Get the stereo mode, or set it.
    StereoMode {
        mode: Option<StereoMode>,
    },
    /// Call any verb with a JSON argument.
    Call {
        path: VerbPath,
        #[arg(default_value = "{}")]
        argument: String,
    },
    /// Send a JSON message wrapped as {"data": message}.
    Send {
        path: VerbPath,
        message: String,
    },
}

enum Action {
    Replay,
    Request(RadioRequest),
    Call(VerbPath, Value),
    Send(VerbPath, Value),
}

impl Command {
    fn into_action(self) -> Result<Action> {
        let request = match self {
            Command::Session => return Ok(Action::Replay),
            Command::Call { path, argument } => {
                let argument = parse_json("argument", &argument)?;
                return Ok(Action::Call(path, argument));
            }
            Command::Send { path, message } => {
                let message = parse_json("message", &message)?;
                return Ok(Action::Send(path, message));
            }
            Command::Subscribe { topic } => RadioRequest::Subscribe(topic),
            Command::Unsubscribe { topic } => RadioRequest::Unsubscribe(topic),
            Command::Band { band } => RadioRequest::Band(band),
            Command::BandSupported { band } => RadioRequest::BandSupported(band),
            Command::FrequencyRange { band } => RadioRequest::FrequencyRange(band),
            Command::FrequencyStep { band } => RadioRequest::FrequencyStep(band),
            Command::Frequency { hz } => RadioRequest::Frequency(hz),
            Command::Rds => RadioRequest::Rds,
            Command::Start => RadioRequest::Start,
            Command::Stop => RadioRequest::Stop,
            Command::ScanStart { direction } => RadioRequest::ScanStart(direction),
            Command::ScanStop => RadioRequest::ScanStop,
            Command::StereoMode { mode } => RadioRequest::StereoMode(mode),
        };
        Ok(Action::Request(request))
    }
}

fn parse_json(what: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{what} is not valid JSON: {raw}"))
}

fn apply_cli_overrides(settings: &mut Settings, cli: &Cli) -> Result<()> {
    if let Some(binder_url) = &cli.binder_url {
        validate_binder_url(binder_url)?;
        settings.binder_url = binder_url.clone();
    }
    if let Some(api) = &cli.api {
        settings.api = api.clone();
    }
    if let Some(script) = &cli.script {
        settings.script = Some(script.clone());
    }
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        settings.color = false;
    }
    Ok(())
}

fn output_style(settings: &Settings, html: bool) -> OutputStyle {
    if html {
        OutputStyle::Html
    } else if settings.color {
        OutputStyle::Ansi
    } else {
        OutputStyle::Plain
    }
}

fn load_script(settings: &Settings) -> Result<SessionScript> {
    let Some(path) = &settings.script else {
        return Ok(SessionScript::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read session script '{}'", path.display()))?;
    SessionScript::from_json(&raw)
        .with_context(|| format!("invalid session script '{}'", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    apply_cli_overrides(&mut settings, &cli)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let html = cli.html;
    let action = cli.command.into_action()?;
    let script = load_script(&settings)?;

    let view = Arc::new(TerminalView::stdout(output_style(&settings, html)));
    let controller = ConsoleController::new(
        ConsoleOptions {
            api: settings.api.clone(),
            binder_url: settings.binder_url.clone(),
            topics: settings.topics.clone(),
        },
        view,
    );
    let binder = ScriptedBinder::from_script(&script);
    let pump = controller
        .initialize(&ScriptedConnector::new(binder.clone()))
        .await?;

    script.play(&binder);
    let state = *controller
        .watch_state()
        .wait_for(|state| *state != ConnectionState::Connecting)
        .await
        .context("console stopped before the session settled")?;
    if state == ConnectionState::Closed {
        pump.await.context("notice task failed")?;
        bail!("binder session closed before it opened");
    }
    controller.settle_subscriptions().await;

    let reply = match action {
        Action::Replay => None,
        Action::Request(request) => Some(controller.request(&request).await),
        Action::Call(path, argument) => Some(controller.invoke(&path, argument).await),
        Action::Send(path, message) => Some(controller.send(&path, message).await),
    };

    binder.abort();
    pump.await.context("notice task failed")?;
    info!(events = controller.event_count(), "console session finished");

    Ok(match reply {
        Some(Reply::Failure(payload)) => {
            error!(payload = %payload, "binder rejected the call");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("radio-console").chain(args.iter().copied()))
            .expect("arguments")
    }

    #[test]
    fn typed_subcommands_map_to_radio_requests() {
        let cases = [
            (vec!["band", "fm"], RadioRequest::Band(Some(Band::Fm))),
            (vec!["band"], RadioRequest::Band(None)),
            (vec!["band-supported", "AM"], RadioRequest::BandSupported(Band::Am)),
            (vec!["stereo-mode", "Mono"], RadioRequest::StereoMode(Some(StereoMode::Mono))),
            (vec!["scan-start", "backward"], RadioRequest::ScanStart(ScanDirection::Backward)),
            (vec!["frequency", "101100000"], RadioRequest::Frequency(NonZeroU32::new(101_100_000))),
            (vec!["subscribe", "station_found"], RadioRequest::Subscribe(EventTopic::StationFound)),
        ];
        for (args, expected) in cases {
            match parse(&args).command.into_action().expect("action") {
                Action::Request(request) => assert_eq!(request, expected, "{args:?}"),
                _ => panic!("expected a typed request for {args:?}"),
            }
        }
    }

    #[test]
    fn unknown_keywords_fail_at_parse_time() {
        let args = ["radio-console", "band", "DAB"];
        assert!(Cli::try_parse_from(args).is_err());
        let args = ["radio-console", "call", "radioband"];
        assert!(Cli::try_parse_from(args).is_err());
        let args = ["radio-console", "frequency", "0"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn free_form_calls_parse_their_json() {
        let cli = parse(&["call", "radio/frequency_step", r#"{"band":"FM"}"#]);
        match cli.command.into_action().expect("action") {
            Action::Call(path, argument) => {
                assert_eq!(path.to_string(), "radio/frequency_step");
                assert_eq!(argument, serde_json::json!({"band": "FM"}));
            }
            _ => panic!("expected a call"),
        }

        let cli = parse(&["send", "radio/ping", "not json"]);
        assert!(cli.command.into_action().is_err());
    }

    #[test]
    fn help_says_calls_are_answered_by_the_script() {
        use clap::CommandFactory;

        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("never by a live binder"), "{help}");
        assert!(help.contains("no connection is made to it"), "{help}");
    }

    #[test]
    fn html_flag_wins_over_color_setting() {
        let settings = Settings::default();
        assert_eq!(output_style(&settings, true), OutputStyle::Html);
        assert_eq!(output_style(&settings, false), OutputStyle::Ansi);

        let plain = Settings {
            color: false,
            ..Settings::default()
        };
        assert_eq!(output_style(&plain, false), OutputStyle::Plain);
    }

    #[test]
    fn cli_overrides_replace_file_settings() {
        let cli = parse(&[
            "--binder-url",
            "ws://car.local:1234/api",
            "--api",
            "tuner",
            "--no-color",
            "session",
        ]);
        let mut settings = Settings::default();
        apply_cli_overrides(&mut settings, &cli).expect("overrides");

        assert_eq!(settings.binder_url, "ws://car.local:1234/api");
        assert_eq!(settings.api.as_str(), "tuner");
        assert!(!settings.color);
        assert!(matches!(cli.command, Command::Session));
    }
}
