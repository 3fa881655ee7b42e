use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use runscribe_core::prelude::*;
use runscribe_core::init_observability;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "runscribe",
    about = "Replay agent run events with a live transcript and dual-sink tracing",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines file of stream events as one run
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Path to the recorded stream events (one JSON object per line)
    events: PathBuf,

    /// Question that opened the run
    #[arg(short, long)]
    question: String,

    /// Concise (CSV) trace path
    #[arg(long)]
    concise: Option<PathBuf>,

    /// Verbose (NDJSON) trace path
    #[arg(long)]
    verbose: Option<PathBuf>,

    /// Character cap for concise trace fields and log lines
    #[arg(long)]
    max_chars: Option<usize>,

    /// Print the run log after the answer
    #[arg(long)]
    show_log: bool,
}

impl ReplayArgs {
    fn trace_config(&self) -> anyhow::Result<TraceConfig> {
        let config = TraceConfig::from_env().context("reading trace settings")?;
        Ok(self.apply_overrides(config))
    }

    /// Command-line values win over `base`.
    fn apply_overrides(&self, mut config: TraceConfig) -> TraceConfig {
        if let Some(path) = &self.concise {
            config = config.concise_path(path);
        }
        if let Some(path) = &self.verbose {
            config = config.verbose_path(path);
        }
        if let Some(cap) = self.max_chars {
            config = config.max_field_chars(cap);
        }
        config
    }
}

/// Streams the answer to stdout as it grows.
#[derive(Default)]
struct StdoutConsumer {
    printed: Mutex<usize>,
}

impl TranscriptConsumer for StdoutConsumer {
    fn push(&self, transcript: &Transcript) {
        let Ok(mut printed) = self.printed.lock() else {
            return;
        };
        if let Some(suffix) = unseen_suffix(&transcript.answer, *printed) {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(suffix.as_bytes());
            let _ = out.flush();
            *printed = transcript.answer.len();
        }
    }
}

/// Part of `answer` past the first `printed` bytes, if any.
fn unseen_suffix(answer: &str, printed: usize) -> Option<&str> {
    answer.get(printed..).filter(|s| !s.is_empty())
}

async fn replay(args: ReplayArgs) -> anyhow::Result<()> {
    let config = args.trace_config()?;
    let mut conversation =
        Conversation::from_config(config).context("invalid trace configuration")?;
    let source = open_json_lines(&args.events)
        .await
        .with_context(|| format!("opening {}", args.events.display()))?;

    let cancel = conversation.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let consumer = StdoutConsumer::default();
    let outcome = conversation.run(&args.question, source, &consumer).await;
    interrupt.abort();
    let outcome = outcome.context("run failed")?;

    println!();
    if args.show_log && !outcome.log.is_empty() {
        println!("--- log ---");
        println!("{}", outcome.log_text());
    }
    info!(
        event = "cli.replay_finished",
        domain = "cli",
        run_id = %outcome.run_id,
        events = outcome.events,
        cancelled = outcome.cancelled
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_observability();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay(args) => replay(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_args_parse_with_overrides() {
        let cli = Cli::try_parse_from([
            "runscribe",
            "replay",
            "run.ndjson",
            "--question",
            "what is 2+2?",
            "--max-chars",
            "100",
            "--show-log",
        ])
        .unwrap();
        let Command::Replay(args) = cli.command;
        assert_eq!(args.events, PathBuf::from("run.ndjson"));
        assert_eq!(args.question, "what is 2+2?");
        assert_eq!(args.max_chars, Some(100));
        assert!(args.show_log);
        assert!(args.concise.is_none());
    }

    #[test]
    fn question_is_required() {
        assert!(Cli::try_parse_from(["runscribe", "replay", "run.ndjson"]).is_err());
    }

    #[test]
    fn overrides_replace_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let concise = dir.path().join("c.csv");
        let concise_arg = concise.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "runscribe",
            "replay",
            "run.ndjson",
            "-q",
            "q",
            "--concise",
            concise_arg.as_str(),
            "--max-chars",
            "64",
        ])
        .unwrap();
        let Command::Replay(args) = cli.command;
        let base = TraceConfig::default()
            .verbose_path(dir.path().join("v.ndjson"))
            .max_field_chars(0);
        let config = args.apply_overrides(base);
        assert_eq!(config.concise_path, concise);
        assert_eq!(config.verbose_path, dir.path().join("v.ndjson"));
        assert_eq!(config.max_field_chars, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unseen_suffix_skips_printed_prefix() {
        assert_eq!(unseen_suffix("Hello world", 5), Some(" world"));
        assert_eq!(unseen_suffix("Hello", 5), None);
        assert_eq!(unseen_suffix("héllo", 2), None);
        assert_eq!(unseen_suffix("abc", 0), Some("abc"));
    }
}
