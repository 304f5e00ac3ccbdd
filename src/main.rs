//! Weave CLI entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use weave::observer::{JsonObserver, LogObserver};
use weave::source::DEFAULT_WEAVEFILE;
use weave::{Engine, EngineOptions};

/// Executes tasks declared in a Weavefile
#[derive(Debug, Parser)]
#[command(name = "weave", version, about)]
struct Cli {
    /// Path to the Weavefile
    #[arg(short = 'f', long = "file", global = true, default_value = DEFAULT_WEAVEFILE)]
    file: PathBuf,

    /// Max parallel tasks to run
    #[arg(long, global = true, default_value_t = weave::engine::DEFAULT_WORKERS)]
    workers: usize,

    /// Emit events without executing operations
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Disable all output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Shorthand for --log-level debug
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List task names
    Tasks,
    /// Run a task and everything it depends on
    Run {
        /// Task to run
        task: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logger(cli: &Cli) {
    let level = if cli.quiet {
        log::LevelFilter::Off
    } else if cli.debug {
        log::LevelFilter::Debug
    } else {
        cli.log_level.into()
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).target(env_logger::Target::Stderr);

    match cli.log_format {
        LogFormat::Text => {
            builder.format_timestamp(None).format_module_path(false);
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = serde_json::json!({
                    "time": chrono::Utc::now().to_rfc3339(),
                    "level": record.level().to_string().to_lowercase(),
                    "target": record.target(),
                    "msg": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            });
        }
    }

    builder.init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(&cli);

    if let Err(e) = start(cli).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn start(cli: Cli) -> Result<()> {
    let options = EngineOptions {
        max_workers: cli.workers,
        dry_run: cli.dry_run,
    };
    let mut engine = Engine::from_file(&cli.file, options);

    if !cli.quiet {
        match cli.log_format {
            LogFormat::Text => {
                LogObserver::attach(engine.bus());
            }
            LogFormat::Json => {
                JsonObserver::stderr().attach(engine.bus());
            }
        }
    }

    engine.load().context("load error")?;

    match cli.command {
        Command::Tasks => {
            for name in engine.task_names() {
                println!("{}", name);
            }
        }
        Command::Run { task } => {
            engine.run(&task).await.context("run error")?;
        }
    }

    Ok(())
}
