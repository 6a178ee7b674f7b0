use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use demodec::{Demo, DemoError, Dispatcher, ParseOptions, Selection, TickOutput};
use demodec_tools::{
    collect_inputs, format_events_pretty, format_header_pretty, format_players_pretty,
    format_summary_pretty, parse_names, parse_steamids, parse_ticks, write_voice, BatchEntry,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "demodec", version, about = "Replay recording inspection and decoding")]
struct Cli {
    /// Fail on the first corrupt message instead of skipping it.
    #[arg(long, global = true)]
    strict: bool,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the recording header, server info and file info.
    Header { demo: PathBuf },
    /// Print game events with optional player and game rules properties.
    Events {
        demo: PathBuf,
        /// Event names, comma-separated, or `all`.
        #[arg(long, default_value = "all")]
        events: String,
        /// Properties attached for every player an event names.
        #[arg(long, default_value = "")]
        player_fields: String,
        /// Game rules properties attached to every event.
        #[arg(long, default_value = "")]
        other_fields: String,
    },
    /// Print player properties at chosen ticks.
    Ticks {
        demo: PathBuf,
        /// Property names, comma-separated, or `all`. `X`, `Y`, `Z` are position.
        #[arg(long)]
        fields: String,
        /// Ticks such as `100,200,1000..1064`, or `all`.
        #[arg(long, default_value = "all")]
        ticks: String,
        /// Steam ids to keep, or `all`.
        #[arg(long, default_value = "all")]
        players: String,
        /// Emit one array per column instead of one object per row.
        #[arg(long)]
        columns: bool,
    },
    /// Print every player seen in the recording.
    Players { demo: PathBuf },
    /// Print projectile positions per tick.
    Grenades { demo: PathBuf },
    /// Print items dropped to players.
    ItemDrops { demo: PathBuf },
    /// Print the weapon skins each player owned at the end of the match.
    Skins { demo: PathBuf },
    /// Print the names of the events that occur.
    ListEvents { demo: PathBuf },
    /// Write each speaker's voice to a file.
    Voice {
        demo: PathBuf,
        /// Directory for the output files.
        #[arg(long, default_value = "voice")]
        out: PathBuf,
    },
    /// Decode everything and print counters.
    Inspect { demo: PathBuf },
    /// Inspect many recordings in parallel.
    Batch {
        /// A recording or a directory of recordings.
        path: PathBuf,
        /// Glob filter when `path` is a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Worker threads; 0 uses one per core.
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let options = ParseOptions::default().strict(cli.strict);
    let format = cli.format;
    match cli.command {
        Command::Header { demo } => {
            let bytes = read_demo(&demo)?;
            let header = Demo::with_options(&bytes, &options).header()?;
            emit(format, &header, || format_header_pretty(&header))?;
        }
        Command::Events {
            demo,
            events,
            player_fields,
            other_fields,
        } => {
            let bytes = read_demo(&demo)?;
            let rows = Demo::with_options(&bytes, &options).events(
                parse_names(&events),
                parse_names(&player_fields),
                parse_names(&other_fields),
            )?;
            emit(format, &rows, || format_events_pretty(&rows))?;
        }
        Command::Ticks {
            demo,
            fields,
            ticks,
            players,
            columns,
        } => {
            let bytes = read_demo(&demo)?;
            let demo = Demo::with_options(&bytes, &options);
            let fields = parse_names(&fields);
            let ticks = parse_ticks(&ticks)?;
            let players = parse_steamids(&players)?;
            let output = if columns {
                TickOutput::Columns(demo.tick_columns(fields, ticks, players)?)
            } else {
                TickOutput::Rows(demo.ticks(fields, ticks, players)?)
            };
            emit(OutputFormat::Json, &output, String::new)?;
        }
        Command::Players { demo } => {
            let bytes = read_demo(&demo)?;
            let roster = Demo::with_options(&bytes, &options).player_info()?;
            emit(format, &roster, || format_players_pretty(&roster))?;
        }
        Command::Grenades { demo } => {
            let bytes = read_demo(&demo)?;
            let rows = Demo::with_options(&bytes, &options).grenades()?;
            emit(OutputFormat::Json, &rows, String::new)?;
        }
        Command::ItemDrops { demo } => {
            let bytes = read_demo(&demo)?;
            let items = Demo::with_options(&bytes, &options).item_drops()?;
            emit(OutputFormat::Json, &items, String::new)?;
        }
        Command::Skins { demo } => {
            let bytes = read_demo(&demo)?;
            let items = Demo::with_options(&bytes, &options).skins()?;
            emit(OutputFormat::Json, &items, String::new)?;
        }
        Command::ListEvents { demo } => {
            let bytes = read_demo(&demo)?;
            let names = Demo::with_options(&bytes, &options).game_event_names()?;
            emit(format, &names, || {
                names.iter().map(|name| format!("{name}\n")).collect()
            })?;
        }
        Command::Voice { demo, out } => {
            let bytes = read_demo(&demo)?;
            let tracks = Demo::with_options(&bytes, &options).voice()?;
            let written = write_voice(&out, &tracks)?;
            info!(files = written.len(), dir = %out.display(), "voice written");
            emit(format, &written, || {
                written
                    .iter()
                    .map(|path| format!("{}\n", path.display()))
                    .collect()
            })?;
        }
        Command::Inspect { demo } => {
            let bytes = read_demo(&demo)?;
            let summary = Demo::with_options(&bytes, &options).inspect()?;
            emit(format, &summary, || format_summary_pretty(&summary))?;
        }
        Command::Batch {
            path,
            glob,
            threads,
        } => {
            let inputs = collect_inputs(&path, glob.as_deref())?;
            let paths: Vec<PathBuf> = inputs.into_iter().map(|entry| entry.path).collect();
            let dispatcher = Dispatcher::new(threads)?;
            info!(files = paths.len(), threads = dispatcher.threads(), "batch");
            let results = dispatcher.run(&paths, |_, bytes| {
                Demo::with_options(bytes, &options).inspect()
            });
            let entries: Vec<BatchEntry> = paths
                .into_iter()
                .zip(results)
                .map(|(path, result)| batch_entry(path, result))
                .collect();
            emit(format, &entries, || {
                entries
                    .iter()
                    .map(|entry| match (&entry.summary, &entry.error) {
                        (Some(summary), _) => format!(
                            "{}: {} events, last tick {}\n",
                            entry.path.display(),
                            summary.events,
                            summary.last_tick
                        ),
                        (None, error) => format!(
                            "{}: error: {}\n",
                            entry.path.display(),
                            error.as_deref().unwrap_or("unknown")
                        ),
                    })
                    .collect()
            })?;
        }
    }
    Ok(())
}

fn read_demo(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("read recording {}", path.display()))
}

fn batch_entry(path: PathBuf, result: Result<demodec::ParseSummary, DemoError>) -> BatchEntry {
    match result {
        Ok(summary) => BatchEntry {
            path,
            summary: Some(summary),
            error: None,
        },
        Err(err) => BatchEntry {
            path,
            summary: None,
            error: Some(err.to_string()),
        },
    }
}

/// Prints `value` as JSON, or the pretty rendering when one was asked for.
fn emit<T, F>(format: OutputFormat, value: &T, pretty: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    let mut stdout = io::stdout().lock();
    if format == OutputFormat::Pretty {
        let text = pretty();
        if !text.is_empty() {
            stdout.write_all(text.as_bytes())?;
            return Ok(());
        }
    }
    serde_json::to_writer_pretty(&mut stdout, value).context("serialize json")?;
    stdout.write_all(b"\n")?;
    Ok(())
}
