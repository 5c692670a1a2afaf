use clap::{ArgAction, Parser, Subcommand};
use imgcache::run::{partial_path, run, MarkerPolicy, RunConfig};
use imgcache::sink::{JsonLinesSink, MemorySink, RecordSink};
use imgcache::{ImgCacheReader, Record};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "imgcache", about = "Extract thumbnails and file metadata from Android imgcache files")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every record into a JSON-lines file
    Decode {
        input: PathBuf,
        /// Output path (default: <INPUT>.jsonl)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Include hex-encoded thumbnails in each row
        #[arg(long)]
        thumbnails: bool,
        /// Skip records without a thumbnail marker instead of aborting
        #[arg(long)]
        skip_missing_marker: bool,
    },
    /// Write a copy with every thumbnail's pixel data zeroed
    Sanitize {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Copy records without a thumbnail marker unchanged instead of aborting
        #[arg(long)]
        skip_missing_marker: bool,
    },
    /// Print one line per record
    List {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match cli.command {

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { input, output, thumbnails, skip_missing_marker } => {
            let output = output.unwrap_or_else(|| {
                let mut name = input.clone().into_os_string();
                name.push(".jsonl");
                PathBuf::from(name)
            });
            let config = RunConfig::decode(&input).with_marker_policy(policy(skip_missing_marker));
            // Rows go to a side file until the whole container has decoded.
            let partial = partial_path(&output);

            let mut sink = JsonLinesSink::new(BufWriter::new(File::create(&partial)?))
                .with_thumbnails(thumbnails);
            let summary = match run(&config, &mut sink) {
                Ok(s) => s,
                Err(e) => {
                    drop(sink);
                    let _ = std::fs::remove_file(&partial);
                    return Err(e.into());
                }
            };
            drop(sink);
            std::fs::rename(&partial, &output)?;
            println!("{}", summary.summary());
            println!("Wrote: {}", output.display());
        }

        // ── Sanitize ─────────────────────────────────────────────────────────
        Commands::Sanitize { input, output, skip_missing_marker } => {
            let config = RunConfig::sanitize(&input, &output)
                .with_marker_policy(policy(skip_missing_marker));
            let summary = run(&config, &mut MemorySink::default())?;
            println!("{}", summary.summary());
            println!("Sanitized → {}", output.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let reader = ImgCacheReader::new(File::open(&input)?)?;
            println!("Container: {} ({} B)", input.display(), reader.file_size());
            println!("{:>10} {:<9} {:>8}  {:<25} {}", "Offset", "Codec", "Thumb", "Time (UTC)", "File path");
            for record in reader.records() {
                PrintSink.accept(&record?)?;
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn policy(skip: bool) -> MarkerPolicy {
    if skip { MarkerPolicy::Skip } else { MarkerPolicy::Abort }
}

/// Prints a one-line listing per record to stdout.
struct PrintSink;

impl RecordSink for PrintSink {
    fn accept(&mut self, r: &Record) -> io::Result<()> {
        let m = &r.metadata;
        let time = m.datetime()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into());
        let path = if r.is_parsed() {
            m.original_file_path.as_deref().or(m.internal_path.as_deref()).unwrap_or("-").to_owned()
        } else {
            format!("<unparsed> {}", hex::encode(&r.raw_metadata[..r.raw_metadata.len().min(16)]))
        };
        writeln!(io::stdout(), "{:>10} {:<9} {:>8}  {:<25} {}",
            r.offset, r.codec.name(), r.thumbnail.len(), time, path)
    }
}
