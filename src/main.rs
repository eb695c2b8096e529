use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lessonsync::{format_timestamp, TranscriptIndex, VideoSource};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lessonsync", version, about = "Inspect lesson videos and transcripts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a lesson video URL to its source and embed URL
    Resolve {
        url: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a transcript file and look up segments in it
    Transcript {
        /// JSON array of segments
        file: PathBuf,
        /// Print the segment active at this time (seconds)
        #[arg(long)]
        at: Option<f64>,
        /// Print segments whose text contains this string
        #[arg(long)]
        search: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Resolve { url, json } => resolve(&url, json),
        Command::Transcript { file, at, search } => transcript(&file, at, search.as_deref()),
    }
}

fn resolve(url: &str, json: bool) -> Result<()> {
    let source = VideoSource::from_url(url);
    if json {
        let value = match &source {
            Some(src) => serde_json::json!({
                "source": src,
                "embed_url": src.embed_url(),
                "thumbnail_url": src.thumbnail_url(),
                "scriptable": src.supports_player_api(),
            }),
            None => serde_json::json!({ "source": null, "placeholder": true }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    match source {
        Some(src) => {
            println!("id:         {}", src.id());
            println!("embed:      {}", src.embed_url());
            if let Some(thumb) = src.thumbnail_url() {
                println!("thumbnail:  {thumb}");
            }
            println!("scriptable: {}", src.supports_player_api());
        }
        None => println!("unsupported video url; the player would show a placeholder"),
    }
    Ok(())
}

fn transcript(file: &Path, at: Option<f64>, search: Option<&str>) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading transcript {}", file.display()))?;
    let index = TranscriptIndex::from_json(&raw)
        .with_context(|| format!("loading transcript {}", file.display()))?;
    log::info!("{} segments loaded", index.len());

    if at.is_none() && search.is_none() {
        for s in index.segments() {
            println!("[{} - {}] {}", format_timestamp(s.start_time), format_timestamp(s.end_time), s.text);
        }
        return Ok(());
    }
    if let Some(t) = at {
        match index.active_at(t) {
            Some(s) => println!("{} [{}] {}", format_timestamp(t), s.id, s.text),
            None => println!("{} no active segment", format_timestamp(t)),
        }
    }
    if let Some(query) = search {
        for s in index.search(query) {
            println!("[{}] {}", format_timestamp(s.start_time), s.text);
        }
    }
    Ok(())
}
