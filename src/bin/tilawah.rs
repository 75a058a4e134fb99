use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use tilawah::{
    CancelToken, GenerateRequest, ReelConfig, ReelStyle,
    generate::generate_reel,
    progress::{ProgressStore, ReelRecord},
    quran::{surah_name_en, validate_verse_range},
};

#[derive(Parser, Debug)]
#[command(name = "tilawah", version, about = "Automated Quran recitation reels")]
struct Cli {
    /// Optional JSON config file; defaults apply otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the next reel (or a specific verse range).
    Generate(GenerateArgs),
    /// Render a single preview frame as a PNG (no audio, no encode).
    Frame(FrameArgs),
    /// Show the current position and recent history.
    Status,
    /// Show reel generation history.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Set the current position in the mushaf.
    SetPosition { surah: u32, ayah: u32 },
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Surah number (1-114). Omit to continue from the stored position.
    #[arg(long)]
    surah: Option<u32>,

    /// Starting ayah.
    #[arg(long)]
    start: Option<u32>,

    /// Ending ayah (inclusive).
    #[arg(long)]
    end: Option<u32>,

    /// Verses per reel when a range is not given explicitly.
    #[arg(long)]
    verses: Option<u32>,

    /// Reciter key (e.g. alafasy, sudais). Random when omitted.
    #[arg(long)]
    reciter: Option<String>,

    /// Output MP4 path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Show what would be generated without doing it.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[arg(long)]
    surah: u32,

    #[arg(long)]
    start: u32,

    #[arg(long)]
    end: u32,

    /// Reel time of the frame, seconds.
    #[arg(long, default_value_t = 1.0)]
    time: f64,

    /// Reciter key. Random when omitted.
    #[arg(long)]
    reciter: Option<String>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => ReelConfig::load(path)?,
        None => ReelConfig::default(),
    };

    match cli.cmd {
        Command::Generate(args) => cmd_generate(args, &cfg),
        Command::Frame(args) => cmd_frame(args, &cfg),
        Command::Status => cmd_status(&cfg),
        Command::History { limit } => cmd_history(&cfg, limit),
        Command::SetPosition { surah, ayah } => cmd_set_position(&cfg, surah, ayah),
    }
}

fn cmd_generate(args: GenerateArgs, cfg: &ReelConfig) -> anyhow::Result<()> {
    let style = ReelStyle::default();
    let mut store = ProgressStore::open(&cfg.state_path)?;
    let verses = args.verses.unwrap_or(cfg.verses_per_reel);

    // Explicit surah selects a fixed range; otherwise continue from the
    // stored position.
    let auto_selected = args.surah.is_none();
    let (surah, start, end) = match args.surah {
        Some(surah) => {
            let start = args.start.unwrap_or(1);
            let end = args.end.unwrap_or(start + verses.saturating_sub(1));
            validate_verse_range(surah, start, end).map(|(s, e)| (surah, s, e))?
        }
        None => store.next_verses(verses)?,
    };

    println!(
        "Generating: Surah {} ({surah}), ayat {start}-{end}",
        surah_name_en(surah)?
    );

    if args.dry_run {
        println!("dry run, nothing generated");
        return Ok(());
    }

    let request = GenerateRequest {
        surah,
        start_ayah: start,
        end_ayah: end,
        reciter_key: args.reciter,
        output_path: args.out,
    };
    let reel = generate_reel(&request, cfg, &style, &CancelToken::new())?;

    store.record_reel(ReelRecord {
        surah: reel.surah,
        start_ayah: reel.actual_start,
        end_ayah: reel.actual_end,
        reciter: reel.reciter_key.to_string(),
        video_path: reel.video_path.clone(),
        created_at: chrono::Utc::now(),
    })?;
    if auto_selected {
        store.advance(reel.surah, reel.actual_end)?;
    }

    println!(
        "wrote {} (ayat {}-{}, {:.1}s)",
        reel.video_path.display(),
        reel.actual_start,
        reel.actual_end,
        reel.total_duration
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs, cfg: &ReelConfig) -> anyhow::Result<()> {
    let style = ReelStyle::default();
    let request = GenerateRequest {
        surah: args.surah,
        start_ayah: args.start,
        end_ayah: args.end,
        reciter_key: args.reciter,
        output_path: None,
    };
    let prepared = tilawah::prepare_reel(&request, cfg, &style, &CancelToken::new())?;
    let frame = prepared.scene.frame_at(args.time);

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        frame.data(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    println!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_status(cfg: &ReelConfig) -> anyhow::Result<()> {
    let store = ProgressStore::open(&cfg.state_path)?;
    println!("Position: {}", store.describe_position());
    println!("Progress: {:.1}% of the mushaf", store.percentage_complete());
    println!("Reels generated: {}", store.state().history.len());

    for record in store.history(5) {
        println!(
            "  {} {}-{} ({}) -> {}",
            surah_name_en(record.surah).unwrap_or("?"),
            record.start_ayah,
            record.end_ayah,
            record.reciter,
            record.video_path.display()
        );
    }
    Ok(())
}

fn cmd_history(cfg: &ReelConfig, limit: usize) -> anyhow::Result<()> {
    let store = ProgressStore::open(&cfg.state_path)?;
    let history = store.history(limit);
    if history.is_empty() {
        println!("no reels generated yet");
        return Ok(());
    }
    for record in history {
        println!(
            "{} | Surah {} ({}) ayat {}-{} | {} | {}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            surah_name_en(record.surah).unwrap_or("?"),
            record.surah,
            record.start_ayah,
            record.end_ayah,
            record.reciter,
            record.video_path.display()
        );
    }
    Ok(())
}

fn cmd_set_position(cfg: &ReelConfig, surah: u32, ayah: u32) -> anyhow::Result<()> {
    let mut store = ProgressStore::open(&cfg.state_path)?;
    store.set_position(surah, ayah)?;
    println!("position set to {}", store.describe_position());
    Ok(())
}
