use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use priority_sieve::cache::save_to_json_file;
use priority_sieve::merge::list_priority_files;
use priority_sieve::{
    CachedCollection, CollectionPriorities, Evaluation, HighlightSettings, Morpheme,
    NoCollection, PriorityMerger, PrioritySelection, RubyStyle, SieveConfig, TextHighlighter,
};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "priority-sieve")]
#[command(about = "Merge morph priority files and highlight morph learning status")]
struct Cli {
    /// YAML settings file; every setting has a default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge the selected priority sources into one mapping
    Merge(MergeArgs),
    /// Wrap each morph of an expression in its learning status
    Highlight(HighlightArgs),
    /// List the priority files available for selection
    List {
        /// Directory holding the priority files
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct MergeArgs {
    /// Priority file names or "Collection frequency"; replaces the configured selection
    selection: Vec<String>,

    #[arg(long, value_enum)]
    evaluation: Option<Evaluation>,

    /// Directory holding the priority files
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Priority cache standing in for the collection frequencies
    #[arg(long)]
    collection: Option<PathBuf>,

    /// Worker threads for parsing, 0 for one per CPU
    #[arg(long)]
    threads: Option<usize>,

    /// Save the merged mapping as a priority cache
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct HighlightArgs {
    /// Expression, may contain ruby annotations such as `予定[よてい]`
    expression: String,

    /// JSON array of morphs with their highest learning intervals
    #[arg(long)]
    morphs: PathBuf,

    #[arg(long, value_enum)]
    evaluation: Option<Evaluation>,

    #[arg(long, value_enum)]
    ruby_style: Option<RubyStyle>,
}

fn init_logging(dev_mode: bool) {
    let default_level = if dev_mode { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn merge(config: &SieveConfig, args: MergeArgs) -> Result<()> {
    let evaluation = args.evaluation.unwrap_or(config.evaluation);
    let selection = if args.selection.is_empty() {
        config.morph_priority_selection.clone()
    } else {
        PrioritySelection::from(args.selection)
    };
    let dir = args.dir.unwrap_or_else(|| config.priority_files_dir.clone());
    let parallel = match args.threads {
        Some(threads) => priority_sieve::ParallelConfig::with_threads(threads),
        None => config.parallel(),
    };

    let cached;
    let collection: &dyn CollectionPriorities = match &args.collection {
        Some(path) => {
            cached = CachedCollection::new(path);
            &cached
        }
        None => &NoCollection,
    };

    let reader = config.priority_file_reader();
    let merger = PriorityMerger::new(&reader, dir, collection).with_parallel(parallel);

    println!("Priority files: {}", merger.priority_files_dir().display());
    println!("Evaluation: {:?}", evaluation);
    println!("Sources: {}", selection.normalized().join(", "));
    println!();

    let start_time = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    pb.set_message("Merging priorities...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let merged = merger.get_morph_priority(evaluation, &selection);
    pb.finish_and_clear();
    let merged = merged.context("failed to merge morph priorities")?;

    if let Some(output) = &args.output {
        save_to_json_file(output, &merged)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("Output: {}", output.display());
    }

    let elapsed = start_time.elapsed();
    println!("Entries: {}", merged.len());
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    Ok(())
}

fn highlight(config: &SieveConfig, args: HighlightArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.morphs)
        .with_context(|| format!("failed to read {}", args.morphs.display()))?;
    let morphs: Vec<Morpheme> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse morphs from {}", args.morphs.display()))?;

    let mut settings = HighlightSettings::from(config);
    if let Some(evaluation) = args.evaluation {
        settings.evaluation = evaluation;
    }
    if let Some(style) = args.ruby_style {
        settings.ruby_style = style;
    }

    let highlighter = TextHighlighter::new(&settings, &args.expression, &morphs);
    println!("{}", highlighter.highlighted());
    Ok(())
}

fn list(config: &SieveConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.priority_files_dir.clone());
    let names = list_priority_files(&dir)
        .with_context(|| format!("failed to list {}", dir.display()))?;
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SieveConfig::load(path)?,
        None => SieveConfig::default(),
    };
    init_logging(config.dev_mode);

    match cli.command {
        Command::Merge(args) => merge(&config, args),
        Command::Highlight(args) => highlight(&config, args),
        Command::List { dir } => list(&config, dir),
    }
}
