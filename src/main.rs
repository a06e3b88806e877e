// main.rs
//! `bpe_subword` command-line tool: train a model, encode and decode with it, or
//! inspect a saved model.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bpe_subword::{AlphabetMode, Backfill, BpeModel, BpeTrainer, Segmentation, BPE};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;

#[derive(Parser)]
#[command(name = "bpe_subword")]
#[command(about = "Train and apply byte pair encoding models", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn merges from a text corpus and save the model as JSON
    Train(TrainCommand),
    /// Encode text to token ids
    Encode(EncodeCommand),
    /// Decode token ids back to text
    Decode(DecodeCommand),
    /// Print a summary of a saved model
    Inspect(InspectCommand),
}

#[derive(Clone, Copy, ValueEnum)]
enum AlphabetArg {
    Byte,
    Character,
}

#[derive(Clone, Copy, ValueEnum)]
enum SegmentationArg {
    Corpus,
    Lines,
}

#[derive(Args)]
struct TrainCommand {
    /// Training corpus (UTF-8; invalid sequences are replaced)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the model
    #[arg(short, long)]
    output: PathBuf,

    /// Trainer configuration as JSON; flags given on the command line override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    vocab_size: Option<usize>,

    #[arg(long, value_enum)]
    alphabet: Option<AlphabetArg>,

    #[arg(long)]
    min_frequency: Option<u64>,

    /// Special token, repeat for several (e.g. --special "<pad>" --special "<unk>")
    #[arg(long = "special")]
    special_tokens: Vec<String>,

    /// Append an end-of-unit marker to every unit
    #[arg(long)]
    boundary_marker: bool,

    #[arg(long)]
    end_symbol: Option<String>,

    #[arg(long)]
    limit_alphabet: Option<usize>,

    #[arg(long, value_enum)]
    segmentation: Option<SegmentationArg>,

    /// Drop separator lines and collapse whitespace before training
    #[arg(long)]
    clean: bool,

    #[arg(long)]
    max_units: Option<usize>,

    /// Pad a short vocabulary with <extra_N> placeholders
    #[arg(long)]
    placeholders: bool,

    #[arg(long)]
    progress: bool,
}

#[derive(Args)]
struct EncodeCommand {
    /// Path to the trained model
    #[arg(short, long)]
    model: PathBuf,

    /// Text to encode ("-" reads stdin)
    #[arg(short, long)]
    input: String,
}

#[derive(Args)]
struct DecodeCommand {
    /// Path to the trained model
    #[arg(short, long)]
    model: PathBuf,

    /// Whitespace-separated ids ("-" reads stdin)
    #[arg(short, long)]
    input: String,

    /// Leave special tokens out of the text
    #[arg(long)]
    skip_special_tokens: bool,
}

#[derive(Args)]
struct InspectCommand {
    /// Path to the trained model
    #[arg(short, long)]
    model: PathBuf,

    /// Number of merges to list
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(cmd) => run_train(cmd)?,
        Commands::Encode(cmd) => run_encode(cmd)?,
        Commands::Decode(cmd) => run_decode(cmd)?,
        Commands::Inspect(cmd) => run_inspect(cmd)?,
    }

    Ok(())
}

fn read_input(input: String) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(input)
    }
}

fn read_corpus(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading corpus {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn trainer_from(cmd: &TrainCommand) -> Result<BpeTrainer> {
    let mut trainer = match &cmd.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading trainer config {}", path.display()))?;
            serde_json::from_str::<BpeTrainer>(&json)
                .with_context(|| format!("parsing trainer config {}", path.display()))?
        }
        None => BpeTrainer::default(),
    };

    if let Some(size) = cmd.vocab_size {
        trainer.vocab_size = size;
    }
    if let Some(alphabet) = cmd.alphabet {
        trainer.alphabet_mode = match alphabet {
            AlphabetArg::Byte => AlphabetMode::Byte,
            AlphabetArg::Character => AlphabetMode::Character,
        };
    }
    if let Some(frequency) = cmd.min_frequency {
        trainer.min_frequency = frequency;
    }
    if !cmd.special_tokens.is_empty() {
        trainer.special_tokens = cmd.special_tokens.clone();
    }
    if cmd.boundary_marker {
        trainer.add_boundary_marker = true;
    }
    if let Some(symbol) = &cmd.end_symbol {
        trainer.end_symbol = symbol.clone();
    }
    if cmd.limit_alphabet.is_some() {
        trainer.limit_alphabet = cmd.limit_alphabet;
    }
    if let Some(segmentation) = cmd.segmentation {
        trainer.segmentation = match segmentation {
            SegmentationArg::Corpus => Segmentation::Corpus,
            SegmentationArg::Lines => Segmentation::Lines,
        };
    }
    if cmd.clean {
        trainer.clean_corpus = true;
    }
    if cmd.max_units.is_some() {
        trainer.max_units = cmd.max_units;
    }
    if cmd.placeholders {
        trainer.backfill = Backfill::Placeholders;
    }
    if cmd.progress {
        trainer.show_progress = true;
    }
    Ok(trainer)
}

fn run_train(cmd: TrainCommand) -> Result<()> {
    let trainer = trainer_from(&cmd)?;
    let corpus = read_corpus(&cmd.input)?;
    info!("read {} bytes from {}", corpus.len(), cmd.input.display());

    let output = bpe_subword::train(&corpus, &trainer)?;
    output.model.save(&cmd.output)?;

    let report = &output.report;
    println!(
        "Trained {} ids ({} merges, stopped: {:?}) -> {}",
        output.model.vocab_size(),
        report.merges,
        report.stop_reason,
        cmd.output.display()
    );
    if report.shortfall > 0 {
        println!(
            "Vocabulary is {} ids short of the requested {} ({} placeholders added)",
            report.shortfall, trainer.vocab_size, report.placeholders
        );
    }
    Ok(())
}

fn run_encode(cmd: EncodeCommand) -> Result<()> {
    let bpe = BPE::new(BpeModel::load(&cmd.model)?);
    let text = read_input(cmd.input)?;

    let (ids, unknown) = bpe.encode_with_report(&text);
    let ids_str: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    println!("{}", ids_str.join(" "));
    if unknown > 0 {
        eprintln!("{unknown} characters were mapped to <unk>");
    }
    Ok(())
}

fn run_decode(cmd: DecodeCommand) -> Result<()> {
    let bpe = BPE::new(BpeModel::load(&cmd.model)?).skip_special_tokens(cmd.skip_special_tokens);
    let input = read_input(cmd.input)?;

    let ids = input
        .split_whitespace()
        .map(|s| s.parse::<u32>().with_context(|| format!("{s:?} is not a token id")))
        .collect::<Result<Vec<u32>>>()?;
    let report = bpe.decode_with_report(&ids);
    println!("{}", report.text);
    if report.unknown_ids > 0 {
        eprintln!("{} ids were outside the vocabulary", report.unknown_ids);
    }
    Ok(())
}

fn run_inspect(cmd: InspectCommand) -> Result<()> {
    let model = BpeModel::load(&cmd.model)?;

    println!("alphabet:       {:?}", model.alphabet());
    println!("vocab_size:     {}", model.vocab_size());
    println!("base symbols:   {}", model.base_len());
    println!("merges:         {}", model.merges().len());
    println!("placeholders:   {}", model.placeholders().len());
    println!("special tokens: {:?}", model.special_tokens());
    println!("end symbol:     {:?}", model.end_symbol());

    for (rank, &(left, right)) in model.merges().iter().take(cmd.top).enumerate() {
        let new_id = model.base_len() + rank;
        println!(
            "#{rank:<5} {:>6} + {:<6} -> {:<6} {:?}",
            left,
            right,
            new_id,
            model.id_to_token(new_id as u32).unwrap_or_default()
        );
    }
    Ok(())
}
