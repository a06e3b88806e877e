// src/bpe_main.rs
//! Batch round trip: encode every line of a file with a saved model, write the ids
//! and the decoded text next to each other and report the compression achieved.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bpe_subword::{BpeModel, BPE};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

#[derive(Parser)]
#[command(name = "bpe_main")]
#[command(about = "Encode and decode a file line by line with a trained model", long_about = None)]
struct Cli {
    /// Path to the trained model
    #[arg(short, long)]
    model: PathBuf,

    /// Text file to encode, one unit per line
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for encoded.txt and decoded.txt
    #[arg(short, long, default_value = "bpe_output")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let bpe = BPE::new(BpeModel::load(&cli.model)?);
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let encoded_path = cli.out_dir.join("encoded.txt");
    let decoded_path = cli.out_dir.join("decoded.txt");

    let test_file = File::open(&cli.input)
        .with_context(|| format!("opening {}", cli.input.display()))?;
    let mut reader = BufReader::new(test_file);
    let mut enc_w = BufWriter::new(File::create(&encoded_path)?);
    let mut dec_w = BufWriter::new(File::create(&decoded_path)?);

    let mut total_tokens = 0usize;
    let mut total_bytes = 0usize;
    let mut total_unknown = 0usize;
    let mut mismatched_lines = 0usize;
    let mut raw_line = Vec::new();

    while reader.read_until(b'\n', &mut raw_line)? > 0 {
        let decoded_line = String::from_utf8_lossy(&raw_line);
        let line = decoded_line.trim_end_matches(&['\r', '\n'][..]);

        let (tokens, unknown) = bpe.encode_with_report(line);
        total_tokens += tokens.len();
        total_bytes += line.len();
        total_unknown += unknown;
        writeln!(enc_w, "{}", serde_json::to_string(&tokens)?)?;

        let text = bpe.decode(&tokens);
        if unknown == 0 && text != line {
            mismatched_lines += 1;
        }
        writeln!(dec_w, "{}", text)?;

        raw_line.clear();
    }

    enc_w.flush()?;
    dec_w.flush()?;

    info!(
        "wrote {} and {}",
        encoded_path.display(),
        decoded_path.display()
    );
    if total_unknown > 0 {
        warn!("{total_unknown} characters were outside the model alphabet");
    }
    if mismatched_lines > 0 {
        warn!("{mismatched_lines} lines did not decode to their input");
    }

    println!("total tokens written to encoded.txt: {}", total_tokens);
    if total_tokens > 0 {
        println!(
            "compression: {} bytes -> {} tokens ({:.3} bytes/token)",
            total_bytes,
            total_tokens,
            total_bytes as f64 / total_tokens as f64
        );
    }
    Ok(())
}
