//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "emotion-server")]
#[command(about = "Sentence emotion classification service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml", env = "EMOTION_CONFIG")]
    pub config: String,

    /// Local model directory (config.json, model.safetensors, tokenizer)
    #[arg(short, long, conflicts_with = "hf_repo")]
    pub model_dir: Option<PathBuf>,

    /// Hugging Face Hub repository to load the model from
    #[arg(long)]
    pub hf_repo: Option<String>,

    /// Compute device: cpu, cuda, cuda:N, metal
    #[arg(short, long)]
    pub device: Option<String>,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
