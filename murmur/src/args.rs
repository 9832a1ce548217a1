use std::path::PathBuf;

use clap::Parser;

/// Murmur streaming speech server
#[derive(Debug, Parser)]
#[command(name = "murmur", about = "Streams synthesized speech as raw PCM over HTTP")]
pub struct Args {
    /// Path to configuration file; a missing file means defaults
    #[arg(short, long, default_value = "murmur.toml", env = "MURMUR_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "MURMUR_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,

    /// Log filter directive, e.g. "info" or "tts=debug,info"
    #[arg(long, default_value = "info", env = "MURMUR_LOG")]
    pub log_filter: String,
}
