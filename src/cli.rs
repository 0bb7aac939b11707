// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Flags override the matching settings of the configuration file.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quayd")]
#[command(about = "Container management daemon with a REST API")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./quayd.yml when present)
    #[arg(short, long, env = "QUAYD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (debug logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Log every JSON response body
    #[arg(long)]
    pub debug: bool,

    /// Address to listen on (unix:/path or tcp:host:port); repeatable
    #[arg(short, long = "listen", value_name = "ADDR")]
    pub listen: Vec<String>,
}
