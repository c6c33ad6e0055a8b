//! PCG CLI — conversational context engine with an MCP server.
//!
//! Usage:
//!   pcg mcp [--transport stdio] [--data-dir path]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pcg", version, about = "Probabilistic contextual graph engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP (Model Context Protocol) server
    Mcp {
        /// Transport type (currently only stdio)
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// Directory to persist the graph, conversations, and fragments
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Mcp { transport, data_dir } => {
            if transport != "stdio" {
                eprintln!("error: only 'stdio' transport is currently supported");
                std::process::exit(1);
            }
            let code = pcg_engine::mcp::run_mcp_server(data_dir);
            std::process::exit(code);
        }
    }
}
