use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "semdex",
    about = "An in-memory semantic search engine for your documents"
)]
pub struct Cli {
    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every command that runs the engine.
#[derive(Debug, clap::Args)]
pub struct EngineArgs {
    /// Directory of documents to index
    #[arg(long, default_value = "pages", global = true)]
    pub root: PathBuf,

    /// Only index files whose relative path matches a glob (repeatable)
    #[arg(long, value_name = "GLOB", global = true)]
    pub include: Vec<String>,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    #[arg(
        long,
        env = "SEMDEX_EMBED_URL",
        default_value = "http://localhost:11434/v1",
        global = true
    )]
    pub embed_url: String,

    /// Embedding model name passed to the gateway
    #[arg(
        long,
        env = "SEMDEX_EMBED_MODEL",
        default_value = "embeddinggemma",
        global = true
    )]
    pub embed_model: String,

    /// API key for the embedding gateway, if it requires one
    #[arg(
        long,
        env = "SEMDEX_EMBED_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub embed_api_key: Option<String>,

    /// Seconds to wait on an embedding call before treating it as failed
    #[arg(long, default_value_t = 30, global = true)]
    pub embed_timeout_secs: u64,

    /// Maximum chunk length in characters
    #[arg(long, default_value_t = crate::chunking::DEFAULT_CHUNK_SIZE, global = true)]
    pub chunk_size: usize,

    /// Characters shared between adjacent chunks
    #[arg(long, default_value_t = crate::chunking::DEFAULT_OVERLAP, global = true)]
    pub overlap: usize,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index the document root, then run a one-shot search
    Search(SearchArgs),
    /// Index the document root, then print a citation context block
    Context(ContextArgs),
    /// Index the document root and keep it in sync with filesystem changes
    Watch,
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct ContextArgs {
    /// Query to build context for
    pub query: String,
}

#[derive(Debug, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_defaults() {
        let cli = Cli::parse_from(["semdex", "search", "how do bundles work"]);
        let Command::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.query, "how do bundles work");
        assert_eq!(args.count, 10);
        assert!(!args.json);
        assert_eq!(cli.engine.chunk_size, 500);
        assert_eq!(cli.engine.overlap, 100);
    }

    #[test]
    fn engine_flags_are_global() {
        let cli = Cli::parse_from([
            "semdex",
            "search",
            "q",
            "--root",
            "/srv/docs",
            "--chunk-size",
            "800",
            "--overlap",
            "200",
        ]);
        assert_eq!(cli.engine.root, PathBuf::from("/srv/docs"));
        assert_eq!(cli.engine.chunk_size, 800);
        assert_eq!(cli.engine.overlap, 200);
    }
}
