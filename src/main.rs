use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use globset::{Glob, GlobSetBuilder};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use semdex::{
    Engine,
    EngineConfig,
    HttpEmbedder,
    chunking::ChunkingConfig,
    cli::{Cli, Command, EngineArgs},
    error::{self, Error},
    mcp, search,
    watcher::{DocWatcher, EVENT_CHANNEL_CAPACITY},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("SEMDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn build_engine(args: &EngineArgs) -> error::Result<Engine> {
    let include = if args.include.is_empty() {
        None
    } else {
        let mut builder = GlobSetBuilder::new();
        for pattern in &args.include {
            builder.add(Glob::new(pattern).map_err(|e| {
                Error::Config(format!("invalid glob pattern '{pattern}': {e}"))
            })?);
        }
        Some(builder.build().map_err(|e| {
            Error::Config(format!("invalid include patterns: {e}"))
        })?)
    };

    let embedder = Arc::new(HttpEmbedder::new(
        &args.embed_url,
        &args.embed_model,
        args.embed_api_key.clone(),
        Duration::from_secs(args.embed_timeout_secs),
    )?);

    Engine::new(
        embedder,
        EngineConfig {
            chunking: ChunkingConfig::new(args.chunk_size, args.overlap)?,
            embed_timeout: Duration::from_secs(args.embed_timeout_secs),
            include,
        },
    )
}

/// Start the filesystem watcher and the event consumer for `engine`.
fn spawn_sync(engine: &Engine, args: &EngineArgs) -> error::Result<()> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let watcher = DocWatcher::new(&args.root, tx)?;
    tokio::spawn(watcher.run());

    let engine = engine.clone();
    let root = args.root.clone();
    tokio::spawn(async move {
        engine.run_events(root, rx).await;
    });
    Ok(())
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(
            args.shell,
            &mut command,
            "semdex",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let engine = build_engine(&cli.engine)?;
    engine.initialize(&cli.engine.root).await?;

    match cli.command {
        Command::Search(args) => {
            let hits = engine.search(&args.query, args.count).await?;
            if args.json {
                search::format_json(&hits, &args.query)?;
            } else {
                search::format_human(&hits);
            }
        }
        Command::Context(args) => {
            match engine.build_context(&args.query).await? {
                Some(context) => println!("{context}"),
                None => eprintln!("No documents are indexed."),
            }
        }
        Command::Watch => {
            spawn_sync(&engine, &cli.engine)?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down");
        }
        Command::Mcp => {
            spawn_sync(&engine, &cli.engine)?;
            mcp::run_mcp(engine).await?;
        }
        Command::Completions(_) => unreachable!("handled above"),
    }

    Ok(())
}
