//! vigil search service & CLI (Rust)
//!
//! Subcommands:
//! - `serve`: HTTP API over an Elasticsearch-compatible engine
//! - `search`: one-shot query, printed as markdown or JSON
//! - `fuzzy`: Levenshtein filter over a local JSON file

mod cli;
mod config;
mod error;
mod format;
mod http;
mod search;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::{clamp_limit, EngineConfig, ServerConfig};
use error::AppError;
use search::{EngineClient, NormalizedQuery};
use serde_json::Value;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity flags; RUST_LOG wins when set
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // Log to stderr to keep stdout clean
        .init();

    let result = match cli.command {
        Some(Commands::Serve(args)) => execute_serve(args).await,
        Some(Commands::Search(args)) => execute_search_cli(args).await,
        Some(Commands::Fuzzy(args)) => execute_fuzzy_cli(args).await,
        None => {
            eprintln!("Error: No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(get_exit_code(&e));
        }
    }
}

/// Run the HTTP server until shutdown
async fn execute_serve(args: cli::ServeArgs) -> Result<String> {
    let engine_config = EngineConfig::from_args(&args.engine)?;
    let server_config = ServerConfig::from_args(&args)?;

    info!(
        "Starting vigil against {} (indices: {})",
        engine_config.base_url,
        engine_config.indices.join(",")
    );

    server::serve(engine_config, server_config).await?;
    Ok(String::new())
}

/// Execute one search in CLI mode
async fn execute_search_cli(args: cli::SearchArgs) -> Result<String> {
    let engine_config = EngineConfig::from_args(&args.engine)?;
    let engine = EngineClient::new(&engine_config)?;

    if args.explain {
        let query = NormalizedQuery::parse(&args.query)?;
        let body = engine.builder().build(&query);
        return Ok(format!(
            "POST {}\n{}",
            engine.search_url(),
            serde_json::to_string_pretty(&body)?
        ));
    }

    let outcome = search::run_search(&engine, &args.query, clamp_limit(args.limit)).await?;
    debug!("Engine reported {} matching documents", outcome.engine_total);

    if args.json {
        Ok(serde_json::to_string_pretty(&outcome)?)
    } else {
        Ok(format::format_search_outcome(&outcome))
    }
}

/// Execute a local fuzzy filter in CLI mode
async fn execute_fuzzy_cli(args: cli::FuzzyArgs) -> Result<String> {
    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let parsed: Value = serde_json::from_str(&raw)
        .map_err(|e| AppError::invalid("file", &format!("Invalid JSON: {}", e)))?;
    let items = match parsed {
        Value::Array(items) => items,
        _ => return Err(AppError::invalid("file", "Expected a JSON array of objects").into()),
    };

    if args.term.trim().is_empty() {
        return Err(AppError::invalid("term", "Term cannot be empty").into());
    }

    let term = args.term.clone();
    let fields = args.fields.clone();
    let results =
        tokio::task::spawn_blocking(move || search::fuzzy_search(&items, &term, &fields)).await?;

    if args.json {
        Ok(serde_json::to_string_pretty(&results)?)
    } else {
        Ok(format::format_fuzzy_results(&results, &args.term))
    }
}

/// Map an error to the process exit code
fn get_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(app_err) => {
            debug!("Exiting with {}", app_err.error_code());
            app_err.exit_code()
        }
        None => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn fuzzy_args(file: PathBuf, term: &str) -> cli::FuzzyArgs {
        cli::FuzzyArgs {
            file,
            term: term.to_string(),
            fields: vec!["name".to_string()],
            json: true,
        }
    }

    fn write_items(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_fuzzy_cli_filters_file() {
        let file = write_items(r#"[{ "name": "Jon Smith" }, { "name": "Zebra" }]"#);

        let output = execute_fuzzy_cli(fuzzy_args(file.path().to_path_buf(), "John Smith"))
            .await
            .unwrap();

        let results: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(results.as_array().unwrap().len(), 1);
        assert_eq!(results[0]["item"]["name"], "Jon Smith");
    }

    #[tokio::test]
    async fn test_fuzzy_cli_rejects_non_array() {
        let file = write_items(r#"{ "name": "Jon Smith" }"#);

        let err = execute_fuzzy_cli(fuzzy_args(file.path().to_path_buf(), "Jon"))
            .await
            .unwrap_err();
        assert_eq!(get_exit_code(&err), 1);
    }

    #[tokio::test]
    async fn test_fuzzy_cli_missing_file() {
        let err = execute_fuzzy_cli(fuzzy_args(PathBuf::from("/nonexistent/items.json"), "Jon"))
            .await
            .unwrap_err();
        assert_eq!(get_exit_code(&err), 5);
    }

    #[test]
    fn test_exit_codes() {
        let search: anyhow::Error = AppError::SearchFailed("down".to_string()).into();
        assert_eq!(get_exit_code(&search), 2);

        let config: anyhow::Error = AppError::Config("bad url".to_string()).into();
        assert_eq!(get_exit_code(&config), 1);

        assert_eq!(get_exit_code(&anyhow::anyhow!("something else")), 5);
    }
}
