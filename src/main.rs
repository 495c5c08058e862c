//! elenchus MCP Server
//!
//! Requirements interrogation for AI agents.
//!
//! Run with: cargo run -- --serve
//! Or via MCP: add `elenchus --serve` to your client config

use anyhow::{bail, Context, Result};
use elenchus::{
    config::{self, DB_FILE},
    mcp, AnthropicClient, Augmentation, EngineConfig, InterrogationEngine, QualityAssessment,
    ResolutionInput, RoundRequest, SqliteStore, StartOutput, TextGenerator,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage:
  elenchus --analyze <epic text | @file>     Score an epic (no session)
  elenchus --facts <answer text>             Extract facts from an answer
  elenchus --start <epic text | @file>       Start an interrogation session
  elenchus --submit <session-id> <file|->    Submit a round (JSON)
  elenchus --resolve <session-id> <contradiction-id> <resolution>
  elenchus --status <session-id>             Show a session
  elenchus --tools                           Print MCP tool definitions
  elenchus --serve                           JSON-RPC over stdio

Add --json to --analyze or --start for machine-readable output.";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results and protocol traffic
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let json_output = args.iter().any(|a| a == "--json");
    let positional: Vec<String> = args
        .iter()
        .skip(2)
        .filter(|a| a.as_str() != "--json")
        .cloned()
        .collect();

    let Some(command) = args.get(1) else {
        println!("{}", USAGE);
        return Ok(());
    };

    match command.as_str() {
        "--analyze" => {
            let text = read_text_arg(&positional)?;
            run_analyze(&text, json_output)
        }
        "--facts" => {
            let answer = positional.join(" ");
            if answer.trim().is_empty() {
                bail!("Usage: --facts <answer text>");
            }
            let facts = elenchus::extract_facts("", &answer);
            println!("{}", serde_json::to_string_pretty(&facts)?);
            Ok(())
        }
        "--tools" => {
            // Output MCP tool definitions as JSON
            let tools = mcp::get_tools();
            println!("{}", serde_json::to_string_pretty(&tools)?);
            Ok(())
        }
        "--start" => {
            let text = read_text_arg(&positional)?;
            let (store, config) = open_store()?;
            let engine = InterrogationEngine::new(&store, &config);
            let client = AnthropicClient::from_env();
            let augmentation = augmentation(client.as_ref());

            let started = engine.start_with(&text, &augmentation).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&started)?);
            } else {
                print_started(&started);
            }
            Ok(())
        }
        "--submit" => {
            let (Some(session_id), Some(source)) = (positional.first(), positional.get(1)) else {
                bail!("Usage: --submit <session-id> <file|->");
            };
            let raw = if source == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read round from stdin")?
            } else {
                std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))?
            };
            let request: RoundRequest = elenchus::request::parse(serde_json::from_str(&raw)?)?;

            let (store, config) = open_store()?;
            let engine = InterrogationEngine::new(&store, &config);
            let client = AnthropicClient::from_env();
            let augmentation = augmentation(client.as_ref());

            let output = engine.submit_round_with(session_id, request, &augmentation).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        "--resolve" => {
            if positional.len() < 3 {
                bail!("Usage: --resolve <session-id> <contradiction-id> <resolution>");
            }
            let (store, config) = open_store()?;
            let engine = InterrogationEngine::new(&store, &config);
            let output = engine.resolve(
                &positional[0],
                &[ResolutionInput {
                    contradiction_id: positional[1].clone(),
                    resolution: positional[2..].join(" "),
                }],
            )?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        "--status" => {
            let Some(session_id) = positional.first() else {
                bail!("Usage: --status <session-id>");
            };
            let (store, config) = open_store()?;
            let engine = InterrogationEngine::new(&store, &config);
            println!("{}", serde_json::to_string_pretty(&engine.session(session_id)?)?);
            Ok(())
        }
        "--serve" => run_stdio_server().await,
        "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

fn augmentation(client: Option<&AnthropicClient>) -> Augmentation<'_> {
    Augmentation::from_generator(client.map(|c| c as &dyn TextGenerator))
}

/// Text from args, or from a file when the first arg is `@path`
fn read_text_arg(args: &[String]) -> Result<String> {
    match args.first() {
        Some(first) if first.starts_with('@') => {
            let path = &first[1..];
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
        }
        Some(_) => Ok(args.join(" ")),
        None => bail!("Missing epic text\n\n{}", USAGE),
    }
}

fn open_store() -> Result<(SqliteStore, EngineConfig)> {
    let data_dir = config::get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {:?}", data_dir))?;
    let db_path = data_dir.join(DB_FILE);
    let store = SqliteStore::open(&db_path)?;
    tracing::debug!("Database at {:?}", db_path);
    Ok((store, EngineConfig::from_env()))
}

fn run_analyze(text: &str, json_output: bool) -> Result<()> {
    let assessment = elenchus::analyze(text);
    if json_output {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print_assessment(&assessment);
    }
    Ok(())
}

fn print_assessment(assessment: &QualityAssessment) {
    let m = &assessment.metrics;
    let bar = "█".repeat(assessment.tier as usize);
    let empty = "░".repeat(5 - assessment.tier.min(5) as usize);

    println!("\nTier:        {}{} {}/5 ({})", bar, empty, assessment.tier, assessment.strategy.name());
    println!("Statements:  {}", m.statement_count);
    println!("Clarity:     {}/100", m.clarity_score);
    println!("Specificity: {}/100", m.specificity_score);
    println!("Coverage:    {}/100", m.coverage_score);

    let vague = &assessment.indicators.vague_phrases;
    if !vague.is_empty() {
        println!("\nVague phrases: {}", vague.iter().map(|p| format!("\"{}\"", p)).collect::<Vec<_>>().join(", "));
    }

    println!("\nArea coverage:");
    for coverage in &assessment.area_coverage {
        println!("  {:<12} {:?}", coverage.area.name(), coverage.level);
        for item in &coverage.missing {
            println!("    - {}", item);
        }
    }
}

fn print_started(started: &StartOutput) {
    println!("Session: {}", started.session_id);
    print_assessment(&started.assessment);

    println!("\nRound {} questions:", started.round);
    for (i, q) in started.questions.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, q.area, q.text);
    }
    for warning in &started.warnings {
        println!("\nWarning: {}", warning);
    }
}

/// Line-delimited JSON-RPC on stdin/stdout
async fn run_stdio_server() -> Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let (store, config) = open_store()?;
    let engine = InterrogationEngine::new(&store, &config);
    let client = AnthropicClient::from_env();
    let augmentation = augmentation(client.as_ref());

    tracing::info!(semantic = augmentation.is_semantic(), "elenchus MCP server ready on stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(message) => mcp::handle_message(&engine, &augmentation, &message).await,
            Err(e) => Some(mcp::parse_error(&e.to_string())),
        };

        if let Some(response) = response {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
