//! Command-line interface for finagent

use anyhow::Context;
use clap::{Parser, Subcommand};
use finagent::{FinanceConfig, Orchestrator, init_tracing, run_batch};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "finagent")]
#[command(about = "Ask questions about Vietnamese stocks", long_about = None)]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one question
    Ask {
        query: String,

        /// Print the whole response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read questions from stdin until EOF or "exit"
    Repl,
    /// Answer every row of a question,expected_answer CSV
    Batch {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Seconds to wait between questions
        #[arg(long, default_value_t = 5)]
        delay_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = FinanceConfig::from_env().context("loading configuration")?;
    let orchestrator = Orchestrator::from_config(&config).context("building pipeline")?;
    info!(model = %config.model, "Starting finagent");

    match args.command {
        Command::Ask { query, json } => {
            let response = orchestrator.process_query(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.answer);
            }
        }
        Command::Repl => repl(&orchestrator).await?,
        Command::Batch {
            input,
            output,
            delay_secs,
        } => {
            let reader = BufReader::new(
                File::open(&input).with_context(|| format!("opening {}", input.display()))?,
            );
            let writer = BufWriter::new(
                File::create(&output).with_context(|| format!("creating {}", output.display()))?,
            );
            let summary =
                run_batch(&orchestrator, reader, writer, Duration::from_secs(delay_secs)).await?;
            println!(
                "Processed {} questions ({} failed), results written to {}",
                summary.processed,
                summary.failed,
                output.display()
            );
        }
    }

    Ok(())
}

async fn repl(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        match orchestrator.process_query(query).await {
            Ok(response) => println!("{}\n", response.answer),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    Ok(())
}
