//! # pq
//!
//! Command-line client for the Pulse mock query engine.
//!
//! - `pq run <request.json>`: answer a request locally.
//! - `pq classify <request.json>`: print the response shape a request maps to.
//! - `pq query <request.json>`: post a request to a running `pq-hub`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tabled::builder::Builder;
use tabled::settings::Style;

use pq_core::{classify, Engine, EngineOptions, QueryRequest, QueryResponse};

#[derive(Parser)]
#[command(name = "pq", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a request file with the local engine.
    Run {
        /// Path to a JSON query request.
        file: PathBuf,

        /// Fixed seed for a reproducible response.
        #[arg(long)]
        seed: Option<u64>,

        /// Print rows as a table instead of JSON.
        #[arg(long)]
        table: bool,
    },

    /// Print the response shape a request is classified as.
    Classify { file: PathBuf },

    /// Post a request file to a running hub (`PQ_BASE_URL`).
    Query {
        file: PathBuf,

        #[arg(long)]
        table: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { file, seed, table } => run(&file, seed, table),
        Commands::Classify { file } => read_request(&file).map(|request| {
            println!("{}", classify(&request));
        }),
        cmd => match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(async_main(cmd)),
            Err(e) => Err(format!("failed to build tokio runtime: {}", e)),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_body(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))
}

fn read_request(path: &Path) -> Result<QueryRequest, String> {
    QueryRequest::from_json(&read_body(path)?).map_err(|e| e.to_string())
}

fn run(path: &Path, seed: Option<u64>, table: bool) -> Result<(), String> {
    let request = read_request(path)?;
    let engine = Engine::new(EngineOptions {
        seed,
        ..Default::default()
    });
    let response = engine.execute(&request).map_err(|e| e.to_string())?;
    eprintln!("{} ({} rows)", classify(&request), response.rows.len());
    print_response(&response, table)
}

fn print_response(response: &QueryResponse, table: bool) -> Result<(), String> {
    if table {
        println!("{}", render_table(response));
        return Ok(());
    }
    let json = serde_json::to_string_pretty(response).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn render_table(response: &QueryResponse) -> String {
    let mut builder = Builder::default();
    builder.push_record(response.fields.iter().cloned());
    for row in &response.rows {
        builder.push_record(row.iter().cloned());
    }
    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

async fn async_main(cmd: Commands) -> Result<(), String> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("PQ_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

    match cmd {
        Commands::Query { file, table } => {
            let body = read_body(&file)?;
            let url = format!(
                "{}/v1/interactions/performance-metric/distribution",
                base_url
            );
            let resp = client
                .post(&url)
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            let json = resp
                .json::<serde_json::Value>()
                .await
                .map_err(|e| e.to_string())?;
            if !status.is_success() {
                let error = &json["error"];
                return Err(format!(
                    "{} {}: {} ({})",
                    status.as_u16(),
                    error["code"].as_str().unwrap_or("UNKNOWN"),
                    error["message"].as_str().unwrap_or(""),
                    error["cause"].as_str().unwrap_or("")
                ));
            }
            let response: QueryResponse =
                serde_json::from_value(json["data"].clone()).map_err(|e| e.to_string())?;
            print_response(&response, table)
        }
        Commands::Run { .. } | Commands::Classify { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_header_and_rows() {
        let response = QueryResponse {
            fields: vec!["platform".into(), "user_count".into()],
            rows: vec![
                vec!["Android".into(), "812".into()],
                vec!["iOS".into(), "640".into()],
            ],
        };
        let rendered = render_table(&response);
        assert!(rendered.contains("platform"));
        assert!(rendered.contains("Android"));
        assert_eq!(rendered.matches("iOS").count(), 1);
    }

    #[test]
    fn test_missing_request_file() {
        let err = read_request(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(err.contains("/nonexistent/request.json"));
    }
}
