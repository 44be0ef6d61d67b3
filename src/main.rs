use anyhow::{anyhow, Error};
use influxdb_line_writer::{validate_env_variables, Client, ClientConfig, Flushed, Point};
use log::info;
use std::io::BufRead;
use tracing_subscriber::EnvFilter;

// Reads one JSON point per line from stdin and writes them as a single batch.
#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    validate_env_variables()?;
    let client = Client::new(ClientConfig::from_env()?);

    let stdin = std::io::stdin();
    for (line_number, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let point: Point = serde_json::from_str(&line)
            .map_err(|error| anyhow!("Failed to parse point on line {}: {}", line_number + 1, error))?;
        client.prepare(point);
    }

    match client.flush().await? {
        Flushed::Empty => info!("No points read from stdin"),
        Flushed::Written { points, status } => {
            info!("Wrote {} points, server responded {}", points, status)
        }
    }
    Ok(())
}
