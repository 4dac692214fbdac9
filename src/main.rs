use std::io::{Read, Write};

use tracing::info;

use salonchain::config::EngineConfig;
use salonchain::request::{Request, execute};

/// Reads one JSON request from the path given as the first argument (or
/// stdin) and prints the JSON response on stdout.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    salonchain::observability::init_tracing();

    let config = EngineConfig::from_env();
    info!(
        default_duration_min = config.default_duration_min,
        finishing_service = config.finishing_service.as_deref().unwrap_or("-"),
        max_chain_len = config.max_chain_len,
        "salonchain starting"
    );

    let input = match std::env::args().nth(1) {
        Some(path) if path != "-" => std::fs::read_to_string(&path)?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let request: Request = serde_json::from_str(&input)?;
    let response = execute(request, &config)?;

    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &response)?;
    writeln!(out)?;
    Ok(())
}
