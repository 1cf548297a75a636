//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the valentine REST API, so the page can
//! generate its client from it.
//!
//! Usage: `openapi [PATH]`. The document goes to `openapi.json` by default, or to
//! stdout when PATH is `-`.

use api_lib::web::rest::ApiDoc;
use std::io::Write;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    let document = ApiDoc::openapi().to_pretty_json()?;

    if target == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(document.as_bytes())?;
        stdout.write_all(b"\n")?;
    } else {
        std::fs::write(&target, document)?;
        eprintln!("OpenAPI document written to {}", target);
    }
    Ok(())
}
