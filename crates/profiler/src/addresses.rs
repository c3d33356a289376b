use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read address list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no addresses found in {0}")]
    NoAddresses(String),
}

/// One address per line. Blank lines and `#` comments are skipped; the
/// addresses themselves are passed through unvalidated.
pub fn parse_addresses(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_addresses(path: &Path) -> Result<Vec<String>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let addresses = parse_addresses(&content);
    if addresses.is_empty() {
        return Err(InputError::NoAddresses(path.display().to_string()));
    }
    Ok(addresses)
}
