use anyhow::{Result, bail};
use serde::Serialize;
use std::str::FromStr;

/// Output format for reports and counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text for people
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    /// Render `data` in this format. Text uses `Display`, JSON uses serde.
    pub fn render<T: Serialize + std::fmt::Display>(self, data: &T) -> Result<String> {
        match self {
            Self::Text => Ok(data.to_string()),
            Self::Json => serde_json::to_string_pretty(data)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}")),
        }
    }
}
