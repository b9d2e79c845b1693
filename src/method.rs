use std::fmt;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Options token asking the server for one raw sequence line per request.
pub const COMPACT_OPTIONS: &str = "-q -C";
/// Options token asking the server for full EMBL records.
pub const FULL_RECORD_OPTIONS: &str = "-q -C -F";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Embl,
    Fasta,
    Gff,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Embl => write!(f, "embl"),
            OutputFormat::Fasta => write!(f, "fasta"),
            OutputFormat::Gff => write!(f, "gff"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketParams {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpStyle {
    /// `request=...` sent as a form body.
    #[default]
    Post,
    /// `request=...` sent as a query parameter.
    Get,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpParams {
    pub location: String,
    #[serde(default)]
    pub cookie_jar: Option<Utf8PathBuf>,
    #[serde(default)]
    pub style: HttpStyle,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandParams {
    pub location: Utf8PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseParams {
    pub location: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FetchMode {
    Socket(SocketParams),
    Http(HttpParams),
    Command(CommandParams),
    Database(DatabaseParams),
    None,
}

impl FetchMode {
    pub fn label(&self) -> &'static str {
        match self {
            FetchMode::Socket(_) => "socket",
            FetchMode::Http(_) => "http",
            FetchMode::Command(_) => "command",
            FetchMode::Database(_) => "database",
            FetchMode::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMethod {
    pub name: String,
    pub format: OutputFormat,
    pub mode: FetchMode,
}

impl FetchMethod {
    /// Server options token for pfetch-style backends.
    pub fn request_options(&self) -> Result<&'static str, FetchError> {
        match self.format {
            OutputFormat::Embl => Ok(FULL_RECORD_OPTIONS),
            OutputFormat::Fasta => Ok(COMPACT_OPTIONS),
            OutputFormat::Gff => Err(self.unsupported_format()),
        }
    }

    pub fn unsupported_format(&self) -> FetchError {
        FetchError::UnsupportedFormat {
            method: self.name.clone(),
            format: self.format.to_string(),
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.mode.label(), self.format)
    }
}
