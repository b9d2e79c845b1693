use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid sequence name: {0:?}")]
    InvalidSequenceName(String),

    #[error("missing config file seqfetch.json in current directory or config dir")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("source {source_name} refers to unknown fetch method {method}")]
    UnknownMethod { source_name: String, method: String },

    #[error("invalid fetch method {method}: {reason}")]
    InvalidMethod { method: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(seqfetch::connect))]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    #[diagnostic(code(seqfetch::send))]
    Send(#[from] SendError),

    #[error("error receiving data from server: {0}")]
    Receive(String),

    #[error(transparent)]
    #[diagnostic(code(seqfetch::parse))]
    Parse(#[from] ParseError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("fetch command failed: {0}")]
    Command(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("fetch method {method} cannot process {format} output")]
    UnsupportedFormat { method: String, format: String },

    #[error("no {0} backend is configured")]
    BackendUnavailable(String),

    #[error("all fetch methods failed: {0}")]
    #[diagnostic(help("check the fetch method configuration and server availability"))]
    AllMethodsFailed(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl FetchError {
    /// Invariant violations that must stop the whole bulk fetch instead of
    /// falling back to the next method.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::Send(SendError::ShortWrite { .. }) | FetchError::Protocol(_)
        )
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConnectError {
    #[error("unknown host {host}")]
    UnknownHost { host: String },

    #[error("failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },
}

#[derive(Debug, Error, Diagnostic)]
pub enum SendError {
    #[error("broken pipe while sending request to server")]
    BrokenPipe,

    #[error("connection reset by server while sending request")]
    ConnectionReset,

    #[error("socket is not connected")]
    NotConnected,

    #[error("short write to server: sent {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("error sending request: {0}")]
    Io(String),
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message} at {byte:?} while parsing {sequence} in state {state} (context: {context:?})")]
pub struct ParseError {
    pub message: String,
    pub byte: char,
    pub state: String,
    pub sequence: String,
    pub context: String,
}
