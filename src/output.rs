use std::io::{self, Write};

use serde::Serialize;

use crate::config::FetchContext;
use crate::orchestrator::FetchReport;
use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};
use crate::store::SequenceStore;

#[derive(Debug, Clone, Serialize)]
pub struct MethodListing {
    pub name: String,
    pub mode: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodsResult {
    pub chunk_size: usize,
    pub methods: Vec<MethodListing>,
    pub default: Vec<String>,
}

impl MethodsResult {
    pub fn from_context(ctx: &FetchContext) -> Self {
        Self {
            chunk_size: ctx.chunk_size,
            methods: ctx
                .methods()
                .iter()
                .map(|method| MethodListing {
                    name: method.name.clone(),
                    mode: method.mode.label().to_string(),
                    format: method.format.to_string(),
                })
                .collect(),
            default: ctx
                .methods_for(None)
                .into_iter()
                .map(|method| method.name.clone())
                .collect(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &FetchReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_methods(result: &MethodsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_fasta(store: &SequenceStore) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(store.to_fasta().as_bytes())?;
        stdout.flush()
    }

    pub fn print_methods(result: &MethodsResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for method in &result.methods {
            writeln!(stdout, "{}\t{}\t{}", method.name, method.mode, method.format)?;
        }
        writeln!(stdout, "default: {}", result.default.join(", "))?;
        Ok(())
    }
}

/// Prints per-sequence outcomes to stderr. Without a [`CancelFlag`] the
/// fetch always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StderrProgress {
    cancel: Option<CancelFlag>,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelFlag) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }
}

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase(message) => eprintln!("{message}"),
            ProgressEvent::Sequence {
                name,
                success,
                fetched,
                total,
            } => {
                let status = if success { "ok" } else { "not found" };
                eprintln!("[{fetched}/{total}] {name}: {status}");
            }
            ProgressEvent::Warning(message) => eprintln!("warning: {message}"),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}
