use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, warn};

use crate::config::FetchContext;
use crate::connection::ReaderChannel;
use crate::domain::SequenceRequest;
use crate::error::FetchError;
use crate::fetcher::{SequenceFetcher, command_parser, wrong_mode};
use crate::method::{CommandParams, FetchMethod, FetchMode};
use crate::progress::ProgressSink;
use crate::session::{FetchSession, SessionOutcome};
use crate::store::SequenceStore;

/// Runs a local fetch program as `location args... names...` and parses its
/// standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandFetcher;

impl CommandFetcher {
    fn spawn(&self, params: &CommandParams, requests: &[SequenceRequest]) -> Result<Child, FetchError> {
        let mut cmd = Command::new(params.location.as_std_path());
        cmd.args(&params.args)
            .args(requests.iter().map(|request| request.name.as_str()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.spawn().map_err(|err| match err.kind() {
            ErrorKind::NotFound => FetchError::MissingTool(params.location.to_string()),
            _ => FetchError::Command(format!("{}: {err}", params.location)),
        })
    }
}

impl SequenceFetcher for CommandFetcher {
    fn fetch(
        &self,
        ctx: &FetchContext,
        method: &FetchMethod,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError> {
        let FetchMode::Command(params) = &method.mode else {
            return Err(wrong_mode(method, "command"));
        };
        if requests.is_empty() {
            return Ok(SessionOutcome::empty());
        }

        let parser = command_parser(method, requests)?;
        debug!(program = %params.location, sequences = requests.len(), "running fetch command");
        let mut child = self.spawn(params, requests)?;

        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(FetchError::Command("command stdout was not captured".to_string()));
        };

        let session = FetchSession::new(ReaderChannel::new(stdout), parser, ctx.chunk_size);
        let outcome = match session.run(requests, store, progress, &method.name) {
            Ok(outcome) if !outcome.cancelled => outcome,
            Ok(outcome) => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(outcome);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        let status = child
            .wait()
            .map_err(|err| FetchError::Command(err.to_string()))?;
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(outcome);
        }

        let stderr = stderr.trim();
        warn!(program = %params.location, %status, "fetch command failed");
        let message = if stderr.is_empty() {
            format!("command failed: {} ({status})", params.location)
        } else {
            stderr.to_string()
        };
        Err(FetchError::Command(message))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::SeqKind;
    use crate::method::OutputFormat;
    use crate::progress::SilentProgress;

    fn shell_method(script: &str, format: OutputFormat) -> FetchMethod {
        FetchMethod {
            name: "local".to_string(),
            format,
            mode: FetchMode::Command(CommandParams {
                location: "sh".into(),
                args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            }),
        }
    }

    fn requests(names: &[&str]) -> Vec<SequenceRequest> {
        names
            .iter()
            .map(|name| SequenceRequest::new(name.parse().unwrap(), SeqKind::Nucleotide))
            .collect()
    }

    #[test]
    fn fasta_output_is_parsed() {
        let method = shell_method(r#"for n in "$@"; do printf '>%s\nACGT\n' "$n"; done"#, OutputFormat::Fasta);
        let ctx = FetchContext::with_methods(vec![method.clone()]);
        let mut store = SequenceStore::new();
        let outcome = CommandFetcher
            .fetch(&ctx, &method, &requests(&["A1", "B2"]), &mut store, &SilentProgress)
            .unwrap();
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(store.get("B2").unwrap().sequence.as_deref(), Some("acgt"));
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let method = shell_method("echo 'no database' >&2; exit 3", OutputFormat::Fasta);
        let ctx = FetchContext::with_methods(vec![method.clone()]);
        let err = CommandFetcher
            .fetch(&ctx, &method, &requests(&["A1"]), &mut SequenceStore::new(), &SilentProgress)
            .unwrap_err();
        assert_matches!(err, FetchError::Command(message) if message == "no database");
    }

    #[test]
    fn missing_program_is_a_missing_tool() {
        let method = FetchMethod {
            name: "local".to_string(),
            format: OutputFormat::Embl,
            mode: FetchMode::Command(CommandParams {
                location: "/nonexistent/seqfetch-helper".into(),
                args: Vec::new(),
            }),
        };
        let ctx = FetchContext::with_methods(vec![method.clone()]);
        let err = CommandFetcher
            .fetch(&ctx, &method, &requests(&["A1"]), &mut SequenceStore::new(), &SilentProgress)
            .unwrap_err();
        assert_matches!(err, FetchError::MissingTool(_));
    }
}
