use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use assert_matches::assert_matches;

use seqfetch::config::FetchContext;
use seqfetch::domain::{SeqKind, SequenceRequest};
use seqfetch::error::{ConnectError, FetchError};
use seqfetch::fetcher::SequenceFetcher;
use seqfetch::method::{FetchMethod, FetchMode, OutputFormat, SocketParams};
use seqfetch::progress::SilentProgress;
use seqfetch::socket::SocketFetcher;
use seqfetch::store::SequenceStore;

/// Accepts one connection, captures the request line and replies with
/// `response`, then closes.
fn serve_once(response: &'static [u8]) -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while stream.read(&mut byte).unwrap() == 1 {
            request.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        stream.write_all(response).unwrap();
        request
    });
    (port, handle)
}

fn method(port: u16, format: OutputFormat) -> FetchMethod {
    FetchMethod {
        name: "pfetch".to_string(),
        format,
        mode: FetchMode::Socket(SocketParams {
            host: "127.0.0.1".to_string(),
            port,
        }),
    }
}

fn requests(names: &[&str], kind: SeqKind) -> Vec<SequenceRequest> {
    names
        .iter()
        .map(|name| SequenceRequest::new(name.parse().unwrap(), kind))
        .collect()
}

#[test]
fn full_record_request_is_framed_per_token() {
    let (port, server) = serve_once(
        b"ID   A1\nOS   Homo sapiens\nSQ   Sequence 4 BP;\n     acgt  4\n//\nno match\n",
    );
    let method = method(port, OutputFormat::Embl);
    let ctx = FetchContext::with_methods(vec![method.clone()]).with_chunk_size(7);
    let mut store = SequenceStore::new();

    let outcome = SocketFetcher
        .fetch(
            &ctx,
            &method,
            &requests(&["A1", "B2"], SeqKind::Nucleotide),
            &mut store,
            &SilentProgress,
        )
        .unwrap();

    assert_eq!(server.join().unwrap(), b"-q -C -F A1 B2 \n".to_vec());
    assert_eq!(outcome.fetched, 2);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.bytes_sent, 16);
    let record = store.get("A1").unwrap();
    assert_eq!(record.sequence.as_deref(), Some("acgt"));
    assert_eq!(record.organism.as_deref(), Some("Homo sapiens"));
    assert!(store.get("B2").unwrap().sequence.is_none());
}

#[test]
fn compact_request_uses_short_options() {
    let (port, server) = serve_once(b"MVLSPADK\nno match\n");
    let method = method(port, OutputFormat::Fasta);
    let ctx = FetchContext::with_methods(vec![method.clone()]);
    let mut store = SequenceStore::new();

    SocketFetcher
        .fetch(
            &ctx,
            &method,
            &requests(&["P1", "P2"], SeqKind::Peptide),
            &mut store,
            &SilentProgress,
        )
        .unwrap();

    assert_eq!(server.join().unwrap(), b"-q -C P1 P2 \n".to_vec());
    assert_eq!(store.get("P1").unwrap().sequence.as_deref(), Some("MVLSPADK"));
}

#[test]
fn empty_request_list_opens_no_connection() {
    let method = FetchMethod {
        name: "pfetch".to_string(),
        format: OutputFormat::Embl,
        mode: FetchMode::Socket(SocketParams {
            host: "no-such-host.invalid".to_string(),
            port: 22100,
        }),
    };
    let ctx = FetchContext::with_methods(vec![method.clone()]);
    let outcome = SocketFetcher
        .fetch(&ctx, &method, &[], &mut SequenceStore::new(), &SilentProgress)
        .unwrap();
    assert_eq!(outcome.fetched, 0);
}

#[test]
fn refused_connection_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let method = method(port, OutputFormat::Embl);
    let ctx = FetchContext::with_methods(vec![method.clone()]);
    let err = SocketFetcher
        .fetch(
            &ctx,
            &method,
            &requests(&["A1"], SeqKind::Nucleotide),
            &mut SequenceStore::new(),
            &SilentProgress,
        )
        .unwrap_err();
    assert_matches!(err, FetchError::Connect(ConnectError::ConnectFailed { .. }));
}

#[test]
fn gff_format_is_unsupported() {
    let method = method(1, OutputFormat::Gff);
    let ctx = FetchContext::with_methods(vec![method.clone()]);
    let err = SocketFetcher
        .fetch(
            &ctx,
            &method,
            &requests(&["A1"], SeqKind::Nucleotide),
            &mut SequenceStore::new(),
            &SilentProgress,
        )
        .unwrap_err();
    assert_matches!(err, FetchError::UnsupportedFormat { .. });
}
