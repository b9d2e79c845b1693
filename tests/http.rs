use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use assert_matches::assert_matches;

use seqfetch::config::FetchContext;
use seqfetch::domain::{SeqKind, SequenceRequest};
use seqfetch::error::FetchError;
use seqfetch::fetcher::SequenceFetcher;
use seqfetch::http::HttpFetcher;
use seqfetch::method::{FetchMethod, FetchMode, HttpParams, HttpStyle, OutputFormat};
use seqfetch::progress::SilentProgress;
use seqfetch::store::SequenceStore;

struct Captured {
    request_line: String,
    body: String,
}

/// Minimal one-shot HTTP server returning `status` and `body`.
fn serve_once(status: &'static str, body: &'static str) -> (u16, thread::JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut body_bytes = vec![0u8; content_length];
        reader.read_exact(&mut body_bytes).unwrap();

        let mut stream = reader.into_inner();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        Captured {
            request_line: request_line.trim_end().to_string(),
            body: String::from_utf8(body_bytes).unwrap(),
        }
    });
    (port, handle)
}

fn method(location: String, style: HttpStyle, port: Option<u16>) -> FetchMethod {
    FetchMethod {
        name: "pfetch-http".to_string(),
        format: OutputFormat::Fasta,
        mode: FetchMode::Http(HttpParams {
            location,
            cookie_jar: None,
            style,
            port,
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
fn post_sends_request_as_form_field() {
    let (port, server) = serve_once("200 OK", "acgt\nno match\n");
    let method = method(format!("http://127.0.0.1:{port}/pfetch"), HttpStyle::Post, None);
    let ctx = FetchContext::with_methods(vec![method.clone()]);
    let mut store = SequenceStore::new();

    let outcome = HttpFetcher::new()
        .unwrap()
        .fetch(&ctx, &method, &requests(&["A1", "B2"]), &mut store, &SilentProgress)
        .unwrap();

    let captured = server.join().unwrap();
    assert!(captured.request_line.starts_with("POST /pfetch"));
    assert_eq!(captured.body, "request=-q+-C+A1+B2");
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(store.get("A1").unwrap().sequence.as_deref(), Some("acgt"));
}

#[test]
fn get_sends_request_as_query_with_port_override() {
    let (port, server) = serve_once("200 OK", "ggcc\n");
    // The location's own port is replaced by the configured one.
    let method = method("http://127.0.0.1:9/pfetch".to_string(), HttpStyle::Get, Some(port));
    let ctx = FetchContext::with_methods(vec![method.clone()]);
    let mut store = SequenceStore::new();

    HttpFetcher::new()
        .unwrap()
        .fetch(&ctx, &method, &requests(&["C3"]), &mut store, &SilentProgress)
        .unwrap();

    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "GET /pfetch?request=-q+-C+C3 HTTP/1.1");
    assert_eq!(store.get("C3").unwrap().sequence.as_deref(), Some("ggcc"));
}

#[test]
fn error_status_is_reported() {
    let (port, server) = serve_once("503 Service Unavailable", "try later");
    let method = method(format!("http://127.0.0.1:{port}/pfetch"), HttpStyle::Post, None);
    let ctx = FetchContext::with_methods(vec![method.clone()]);

    let err = HttpFetcher::new()
        .unwrap()
        .fetch(&ctx, &method, &requests(&["A1"]), &mut SequenceStore::new(), &SilentProgress)
        .unwrap_err();
    server.join().unwrap();
    assert_matches!(err, FetchError::HttpStatus { status: 503, message } if message == "try later");
}
