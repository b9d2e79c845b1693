use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::FetchContext;
use crate::connection::ReaderChannel;
use crate::domain::SequenceRequest;
use crate::error::FetchError;
use crate::fetcher::{SequenceFetcher, server_parser, wrong_mode};
use crate::method::{FetchMethod, FetchMode, HttpParams, HttpStyle};
use crate::progress::ProgressSink;
use crate::session::{FetchSession, SessionOutcome};
use crate::store::SequenceStore;
use crate::wire::request_line;

/// Form field / query parameter carrying the request line.
const REQUEST_FIELD: &str = "request";

/// Sends the pfetch request line to an HTTP proxy and streams the response
/// body through the session loop.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("seqfetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::Http(err.to_string()))?,
        );

        // Large batches stream for a long time; only connecting is bounded.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(60))
            .timeout(Option::<Duration>::None)
            .build()
            .map_err(|err| FetchError::Http(err.to_string()))?;

        Ok(Self { client })
    }

    fn send(&self, params: &HttpParams, line: &str) -> Result<Response, FetchError> {
        let url = request_url(params)?;
        let mut request = match params.style {
            HttpStyle::Post => self.client.post(url.clone()).form(&[(REQUEST_FIELD, line)]),
            HttpStyle::Get => self.client.get(url.clone()).query(&[(REQUEST_FIELD, line)]),
        };
        if let Some(jar) = &params.cookie_jar {
            let host = url.host_str().unwrap_or_default();
            if let Some(cookies) = cookie_header(jar, host)? {
                let value = HeaderValue::from_str(&cookies)
                    .map_err(|err| FetchError::Http(err.to_string()))?;
                request = request.header(COOKIE, value);
            }
        }

        let response = request
            .send()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "HTTP fetch request failed".to_string());
            return Err(FetchError::HttpStatus { status, message });
        }
        Ok(response)
    }
}

impl SequenceFetcher for HttpFetcher {
    fn fetch(
        &self,
        ctx: &FetchContext,
        method: &FetchMethod,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError> {
        let FetchMode::Http(params) = &method.mode else {
            return Err(wrong_mode(method, "http"));
        };
        if requests.is_empty() {
            return Ok(SessionOutcome::empty());
        }

        let options = method.request_options()?;
        let parser = server_parser(method, requests)?;
        let line = request_line(options, requests.iter().map(|request| &request.name));
        debug!(location = %params.location, style = ?params.style, "sending HTTP request");
        let response = self.send(params, &line)?;

        let mut session = FetchSession::new(ReaderChannel::new(response), parser, ctx.chunk_size);
        session.note_sent(line.len());
        session.run(requests, store, progress, &method.name)
    }
}

fn request_url(params: &HttpParams) -> Result<Url, FetchError> {
    let mut url = Url::parse(&params.location)
        .map_err(|err| FetchError::Http(format!("{}: {err}", params.location)))?;
    if let Some(port) = params.port {
        url.set_port(Some(port))
            .map_err(|_| FetchError::Http(format!("cannot set port on {}", params.location)))?;
    }
    Ok(url)
}

/// Builds a `Cookie` header value from a Netscape cookie-jar file for the
/// given host. Returns `None` when no cookie matches.
pub fn cookie_header(jar: &Utf8Path, host: &str) -> Result<Option<String>, FetchError> {
    let content =
        fs::read_to_string(jar).map_err(|err| FetchError::Filesystem(format!("{jar}: {err}")))?;
    let pairs = content
        .lines()
        .filter_map(|line| {
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
            if line.starts_with('#') || line.trim().is_empty() {
                return None;
            }
            let fields = line.split('\t').collect::<Vec<_>>();
            if fields.len() < 7 {
                return None;
            }
            domain_matches(fields[0], host).then(|| format!("{}={}", fields[5], fields[6].trim_end()))
        })
        .collect::<Vec<_>>();
    Ok((!pairs.is_empty()).then(|| pairs.join("; ")))
}

fn domain_matches(domain: &str, host: &str) -> bool {
    let domain = domain.trim_start_matches('.');
    host.eq_ignore_ascii_case(domain)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
}
