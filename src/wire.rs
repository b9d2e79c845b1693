//! Request framing for the pfetch line protocol.
//!
//! Every token travels in its own `send` as the token bytes followed by a
//! single delimiter byte; the request is flushed by a lone newline.

use crate::domain::SequenceName;

pub const TOKEN_DELIMITER: u8 = b' ';
pub const REQUEST_TERMINATOR: &[u8] = b"\n";

/// Frames a single token: token bytes plus the trailing delimiter.
pub fn frame_token(token: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(token.len() + 1);
    frame.extend_from_slice(token.as_bytes());
    frame.push(TOKEN_DELIMITER);
    frame
}

/// The ordered `send` units making up one request.
pub fn encode_request<'a, I>(options: &str, names: I) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = &'a SequenceName>,
{
    let mut frames = vec![frame_token(options)];
    frames.extend(names.into_iter().map(|name| frame_token(name.as_str())));
    frames.push(REQUEST_TERMINATOR.to_vec());
    frames
}

/// The whole request as one line, for transports that carry it in a
/// single field (HTTP proxies).
pub fn request_line<'a, I>(options: &str, names: I) -> String
where
    I: IntoIterator<Item = &'a SequenceName>,
{
    let mut line = options.to_string();
    for name in names {
        line.push(' ');
        line.push_str(name.as_str());
    }
    line
}
