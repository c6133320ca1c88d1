//! Control protocol framing
//!
//! Replies are `NNN-text` (mid), `NNN+text` (data block until a lone `.`)
//! and `NNN text` (end). Only the pieces needed for authentication and
//! signalling are parsed here.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// A complete control-port reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code of the end line
    pub status: u16,
    /// Text of every reply line (status prefix stripped), data block lines included
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == 250
    }

    /// Text of the end line, e.g. "OK" or "Authentication failed"
    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// One-line summary for errors and logs
    pub fn summary(&self) -> String {
        format!("{} {}", self.status, self.message())
    }
}

/// Read one full reply from the control port
pub async fn read_reply<R>(reader: &mut R) -> io::Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();

    loop {
        let line = read_line(reader).await?;
        if line.len() < 4 || !line.is_char_boundary(3) || !line.is_char_boundary(4) {
            return Err(malformed(&line));
        }

        let status: u16 = line[..3].parse().map_err(|_| malformed(&line))?;
        let sep = line.as_bytes()[3];
        let text = line[4..].to_string();

        match sep {
            b' ' => {
                lines.push(text);
                debug!("Control reply: {} {}", status, lines.last().map(String::as_str).unwrap_or(""));
                return Ok(Reply { status, lines });
            },
            b'-' => lines.push(text),
            b'+' => {
                lines.push(text);
                loop {
                    let data = read_line(reader).await?;
                    if data == "." {
                        break;
                    }
                    // Leading dots are escaped as ".."
                    let data = data.strip_prefix('.').unwrap_or(&data).to_string();
                    lines.push(data);
                }
            },
            _ => return Err(malformed(&line)),
        }
    }
}

async fn read_line<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "control connection closed mid-reply",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn malformed(line: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("malformed control reply line: {:?}", line),
    )
}

/// Authentication details advertised by PROTOCOLINFO
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Auth methods in upper case (NULL, HASHEDPASSWORD, COOKIE, SAFECOOKIE)
    pub auth_methods: Vec<String>,
    /// Cookie file path if cookie auth is enabled
    pub cookie_file: Option<String>,
    /// Tor version string
    pub tor_version: Option<String>,
}

impl ProtocolInfo {
    pub fn supports(&self, method: &str) -> bool {
        self.auth_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Parse a PROTOCOLINFO reply
    pub fn parse(reply: &Reply) -> Self {
        let mut info = Self::default();

        for line in &reply.lines {
            if let Some(rest) = line.strip_prefix("AUTH ") {
                for (key, value) in key_values(rest) {
                    match key.as_str() {
                        "METHODS" => {
                            info.auth_methods = value
                                .split(',')
                                .filter(|m| !m.is_empty())
                                .map(|m| m.to_ascii_uppercase())
                                .collect();
                        },
                        "COOKIEFILE" => info.cookie_file = Some(value),
                        _ => {},
                    }
                }
            } else if let Some(rest) = line.strip_prefix("VERSION ") {
                for (key, value) in key_values(rest) {
                    if key == "Tor" {
                        info.tor_version = Some(value);
                    }
                }
            }
        }

        info
    }
}

/// Split `K=V K2="quoted value"` into pairs, unescaping quoted values
fn key_values(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];

        let value;
        if rest.starts_with('"') {
            let (unquoted, consumed) = unquote(rest);
            value = unquoted;
            rest = &rest[consumed..];
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            value = rest[..end].to_string();
            rest = &rest[end..];
        }

        pairs.push((key, value));
        rest = rest.trim_start();
    }

    pairs
}

/// Decode a QuotedString starting at `input[0] == '"'`.
/// Returns the value and the number of bytes consumed.
fn unquote(input: &str) -> (String, usize) {
    let mut out = String::new();
    let mut chars = input.char_indices().skip(1);

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return (out, idx + 1),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }

    // Unterminated
    (out, input.len())
}
