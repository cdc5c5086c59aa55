//! Newline-delimited ASCII wire codec.
//!
//! Wire grammar (peer → host):
//! ```text
//! T:<temp>,H:<humidity>\n
//! USER_FEEDBACK:<temp>,<humidity>,<hot|comfortable|cold>\n
//! Status:<free text>\n          informational, never changes state
//! Action:<free text>\n          informational, never changes state
//! ```
//! Host → peer: exactly one of `hot`, `cold`, `comfortable` per line.
//!
//! The [`LineDecoder`] accumulates incoming bytes and yields complete
//! lines.  A single `Transport::read` may return part of a line, several
//! lines, or a line split across a `\r\n` pair.

use core::fmt;

use heapless::Vec;
use serde::Serialize;

use crate::comfort::ComfortLabel;
use crate::error::ParseError;

/// Longest line accepted.  Real telemetry lines are well under 40 bytes.
pub const MAX_LINE_LEN: usize = 128;

const TELEMETRY_PREFIX: &str = "T:";
const HUMIDITY_SEPARATOR: &str = ",H:";
const FEEDBACK_PREFIX: &str = "USER_FEEDBACK:";
const STATUS_PREFIX: &str = "Status:";
const ACTION_PREFIX: &str = "Action:";

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// Relay command understood by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayCommand {
    Hot,
    Cold,
    Comfortable,
}

impl RelayCommand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Cold => "cold",
            Self::Comfortable => "comfortable",
        }
    }

    /// Wire form including the terminating newline.
    pub fn encode(self) -> String {
        format!("{}\n", self.as_str())
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Status,
    Action,
}

/// A recognised peer line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Telemetry {
        temperature: f32,
        humidity: f32,
    },
    Feedback {
        temperature: f32,
        humidity: f32,
        label: ComfortLabel,
    },
    Notice {
        kind: NoticeKind,
        text: String,
    },
}

/// Parse one line (without its terminator).
pub fn parse_line(line: &str) -> Result<Inbound, ParseError> {
    let line = line.trim_matches(|c: char| c.is_ascii_whitespace());
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(rest) = line.strip_prefix(FEEDBACK_PREFIX) {
        let mut fields = rest.splitn(3, ',');
        let (Some(t), Some(h), Some(label)) = (fields.next(), fields.next(), fields.next()) else {
            return Err(ParseError::Unrecognised(line.to_string()));
        };
        return Ok(Inbound::Feedback {
            temperature: parse_decimal(t)?,
            humidity: parse_decimal(h)?,
            label: label.parse()?,
        });
    }

    if let Some(rest) = line.strip_prefix(TELEMETRY_PREFIX) {
        let Some((t, h)) = rest.split_once(HUMIDITY_SEPARATOR) else {
            return Err(ParseError::Unrecognised(line.to_string()));
        };
        return Ok(Inbound::Telemetry {
            temperature: parse_decimal(t)?,
            humidity: parse_decimal(h)?,
        });
    }

    for (prefix, kind) in [
        (STATUS_PREFIX, NoticeKind::Status),
        (ACTION_PREFIX, NoticeKind::Action),
    ] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Ok(Inbound::Notice {
                kind,
                text: rest.trim().to_string(),
            });
        }
    }

    Err(ParseError::Unrecognised(line.to_string()))
}

/// Strict decimal: `-?digits(.digits)?`, no exponent, no `inf`/`nan`.
pub fn parse_decimal(field: &str) -> Result<f32, ParseError> {
    let bad = || ParseError::BadNumber(field.to_string());
    let unsigned = field.strip_prefix('-').unwrap_or(field);
    let (int, frac) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || frac.is_some_and(|f| !digits(f)) {
        return Err(bad());
    }
    let value: f32 = field.parse().map_err(|_| bad())?;
    if value.is_finite() { Ok(value) } else { Err(bad()) }
}

/// Telemetry line as the peer sends it (one decimal place).
pub fn encode_telemetry(temperature: f32, humidity: f32) -> String {
    format!("{TELEMETRY_PREFIX}{temperature:.1}{HUMIDITY_SEPARATOR}{humidity:.1}\n")
}

/// Feedback line as the peer sends it (one decimal place).
pub fn encode_feedback(temperature: f32, humidity: f32, label: ComfortLabel) -> String {
    format!("{FEEDBACK_PREFIX}{temperature:.1},{humidity:.1},{label}\n")
}

// ---------------------------------------------------------------------------
// Streaming line decoder
// ---------------------------------------------------------------------------

/// Streaming line decoder.
///
/// Lines longer than [`MAX_LINE_LEN`] are dropped up to the next `\n` and
/// reported once as [`ParseError::TooLong`].  Blank lines are skipped.
pub struct LineDecoder {
    buf: Vec<u8, MAX_LINE_LEN>,
    /// Bytes dropped from the current over-long line.
    overflow: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflow: 0,
        }
    }

    /// Feed bytes, calling `on_line` for every complete line in order.
    pub fn feed(&mut self, data: &[u8], mut on_line: impl FnMut(Result<&str, ParseError>)) {
        for &byte in data {
            if byte != b'\n' {
                if self.overflow > 0 || self.buf.push(byte).is_err() {
                    self.overflow += 1;
                }
                continue;
            }

            if self.overflow > 0 {
                on_line(Err(ParseError::TooLong(self.buf.len() + self.overflow)));
            } else {
                let line = self.buf.strip_suffix(b"\r").unwrap_or(&self.buf[..]);
                if !line.is_empty() {
                    on_line(core::str::from_utf8(line).map_err(|_| ParseError::Encoding));
                }
            }
            self.reset();
        }
    }

    /// Bytes buffered for the current partial line.
    pub fn pending(&self) -> usize {
        self.buf.len() + self.overflow
    }

    /// Drop any partial line (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflow = 0;
    }
}
