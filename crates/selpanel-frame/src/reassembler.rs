use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::fragment::{FragmentShape, FragmentTable};

/// Default time without a newline after which buffered bytes are treated as
/// a lone fragment.
pub const DEFAULT_FRAGMENT_TIMEOUT: Duration = Duration::from_millis(50);

/// Default cap on an undelimited buffer. The panel never sends lines this long.
pub const DEFAULT_MAX_LINE_LEN: usize = 256;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Configuration for [`FrameReassembler`].
#[derive(Debug, Clone)]
pub struct ReassemblerConfig {
    /// Silence after the last byte before the buffer is flushed as a fragment.
    pub fragment_timeout: Duration,
    /// How long a held keyword fragment waits for its continuation before it
    /// is released on its own, as a [`Reassembled::Fragment`].
    pub pending_timeout: Duration,
    /// Maximum buffered bytes without a delimiter. Excess input is discarded.
    pub max_line_len: usize,
    pub table: FragmentTable,
}

impl ReassemblerConfig {
    /// Default configuration with an explicit fragment timeout.
    pub fn with_fragment_timeout(fragment_timeout: Duration) -> Self {
        Self {
            fragment_timeout,
            pending_timeout: fragment_timeout * 10,
            ..Self::default()
        }
    }
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            fragment_timeout: DEFAULT_FRAGMENT_TIMEOUT,
            pending_timeout: DEFAULT_FRAGMENT_TIMEOUT * 10,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            table: FragmentTable::default(),
        }
    }
}

/// One unit of reassembled input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembled {
    /// A delimited line, or a keyword line recovered from fragments.
    Line(String),
    /// Input that never saw a delimiter and could not be completed.
    Fragment(String),
}

impl Reassembled {
    pub fn text(&self) -> &str {
        match self {
            Reassembled::Line(text) | Reassembled::Fragment(text) => text,
        }
    }
}

#[derive(Debug)]
struct PendingFragment {
    text: String,
    since: Instant,
}

/// Reassembles newline-delimited lines from arbitrarily split byte chunks.
///
/// The clock is passed in by the caller so fragment timeouts are
/// deterministic under test.
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    last_byte_at: Option<Instant>,
    pending: Option<PendingFragment>,
    config: ReassemblerConfig,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            last_byte_at: None,
            pending: None,
            config,
        }
    }

    /// Feed one chunk received at `now`; returns every line it completed.
    pub fn push(&mut self, chunk: &[u8], now: Instant) -> Vec<Reassembled> {
        let mut out = Vec::new();
        if chunk.is_empty() {
            return out;
        }

        self.buf.extend_from_slice(chunk);
        self.last_byte_at = Some(now);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw = self.buf.split_to(pos + 1);
            let line = decode(&raw[..pos]);
            if !line.is_empty() {
                self.accept_line(line, now, &mut out);
            }
        }

        if self.buf.len() > self.config.max_line_len {
            warn!(
                size = self.buf.len(),
                max = self.config.max_line_len,
                "discarding undelimited serial input"
            );
            self.buf.clear();
        }
        if self.buf.is_empty() {
            self.last_byte_at = None;
        }

        out
    }

    /// Flush state that has been silent for too long.
    ///
    /// Call this whenever the transport has been idle. A buffer that saw no
    /// delimiter within the fragment timeout is always cleared, whatever
    /// the outcome of interpreting it.
    pub fn poll_timeout(&mut self, now: Instant) -> Vec<Reassembled> {
        let mut out = Vec::new();

        if let Some(last) = self.last_byte_at {
            if now.saturating_duration_since(last) >= self.config.fragment_timeout {
                let raw = self.buf.split();
                self.last_byte_at = None;
                let fragment = decode(&raw);
                if !fragment.is_empty() {
                    out.extend(self.accept_fragment(fragment, now));
                }
            }
        }

        let expired = self
            .pending
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.since) >= self.config.pending_timeout);
        if expired && self.buf.is_empty() {
            if let Some(pending) = self.pending.take() {
                // Held text is never complete; `PRESS 01` may be `PRESS 012`
                // cut short, so it must not become a press.
                debug!(fragment = %pending.text, "held fragment never completed");
                out.push(Reassembled::Fragment(pending.text));
            }
        }

        out
    }

    /// True while bytes or a held fragment are waiting for completion.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty() || self.pending.is_some()
    }

    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }

    fn accept_line(&mut self, line: String, now: Instant, out: &mut Vec<Reassembled>) {
        let table = self.config.table;

        if let Some(pending) = self.pending.take() {
            let combined = table.splice(&pending.text, &line);
            if table.classify(&combined).has_argument() {
                debug!(pending = %pending.text, line = %line, combined = %combined, "spliced fragment");
                out.push(Reassembled::Line(combined));
                return;
            }
            debug!(pending = %pending.text, line = %line, "dropping unmatched fragment");
        }

        if table.classify(&line) == FragmentShape::KeywordPrefix {
            debug!(fragment = %line, "holding keyword fragment");
            self.pending = Some(PendingFragment {
                text: line,
                since: now,
            });
            return;
        }

        out.push(Reassembled::Line(line));
    }

    fn accept_fragment(&mut self, fragment: String, now: Instant) -> Option<Reassembled> {
        let table = self.config.table;

        let text = match self.pending.take() {
            Some(pending) => {
                let combined = table.splice(&pending.text, &fragment);
                if table.classify(&combined) == FragmentShape::Unrelated {
                    debug!(pending = %pending.text, fragment = %fragment, "dropping unmatched fragment");
                    fragment
                } else {
                    combined
                }
            }
            None => fragment,
        };

        match table.classify(&text) {
            shape if shape.is_incomplete() => {
                debug!(fragment = %text, "holding keyword fragment after timeout");
                self.pending = Some(PendingFragment { text, since: now });
                None
            }
            FragmentShape::Complete => {
                debug!(line = %text, "recovered line without delimiter");
                Some(Reassembled::Line(text))
            }
            FragmentShape::Numeric => {
                debug!(fragment = %text, "numeric fragment after timeout");
                Some(Reassembled::Fragment(text))
            }
            _ => {
                debug!(fragment = %text, "unresolved fragment after timeout");
                Some(Reassembled::Fragment(text))
            }
        }
    }

}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Reassembled {
        Reassembled::Line(text.to_string())
    }

    fn fragment(text: &str) -> Reassembled {
        Reassembled::Fragment(text.to_string())
    }

    #[test]
    fn single_line() {
        let mut r = FrameReassembler::new();
        let now = Instant::now();
        assert_eq!(r.push(b"PRESS 007\n", now), vec![line("PRESS 007")]);
        assert!(!r.has_partial());
    }

    #[test]
    fn every_split_offset_yields_line_once() {
        let wire = b"PRESS 007\n";
        for split in 0..=wire.len() {
            let mut r = FrameReassembler::new();
            let now = Instant::now();
            let mut out = r.push(&wire[..split], now);
            out.extend(r.push(&wire[split..], now));
            assert_eq!(out, vec![line("PRESS 007")], "split at {split}");
        }
    }

    #[test]
    fn every_split_offset_survives_a_stall() {
        let wire = b"PRESS 007\n";
        let t0 = Instant::now();
        let resume = t0 + DEFAULT_FRAGMENT_TIMEOUT * 2;
        for split in 0..=wire.len() {
            let mut r = FrameReassembler::new();
            let mut out = r.push(&wire[..split], t0);
            out.extend(r.poll_timeout(resume));
            out.extend(r.push(&wire[split..], resume));
            out.extend(r.poll_timeout(resume + DEFAULT_FRAGMENT_TIMEOUT * 20));
            assert_eq!(out, vec![line("PRESS 007")], "split at {split}");
            assert!(!r.has_partial(), "split at {split}");
        }
    }

    #[test]
    fn truncated_argument_never_becomes_a_line() {
        let wire = b"PRESS 012";
        let t0 = Instant::now();
        for split in 1..wire.len() {
            let mut r = FrameReassembler::new();
            let mut out = r.push(&wire[..split], t0);
            out.extend(r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT));
            out.extend(r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT * 12));
            assert!(
                out.iter().all(|item| matches!(item, Reassembled::Fragment(_))),
                "split at {split}: {out:?}"
            );
            assert!(!r.has_partial(), "split at {split}");
        }
    }

    #[test]
    fn byte_by_byte_delivery() {
        let mut r = FrameReassembler::new();
        let now = Instant::now();
        let mut out = Vec::new();
        for byte in b"READY\nPONG\n" {
            out.extend(r.push(std::slice::from_ref(byte), now));
        }
        assert_eq!(out, vec![line("READY"), line("PONG")]);
    }

    #[test]
    fn coalesced_lines_and_crlf() {
        let mut r = FrameReassembler::new();
        let out = r.push(b"FW selection-panel v2.5.1\r\nREADY\r\n\r\nPRESS 001\r\n", Instant::now());
        assert_eq!(
            out,
            vec![line("FW selection-panel v2.5.1"), line("READY"), line("PRESS 001")]
        );
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let mut r = FrameReassembler::new();
        let out = r.push(b"ERROR \xffbad\n", Instant::now());
        assert_eq!(out, vec![line("ERROR \u{fffd}bad")]);
    }

    #[test]
    fn fragment_timeout_recovery_across_three_chunks() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        let step = DEFAULT_FRAGMENT_TIMEOUT + Duration::from_millis(5);

        assert!(r.push(b"PR", t0).is_empty());
        assert!(r.poll_timeout(t0 + step).is_empty());

        assert!(r.push(b"ESS ", t0 + step).is_empty());
        assert!(r.poll_timeout(t0 + step * 2).is_empty());

        let out = r.push(b"007\n", t0 + step * 2);
        assert_eq!(out, vec![line("PRESS 007")]);
        assert!(!r.has_partial());
    }

    #[test]
    fn keyword_line_then_numeric_line_is_spliced() {
        let mut r = FrameReassembler::new();
        let now = Instant::now();
        let out = r.push(b"PRESS \n003\n", now);
        assert_eq!(out, vec![line("PRESS 003")]);
    }

    #[test]
    fn numeric_fragment_completes_pending_keyword() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        let later = t0 + DEFAULT_FRAGMENT_TIMEOUT;

        r.push(b"PRESS", t0);
        assert!(r.poll_timeout(later).is_empty());
        r.push(b"012", later);
        let out = r.poll_timeout(later + DEFAULT_FRAGMENT_TIMEOUT);
        assert_eq!(out, vec![line("PRESS 012")]);
    }

    #[test]
    fn lone_numeric_fragment_is_forwarded() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        r.push(b"004", t0);
        assert!(r.poll_timeout(t0 + Duration::from_millis(10)).is_empty());
        let out = r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT);
        assert_eq!(out, vec![fragment("004")]);
        assert!(!r.has_partial());
    }

    #[test]
    fn unrelated_fragment_is_forwarded_and_cleared() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        r.push(b"HEAP 2", t0);
        let out = r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT);
        assert_eq!(out, vec![fragment("HEAP 2")]);

        let out = r.push(b"READY\n", t0 + DEFAULT_FRAGMENT_TIMEOUT * 2);
        assert_eq!(out, vec![line("READY")]);
    }

    #[test]
    fn complete_keyword_without_delimiter_is_recovered() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        r.push(b"RELEASE 009", t0);
        let out = r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT);
        assert_eq!(out, vec![line("RELEASE 009")]);

        // A late delimiter produces an empty line, which is skipped.
        assert!(r.push(b"\n", t0 + DEFAULT_FRAGMENT_TIMEOUT * 2).is_empty());
    }

    #[test]
    fn unmatched_pending_is_dropped_and_line_forwarded() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        r.push(b"PR", t0);
        r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT);

        let out = r.push(b"PRESS 002\n", t0 + DEFAULT_FRAGMENT_TIMEOUT * 2);
        assert_eq!(out, vec![line("PRESS 002")]);
        assert!(!r.has_partial());
    }

    #[test]
    fn held_partial_argument_expires_as_fragment() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        r.push(b"PRESS 01", t0);
        assert!(r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT).is_empty());
        assert!(r.has_partial());

        let out = r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT * 11);
        assert_eq!(out, vec![fragment("PRESS 01")]);
        assert!(!r.has_partial());
    }

    #[test]
    fn held_keyword_without_argument_expires_as_fragment() {
        let mut r = FrameReassembler::new();
        let t0 = Instant::now();
        r.push(b"PRE\n", t0);
        assert!(r.has_partial());
        let out = r.poll_timeout(t0 + DEFAULT_FRAGMENT_TIMEOUT * 10);
        assert_eq!(out, vec![fragment("PRE")]);
    }

    #[test]
    fn oversized_buffer_is_discarded() {
        let cfg = ReassemblerConfig {
            max_line_len: 8,
            ..ReassemblerConfig::default()
        };
        let mut r = FrameReassembler::with_config(cfg);
        let now = Instant::now();
        assert!(r.push(b"0123456789abcdef", now).is_empty());
        assert!(!r.has_partial());
        assert_eq!(r.push(b"PONG\n", now), vec![line("PONG")]);
    }

    #[test]
    fn with_fragment_timeout_scales_pending_timeout() {
        let cfg = ReassemblerConfig::with_fragment_timeout(Duration::from_millis(20));
        assert_eq!(cfg.pending_timeout, Duration::from_millis(200));
    }
}
