//! Line classification.
//!
//! Stateless: one decoded line in, at most one [`ProtocolEvent`] out. Lines
//! that look like a press or release but carry a bad argument are dropped
//! rather than turned into a malformed event.

use tracing::{debug, warn};

use crate::event::ProtocolEvent;
use crate::fragment::is_digits;
use crate::id::{Catalog, MediaId};

const STATUS_PREFIXES: &[&str] = &["CURLED ", "BTNS ", "LEDS ", "HEAP "];

/// Classify one complete line.
///
/// Returns `None` only for `PRESS`/`RELEASE` (or bare numeric) lines whose
/// argument is not a strict decimal id inside the catalog.
pub fn interpret(line: &str, catalog: Catalog) -> Option<ProtocolEvent> {
    let line = line.trim();

    if let Some(arg) = keyword_argument(line, "PRESS") {
        return parse_id(arg, line, catalog).map(ProtocolEvent::Press);
    }
    if let Some(arg) = keyword_argument(line, "RELEASE") {
        return parse_id(arg, line, catalog).map(ProtocolEvent::Release);
    }
    if is_digits(line) {
        debug!(line, "bare numeric line treated as press");
        return parse_id(line, line, catalog).map(ProtocolEvent::Press);
    }

    let event = match line {
        "READY" => ProtocolEvent::Ready,
        "PONG" => ProtocolEvent::HeartbeatReply,
        _ if line.starts_with("OK") => ProtocolEvent::StatusInfo(line.to_string()),
        _ if line.starts_with("FW ") => ProtocolEvent::FirmwareInfo(line.to_string()),
        _ => {
            if let Some(text) = error_text(line) {
                ProtocolEvent::DeviceError(text.to_string())
            } else if let Some(text) = line.strip_prefix("MODE ") {
                ProtocolEvent::ModeInfo(text.trim().to_string())
            } else if STATUS_PREFIXES.iter().any(|p| line.starts_with(p)) {
                ProtocolEvent::StatusInfo(line.to_string())
            } else {
                debug!(line, "unrecognized device line");
                ProtocolEvent::Unknown(line.to_string())
            }
        }
    };
    Some(event)
}

/// Classify input forwarded without a delimiter after the fragment timeout.
///
/// A purely numeric fragment is a press whose keyword was lost; anything else
/// is reported as unknown.
pub fn interpret_fragment(fragment: &str, catalog: Catalog) -> Option<ProtocolEvent> {
    let fragment = fragment.trim();
    if is_digits(fragment) {
        debug!(fragment, "numeric fragment recovered as press");
        return parse_id(fragment, fragment, catalog).map(ProtocolEvent::Press);
    }
    debug!(fragment, "unresolved fragment");
    Some(ProtocolEvent::Unknown(fragment.to_string()))
}

/// Text of a bare `ERROR` or an `ERROR <text>` line.
fn error_text(line: &str) -> Option<&str> {
    match line.strip_prefix("ERROR")? {
        "" => Some(""),
        rest => rest.strip_prefix(' ').map(str::trim),
    }
}

/// Argument following `keyword` and exactly one space, or `None` if the line
/// is some other keyword.
fn keyword_argument<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix(' ').map(str::trim)
}

fn parse_id(arg: &str, line: &str, catalog: Catalog) -> Option<MediaId> {
    if !is_digits(arg) {
        warn!(line, "dropping line with non-numeric id");
        return None;
    }
    // Strict digits only; overflow is out of range too.
    let id = arg
        .parse::<u32>()
        .ok()
        .and_then(|raw| catalog.media_id(raw));
    if id.is_none() {
        warn!(line, catalog_size = catalog.size(), "dropping line with out-of-range id");
    }
    id
}
