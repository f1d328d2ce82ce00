//! Config transformation applied before the tunnel comes up
//!
//! The pipeline runs in a fixed order:
//!
//! 1. Decode the raw input if it is base64 of a WireGuard config
//! 2. Replace the first `AllowedIPs` line with the requested override
//! 3. Drop every `DNS` line unless the caller asked to keep them
//!
//! Dropping `DNS` works around `wg-quick` hanging on the runner's
//! resolvconf integration.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use regex::{NoExpand, Regex};
use std::sync::OnceLock;

/// Section header that must appear in decoded content for the decode to count
pub const INTERFACE_MARKER: &str = "[Interface]";

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn allowed_ips_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^AllowedIPs[ \t]*=[^\r\n]*").expect("valid regex"))
}

fn dns_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^DNS[ \t]*=[^\r\n]*(?:\r?\n)?").expect("valid regex"))
}

/// Caller-supplied knobs for [`transform`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Comma-separated CIDR list, substituted verbatim. Empty means no override.
    pub allowed_ips: Option<String>,
    /// Keep `DNS = ...` lines instead of stripping them
    pub keep_dns: bool,
}

/// What happened to a requested `AllowedIPs` override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
    NotRequested,
    Applied,
    /// An override was given but the config has no `AllowedIPs` line
    NoMatchingLine,
}

/// Result of running the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    /// The effective config to write to disk
    pub config: String,
    pub decoded_from_base64: bool,
    pub allowed_ips: OverrideOutcome,
    pub dns_lines_removed: usize,
}

/// Run the full pipeline. Pure: no I/O, no failure modes.
pub fn transform(raw: &str, options: &TransformOptions) -> TransformReport {
    let (content, decoded_from_base64) = match decode_base64_config(raw) {
        Some(decoded) => (decoded, true),
        None => (raw.to_string(), false),
    };

    let (content, allowed_ips) = match options.allowed_ips.as_deref() {
        Some(value) if !value.is_empty() => override_allowed_ips(&content, value),
        _ => (content, OverrideOutcome::NotRequested),
    };

    let (config, dns_lines_removed) = if options.keep_dns {
        (content, 0)
    } else {
        strip_dns(&content)
    };

    TransformReport {
        config,
        decoded_from_base64,
        allowed_ips,
        dns_lines_removed,
    }
}

/// Decode `raw` as base64, keeping the result only if it looks like a config.
///
/// Whitespace is ignored so wrapped `base64` output decodes too. Returns
/// `None` for invalid base64, non-UTF-8 output, or output without an
/// `[Interface]` section.
pub fn decode_base64_config(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let bytes = LENIENT_BASE64.decode(compact.as_bytes()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    decoded.contains(INTERFACE_MARKER).then_some(decoded)
}

/// Replace the first `AllowedIPs = ...` line with `AllowedIPs = <value>`
pub fn override_allowed_ips(content: &str, value: &str) -> (String, OverrideOutcome) {
    let re = allowed_ips_line();
    if !re.is_match(content) {
        return (content.to_string(), OverrideOutcome::NoMatchingLine);
    }

    let line = format!("AllowedIPs = {}", value);
    let replaced = re.replacen(content, 1, NoExpand(&line)).into_owned();
    (replaced, OverrideOutcome::Applied)
}

/// Remove every `DNS = ...` line along with its line ending
pub fn strip_dns(content: &str) -> (String, usize) {
    let re = dns_line();
    let removed = re.find_iter(content).count();
    if removed == 0 {
        return (content.to_string(), 0);
    }
    (re.replace_all(content, "").into_owned(), removed)
}
