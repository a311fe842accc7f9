//! Byte-size parsing and normalization.
//!
//! Every size in this program is an integer number of MiB. Operators and
//! system tools hand us strings in a mix of decimal (`500MB`) and binary
//! (`4GiB`) units, and a unit mix-up here means an unbootable system or a
//! destroyed partition, so everything funnels through [`parse_size`] and is
//! compared in one unit only.

use crate::error::InstallError;

/// Bytes per MiB, the canonical unit.
pub const MIB: u64 = 1 << 20;

/// Outcome of parsing a size string.
///
/// An explicit zero and a malformed string both carry a zero magnitude, but
/// they mean very different things (swap disabled vs. operator typo), so the
/// distinction is kept here instead of being flattened into one integer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParsedSize {
	/// A well-formed size, normalized to MiB (truncating).
	Parsed(u64),
	/// A literal zero: the feature this size controls is disabled.
	Disabled,
	/// Unrecognized unit or malformed number. Degrades to a zero
	/// magnitude; callers that need validity must check the tag.
	Failed,
}

impl ParsedSize {
	pub fn mib(&self) -> u64 {
		match self {
			Self::Parsed(n) => *n,
			Self::Disabled | Self::Failed => 0,
		}
	}
}

/// Unit multipliers. Binary suffixes come first so that `gi` is never
/// matched as `g` with a stray `i` left over.
const UNITS: &[(&str, u64)] = &[
	("ki", 1 << 10),
	("mi", 1 << 20),
	("gi", 1 << 30),
	("ti", 1 << 40),
	("k", 1_000),
	("m", 1_000_000),
	("g", 1_000_000_000),
	("t", 1_000_000_000_000),
];

/// Parse a human-written size string into MiB.
///
/// Accepts an optional trailing `B` (`4GiB` and `4Gi` are the same), decimal
/// and binary unit suffixes in any case, and a bare integer, which is taken
/// as a byte count (`lsblk --bytes` reports sizes that way). The numeric
/// portion must be a non-negative integer.
pub fn parse_size<S: AsRef<str>>(text: S) -> ParsedSize {
	let lower = text.as_ref().trim().to_ascii_lowercase();
	let stripped = lower.strip_suffix('b').unwrap_or(&lower);
	let (digits, multiplier) = match UNITS.iter().find(|(suffix, _)| stripped.ends_with(suffix)) {
		Some((suffix, mult)) => (&stripped[..stripped.len() - suffix.len()], *mult),
		None => (stripped, 1),
	};
	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return ParsedSize::Failed;
	}
	let magnitude = match digits.parse::<u64>() {
		Ok(n) => n,
		Err(_) => return ParsedSize::Failed,
	};
	if magnitude == 0 {
		return ParsedSize::Disabled;
	}
	ParsedSize::Parsed(magnitude.saturating_mul(multiplier) / MIB)
}

/// Validate an operator-supplied swap request.
///
/// Stricter than [`parse_size`]: the only accepted forms are an integer
/// followed by `[KMGT]B` or `[KMGT]iB` (any case), and the literal `0`.
/// The lenient parser would degrade `4X` to zero; an explicit swap request
/// has to fail loudly instead.
pub fn validate_swap_request<S: AsRef<str>>(text: S) -> Result<ParsedSize, InstallError> {
	let raw = text.as_ref().trim();
	if raw == "0" {
		return Ok(ParsedSize::Disabled);
	}
	let lower = raw.to_ascii_lowercase();
	let well_formed = lower
		.strip_suffix('b')
		.map(|body| body.strip_suffix('i').unwrap_or(body))
		.and_then(|body| body.strip_suffix(&['k', 'm', 'g', 't']))
		.is_some_and(|digits| {
			!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
		});
	if !well_formed {
		return Err(InstallError::InvalidSwapFormat(raw.to_string()));
	}
	Ok(parse_size(raw))
}
