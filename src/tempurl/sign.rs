//! Canonical-string construction and HMAC-SHA1 temp-URL signatures.
//!
//! The canonical string is exactly `METHOD\n{expiry}\n{path}` with single
//! newline separators and nothing else; the verifier builds the same bytes
//! independently, so any drift here invalidates every issued URL.

// crates.io
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::form_urlencoded;

type HmacSha1 = Hmac<Sha1>;

/// Query parameter carrying the hex signature.
pub const SIG_PARAM: &str = "temp_url_sig";
/// Query parameter carrying the absolute expiry in unix seconds.
pub const EXPIRES_PARAM: &str = "temp_url_expires";

/// Computes the lowercase-hex HMAC-SHA1 temp-URL signature.
///
/// Pure: identical `(key, method, expiry, path)` inputs always yield an
/// identical signature, which is what lets an independent verifier accept it.
pub fn signature(key: &str, method: &str, expires_unix: i64, path: &str) -> String {
	let canonical = format!("{method}\n{expires_unix}\n{path}");
	let mut mac =
		HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length.");

	mac.update(canonical.as_bytes());

	hex::encode(mac.finalize().into_bytes())
}

/// Appends the signature query parameters to an absolute object URL.
pub(crate) fn assemble_url(
	object_url: &str,
	sig: &str,
	expires_unix: i64,
	filename: Option<&str>,
	inline: bool,
) -> String {
	let mut url = format!("{object_url}?{SIG_PARAM}={sig}&{EXPIRES_PARAM}={expires_unix}");

	if let Some(filename) = filename {
		url.push_str("&filename=");
		url.extend(form_urlencoded::byte_serialize(filename.as_bytes()));
	}
	if inline {
		url.push_str("&inline");
	}

	url
}
