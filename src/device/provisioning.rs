//! Configuration portal helpers.
//!
//! While the device runs its access point, a small HTTP portal lets a phone
//! list nearby networks and submit WiFi credentials. The HTTP server itself
//! belongs to the platform; this module produces the response bodies and
//! parses the submitted form.

use super::Error;
use heapless::{String, Vec};
use serde::Serialize;

/// Maximum number of networks listed in a scan report.
pub const MAX_SCAN_ENTRIES: usize = 5;

/// Buffer size that always holds a full scan report.
pub const SCAN_REPORT_CAPACITY: usize = 400;

/// Body sent when a scan found nothing.
pub const NO_NETWORKS_FOUND: &str = "No networks found!";

/// Body sent after credentials were accepted.
pub const CREDENTIALS_ACK: &str = "Network credentials received. Check MCU led for status.";

/// Maximum SSID length in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA passphrase length in bytes.
pub const MAX_PASSWORD_LEN: usize = 64;

/// One network found by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanEntry<'a> {
    /// Network name.
    pub ssid: &'a str,
    /// Signal strength in dBm.
    pub rssi: i8,
    /// Platform-specific encryption type code.
    #[serde(rename = "encryptionType")]
    pub encryption_type: u8,
}

/// Render a scan report into `out`.
///
/// At most [`MAX_SCAN_ENTRIES`] entries are listed, as a JSON array of
/// `{"ssid","rssi","encryptionType"}` objects. An empty scan yields
/// [`NO_NETWORKS_FOUND`].
///
/// # Errors
///
/// [`Error::BufferOverflow`] if the report does not fit `out`.
///
/// # Examples
///
/// ```rust
/// use libmqtt::device::provisioning::{scan_report, ScanEntry};
///
/// let entries = [ScanEntry { ssid: "home", rssi: -48, encryption_type: 4 }];
/// let mut out = [0u8; 128];
/// let body = scan_report(&entries, &mut out).unwrap();
/// assert_eq!(body, r#"[{"ssid":"home","rssi":-48,"encryptionType":4}]"#);
/// ```
pub fn scan_report<'b>(entries: &[ScanEntry<'_>], out: &'b mut [u8]) -> Result<&'b str, Error> {
    let len = if entries.is_empty() {
        let text = NO_NETWORKS_FOUND.as_bytes();
        out.get_mut(..text.len())
            .ok_or(Error::BufferOverflow)?
            .copy_from_slice(text);
        text.len()
    } else {
        let listed = &entries[..entries.len().min(MAX_SCAN_ENTRIES)];
        serde_json_core::to_slice(&listed, out).map_err(|_| Error::BufferOverflow)?
    };
    let body = out.get(..len).ok_or(Error::BufferOverflow)?;
    core::str::from_utf8(body).map_err(|_| Error::InvalidEncoding)
}

/// WiFi credentials submitted through the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    /// Network name.
    pub ssid: String<MAX_SSID_LEN>,
    /// Passphrase; empty for open networks.
    pub password: String<MAX_PASSWORD_LEN>,
}

/// Parse `ssid=..&password=..` from a query string or form body.
///
/// Values are form-decoded: `+` becomes a space and `%XX` a byte. Unknown
/// fields are ignored; a missing password is treated as empty.
///
/// # Errors
///
/// * [`Error::MissingField`] - no non-empty `ssid`
/// * [`Error::InvalidEncoding`] - a bad `%` escape or invalid UTF-8
/// * [`Error::BufferOverflow`] - a value longer than its limit
pub fn parse_credentials(form: &str) -> Result<NetworkCredentials, Error> {
    let form = form.strip_prefix('?').unwrap_or(form);
    let mut ssid = None;
    let mut password: String<MAX_PASSWORD_LEN> = String::new();
    for pair in form.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "ssid" => ssid = Some(form_decode::<MAX_SSID_LEN>(value)?),
            "password" => password = form_decode(value)?,
            _ => {}
        }
    }
    match ssid {
        Some(ssid) if !ssid.is_empty() => Ok(NetworkCredentials { ssid, password }),
        _ => Err(Error::MissingField),
    }
}

fn form_decode<const N: usize>(raw: &str) -> Result<String<N>, Error> {
    let mut bytes: Vec<u8, N> = Vec::new();
    let mut input = raw.bytes();
    while let Some(byte) = input.next() {
        let decoded = match byte {
            b'+' => b' ',
            b'%' => {
                let high = input.next().and_then(hex_digit);
                let low = input.next().and_then(hex_digit);
                match (high, low) {
                    (Some(high), Some(low)) => (high << 4) | low,
                    _ => return Err(Error::InvalidEncoding),
                }
            }
            other => other,
        };
        bytes.push(decoded).map_err(|_| Error::BufferOverflow)?;
    }
    String::from_utf8(bytes).map_err(|_| Error::InvalidEncoding)
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
