//! NMEA-style XOR checksum.
//!
//! The checksum covers every byte between the `$` and the `*` delimiters,
//! not including the delimiters themselves, and is written as uppercase hex.

/// Computes the checksum over `message`.
///
/// A leading `$` and a trailing `*HH` are tolerated and excluded, so both a
/// bare sentence body and a full sentence produce the same value. The result
/// is always two uppercase hex digits.
pub fn calculate_checksum(message: &[u8]) -> String {
    let body = strip_delimiters(message);

    let checksum = body.iter().fold(0u8, |acc, byte| acc ^ byte);

    format!("{:02X}", checksum)
}

/// Verifies the `*HH` checksum at the end of `message`.
///
/// Returns `None` when no checksum field can be found. Verification is
/// lenient: any case and at least one hex digit are accepted.
pub fn check_checksum(message: &[u8]) -> Option<bool> {
    let star = message.iter().rposition(|&b| b == b'*')?;

    let (data, checksum) = (&message[..star], &message[star + 1..]);
    if checksum.is_empty() || !checksum.iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    // Strip leading zeros so a non-padded `%X` checksum still verifies.
    let received = std::str::from_utf8(checksum).ok()?;
    let received = u8::from_str_radix(received, 16).ok()?;
    let expected = u8::from_str_radix(&calculate_checksum(data), 16).ok()?;

    Some(received == expected)
}

fn strip_delimiters(message: &[u8]) -> &[u8] {
    let message = message.strip_prefix(b"$").unwrap_or(message);

    match message.iter().rposition(|&b| b == b'*') {
        Some(star) if message[star + 1..].iter().all(|b| b.is_ascii_hexdigit()) => {
            &message[..star]
        }
        _ => message,
    }
}
