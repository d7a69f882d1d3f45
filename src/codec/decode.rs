//! Decoding of raw specMech reply bytes into a [`MechReply`].
//!
//! The reply grammar, in the order the decoder applies it:
//!
//! 1. A `!` anywhere in the raw data means the controller has rebooted.
//! 2. Telnet subnegotiation bytes (`\xFF` ... `\xF0`) are stripped.
//! 3. The payload runs up to the `>` terminator, minus an optional
//!    `\x00`/`\n` immediately before it. An empty payload acknowledges a
//!    reboot.
//! 4. The payload is the `$S2CMD...*HH` command echo, optionally followed by
//!    `\x00?\n` and data sentences separated by `\r\x00\n`, each
//!    `$S2<TAG>,<fields>*HH`.

use log::warn;

use specmech_types::{MechReply, ReplyCode, Sentence, SentenceTag};

use crate::checksum::check_checksum;
use crate::parse::{echo_id, sentence};

/// Decodes one complete raw reply.
///
/// Never fails: structural problems are reported through
/// [`MechReply::code`].
pub fn decode_reply(raw: &[u8]) -> MechReply {
    let mut reply = MechReply {
        raw: raw.to_vec(),
        command_id: 0,
        code: ReplyCode::Valid,
        sentences: Vec::new(),
    };

    // `!` only ever appears after a controller reboot.
    if raw.contains(&b'!') {
        reply.code = ReplyCode::ControllerRebooted;
        return reply;
    }

    let data = match payload(raw) {
        Some(data) => data,
        None => {
            reply.code = ReplyCode::Unparsable;
            return reply;
        }
    };

    if data.is_empty() {
        reply.code = ReplyCode::RebootAcknowledged;
        return reply;
    }

    match parse_payload(data) {
        Ok((command_id, sentences)) => {
            reply.command_id = command_id;
            if sentences.iter().any(|s| s.tag == SentenceTag::Err) {
                reply.code = ReplyCode::ErrInReply;
            }
            reply.sentences = sentences;
        }
        Err(code) => reply.code = code,
    }

    reply
}

/// Strips a leading telnet subnegotiation (`\xFF` ... `\xF0`).
///
/// Returns `None` when the data starts a subnegotiation that never ends.
pub(crate) fn strip_telnet(data: &[u8]) -> Option<&[u8]> {
    if data.first() == Some(&0xFF) {
        let subneg_end = data.iter().rposition(|&b| b == 0xF0)?;
        Some(&data[subneg_end + 1..])
    } else {
        Some(data)
    }
}

/// Strips the telnet prefix and the `>` terminator.
fn payload(raw: &[u8]) -> Option<&[u8]> {
    let end = raw.iter().position(|&b| b == b'>')?;
    let data = strip_telnet(&raw[..end])?;

    let data = data.strip_suffix(b"\n").unwrap_or(data);
    let data = data.strip_suffix(b"\x00").unwrap_or(data);

    Some(data)
}

fn parse_payload(data: &[u8]) -> Result<(u64, Vec<Sentence>), ReplyCode> {
    let echo_end = data
        .iter()
        .position(|&b| b == b'\r')
        .ok_or(ReplyCode::Unparsable)?;
    let (echo, rest) = (&data[..echo_end], &data[echo_end + 1..]);

    if !echo.starts_with(b"$S2CMD") {
        return Err(ReplyCode::Unparsable);
    }

    match check_checksum(echo) {
        Some(true) => {}
        Some(false) => return Err(ReplyCode::BadCommandChecksum),
        None => return Err(ReplyCode::Unparsable),
    }

    let command_id = match echo_id(echo) {
        Some(id) => id,
        None => {
            warn!(
                "Failed matching command ID in command echo {:?}",
                String::from_utf8_lossy(echo)
            );
            0
        }
    };

    let mut sentences = vec![parse_sentence(echo)?];

    // A reply that is only the command echo carries no data sentences.
    if !rest.is_empty() {
        let rest = rest.strip_prefix(b"\x00").unwrap_or(rest);
        let rest = rest.strip_prefix(b"\n").ok_or(ReplyCode::Unparsable)?;
        let replies_end = rest
            .iter()
            .rposition(|&b| b == b'\r')
            .ok_or(ReplyCode::Unparsable)?;

        for line in split_on(&rest[..replies_end], b"\r\x00\n") {
            match check_checksum(line) {
                Some(true) => {}
                Some(false) => return Err(ReplyCode::BadReplyChecksum),
                None => return Err(ReplyCode::Unparsable),
            }

            sentences.push(parse_sentence(line)?);
        }
    }

    Ok((command_id, sentences))
}

fn parse_sentence(line: &[u8]) -> Result<Sentence, ReplyCode> {
    let (remaining, raw) = sentence(line).map_err(|_| ReplyCode::Unparsable)?;
    if !remaining.is_empty() {
        return Err(ReplyCode::Unparsable);
    }

    let tag: SentenceTag = raw.tag.parse().map_err(|_| ReplyCode::Unparsable)?;
    let fields = raw.fields.iter().map(|f| f.to_string()).collect();

    Ok(Sentence::new(tag, fields))
}

fn split_on<'a>(haystack: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while index + separator.len() <= haystack.len() {
        if &haystack[index..index + separator.len()] == separator {
            parts.push(&haystack[start..index]);
            index += separator.len();
            start = index;
        } else {
            index += 1;
        }
    }
    parts.push(&haystack[start..]);

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pneumatics_reply() {
        let raw = b"$S2CMD,rp;1*0F\r\n$S2PNU,,o,,c,,o,,1*78\r\n>";
        let reply = decode_reply(raw);

        assert_eq!(reply.code, ReplyCode::Valid);
        assert_eq!(reply.command_id, 1);
        assert_eq!(reply.sentences.len(), 2);
        assert_eq!(reply.sentences[0].tag, SentenceTag::Cmd);
        assert_eq!(reply.sentences[0].fields, vec!["rp;1"]);

        let pnu = &reply.sentences[1];
        assert_eq!(pnu.tag, SentenceTag::Pnu);
        assert_eq!(pnu.fields, vec!["", "o", "", "c", "", "o", "", "1"]);
    }

    #[test]
    fn test_reboot_marker() {
        let reply = decode_reply(b"!");
        assert_eq!(reply.code, ReplyCode::ControllerRebooted);
        assert!(reply.sentences.is_empty());
    }

    #[test]
    fn test_reboot_acknowledged() {
        let reply = decode_reply(b">");
        assert_eq!(reply.code, ReplyCode::RebootAcknowledged);

        // The acknowledgement may arrive with line terminators only.
        let reply = decode_reply(b"\x00\n>");
        assert_eq!(reply.code, ReplyCode::RebootAcknowledged);
    }

    #[test]
    fn test_pure_command_echo() {
        let reply = decode_reply(b"$S2CMD,os;2*12\r\n>");
        assert_eq!(reply.code, ReplyCode::Valid);
        assert_eq!(reply.command_id, 2);
        assert_eq!(reply.sentences.len(), 1);
        assert_eq!(reply.sentences[0].tag, SentenceTag::Cmd);
    }

    #[test]
    fn test_err_sentence() {
        let raw = b"$S2CMD,rt;1*0B\r\n$S2ERR,42,Bad arg*31\r\n>";
        let reply = decode_reply(raw);

        assert_eq!(reply.code, ReplyCode::ErrInReply);
        assert_eq!(
            reply.error_sentence(),
            Some(("42".to_string(), "Bad arg".to_string()))
        );
    }

    #[test]
    fn test_bad_checksums() {
        let bad_cmd = b"$S2CMD,rp;1*FF\r\n$S2PNU,,o,,c,,o,,1*78\r\n>";
        assert_eq!(decode_reply(bad_cmd).code, ReplyCode::BadCommandChecksum);

        let bad_reply = b"$S2CMD,rp;1*0F\r\n$S2PNU,,o,,c,,o,,1*FF\r\n>";
        assert_eq!(decode_reply(bad_reply).code, ReplyCode::BadReplyChecksum);
    }

    #[test]
    fn test_lenient_checksum_verification() {
        // A non-padded lowercase checksum still verifies.
        let raw = b"$S2CMD,rp;1*f\r\n>";
        assert_eq!(decode_reply(raw).code, ReplyCode::Valid);
    }

    #[test]
    fn test_telnet_prefix_stripped() {
        let raw = b"\xFF\xFA\x18\x01\xFF\xF0$S2CMD,rp;1*0F\r\n$S2PNU,,o,,c,,o,,1*78\r\n>";
        let reply = decode_reply(raw);

        assert_eq!(reply.code, ReplyCode::Valid);
        assert_eq!(reply.sentences.len(), 2);
    }

    #[test]
    fn test_multiple_sentences() {
        let raw = b"$S2CMD,rd;1*1B\r\n\
                    $S2MTR,,a,1200,microns*2F\r\x00\n\
                    $S2MTR,,b,1199,microns*2F\r\x00\n\
                    $S2MTR,,c,1201,microns*2C\r\n>";
        let reply = decode_reply(raw);

        assert_eq!(reply.code, ReplyCode::Valid);
        assert_eq!(reply.sentences.len(), 4);
        assert!(reply
            .data()
            .all(|sentence| sentence.tag == SentenceTag::Mtr));
        let positions: Vec<&str> = reply.data().map(|s| s.field(2)).collect();
        assert_eq!(positions, vec!["1200", "1199", "1201"]);
    }

    #[test]
    fn test_unparsable() {
        // No terminator at all.
        assert_eq!(decode_reply(b"$S2CMD,rp;1*0F\r\n").code, ReplyCode::Unparsable);
        // Echo does not start with $S2CMD.
        assert_eq!(
            decode_reply(b"$S2PNU,,o*11\r\n>").code,
            ReplyCode::Unparsable
        );
        // Unknown sentence tag.
        assert_eq!(
            decode_reply(b"$S2CMD,rp;1*0F\r\n$S2XYZ,1*27\r\n>").code,
            ReplyCode::Unparsable
        );
    }

    #[test]
    fn test_split_on() {
        assert_eq!(
            split_on(b"a\r\x00\nb\r\x00\nc", b"\r\x00\n"),
            vec![b"a".as_ref(), b"b".as_ref(), b"c".as_ref()]
        );
        assert_eq!(split_on(b"abc", b"\r\x00\n"), vec![b"abc".as_ref()]);
    }
}
