//! The reply model.
//!
//! A single interaction with the specMech produces one [`MechReply`]: the raw
//! bytes as read from the wire, a classification [`ReplyCode`], and the
//! parsed NMEA-style [`Sentence`]s in the order they were received. The
//! command echo (`$S2CMD...`) always precedes the data sentences and the
//! decoder preserves that order.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

/// Classification of a complete specMech reply.
///
/// Exactly one code applies to a reply. `Valid` implies that the checksum of
/// the command echo and of every data sentence verified.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyCode {
    Valid,
    Unparsable,
    MismatchedId,
    BadCommandChecksum,
    BadReplyChecksum,
    ErrInReply,
    ControllerRebooted,
    RebootAcknowledged,
    ConnectionFailed,
}

impl ReplyCode {
    /// Whether a reply with this code completed a normal interaction.
    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyCode::Valid | ReplyCode::RebootAcknowledged)
    }
}

impl Display for ReplyCode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            ReplyCode::Valid => "VALID",
            ReplyCode::Unparsable => "UNPARSABLE",
            ReplyCode::MismatchedId => "MISMATCHED_ID",
            ReplyCode::BadCommandChecksum => "BAD_CMD_CHECKSUM",
            ReplyCode::BadReplyChecksum => "BAD_REPLY_CHECKSUM",
            ReplyCode::ErrInReply => "ERR_IN_REPLY",
            ReplyCode::ControllerRebooted => "CONTROLLER_REBOOTED",
            ReplyCode::RebootAcknowledged => "REBOOT_ACKNOWLEDGED",
            ReplyCode::ConnectionFailed => "CONNECTION_FAILED",
        };

        write!(f, "{}", name)
    }
}

/// Tag of a reply sentence.
///
/// The set is closed; a tag outside it makes the whole reply unparsable.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentenceTag {
    /// Echo of the sent command.
    Cmd,
    /// Collimator motor report.
    Mtr,
    /// Environment (temperature/humidity) report.
    Env,
    /// Accelerometer orientation report.
    Ori,
    /// Pneumatics report.
    Pnu,
    /// Controller clock report.
    Tim,
    /// Firmware version report.
    Ver,
    /// Dewar vacuum report.
    Vac,
    /// Liquid nitrogen system report.
    Ln2,
    /// Internal specMech status report.
    S2,
    /// Error indication.
    Err,
}

impl Display for SentenceTag {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let tag = match self {
            SentenceTag::Cmd => "CMD",
            SentenceTag::Mtr => "MTR",
            SentenceTag::Env => "ENV",
            SentenceTag::Ori => "ORI",
            SentenceTag::Pnu => "PNU",
            SentenceTag::Tim => "TIM",
            SentenceTag::Ver => "VER",
            SentenceTag::Vac => "VAC",
            SentenceTag::Ln2 => "LN2",
            SentenceTag::S2 => "S2",
            SentenceTag::Err => "ERR",
        };

        write!(f, "{}", tag)
    }
}

/// Error returned when a sentence tag is not in the closed set.
#[derive(Clone, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[error("Unknown sentence tag {0:?}")]
pub struct UnknownTag(pub String);

impl FromStr for SentenceTag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        match s {
            "CMD" => Ok(SentenceTag::Cmd),
            "MTR" => Ok(SentenceTag::Mtr),
            "ENV" => Ok(SentenceTag::Env),
            "ORI" => Ok(SentenceTag::Ori),
            "PNU" => Ok(SentenceTag::Pnu),
            "TIM" => Ok(SentenceTag::Tim),
            "VER" => Ok(SentenceTag::Ver),
            "VAC" => Ok(SentenceTag::Vac),
            "LN2" => Ok(SentenceTag::Ln2),
            "S2" => Ok(SentenceTag::S2),
            "ERR" => Ok(SentenceTag::Err),
            other => Err(UnknownTag(other.to_string())),
        }
    }
}

/// One parsed `$S2<TAG>,<fields>*<CHK>` sentence.
///
/// `fields` holds everything between the tag and the checksum delimiter,
/// split on commas. Empty fields are preserved: the PNU report interleaves
/// empty placeholder fields with the values.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Sentence {
    pub tag: SentenceTag,
    pub fields: Vec<String>,
}

impl Sentence {
    pub fn new(tag: SentenceTag, fields: Vec<String>) -> Self {
        Self { tag, fields }
    }

    /// Returns the field at `index`, or an empty string when missing.
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.as_str()).unwrap_or("")
    }
}

/// A complete decoded reply to one specMech command.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MechReply {
    /// The raw bytes as read from the wire, including the terminator.
    pub raw: Vec<u8>,
    /// The sequence id parsed from the command echo; 0 when unknown.
    pub command_id: u64,
    pub code: ReplyCode,
    /// Parsed sentences in wire order. Empty for a pure command echo.
    pub sentences: Vec<Sentence>,
}

impl MechReply {
    /// A reply that never made it to the wire.
    pub fn failed(code: ReplyCode) -> Self {
        Self {
            raw: Vec::new(),
            command_id: 0,
            code,
            sentences: Vec::new(),
        }
    }

    /// The first sentence carrying data, skipping the command echo.
    pub fn first_data(&self) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.tag != SentenceTag::Cmd)
    }

    /// All data sentences, skipping the command echo.
    pub fn data(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences.iter().filter(|s| s.tag != SentenceTag::Cmd)
    }

    /// The `(code, message)` of the first `ERR` sentence, if any.
    pub fn error_sentence(&self) -> Option<(String, String)> {
        self.sentences
            .iter()
            .find(|s| s.tag == SentenceTag::Err)
            .map(|s| (s.field(0).to_string(), s.field(1).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in [
            SentenceTag::Cmd,
            SentenceTag::Mtr,
            SentenceTag::Env,
            SentenceTag::Ori,
            SentenceTag::Pnu,
            SentenceTag::Tim,
            SentenceTag::Ver,
            SentenceTag::Vac,
            SentenceTag::Ln2,
            SentenceTag::S2,
            SentenceTag::Err,
        ] {
            assert_eq!(tag.to_string().parse::<SentenceTag>().unwrap(), tag);
        }

        assert_eq!(
            "XYZ".parse::<SentenceTag>(),
            Err(UnknownTag("XYZ".to_string()))
        );
    }

    #[test]
    fn test_error_sentence() {
        let reply = MechReply {
            raw: Vec::new(),
            command_id: 1,
            code: ReplyCode::ErrInReply,
            sentences: vec![
                Sentence::new(SentenceTag::Cmd, vec![]),
                Sentence::new(
                    SentenceTag::Err,
                    vec!["42".to_string(), "Bad arg".to_string()],
                ),
            ],
        };

        assert_eq!(
            reply.error_sentence(),
            Some(("42".to_string(), "Bad arg".to_string()))
        );
    }
}
