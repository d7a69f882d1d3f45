//! Raw nom parsers for the specMech sentence grammar.
//!
//! Checksum verification and tag classification live in
//! [`crate::codec::decode`]; the parsers here only recognize the sentence
//! structure and expose the parts as borrowed slices.

use std::str::from_utf8;

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::digit1,
    combinator::map_res,
    multi::separated_list0,
    sequence::{preceded, tuple},
    IResult,
};

/// A structurally valid sentence, before checksum verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawSentence<'a> {
    /// The tag, e.g. `MTR`, without the `$S2` prefix.
    pub tag: &'a str,
    /// Comma-separated fields between the tag and the `*`. Empty fields are
    /// preserved.
    pub fields: Vec<&'a str>,
    /// The hex digits after the `*`.
    pub checksum: &'a str,
}

fn is_tag_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

fn is_field_char(byte: u8) -> bool {
    byte != b',' && byte != b'*' && byte != b'\r' && byte != b'\n'
}

/// `sentence = "$S2" tag 1*("," field) "*" checksum`
///
/// The tag is `1*ALNUM`; a field is any run of bytes free of `,`, `*`, and
/// line terminators, possibly empty; the checksum is `1*HEXDIG`.
pub fn sentence(input: &[u8]) -> IResult<&[u8], RawSentence<'_>> {
    let (remaining, (_, tag_bytes, fields, _, checksum)) = tuple((
        tag(b"$S2".as_ref()),
        map_res(take_while1(is_tag_char), from_utf8),
        preceded(
            tag(b",".as_ref()),
            separated_list0(
                tag(b",".as_ref()),
                map_res(take_while(is_field_char), from_utf8),
            ),
        ),
        tag(b"*".as_ref()),
        map_res(take_while1(|b: u8| b.is_ascii_hexdigit()), from_utf8),
    ))(input)?;

    Ok((
        remaining,
        RawSentence {
            tag: tag_bytes,
            fields,
            checksum,
        },
    ))
}

/// `echo-id = ";" 1*DIGIT "*"`
///
/// Extracts the sequence id from a command echo such as `$S2CMD,rp;12*37`.
/// Multi-digit ids are accepted even though one firmware revision only ever
/// echoes a single digit.
pub fn echo_id(echo: &[u8]) -> Option<u64> {
    let semicolon = echo.iter().position(|&b| b == b';')?;

    let mut parser = tuple((digit1::<&[u8], nom::error::Error<&[u8]>>, tag(b"*".as_ref())));
    let (_, (digits, _)) = parser(&echo[semicolon + 1..]).ok()?;

    from_utf8(digits).ok()?.parse().ok()
}
