//! Media type and charset resolution for response bodies.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1251};
use mime::Mime;

/// The parts of a `Content-Type` value the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType<'a> {
    /// Type/subtype exactly as sent, without parameters, e.g. `text/html`.
    pub essence: &'a str,
    charset: Option<String>,
}

impl<'a> MediaType<'a> {
    /// Split a `Content-Type` value into its essence and charset.
    ///
    /// The essence keeps its original case since content rules are looked up
    /// by exact match. A value `mime` cannot parse has no charset.
    pub fn parse(content_type: &'a str) -> Self {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let charset = content_type
            .parse::<Mime>()
            .ok()
            .and_then(|mime| {
                mime.get_param(mime::CHARSET)
                    .map(|value| value.as_str().trim_matches('"').to_owned())
            })
            .filter(|value| !value.is_empty());
        Self { essence, charset }
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Encoding for this media type; UTF-8 when no charset is declared.
    pub fn encoding(&self) -> Result<&'static Encoding, UnknownCharset> {
        resolve_encoding(self.charset())
    }
}

/// A declared charset that has no usable encoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown charset {0:?}")]
pub struct UnknownCharset(pub String);

/// Map a charset label to an encoding that can both decode and re-encode.
///
/// Labels resolving to the `replacement` encoding (`iso-2022-kr`,
/// `hz-gb-2312`, ...) are rejected: it decodes any input to U+FFFD.
pub fn resolve_encoding(charset: Option<&str>) -> Result<&'static Encoding, UnknownCharset> {
    let Some(label) = charset else {
        return Ok(UTF_8);
    };
    if label.eq_ignore_ascii_case("cp1251") {
        return Ok(WINDOWS_1251);
    }
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) if encoding.output_encoding() == encoding || is_utf16(encoding) => {
            Ok(encoding)
        }
        _ => Err(UnknownCharset(label.to_owned())),
    }
}

fn is_utf16(encoding: &'static Encoding) -> bool {
    encoding == UTF_16LE || encoding == UTF_16BE
}

/// Decode `bytes`, run `rewrite` over the text and encode the result again
/// with the same encoding.
pub fn transcode(
    bytes: &[u8],
    encoding: &'static Encoding,
    rewrite: impl FnOnce(&str) -> String,
) -> Vec<u8> {
    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    let rewritten = rewrite(&*text);
    encode(&rewritten, encoding)
}

/// `Encoding::encode` emits UTF-8 for UTF-16 targets, so those are done here.
fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_16LE {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    } else if encoding == UTF_16BE {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    } else {
        let (encoded, _, _) = encoding.encode(text);
        encoded.into_owned()
    }
}
