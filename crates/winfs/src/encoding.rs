//! Code page handling for the narrow native channel
//!
//! Maps Windows code page numbers to encodings, checks whether a path survives
//! the narrow API, and decodes native entry names that are not UTF-8.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// UTF-8 code page identifier
pub const CP_UTF8: u32 = 65001;

/// Hint for encoding detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingHint {
    /// Prefer Japanese encodings (Shift_JIS)
    Japanese,
    /// Prefer Chinese Simplified (GBK/GB18030)
    ChineseSimplified,
    /// Prefer Chinese Traditional (Big5)
    ChineseTraditional,
    /// Prefer Korean (EUC-KR)
    Korean,
    /// No preference
    None,
}

impl EncodingHint {
    /// Hint matching an ANSI code page
    pub fn from_code_page(code_page: u32) -> Self {
        match code_page {
            932 => EncodingHint::Japanese,
            936 => EncodingHint::ChineseSimplified,
            950 => EncodingHint::ChineseTraditional,
            949 => EncodingHint::Korean,
            _ => EncodingHint::None,
        }
    }

    fn tld(self) -> Option<&'static [u8]> {
        match self {
            EncodingHint::Japanese => Some(b"jp"),
            EncodingHint::ChineseSimplified => Some(b"cn"),
            EncodingHint::ChineseTraditional => Some(b"tw"),
            EncodingHint::Korean => Some(b"kr"),
            EncodingHint::None => None,
        }
    }
}

/// Encoding used by a Windows code page, if known
pub fn encoding_for_code_page(code_page: u32) -> Option<&'static Encoding> {
    let encoding = match code_page {
        CP_UTF8 => encoding_rs::UTF_8,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 => encoding_rs::WINDOWS_1252,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        _ => return None,
    };
    Some(encoding)
}

/// Can `s` pass through an API limited to `encoding` without loss?
pub fn is_representable(s: &str, encoding: &'static Encoding) -> bool {
    if s.is_ascii() || encoding == encoding_rs::UTF_8 {
        return true;
    }

    let (_, _, had_errors) = encoding.encode(s);
    !had_errors
}

/// Detect the most likely encoding of a byte sequence
pub fn detect_encoding(bytes: &[u8], hint: EncodingHint) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        return encoding_rs::UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);

    let detected = detector.guess(hint.tld(), true);

    // chardetng falls back to windows-1252 when it has nothing better
    if detected != encoding_rs::WINDOWS_1252 {
        return detected;
    }

    match hint {
        EncodingHint::Japanese => encoding_rs::SHIFT_JIS,
        EncodingHint::ChineseSimplified => encoding_rs::GBK,
        EncodingHint::ChineseTraditional => encoding_rs::BIG5,
        EncodingHint::Korean => encoding_rs::EUC_KR,
        EncodingHint::None => detected,
    }
}

/// Decode bytes to UTF-8 string
///
/// Returns the decoded string and a flag indicating if there were errors
pub fn decode_bytes(bytes: &[u8], hint: EncodingHint) -> (String, bool) {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return (s.to_string(), false);
    }

    let encoding = detect_encoding(bytes, hint);

    let (result, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!("Lossy decode of native name with {}", encoding.name());
    }
    (result.into_owned(), had_errors)
}
