//! The `detect_encoding`/`recode` collaborators assumed external by §6,
//! discharged here with `chardetng` + `encoding_rs` (§10.2).

use encoding_rs::Encoding;

/// Guess a text encoding from a sample of raw filename bytes.
///
/// Returns the encoding's canonical label, or an empty string if no
/// encoding could be determined (mirrors the external contract in §6,
/// which permits an empty-string failure signal).
pub fn detect_encoding(sample: &[u8]) -> String {
    if sample.is_empty() {
        return String::new();
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, true);
    let encoding = detector.guess(None, true);
    encoding.name().to_string()
}

/// Decode `bytes` using the named encoding, returning the UTF-8 form.
///
/// Returns `None` if `encoding` is not a recognized label (§9 Open
/// Question 4: the caller must then reject the archive rather than
/// silently falling back to some default encoding).
pub fn recode(bytes: &[u8], encoding: &str) -> Option<String> {
    let enc = Encoding::for_label(encoding.as_bytes())?;
    let (decoded, _, _had_errors) = enc.decode(bytes);
    Some(decoded.into_owned())
}
