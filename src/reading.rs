use unicode_normalization::UnicodeNormalization;

/// Converts a raw reading column value into the form used in priority keys.
pub trait ReadingNormalizer: Send + Sync {
    fn normalize(&self, reading: &str) -> String;
}

impl<F> ReadingNormalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, reading: &str) -> String {
        self(reading)
    }
}

/// Default normalizer, see [`normalize_reading`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KanaNormalizer;

impl ReadingNormalizer for KanaNormalizer {
    fn normalize(&self, reading: &str) -> String {
        normalize_reading(reading)
    }
}

/// NFKD, drop U+0300..U+036F, recompose with NFC, lowercase, katakana to
/// hiragana, trim.
///
/// Only the U+0300..U+036F block is stripped so that kana voicing marks survive.
pub fn normalize_reading(reading: &str) -> String {
    let trimmed = reading.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    trimmed
        .nfkd()
        .filter(|&ch| !is_latin_diacritic(ch))
        .nfc()
        .flat_map(char::to_lowercase)
        .map(katakana_to_hiragana)
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_latin_diacritic(ch: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&ch)
}

fn katakana_to_hiragana(ch: char) -> char {
    match ch {
        '\u{30a1}'..='\u{30f6}' => char::from_u32(ch as u32 - 0x60).unwrap_or(ch),
        _ => ch,
    }
}
