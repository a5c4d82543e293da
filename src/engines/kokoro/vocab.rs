use std::collections::HashMap;
use std::path::Path;

use super::model::KokoroError;

/// Mapping from phoneme characters to Kokoro token IDs.
#[derive(Debug, Clone)]
pub struct Vocab {
    ids: HashMap<char, i64>,
}

impl Vocab {
    /// Load the vocabulary from a Kokoro `config.json`.
    ///
    /// The file must contain a `"vocab"` object mapping single-character
    /// strings to integer token IDs.
    pub fn load(config_path: &Path) -> Result<Self, KokoroError> {
        let content = std::fs::read_to_string(config_path)?;
        Self::from_config_json(&content)
    }

    fn from_config_json(content: &str) -> Result<Self, KokoroError> {
        let json: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| KokoroError::Config(format!("Failed to parse JSON: {e}")))?;

        let entries = json
            .get("vocab")
            .ok_or_else(|| KokoroError::Config("Missing 'vocab' field".to_string()))?
            .as_object()
            .ok_or_else(|| KokoroError::Config("'vocab' must be an object".to_string()))?;

        let mut ids = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let ch = key
                .chars()
                .next()
                .ok_or_else(|| KokoroError::Config(format!("Empty key in vocab: {key:?}")))?;
            let id = value.as_i64().ok_or_else(|| {
                KokoroError::Config(format!("Non-integer vocab value for key {key:?}"))
            })?;
            ids.insert(ch, id);
        }

        if ids.is_empty() {
            return Err(KokoroError::Config("'vocab' is empty".to_string()));
        }
        Ok(Self { ids })
    }

    /// The vocabulary shipped with Kokoro v1.0, used when no `config.json` is present.
    pub fn builtin() -> Self {
        Self {
            ids: BUILTIN_VOCAB.iter().copied().collect(),
        }
    }

    pub fn contains(&self, ch: char) -> bool {
        self.ids.contains_key(&ch)
    }

    /// Token IDs for a phoneme string. Unknown characters are skipped.
    pub fn encode(&self, phonemes: &str) -> Vec<i64> {
        phonemes
            .chars()
            .filter_map(|ch| self.ids.get(&ch).copied())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }
}

const BUILTIN_VOCAB: &[(char, i64)] = &[
    (';', 1),
    (':', 2),
    (',', 3),
    ('.', 4),
    ('!', 5),
    ('?', 6),
    ('—', 9),
    ('…', 10),
    ('"', 11),
    ('(', 12),
    (')', 13),
    ('\u{201c}', 14),
    ('\u{201d}', 15),
    (' ', 16),
    ('\u{0303}', 17),
    ('ʣ', 18),
    ('ʥ', 19),
    ('ʦ', 20),
    ('ʨ', 21),
    ('ᵝ', 22),
    ('ꭧ', 23),
    ('A', 24),
    ('I', 25),
    ('O', 31),
    ('Q', 33),
    ('S', 35),
    ('T', 36),
    ('W', 39),
    ('Y', 41),
    ('ᵊ', 42),
    ('a', 43),
    ('b', 44),
    ('c', 45),
    ('d', 46),
    ('e', 47),
    ('f', 48),
    ('h', 50),
    ('i', 51),
    ('j', 52),
    ('k', 53),
    ('l', 54),
    ('m', 55),
    ('n', 56),
    ('o', 57),
    ('p', 58),
    ('q', 59),
    ('r', 60),
    ('s', 61),
    ('t', 62),
    ('u', 63),
    ('v', 64),
    ('w', 65),
    ('x', 66),
    ('y', 67),
    ('z', 68),
    ('ɑ', 69),
    ('ɐ', 70),
    ('ɒ', 71),
    ('æ', 72),
    ('β', 75),
    ('ɔ', 76),
    ('ɕ', 77),
    ('ç', 78),
    ('ɖ', 80),
    ('ð', 81),
    ('ʤ', 82),
    ('ə', 83),
    ('ɚ', 85),
    ('ɛ', 86),
    ('ɜ', 87),
    ('ɟ', 90),
    ('ɡ', 92),
    ('ɥ', 99),
    ('ɨ', 101),
    ('ɪ', 102),
    ('ʝ', 103),
    ('ɯ', 110),
    ('ɰ', 111),
    ('ŋ', 112),
    ('ɳ', 113),
    ('ɲ', 114),
    ('ɴ', 115),
    ('ø', 116),
    ('ɸ', 118),
    ('θ', 119),
    ('œ', 120),
    ('ɹ', 123),
    ('ɾ', 125),
    ('ɻ', 126),
    ('ʁ', 128),
    ('ɽ', 129),
    ('ʂ', 130),
    ('ʃ', 131),
    ('ʈ', 132),
    ('ʧ', 133),
    ('ʊ', 135),
    ('ʋ', 136),
    ('ʌ', 138),
    ('ɣ', 139),
    ('ɤ', 140),
    ('χ', 142),
    ('ʎ', 143),
    ('ʒ', 147),
    ('ʔ', 148),
    ('ˈ', 156),
    ('ˌ', 157),
    ('ː', 158),
    ('ʰ', 162),
    ('ʲ', 164),
    ('↓', 169),
    ('→', 171),
    ('↗', 172),
    ('↘', 173),
    ('ᵻ', 177),
];

#[cfg(test)]
mod tests {
    use super::Vocab;

    #[test]
    fn encodes_known_characters_only() {
        let vocab = Vocab::builtin();
        assert_eq!(vocab.encode("hə.x"), vec![50, 83, 4, 66]);
        assert_eq!(vocab.encode("#"), Vec::<i64>::new());
    }

    #[test]
    fn parses_config_json() {
        let vocab = Vocab::from_config_json(r#"{"vocab": {"a": 43, ";": 1}}"#).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.encode(";a"), vec![1, 43]);
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(Vocab::from_config_json("{}").is_err());
        assert!(Vocab::from_config_json(r#"{"vocab": []}"#).is_err());
        assert!(Vocab::from_config_json(r#"{"vocab": {}}"#).is_err());
        assert!(Vocab::from_config_json(r#"{"vocab": {"a": "x"}}"#).is_err());
        assert!(Vocab::from_config_json(r#"{"vocab": {"": 1}}"#).is_err());
    }
}
