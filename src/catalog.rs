//! Static registry of Kokoro voices grouped by language.
//!
//! Voice codes follow the pattern `{language_tag}{gender}_{name}`, e.g.
//! `af_heart` is American English, female, "heart". The first character of
//! the code selects both the catalog bucket and the synthesis engine.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Voice used when a request does not name one.
pub const DEFAULT_VOICE: &str = "af_heart";

/// Bucket for voices whose tag has no registered language.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Language names and the single-character tags they are registered under.
pub const KOKORO_LANGUAGE_CODES: &[(&str, char)] = &[
    ("English (US)", 'a'),
    ("English (UK)", 'b'),
    ("Spanish", 'e'),
    ("French", 'f'),
    ("Italian", 'i'),
    ("Portuguese (Brazil)", 'p'),
];

/// Every voice offered by the service, as (display name, code, gender).
pub const KOKORO_VOICE_CHOICES: &[(&str, &str, Gender)] = &[
    // US English (a)
    ("KOKORO US Fenrir", "am_fenrir", Gender::Male),
    ("KOKORO US Nicole", "af_nicole", Gender::Female),
    ("KOKORO US Jessica", "af_jessica", Gender::Female),
    ("KOKORO US River", "af_river", Gender::Female),
    ("KOKORO US Eric", "am_eric", Gender::Male),
    ("KOKORO US Adam", "am_adam", Gender::Male),
    ("KOKORO US Alloy", "af_alloy", Gender::Female),
    ("KOKORO US Heart", "af_heart", Gender::Female),
    ("KOKORO US Onyx", "am_onyx", Gender::Male),
    ("KOKORO US Bella", "af_bella", Gender::Female),
    ("KOKORO US Aoede", "af_aoede", Gender::Female),
    ("KOKORO US Santa", "am_santa", Gender::Male),
    ("KOKORO US Sky", "af_sky", Gender::Female),
    ("KOKORO US Puck", "am_puck", Gender::Male),
    ("KOKORO US Nova", "af_nova", Gender::Female),
    ("KOKORO US Liam", "am_liam", Gender::Male),
    ("KOKORO US Sarah", "af_sarah", Gender::Female),
    ("KOKORO US Kore", "af_kore", Gender::Female),
    ("KOKORO US Echo", "am_echo", Gender::Male),
    ("KOKORO US Michael", "am_michael", Gender::Male),
    // UK English (b)
    ("KOKORO GB Alice", "bf_alice", Gender::Female),
    ("KOKORO GB George", "bm_george", Gender::Male),
    ("KOKORO GB Fable", "bm_fable", Gender::Male),
    ("KOKORO GB Lily", "bf_lily", Gender::Female),
    ("KOKORO GB Emma", "bf_emma", Gender::Female),
    ("KOKORO GB Isabella", "bf_isabella", Gender::Female),
    ("KOKORO GB Lewis", "bm_lewis", Gender::Male),
    ("KOKORO GB Daniel", "bm_daniel", Gender::Male),
    // Portuguese (p)
    ("KOKORO PT Dora", "pf_dora", Gender::Female),
    ("KOKORO PT Alex", "pm_alex", Gender::Male),
    ("KOKORO PT Santa", "pm_santa", Gender::Male),
    // Italian (i)
    ("KOKORO IT Nicola", "im_nicola", Gender::Male),
    ("KOKORO IT Sara", "if_sara", Gender::Female),
    // French (f)
    ("KOKORO FR Siwis", "ff_siwis", Gender::Female),
    // Spanish (e)
    ("KOKORO ES Dora", "ef_dora", Gender::Female),
    ("KOKORO ES Alex", "em_alex", Gender::Male),
    ("KOKORO ES Santa", "em_santa", Gender::Male),
];

/// Single-character discriminator selecting which engine handles a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageTag(char);

impl LanguageTag {
    pub const fn new(tag: char) -> Self {
        Self(tag)
    }

    /// Tag embedded in a voice code's first character. `None` for an empty code.
    pub fn from_voice(code: &str) -> Option<Self> {
        code.chars().next().map(Self)
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

/// A named synthesis persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    #[serde(rename = "name")]
    pub display_name: String,
    pub code: String,
    pub gender: Gender,
}

impl Voice {
    pub fn language(&self) -> Option<LanguageTag> {
        LanguageTag::from_voice(&self.code)
    }
}

/// Mapping from language name to its voices, in first-seen order.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    languages: Vec<LanguageEntry>,
}

#[derive(Debug, Clone)]
struct LanguageEntry {
    name: String,
    tag: Option<LanguageTag>,
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    /// Partition `voices` by the tag in each code's first character.
    ///
    /// A voice whose tag is not registered in `languages` is filed under
    /// [`UNKNOWN_LANGUAGE`], which hides it from every real language group.
    pub fn build(languages: &[(&str, char)], voices: &[(&str, &str, Gender)]) -> Self {
        let mut catalog = Self::default();

        for &(name, code, gender) in voices {
            let tag = LanguageTag::from_voice(code);
            let registered = tag.and_then(|tag| {
                languages
                    .iter()
                    .find(|(_, t)| *t == tag.as_char())
                    .map(|(lang, _)| (*lang, tag))
            });

            let (lang_name, lang_tag) = match registered {
                Some((lang, tag)) => (lang, Some(tag)),
                None => {
                    log::warn!(
                        "Voice '{code}' has unregistered language tag, filing under '{UNKNOWN_LANGUAGE}'"
                    );
                    (UNKNOWN_LANGUAGE, None)
                }
            };

            let voice = Voice {
                display_name: name.to_string(),
                code: code.to_string(),
                gender,
            };

            match catalog.languages.iter_mut().find(|e| e.name == lang_name) {
                Some(entry) => entry.voices.push(voice),
                None => catalog.languages.push(LanguageEntry {
                    name: lang_name.to_string(),
                    tag: lang_tag,
                    voices: vec![voice],
                }),
            }
        }

        catalog
    }

    /// The catalog of voices served by the Kokoro web endpoint.
    pub fn kokoro() -> Self {
        Self::build(KOKORO_LANGUAGE_CODES, KOKORO_VOICE_CHOICES)
    }

    /// Language names in first-seen order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|e| e.name.as_str())
    }

    pub fn voices(&self, language: &str) -> Option<&[Voice]> {
        self.entry(language).map(|e| e.voices.as_slice())
    }

    /// Registered tag of a language; `None` for unknown languages and the
    /// "Unknown" bucket.
    pub fn tag_of(&self, language: &str) -> Option<LanguageTag> {
        self.entry(language).and_then(|e| e.tag)
    }

    pub fn find(&self, code: &str) -> Option<&Voice> {
        self.languages
            .iter()
            .flat_map(|e| e.voices.iter())
            .find(|v| v.code == code)
    }

    /// Iterate `(language, voices)` groups in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Voice])> {
        self.languages
            .iter()
            .map(|e| (e.name.as_str(), e.voices.as_slice()))
    }

    /// Total number of voices.
    pub fn len(&self) -> usize {
        self.languages.iter().map(|e| e.voices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    fn entry(&self, language: &str) -> Option<&LanguageEntry> {
        self.languages.iter().find(|e| e.name == language)
    }
}

impl Serialize for VoiceCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.languages.len()))?;
        for entry in &self.languages {
            map.serialize_entry(&entry.name, &entry.voices)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_voice_matches_its_language_tag() {
        let catalog = VoiceCatalog::kokoro();
        for (language, voices) in catalog.iter() {
            let tag = catalog
                .tag_of(language)
                .unwrap_or_else(|| panic!("{language} should have a registered tag"));
            for voice in voices {
                assert_eq!(voice.language(), Some(tag), "{} in {language}", voice.code);
            }
        }
    }

    #[test]
    fn kokoro_catalog_has_all_voices_and_no_unknown_bucket() {
        let catalog = VoiceCatalog::kokoro();
        assert_eq!(catalog.len(), KOKORO_VOICE_CHOICES.len());
        assert!(catalog.voices(UNKNOWN_LANGUAGE).is_none());
        assert_eq!(
            catalog.languages().collect::<Vec<_>>(),
            vec![
                "English (US)",
                "English (UK)",
                "Portuguese (Brazil)",
                "Italian",
                "French",
                "Spanish"
            ]
        );
        assert_eq!(catalog.voices("English (US)").map(<[Voice]>::len), Some(20));
        assert_eq!(catalog.voices("French").map(<[Voice]>::len), Some(1));
    }

    #[test]
    fn preserves_voice_order_within_language() {
        let catalog = VoiceCatalog::kokoro();
        let codes: Vec<&str> = catalog
            .voices("Italian")
            .unwrap()
            .iter()
            .map(|v| v.code.as_str())
            .collect();
        assert_eq!(codes, vec!["im_nicola", "if_sara"]);
    }

    #[test]
    fn unmapped_tag_goes_to_unknown_bucket() {
        let catalog = VoiceCatalog::build(
            &[("English (US)", 'a')],
            &[
                ("US Heart", "af_heart", Gender::Female),
                ("JP Alpha", "jf_alpha", Gender::Female),
                ("", "", Gender::Male),
            ],
        );
        let unknown = catalog.voices(UNKNOWN_LANGUAGE).unwrap();
        assert_eq!(unknown.len(), 2);
        assert_eq!(unknown[0].code, "jf_alpha");
        assert_eq!(catalog.tag_of(UNKNOWN_LANGUAGE), None);
        assert_eq!(catalog.voices("English (US)").unwrap().len(), 1);
    }

    #[test]
    fn find_looks_up_by_code() {
        let catalog = VoiceCatalog::kokoro();
        let voice = catalog.find("bm_george").unwrap();
        assert_eq!(voice.display_name, "KOKORO GB George");
        assert_eq!(voice.gender, Gender::Male);
        assert!(catalog.find("zz_nobody").is_none());
    }

    #[test]
    fn serializes_as_language_map() {
        let catalog = VoiceCatalog::build(
            &[("French", 'f')],
            &[("KOKORO FR Siwis", "ff_siwis", Gender::Female)],
        );
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "French": [{"name": "KOKORO FR Siwis", "code": "ff_siwis", "gender": "f"}]
            })
        );
    }

    #[test]
    fn language_tag_from_voice() {
        assert_eq!(LanguageTag::from_voice("af_heart"), Some(LanguageTag::new('a')));
        assert_eq!(LanguageTag::from_voice(""), None);
    }
}
