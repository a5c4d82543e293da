use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::model::KokoroError;
use super::vocab::Vocab;
use crate::catalog::LanguageTag;

/// Location of the espeak-ng binary and its data directory.
///
/// `None` fields fall back to `espeak-ng` from PATH and its built-in data path.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self) -> Command {
        let mut command = match &self.bin_path {
            Some(bin) => Command::new(bin),
            None => Command::new("espeak-ng"),
        };
        if let Some(data) = &self.data_path {
            command.env("ESPEAK_DATA_PATH", data);
        }
        command
    }
}

/// Map a language tag to an espeak-ng language code.
pub fn espeak_language(tag: LanguageTag) -> Option<&'static str> {
    match tag.as_char() {
        'a' => Some("en-us"),
        'b' => Some("en-gb"),
        'e' => Some("es"),
        'f' => Some("fr"),
        'h' => Some("hi"),
        'i' => Some("it"),
        'j' => Some("ja"),
        'p' => Some("pt-br"),
        'z' => Some("cmn"),
        _ => None,
    }
}

/// Convert text to a Kokoro phoneme string via espeak-ng.
///
/// The result only contains characters known to `vocab`; everything else
/// espeak emits is dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<String, KokoroError> {
    let parts = split_text_parts(text);
    if parts.is_empty() {
        return Ok(String::new());
    }

    let text_segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let segment_phonemes = if text_segments.is_empty() {
        Vec::new()
    } else {
        phonemize_segments_batch(&text_segments, lang, vocab, espeak)?
    };

    let mut phonemes = String::new();
    let mut segment_index = 0usize;
    for part in parts {
        match part {
            TextPart::Text(_) => {
                if let Some(chunk) = segment_phonemes.get(segment_index) {
                    phonemes.push_str(chunk);
                }
                segment_index += 1;
            }
            TextPart::Punct(ch) => {
                if vocab.contains(ch) {
                    phonemes.push(ch);
                }
            }
        }
    }

    Ok(phonemes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        if let Some(punct) = boundary_punctuation(ch) {
            if !joins_digits(text, idx, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        _ => None,
    }
}

/// True for `.` or `,` sitting between two digits, as in `2.0` or `1,000`.
fn joins_digits(text: &str, idx: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn phonemize_segments_batch(
    segments: &[&str],
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<String>, KokoroError> {
    let output = run_espeak(&segments.join("\n"), lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();

    // One output line per input line is expected; otherwise go segment by segment.
    if lines.len() != segments.len() {
        log::debug!(
            "espeak-ng returned {} lines for {} segments, retrying individually",
            lines.len(),
            segments.len()
        );
        return segments
            .iter()
            .map(|segment| Ok(ipa_to_phonemes(&run_espeak(segment, lang, espeak)?, vocab)))
            .collect();
    }

    Ok(lines.iter().map(|line| ipa_to_phonemes(line, vocab)).collect())
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let mut child = espeak
        .command()
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KokoroError::EspeakNotFound
            } else {
                KokoroError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng under-processes the final token of an unterminated line.
        stdin.write_all(newline_terminated(input).as_bytes())?;
    }

    let output = child.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KokoroError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn newline_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

fn ipa_to_phonemes(ipa: &str, vocab: &Vocab) -> String {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(str::chars)
        .filter(|&ch| ch != '_' && vocab.contains(ch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn splits_text_and_punctuation_parts() {
        let parts = split_text_parts("Hello, world. Testing!");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("Hello".to_string()),
                TextPart::Punct(','),
                TextPart::Text("world".to_string()),
                TextPart::Punct('.'),
                TextPart::Text("Testing".to_string()),
                TextPart::Punct('!'),
            ]
        );
    }

    #[test]
    fn keeps_decimal_and_thousands_separators_inside_text() {
        let parts = split_text_parts("Version 2.0 reached 1,000 users.");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("Version 2.0 reached 1,000 users".to_string()),
                TextPart::Punct('.'),
            ]
        );
    }

    #[test]
    fn carriage_returns_are_whitespace() {
        let parts = split_text_parts("First\r line\r");
        assert_eq!(parts, vec![TextPart::Text("First line".to_string())]);
    }

    #[test]
    fn appends_trailing_newline_for_espeak_stdin() {
        assert_eq!(newline_terminated("America"), "America\n");
        assert_eq!(newline_terminated("America\n"), "America\n");
    }

    #[test]
    fn maps_catalog_tags_to_espeak_languages() {
        assert_eq!(espeak_language(LanguageTag::new('a')), Some("en-us"));
        assert_eq!(espeak_language(LanguageTag::new('p')), Some("pt-br"));
        assert_eq!(espeak_language(LanguageTag::new('x')), None);
    }

    #[test]
    fn ipa_filtering_drops_unknown_characters() {
        let vocab = Vocab::builtin();
        assert_eq!(ipa_to_phonemes("hə_lˈoʊ 😀\n", &vocab), "həlˈoʊ ");
    }

    #[test]
    fn missing_binary_is_reported() {
        let espeak = EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            data_path: None,
        };
        assert!(matches!(
            run_espeak("hello", "en-us", &espeak),
            Err(KokoroError::EspeakNotFound)
        ));
    }

    #[test]
    fn phonemize_keeps_terminal_schwa_for_america() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_available() {
            return;
        }

        let vocab = Vocab::builtin();
        let phonemes = phonemize("America", "en-us", &vocab, &EspeakConfig::default())
            .expect("phonemize should succeed");
        assert_eq!(phonemes.chars().last(), Some('ə'));
    }
}
