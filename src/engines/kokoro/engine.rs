use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::catalog::{LanguageTag, KOKORO_VOICE_CHOICES};
use crate::{BoxError, EngineFactory, Segment, SegmentStream, SynthesisEngine};

use super::model::{
    load_styles, load_vocab, split_phonemes, KokoroError, KokoroModel, MAX_PHONEME_LEN,
    SAMPLE_RATE,
};
use super::phonemizer::{espeak_language, phonemize, EspeakConfig};
use super::styles::VoiceStyles;
use super::vocab::Vocab;

/// Parameters for configuring Kokoro model loading and inference.
#[derive(Debug, Clone)]
pub struct KokoroModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Path for caching the Level3-optimized ONNX graph.
    ///
    /// Must be writable. Each language pipeline loads the same graph, so
    /// only the first load pays for optimization.
    pub optimized_model_cache_path: Option<PathBuf>,
    /// Speech speed multiplier. Range: 0.5–2.0, default 1.0.
    pub speed: f32,
}

impl Default for KokoroModelParams {
    fn default() -> Self {
        Self {
            num_threads: None,
            optimized_model_cache_path: None,
            speed: 1.0,
        }
    }
}

/// Builds one [`KokoroPipeline`] per language tag from a model directory.
#[derive(Debug, Clone)]
pub struct KokoroFactory {
    model_dir: PathBuf,
    params: KokoroModelParams,
    espeak: EspeakConfig,
}

impl KokoroFactory {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            params: KokoroModelParams::default(),
            espeak: EspeakConfig::default(),
        }
    }

    pub fn with_params(mut self, params: KokoroModelParams) -> Self {
        self.params = params;
        self
    }

    /// Use a bundled espeak-ng binary and/or data directory.
    pub fn with_espeak(mut self, espeak: EspeakConfig) -> Self {
        self.espeak = espeak;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

impl EngineFactory for KokoroFactory {
    fn create(&self, language: LanguageTag) -> Result<Box<dyn SynthesisEngine>, BoxError> {
        let pipeline =
            KokoroPipeline::load(&self.model_dir, language, &self.params, self.espeak.clone())?;
        Ok(Box::new(pipeline))
    }
}

/// Kokoro synthesis for a single language.
///
/// Each non-empty line of the input is phonemized with the language's
/// espeak-ng voice, split into chunks of at most [`MAX_PHONEME_LEN`] tokens
/// and synthesized one chunk per segment. Only inference is serialized per
/// pipeline.
pub struct KokoroPipeline {
    language: LanguageTag,
    espeak_lang: &'static str,
    espeak: EspeakConfig,
    speed: f32,
    vocab: Vocab,
    styles: VoiceStyles,
    model: Mutex<KokoroModel>,
}

impl KokoroPipeline {
    pub fn load(
        model_dir: &Path,
        language: LanguageTag,
        params: &KokoroModelParams,
        espeak: EspeakConfig,
    ) -> Result<Self, KokoroError> {
        let espeak_lang = espeak_language(language)
            .ok_or(KokoroError::UnsupportedLanguage(language.as_char()))?;

        let model = KokoroModel::load(
            model_dir,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
        )?;
        let styles = load_styles(model_dir)?;
        let vocab = load_vocab(model_dir)?;

        let missing = styles.missing(catalog_voices(language));
        if !missing.is_empty() {
            log::warn!(
                "Voice archive has no styles for {} '{language}' voice(s): {}",
                missing.len(),
                missing.join(", ")
            );
        }
        log::info!("Kokoro pipeline ready for '{language}' (espeak: {espeak_lang})");

        Ok(Self {
            language,
            espeak_lang,
            espeak,
            speed: params.speed,
            vocab,
            styles,
            model: Mutex::new(model),
        })
    }

    fn lock_model(&self) -> std::sync::MutexGuard<'_, KokoroModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SynthesisEngine for KokoroPipeline {
    fn language(&self) -> LanguageTag {
        self.language
    }

    fn synthesize<'a>(&'a self, text: &str, voice: &str) -> Result<SegmentStream<'a>, BoxError> {
        // Unknown voices fail before espeak-ng is spawned.
        self.styles.get(voice, 0)?;

        let chunks = plan_chunks(text, |line| {
            phonemize(line, self.espeak_lang, &self.vocab, &self.espeak)
        })?;
        if chunks.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
        }

        Ok(Box::new(KokoroSegments {
            pipeline: self,
            voice: voice.to_string(),
            chunks: chunks.into_iter().enumerate(),
        }))
    }
}

/// Catalog voice codes that belong to `language`.
fn catalog_voices(language: LanguageTag) -> impl Iterator<Item = &'static str> {
    KOKORO_VOICE_CHOICES
        .iter()
        .map(|(_, code, _)| *code)
        .filter(move |code| LanguageTag::from_voice(code) == Some(language))
}

/// Phoneme chunks for `text`, in order.
///
/// Runs of newlines separate lines; every non-empty line is phonemized on
/// its own and contributes one or more chunks.
fn plan_chunks<F>(text: &str, mut phonemize: F) -> Result<Vec<String>, KokoroError>
where
    F: FnMut(&str) -> Result<String, KokoroError>,
{
    let mut chunks = Vec::new();
    for line in text.split('\n').map(str::trim).filter(|line| !line.is_empty()) {
        let phonemes = phonemize(line)?;
        let pieces = split_phonemes(&phonemes, MAX_PHONEME_LEN);
        if pieces.len() > 1 {
            log::debug!(
                "Kokoro phoneme sequence exceeded limit ({} > {}), {} chunks",
                phonemes.chars().count(),
                MAX_PHONEME_LEN,
                pieces.len()
            );
        }
        chunks.extend(pieces.into_iter().filter(|piece| !piece.trim().is_empty()));
    }
    Ok(chunks)
}

/// Lazily synthesizes one segment per phoneme chunk.
struct KokoroSegments<'a> {
    pipeline: &'a KokoroPipeline,
    voice: String,
    chunks: std::iter::Enumerate<std::vec::IntoIter<String>>,
}

impl KokoroSegments<'_> {
    fn render(&self, phonemes: &str) -> Result<Vec<f32>, KokoroError> {
        let tokens = self.pipeline.vocab.encode(phonemes);
        let style = self.pipeline.styles.get(&self.voice, tokens.len())?;
        self.pipeline
            .lock_model()
            .infer(&tokens, &style, self.pipeline.speed)
    }
}

impl Iterator for KokoroSegments<'_> {
    type Item = Result<Segment, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, phonemes) = self.chunks.next()?;
        Some(
            self.render(&phonemes)
                .map(|samples| Segment {
                    index,
                    phonemes,
                    samples,
                    sample_rate: SAMPLE_RATE,
                })
                .map_err(BoxError::from),
        )
    }
}
