//! # kokoro-web
//!
//! A minimal web service exposing Kokoro text-to-speech synthesis.
//!
//! ## Features
//!
//! - **Voice Catalog**: the fixed Kokoro voice list grouped by language
//! - **Synthesis Service**: one lazily loaded engine per language, reused across requests
//! - **Audio Store**: uniquely named WAV files with an optional retention policy
//! - **HTTP**: `GET /`, `POST /generate`, `GET /audio/<name>`
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-web = { version = "2026.2", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use kokoro_web::{
//!     engines::kokoro::KokoroFactory,
//!     store::{AudioStore, RetentionPolicy},
//!     SynthesisService,
//! };
//!
//! let factory = KokoroFactory::new("models/kokoro");
//! let store = AudioStore::open("output", RetentionPolicy::default())?;
//! let service = SynthesisService::new(Arc::new(factory), store);
//!
//! let outcome = service.synthesize("Hello, world!", "af_heart")?;
//! println!("{} ({} segments)", outcome.path.display(), outcome.segments);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod config;
pub mod engines;
pub mod error;
pub mod server;
pub mod service;
pub mod store;

pub use catalog::{Gender, LanguageTag, Voice, VoiceCatalog};
pub use error::ServiceError;
pub use service::{SynthesisOutcome, SynthesisService};

use std::path::Path;

/// Boxed error returned across the engine seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A lazy, finite, non-restartable sequence of synthesis segments.
pub type SegmentStream<'a> = Box<dyn Iterator<Item = Result<Segment, BoxError>> + Send + 'a>;

/// One unit of output produced while synthesizing a (possibly multi-part) text.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Position of this segment in its sequence, starting at 0
    pub index: usize,
    /// Phonemes the segment was synthesized from
    pub phonemes: String,
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Kokoro)
    pub sample_rate: u32,
}

impl Segment {
    /// Write the audio to a 32-bit float mono WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// An engine is bound to a single language tag, is expensive to construct and
/// cheap to reuse. Implementations must be shareable across request threads.
pub trait SynthesisEngine: Send + Sync {
    /// The language tag this engine was constructed for.
    fn language(&self) -> LanguageTag;

    /// Start synthesizing `text` with the given voice code.
    ///
    /// Setup failures (unknown voice, phonemizer errors) are returned
    /// directly; failures while producing a segment are yielded by the stream.
    fn synthesize<'a>(&'a self, text: &str, voice: &str) -> Result<SegmentStream<'a>, BoxError>;
}

/// Constructs engines for the synthesis service's cache.
pub trait EngineFactory: Send + Sync {
    /// Build the engine for a language tag. Called at most once per tag
    /// unless construction fails.
    fn create(&self, language: LanguageTag) -> Result<Box<dyn SynthesisEngine>, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::Segment;

    #[test]
    fn writes_mono_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let segment = Segment {
            index: 0,
            phonemes: "həlˈoʊ".to_string(),
            samples: vec![0.0, 0.25, -0.25, 0.5],
            sample_rate: 24000,
        };
        segment.write_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn duration_uses_sample_rate() {
        let segment = Segment {
            index: 0,
            phonemes: String::new(),
            samples: vec![0.0; 12000],
            sample_rate: 24000,
        };
        assert!((segment.duration_secs() - 0.5).abs() < f64::EPSILON);
    }
}
