//! Kokoro-82M text-to-speech engine implementation.
//!
//! Each [`KokoroPipeline`] serves one language tag and is built on demand by
//! [`KokoroFactory`]. Text is phonemized with espeak-ng and run through the
//! Kokoro-82M ONNX model one chunk at a time.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # 8-bit quantized model (88MB, CPU-optimized)
//! ├── voices-v1.0.bin                  # Voice data archive (.npz format)
//! └── config.json                      # Optional vocabulary
//! ```
//!
//! # Language Support
//!
//! | Tag | Language | espeak-ng code |
//! |---|---|---|
//! | `a` | American English | `en-us` |
//! | `b` | British English | `en-gb` |
//! | `e` | Spanish | `es` |
//! | `f` | French | `fr` |
//! | `h` | Hindi | `hi` |
//! | `i` | Italian | `it` |
//! | `j` | Japanese | `ja` |
//! | `p` | Brazilian Portuguese | `pt-br` |
//! | `z` | Mandarin Chinese | `cmn` |
//!
//! # Example
//!
//! ```rust,no_run
//! use kokoro_web::{engines::kokoro::KokoroFactory, EngineFactory, LanguageTag};
//!
//! let factory = KokoroFactory::new("models/kokoro");
//! let engine = factory.create(LanguageTag::new('b'))?;
//! for segment in engine.synthesize("Hello from British Emma!", "bf_emma")? {
//!     let segment = segment?;
//!     println!("segment {}: {:.2}s", segment.index, segment.duration_secs());
//! }
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod styles;
pub mod vocab;

pub use engine::{KokoroFactory, KokoroModelParams, KokoroPipeline};
pub use model::KokoroError;
pub use phonemizer::EspeakConfig;
