use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::styles::{StyleVector, VoiceStyles};
use super::vocab::Vocab;

/// Maximum number of phoneme tokens per chunk (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

/// Output sample rate from the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Phoneme characters a chunk may end on, in preference to a hard cut.
const CHUNK_BREAKS: &[char] = &[';', ':', ',', '.', '!', '?'];

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found in the voice archive")]
    VoiceNotFound(String),
    #[error("Language '{0}' is not supported by Kokoro")]
    UnsupportedLanguage(char),
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Model produced no output")]
    EmptyOutput,
}

/// Loaded Kokoro ONNX session.
pub struct KokoroModel {
    session: Session,
    /// Detected input name: "input_ids" or "tokens"
    tokens_input_name: String,
    /// True if the speed input expects int32, false for float32
    speed_is_int32: bool,
}

impl KokoroModel {
    /// Load the Kokoro ONNX graph from a directory.
    ///
    /// The directory must contain an `.onnx` file (preferably
    /// `kokoro-quant-convinteger.onnx`).
    pub fn load(
        model_dir: &Path,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let session = init_session(&onnx_path, num_threads, optimized_cache_path)?;
        let tokens_input_name = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_type(&session);
        log::info!(
            "Detected: tokens_input='{}', speed_is_int32={}",
            tokens_input_name,
            speed_is_int32
        );

        Ok(Self {
            session,
            tokens_input_name,
            speed_is_int32,
        })
    }

    /// Run ONNX inference on one chunk of phoneme token IDs.
    pub fn infer(
        &mut self,
        tokens: &[i64],
        style: &StyleVector,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let seq_len = tokens.len() + 2; // +2 for padding tokens

        // [[0, t1..tN, 0]]
        let mut padded = vec![0i64; seq_len];
        padded[1..seq_len - 1].copy_from_slice(tokens);
        let tokens_arr = Array2::from_shape_vec((1, seq_len), padded)?;
        let style_view = ndarray::ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let output = if self.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[speed as i32]);
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        };

        let (_, waveform) = output.iter().next().ok_or(KokoroError::EmptyOutput)?;
        let waveform = waveform.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

/// Load the `voices-v1.0.bin` style archive from `model_dir`.
pub fn load_styles(model_dir: &Path) -> Result<VoiceStyles, KokoroError> {
    let voices_path = model_dir.join("voices-v1.0.bin");
    if !voices_path.exists() {
        return Err(KokoroError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!(
                "Voice file not found at {}. Download it from the Kokoro model repository.",
                voices_path.display()
            ),
        )));
    }
    VoiceStyles::load(&voices_path)
}

/// Load the vocabulary from `model_dir/config.json`, falling back to the
/// built-in table.
pub fn load_vocab(model_dir: &Path) -> Result<Vocab, KokoroError> {
    let config_path = model_dir.join("config.json");
    if !config_path.exists() {
        log::warn!("config.json not found, using built-in vocab");
        return Ok(Vocab::builtin());
    }
    let vocab = Vocab::load(&config_path)?;
    log::info!("Loaded {} vocab entries from config.json", vocab.len());
    Ok(vocab)
}

/// Find the ONNX model file in the given directory.
///
/// Prefers `kokoro-quant-convinteger.onnx`, then the first `.onnx` file found.
fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join("kokoro-quant-convinteger.onnx");
    if preferred.exists() {
        return Ok(preferred);
    }

    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            log::info!("Using ONNX file: {}", path.display());
            return Ok(path);
        }
    }

    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .onnx file found in {}", model_dir.display()),
    )))
}

/// Initialize an ONNX session with optional on-disk graph caching.
///
/// Without a cache path the graph is optimized at Level3 on every load. With
/// one, the first load writes the optimized graph there and later loads read
/// it back with optimization disabled.
fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let (load_path, opt_level, write_cache) = match optimized_cache_path {
        Some(cache) if cache.exists() => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            (cache, GraphOptimizationLevel::Disable, None)
        }
        Some(cache) => {
            log::info!(
                "First load: running Level3 optimization; saving graph to {}",
                cache.display()
            );
            (onnx_path, GraphOptimizationLevel::Level3, Some(cache))
        }
        None => (onnx_path, GraphOptimizationLevel::Level3, None),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(opt_level)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(cache) = write_cache {
        builder = builder.with_optimized_model_path(cache)?;
    }

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Detect the token input name ("input_ids" or "tokens") from session inputs.
fn detect_tokens_input(session: &Session) -> String {
    session
        .inputs()
        .iter()
        .map(|input| input.name())
        .find(|name| *name == "input_ids" || *name == "tokens")
        .unwrap_or("input_ids")
        .to_string()
}

/// Detect whether the speed input expects int32 (true) or float32 (false).
fn detect_speed_type(session: &Session) -> bool {
    session
        .inputs()
        .iter()
        .find(|input| input.name() == "speed")
        .map(|input| {
            let type_str = format!("{:?}", input.dtype());
            type_str.contains("Int32") || type_str.contains("int32")
        })
        // Modern Kokoro models use int32.
        .unwrap_or(true)
}

/// Split a phoneme string into chunks of at most `max_len` characters,
/// ending each chunk on the last punctuation mark that fits.
pub fn split_phonemes(phonemes: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = phonemes.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + max_len).min(chars.len());
        if end == chars.len() {
            chunks.push(chars[start..end].iter().collect());
            break;
        }

        let split = chars[start..end]
            .iter()
            .rposition(|ch| CHUNK_BREAKS.contains(ch))
            .map(|i| start + i + 1)
            .unwrap_or(end);

        chunks.push(chars[start..split].iter().collect());
        start = split;
    }

    chunks
}
