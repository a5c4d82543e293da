use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::catalog::LanguageTag;
use crate::error::ServiceError;
use crate::store::AudioStore;
use crate::{EngineFactory, SynthesisEngine};

type EngineSlot = Arc<OnceCell<Arc<dyn SynthesisEngine>>>;

/// Result of a completed synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    /// Committed audio file holding the last segment.
    pub path: PathBuf,
    /// Number of segments the engine produced.
    pub segments: usize,
}

/// Façade over per-language synthesis engines.
///
/// Engines are created on the first request for their language tag and kept
/// for the lifetime of the service. Construction is serialized per tag, so
/// concurrent first requests build a single engine; requests for other tags
/// are not blocked by it.
pub struct SynthesisService {
    factory: Arc<dyn EngineFactory>,
    engines: Mutex<HashMap<LanguageTag, EngineSlot>>,
    store: AudioStore,
}

impl SynthesisService {
    pub fn new(factory: Arc<dyn EngineFactory>, store: AudioStore) -> Self {
        Self {
            factory,
            engines: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    /// Synthesize `text` with `voice` and persist the final segment.
    ///
    /// Every segment is written to the same file in turn; only the last one
    /// survives. Audio from earlier segments is not concatenated.
    pub fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisOutcome, ServiceError> {
        if text.is_empty() {
            return Err(ServiceError::InvalidInput("Text is required".to_string()));
        }
        let language = LanguageTag::from_voice(voice)
            .ok_or_else(|| ServiceError::InvalidInput("Voice is required".to_string()))?;

        let engine = self.engine(language)?;
        let segments = engine.synthesize(text, voice).map_err(ServiceError::Engine)?;

        let mut pending = self.store.allocate();
        let mut count = 0;
        for segment in segments {
            let segment = segment.map_err(ServiceError::Engine)?;
            log::debug!(
                "Segment {} for voice '{voice}': {:.2}s, phonemes {:?}",
                segment.index,
                segment.duration_secs(),
                segment.phonemes
            );
            pending
                .write_segment(&segment)
                .map_err(ServiceError::engine)?;
            count += 1;
        }

        if count == 0 {
            return Err(ServiceError::engine("engine produced no audio segments"));
        }

        let path = pending.commit().map_err(ServiceError::engine)?;
        log::info!(
            "Synthesized {} segment(s) with voice '{voice}' into {}",
            count,
            path.display()
        );

        if self.store.retention().max_files.is_some() {
            if let Err(e) = self.store.sweep() {
                log::warn!("Retention sweep failed: {e}");
            }
        }

        Ok(SynthesisOutcome {
            path,
            segments: count,
        })
    }

    /// Read a previously synthesized file by name.
    ///
    /// Only the base name of `requested` is looked up in the output directory.
    pub fn fetch_audio(&self, requested: &str) -> Result<Vec<u8>, ServiceError> {
        self.store.read(requested)
    }

    /// Number of engines currently held.
    pub fn engine_count(&self) -> usize {
        self.lock_engines()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn has_engine(&self, language: LanguageTag) -> bool {
        self.lock_engines()
            .get(&language)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Get or create the engine for a language tag.
    ///
    /// A failed construction leaves the slot empty and is retried by the
    /// next request.
    fn engine(&self, language: LanguageTag) -> Result<Arc<dyn SynthesisEngine>, ServiceError> {
        let slot = Arc::clone(self.lock_engines().entry(language).or_default());

        slot.get_or_try_init(|| {
            log::info!("Creating synthesis engine for language '{language}'");
            self.factory.create(language).map(Arc::from)
        })
        .cloned()
        .map_err(|e| {
            log::warn!("Engine construction for language '{language}' failed: {e}");
            ServiceError::Engine(e)
        })
    }

    fn lock_engines(&self) -> std::sync::MutexGuard<'_, HashMap<LanguageTag, EngineSlot>> {
        // The map is only ever inserted into, so a poisoned guard is still consistent.
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;
    use crate::store::RetentionPolicy;
    use crate::{BoxError, Segment, SegmentStream};

    struct FakeEngine {
        language: LanguageTag,
        segments: usize,
    }

    impl SynthesisEngine for FakeEngine {
        fn language(&self) -> LanguageTag {
            self.language
        }

        fn synthesize<'a>(
            &'a self,
            text: &str,
            voice: &str,
        ) -> Result<SegmentStream<'a>, BoxError> {
            if voice.ends_with("_missing") {
                return Err(format!("Voice '{voice}' not found").into());
            }
            let phonemes = text.to_string();
            Ok(Box::new((0..self.segments).map(move |index| {
                Ok::<_, BoxError>(Segment {
                    index,
                    phonemes: phonemes.clone(),
                    samples: vec![0.5; 10 * (index + 1)],
                    sample_rate: 24000,
                })
            })))
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        fail_first: bool,
        segments: usize,
        delay: Duration,
    }

    impl EngineFactory for CountingFactory {
        fn create(&self, language: LanguageTag) -> Result<Box<dyn SynthesisEngine>, BoxError> {
            std::thread::sleep(self.delay);
            let attempt = self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && attempt == 0 {
                return Err("model failed to load".into());
            }
            Ok(Box::new(FakeEngine {
                language,
                segments: self.segments,
            }))
        }
    }

    fn service(factory: Arc<CountingFactory>) -> (SynthesisService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::open(dir.path(), RetentionPolicy::default()).unwrap();
        (SynthesisService::new(factory, store), dir)
    }

    fn factory(segments: usize) -> Arc<CountingFactory> {
        Arc::new(CountingFactory {
            segments,
            ..Default::default()
        })
    }

    #[test]
    fn empty_text_is_invalid_input() {
        let factory = factory(1);
        let (service, _dir) = service(factory.clone());
        for voice in ["af_heart", "zz", ""] {
            assert!(matches!(
                service.synthesize("", voice),
                Err(ServiceError::InvalidInput(_))
            ));
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_voice_is_invalid_input() {
        let (service, _dir) = service(factory(1));
        assert!(matches!(
            service.synthesize("Hello", ""),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn reuses_engine_per_language() {
        let factory = factory(1);
        let (service, _dir) = service(factory.clone());

        service.synthesize("One.", "af_heart").unwrap();
        service.synthesize("Two.", "am_adam").unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        service.synthesize("Trois.", "ff_siwis").unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(service.engine_count(), 2);
        assert!(service.has_engine(LanguageTag::new('a')));
        assert!(service.has_engine(LanguageTag::new('f')));
        assert!(!service.has_engine(LanguageTag::new('b')));
    }

    #[test]
    fn failed_construction_is_retried() {
        let factory = Arc::new(CountingFactory {
            fail_first: true,
            segments: 1,
            ..Default::default()
        });
        let (service, _dir) = service(factory.clone());

        assert!(matches!(
            service.synthesize("Hello.", "af_heart"),
            Err(ServiceError::Engine(_))
        ));
        assert!(!service.has_engine(LanguageTag::new('a')));

        service.synthesize("Hello.", "af_heart").unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(service.engine_count(), 1);
    }

    #[test]
    fn persists_only_the_last_segment() {
        let (service, _dir) = service(factory(3));
        let outcome = service.synthesize("Long text.", "af_heart").unwrap();
        assert_eq!(outcome.segments, 3);

        let reader = hound::WavReader::open(&outcome.path).unwrap();
        assert_eq!(reader.len(), 30);
    }

    #[test]
    fn engine_errors_are_wrapped() {
        let (service, dir) = service(factory(1));
        let err = service.synthesize("Hello.", "af_missing").unwrap_err();
        assert!(matches!(err, ServiceError::Engine(_)));
        assert!(err.chain().contains("af_missing"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn zero_segments_is_an_engine_error() {
        let (service, dir) = service(factory(0));
        assert!(matches!(
            service.synthesize("Hello.", "af_heart"),
            Err(ServiceError::Engine(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn synthesized_audio_can_be_fetched_by_base_name() {
        let (service, _dir) = service(factory(1));
        let outcome = service.synthesize("Hello world.", "af_heart").unwrap();
        assert!(outcome.path.to_string_lossy().ends_with(".wav"));
        assert!(outcome.segments > 0);

        let name = outcome.path.file_name().unwrap().to_str().unwrap();
        assert!(!service.fetch_audio(name).unwrap().is_empty());
        let nested = format!("some/dir/{name}");
        assert!(!service.fetch_audio(&nested).unwrap().is_empty());
    }

    #[test]
    fn fetching_unknown_audio_is_not_found() {
        let (service, _dir) = service(factory(1));
        assert!(matches!(
            service.fetch_audio("never-written.wav"),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn concurrent_first_requests_build_one_engine() {
        let factory = Arc::new(CountingFactory {
            segments: 1,
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let (service, _dir) = service(factory.clone());
        let service = Arc::new(service);
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    service.synthesize(&format!("Request {i}."), "bf_emma")
                })
            })
            .collect();

        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.join().unwrap().unwrap().path);
        }
        paths.sort();
        paths.dedup();

        assert_eq!(paths.len(), 4);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(service.engine_count(), 1);
    }

    #[test]
    fn max_files_is_enforced_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::open(
            dir.path(),
            RetentionPolicy {
                max_age: None,
                max_files: Some(1),
            },
        )
        .unwrap();
        let service = SynthesisService::new(factory(1), store);

        service.synthesize("One.", "af_heart").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let second = service.synthesize("Two.", "af_heart").unwrap();

        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(remaining, vec![second.path]);
    }
}
