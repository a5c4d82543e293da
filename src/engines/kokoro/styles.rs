use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

pub type StyleVector = [f32; STYLE_DIM];

/// Style vectors for every voice in a Kokoro voice archive.
///
/// A voice holds one vector per phoneme token count; synthesis picks the
/// vector matching the length of its input for consistent prosody.
pub struct VoiceStyles {
    voices: HashMap<String, Vec<StyleVector>>,
}

impl VoiceStyles {
    /// Load all voices from a `.npz` archive (e.g. `voices-v1.0.bin`).
    ///
    /// Each entry is a `.npy` file named after its voice, e.g. `af_heart.npy`.
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| KokoroError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut voices = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| {
                KokoroError::VoiceParse(format!("Failed to read zip entry {i}: {e}"))
            })?;
            if entry.is_dir() {
                continue;
            }

            let raw_name = entry.name().to_string();
            let voice = raw_name.trim_end_matches(".npy");
            if voice.is_empty() {
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| KokoroError::VoiceParse(format!("Failed to read {raw_name}: {e}")))?;

            voices.insert(voice.to_string(), parse_npy(&data, &raw_name)?);
        }

        log::info!("Loaded {} voices from {}", voices.len(), path.display());
        Ok(Self { voices })
    }

    /// Style vector for `voice` at `idx`, clamped to the voice's last vector.
    pub fn get(&self, voice: &str, idx: usize) -> Result<StyleVector, KokoroError> {
        let styles = self
            .voices
            .get(voice)
            .filter(|styles| !styles.is_empty())
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;

        Ok(styles[idx.min(styles.len() - 1)])
    }

    /// The `codes` this archive has no style vectors for, in input order.
    pub fn missing<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        codes
            .into_iter()
            .filter(|code| !self.voices.contains_key(*code))
            .collect()
    }
}

/// Parse a `.npy` payload holding a little-endian float32 array of shape `[N, 256]`
/// (a leading singleton axis, as in `[N, 1, 256]`, is accepted too).
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<StyleVector>, KokoroError> {
    const MAGIC: &[u8] = b"\x93NUMPY";

    if data.len() < 10 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: file too short ({} bytes)",
            data.len()
        )));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: invalid numpy magic bytes"
        )));
    }

    // [6] major, [7] minor, [8..10] little-endian header length (format 1.0)
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let payload = data.get(10 + header_len..).ok_or_else(|| {
        KokoroError::VoiceParse(format!(
            "{name}: header truncated (need {} bytes, got {})",
            10 + header_len,
            data.len()
        ))
    })?;

    let row_bytes = STYLE_DIM * 4;
    if payload.len() % row_bytes != 0 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: {} payload bytes do not form whole {STYLE_DIM}-float style vectors",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (value, bytes) in style.iter_mut().zip(row.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            style
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npy(rows: usize) -> Vec<u8> {
        let header = b"{'descr': '<f4', 'fortran_order': False, 'shape': (1, 256), }\n";
        let mut data = b"\x93NUMPY\x01\x00".to_vec();
        data.extend_from_slice(&(header.len() as u16).to_le_bytes());
        data.extend_from_slice(header);
        for row in 0..rows {
            for _ in 0..STYLE_DIM {
                data.extend_from_slice(&(row as f32).to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn parses_style_rows() {
        let styles = parse_npy(&npy(3), "af_test.npy").unwrap();
        assert_eq!(styles.len(), 3);
        assert_eq!(styles[2][0], 2.0);
        assert_eq!(styles[2][STYLE_DIM - 1], 2.0);
    }

    #[test]
    fn rejects_bad_magic_and_partial_rows() {
        let mut data = npy(1);
        data[0] = 0;
        assert!(parse_npy(&data, "bad.npy").is_err());

        let mut data = npy(1);
        data.pop();
        assert!(parse_npy(&data, "short.npy").is_err());
        assert!(parse_npy(b"\x93NUMPY", "tiny.npy").is_err());
    }

    #[test]
    fn clamps_style_index() {
        let styles = VoiceStyles {
            voices: HashMap::from([("af_test".to_string(), parse_npy(&npy(2), "t").unwrap())]),
        };
        assert_eq!(styles.get("af_test", 99).unwrap()[0], 1.0);
        assert!(matches!(
            styles.get("bf_none", 0),
            Err(KokoroError::VoiceNotFound(_))
        ));
    }

    #[test]
    fn reports_voices_absent_from_archive() {
        let styles = VoiceStyles {
            voices: HashMap::from([("af_heart".to_string(), parse_npy(&npy(1), "t").unwrap())]),
        };
        assert_eq!(
            styles.missing(["af_bella", "af_heart", "am_adam"]),
            vec!["af_bella", "am_adam"]
        );
        assert!(styles.missing(["af_heart"]).is_empty());
    }
}
