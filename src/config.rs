use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;

use crate::store::RetentionPolicy;

/// Settings for the HTTP server and its output directory.
///
/// ```
/// use kokoro_web::config::ServerConfigBuilder;
///
/// let config = ServerConfigBuilder::default()
///     .port(8080u16)
///     .output_dir("/tmp/kokoro")
///     .build()?;
/// assert_eq!(config.port, 8080);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ServerConfig {
    #[builder(default = "\"127.0.0.1\".to_string()")]
    pub host: String,
    #[builder(default = "5000")]
    pub port: u16,
    /// Directory the synthesized WAV files are written to.
    #[builder(default = "PathBuf::from(\"output\")")]
    pub output_dir: PathBuf,
    /// Directory holding the Kokoro ONNX model and voice archive.
    #[builder(default = "PathBuf::from(\"models/kokoro\")")]
    pub model_dir: PathBuf,
    #[builder(default)]
    pub retention: RetentionPolicy,
    /// How often the retention policy is applied in the background.
    #[builder(default = "Duration::from_secs(60)")]
    pub sweep_interval: Duration,
}

impl ServerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref host) = self.host {
            if host.trim().is_empty() {
                return Err("host must not be empty".to_string());
            }
        }
        if self.sweep_interval == Some(Duration::ZERO) {
            return Err("sweep interval must be positive".to_string());
        }
        if let Some(RetentionPolicy {
            max_files: Some(0), ..
        }) = self.retention
        {
            return Err("max files must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfigBuilder::default()
            .build()
            .unwrap_or_else(|_| unreachable!("defaults are valid"))
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
