use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub stt: SttConfig,
    pub grading: GradingConfig,
    pub ledger: LedgerConfig,
    pub progress: ProgressConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Directory the upload targets live in; empty means unconfigured
    pub uploads_path: String,
}

#[derive(Debug, Deserialize)]
pub struct SttConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct GradingConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Corrective notes are written in this language
    pub native_language: String,
    /// Rephrasings are written in this language
    pub target_language: String,
}

#[derive(Debug, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
    /// Static pro-entitlement flag; a real deployment wires this to the
    /// entitlement provider instead
    pub unlimited: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProgressConfig {
    pub path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
