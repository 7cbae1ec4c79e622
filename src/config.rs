use anyhow::{bail, Context};

pub const DEFAULT_PAGE_SIZE: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// PostgREST-style hosted store (the normal mode).
    Rest,
    /// In-memory store, nothing persisted. For local demos.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub api_url: String,
    pub api_key: String,
    pub page_size: u64,
}

impl Config {
    /// Reads `SEVENCH_BACKEND` (`rest`, the default, or `memory`),
    /// `SEVENCH_API_URL` / `SEVENCH_API_KEY` (required for `rest`), and
    /// `SEVENCH_PAGE_SIZE` (default 5).
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("SEVENCH_BACKEND").as_deref() {
            Ok("memory") => Backend::Memory,
            Ok("rest") | Err(_) => Backend::Rest,
            Ok(other) => {
                bail!("unsupported SEVENCH_BACKEND '{other}' (expected 'rest' or 'memory')")
            }
        };

        let page_size = match std::env::var("SEVENCH_PAGE_SIZE") {
            Ok(raw) => {
                let n: u64 = raw
                    .parse()
                    .context("SEVENCH_PAGE_SIZE must be a positive integer")?;
                if n == 0 {
                    bail!("SEVENCH_PAGE_SIZE must be at least 1");
                }
                n
            }
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        let (api_url, api_key) = match backend {
            Backend::Rest => (
                std::env::var("SEVENCH_API_URL")
                    .context("SEVENCH_API_URL must be set (base URL of the data gateway)")?,
                std::env::var("SEVENCH_API_KEY")
                    .context("SEVENCH_API_KEY must be set (data gateway API key)")?,
            ),
            Backend::Memory => (String::new(), String::new()),
        };

        Ok(Self { backend, api_url, api_key, page_size })
    }
}
