pub mod types;

#[cfg(test)]
mod tests;

pub use types::{Options, PoolSource, RotatePolicy};

use anyhow::Result;
use std::path::Path;

impl Options {
    /// Load options from an optional file (TOML or JSON dispatch by
    /// extension) layered under built-in defaults. When no file is given,
    /// or it does not exist, defaults are used untouched — callers apply
    /// CLI overrides afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let options = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                match p.extension().and_then(|e| e.to_str()) {
                    Some("toml") => toml::from_str(&content)?,
                    Some("json") => serde_json::from_str(&content)?,
                    Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                    None => anyhow::bail!("config file has no extension, use .toml or .json"),
                }
            }
            Some(p) => anyhow::bail!("config file not found: {}", p.display()),
            None => Options::default(),
        };
        Ok(options)
    }

    /// Apply environment variable overrides, matching the gateway's
    /// `ROTOPROXY_*` convention for infrastructure settings not otherwise
    /// exposed on the CLI.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ROTOPROXY_AUTH") {
            self.auth = Some(v);
        }
        if let Ok(v) = std::env::var("ROTOPROXY_VERBOSE") {
            self.verbose = v == "true" || v == "1";
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            anyhow::bail!("listen address must not be empty");
        }
        if self.max_parallelism == 0 {
            anyhow::bail!("max_parallelism must be at least 1");
        }
        if let RotatePolicy::EveryN { n } = self.rotate {
            if n == 0 {
                anyhow::bail!("rotate policy every_n requires n >= 1");
            }
        }
        Ok(())
    }
}
