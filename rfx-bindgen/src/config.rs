//! Configuration types for `rfx-bindgen.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    /// The C header to generate bindings for. Resolved against the TOML
    /// file's directory first, then each entry in `include_paths`.
    pub header: PathBuf,
    /// Additional directories to search when resolving the header.
    /// Also injected as `-I` flags for clang.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Extra clang arguments (e.g. `-DFOO`, `-std=c11`).
    #[serde(default)]
    pub clang_args: Vec<String>,
    #[serde(default)]
    pub naming: NamingConfig,
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output file path (e.g. `src/bindings.rs`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("bindings.rs")
}

/// Naming policy settings.
#[derive(Debug, Deserialize)]
pub struct NamingConfig {
    /// Project prefix stripped from public identifiers, matched in any
    /// capitalization with an optional trailing underscore.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "Rfx".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

/// Resolve a header path by searching `base_dir` first, then each
/// `include_paths` entry.  Absolute paths are returned as-is.  If the
/// file is not found anywhere, falls back to `base_dir.join(path)` so
/// that the caller gets a meaningful error from clang.
pub fn resolve_header(path: &Path, base_dir: &Path, include_paths: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = base_dir.join(path);
    if candidate.exists() {
        return candidate;
    }
    for inc in include_paths {
        let candidate = inc.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    // Fall back — clang will report the error with context.
    base_dir.join(path)
}

/// Load and parse an `rfx-bindgen.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            header = "rfx.h"

            [output]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.header, PathBuf::from("rfx.h"));
        assert_eq!(cfg.output.file, PathBuf::from("bindings.rs"));
        assert_eq!(cfg.naming.prefix, "Rfx");
        assert!(cfg.include_paths.is_empty());
        assert!(cfg.clang_args.is_empty());
    }

    #[test]
    fn naming_prefix_is_overridable() {
        let cfg: Config = toml::from_str(
            r#"
            header = "gfx.h"

            [output]
            file = "src/gfx_sys.rs"

            [naming]
            prefix = "Gfx"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.naming.prefix, "Gfx");
        assert_eq!(cfg.output.file, PathBuf::from("src/gfx_sys.rs"));
    }
}
