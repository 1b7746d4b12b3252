//! rfx-bindgen — C header → Rust bindings generator.
//!
//! Parses a C header through clang's JSON AST dump and emits a single
//! Rust source file with two layers: a raw `sys` module mirroring the C
//! ABI exactly, and an idiomatic safe layer (handle wrappers, enums and
//! bit-flag sets, method-ified functions) built on top of it.
//!
//! # Quick start
//!
//! Generate a bindings file from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, parses the header, writes the bindings file.
//! rfx_bindgen::run(Path::new("rfx-bindgen.toml"), None).unwrap();
//! ```
//!
//! Or get the generated source text without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let bindings = rfx_bindgen::generate(Path::new("rfx-bindgen.toml")).unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod ast;
pub mod classify;
pub mod config;
pub mod emit;
pub mod ingest;
pub mod model;
pub mod naming;

/// Run the full pipeline: load config, parse the C header, emit the
/// bindings, and write the output file.
///
/// `config_path` is the path to an `rfx-bindgen.toml` configuration
/// file.
/// `output` optionally overrides the output file path from the config.
///
/// This is the top-level entry point intended for use in `build.rs`
/// scripts or other programmatic callers that want the complete
/// generate-and-write workflow in a single call.
///
/// Returns the path the bindings file was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let bindings = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    std::fs::write(&output_path, &bindings)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = bindings.len(),
        "wrote bindings"
    );

    Ok(output_path)
}

/// Parse an `rfx-bindgen.toml` config file, run the pipeline on the
/// referenced C header, and return the generated source text without
/// writing to disk.
pub fn generate(config_path: &Path) -> Result<String> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate bindings from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which the header path in the
/// config is resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<String> {
    let header = config::resolve_header(&cfg.header, base_dir, &cfg.include_paths);
    info!(header = %header.display(), "loaded configuration");

    // Build clang arguments: user-specified args + -I flags from include_paths
    let mut clang_args: Vec<String> = cfg.clang_args.clone();
    for inc in &cfg.include_paths {
        let flag = format!("-I{}", inc.display());
        if !clang_args.contains(&flag) {
            clang_args.push(flag);
        }
    }

    let root = ast::dump(&header, &clang_args)
        .with_context(|| format!("dumping AST of {}", header.display()))?;
    let index = ast::NodeIndex::build(&root);

    let module = ingest::ingest(&root, &index, &header);
    info!(
        enums = module.enums.len(),
        structs = module.structs.len(),
        functions = module.functions.len(),
        typedefs = module.typedefs.len(),
        "ingested api model"
    );

    let policy = naming::NamingPolicy::new(&cfg.naming.prefix);
    let bindings = emit::emit(&module, &policy);

    info!(size = bindings.len(), "generated bindings");

    Ok(bindings)
}
