//! End-to-end tests against a real clang installation.
//!
//! These parse `tests/fixtures/rfx.h` through the actual compiler
//! subprocess, so they are ignored by default; run with
//! `cargo test -- --ignored` on a machine with clang on PATH.

use std::path::{Path, PathBuf};

fn fixture_config() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/rfx-bindgen.toml")
}

#[test]
#[ignore = "requires clang on PATH"]
fn fixture_header_generates_both_layers() {
    let text = rfx_bindgen::generate(&fixture_config()).expect("generate bindings");

    // Raw layer.
    assert!(text.contains("pub mod sys {"), "{text}");
    assert!(
        text.contains("pub struct RfxDeviceT { _unused: [u8; 0] }"),
        "{text}"
    );
    assert!(text.contains("pub fn rfxDeviceDestroy(device: RfxDevice);"), "{text}");

    // The integer typedef + anonymous enum idiom names the enum.
    assert!(text.contains("pub type RfxFormat = u32;"), "{text}");
    assert!(text.contains("pub enum Format {"), "{text}");
    assert!(text.contains("Rgba8 = sys::RFX_FORMAT_RGBA8 as u32,"), "{text}");

    // Bit-flag enum becomes a bitflags set.
    assert!(text.contains("pub struct ShaderStageFlags: u32 {"), "{text}");
    assert!(
        text.contains("const VERTEX = sys::RFX_SHADER_STAGE_VERTEX;"),
        "{text}"
    );

    // Handle wrappers and methods.
    assert!(text.contains("pub struct Device(pub sys::RfxDevice);"), "{text}");
    assert!(text.contains("pub fn destroy(&self) {"), "{text}");
    assert!(
        text.contains("unsafe { sys::rfxDeviceDestroy(self.0) }"),
        "{text}"
    );
    assert!(
        text.contains("pub fn draw(&self, vertex_count: u32, instance_count: u32) {"),
        "{text}"
    );

    // String parameters convert at the call boundary.
    assert!(
        text.contains("pub fn set_label(&self, label: &str) {"),
        "{text}"
    );

    // The anonymous union inside RfxClearValue gets a synthetic type.
    assert!(text.contains("RfxClearValue_Data"), "{text}");
}

#[test]
#[ignore = "requires clang on PATH"]
fn run_writes_the_output_file() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let out = tmp.path().join("rfx_bindings.rs");
    let written = rfx_bindgen::run(&fixture_config(), Some(&out)).expect("run pipeline");
    assert_eq!(written, out);

    let text = std::fs::read_to_string(&out).expect("read generated file");
    assert!(text.starts_with("// This file is @generated by rfx-bindgen"));
}
