//! Emission — API model → Rust source text.
//!
//! The output is a single file with two layers back to back: a raw
//! `sys` module mirroring the C ABI exactly, and a safe layer with
//! renamed identifiers, enum/bitflag abstractions, handle wrapper types,
//! and ergonomic function signatures. Bit-flag sets in the safe layer
//! use the `bitflags!` macro, so the crate the output lands in depends
//! on `bitflags`; the generator itself does not.
//!
//! Emission never fails: heuristic misclassification produces worse
//! output, not an error.

use tracing::debug;

use crate::classify;
use crate::model::*;
use crate::naming::{self, NameMap, NamingPolicy};

/// Render the whole module as Rust source text, raw layer first.
pub fn emit(module: &ApiModule, policy: &NamingPolicy) -> String {
    let names = NameMap::build(module, policy);
    debug!(
        handles = names.handles.len(),
        names = names.iter().count(),
        "assigned public names"
    );
    let emitter = Emitter {
        module,
        policy,
        names: &names,
        out: Vec::new(),
    };
    emitter.generate()
}

struct Emitter<'a> {
    module: &'a ApiModule,
    policy: &'a NamingPolicy,
    names: &'a NameMap,
    out: Vec<String>,
}

impl<'a> Emitter<'a> {
    fn line(&mut self, text: &str, indent: usize) {
        let mut s = String::with_capacity(indent * 4 + text.len());
        for _ in 0..indent {
            s.push_str("    ");
        }
        s.push_str(text);
        self.out.push(s);
    }

    fn blank(&mut self) {
        self.out.push(String::new());
    }

    fn doc(&mut self, doc: Option<&str>, indent: usize) {
        if let Some(doc) = doc {
            for line in doc.lines() {
                self.line(&format!("/// {line}"), indent);
            }
        }
    }

    fn section(&mut self, title: &str) {
        self.line("//", 0);
        self.line(&format!("// {title}"), 0);
        self.line("//", 0);
    }

    fn generate(mut self) -> String {
        self.line(
            "// This file is @generated by rfx-bindgen; do not edit by hand.",
            0,
        );
        self.line("// Regenerate it from the C header instead.", 0);
        self.line(
            "#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals, unused)]",
            0,
        );
        self.blank();
        self.line("use std::ffi::c_void;", 0);
        self.line("use std::os::raw::c_char;", 0);
        self.blank();
        self.sys_module();
        self.blank();
        self.safe_typedefs();
        self.safe_enums();
        self.safe_handles_and_structs();
        self.safe_functions();

        let mut text = self.out.join("\n");
        while text.ends_with('\n') {
            text.pop();
        }
        text.push('\n');
        text
    }

    // -----------------------------------------------------------------
    // Type rendering
    // -----------------------------------------------------------------

    /// Render a [`TypeInfo`] as Rust type text. In `sys` mode raw names
    /// are used verbatim; in safe mode names resolve through the name
    /// map and unmapped non-primitives qualify into the `sys` module.
    fn rust_type(&self, t: &TypeInfo, sys: bool) -> String {
        let mut base = t.name.clone();
        if !sys {
            if let Some(safe) = self.names.get(&base) {
                base = safe.to_string();
            } else if !classify::is_primitive(&base) {
                base = format!("sys::{base}");
            }
        }

        if let Some(size) = t.array_size {
            let inner = self.rust_type(&TypeInfo::named(t.name.clone()), sys);
            return match t.array_size_2d {
                Some(outer) => format!("[[{inner}; {size}]; {outer}]"),
                None => format!("[{inner}; {size}]"),
            };
        }

        if t.is_pointer {
            let ptr = if t.is_const { "*const" } else { "*mut" };
            if base.contains("void") {
                base = "c_void".to_string();
            } else if base.contains("char") {
                base = "c_char".to_string();
            }
            return format!("{ptr} {base}");
        }

        base
    }

    /// Whether a return type renders as nothing (C `void`).
    fn is_void_return(&self, t: &TypeInfo) -> bool {
        !t.is_pointer && matches!(t.name.as_str(), "void" | "c_void")
    }

    // -----------------------------------------------------------------
    // Raw layer
    // -----------------------------------------------------------------

    fn sys_module(&mut self) {
        let module = self.module;
        self.line("pub mod sys {", 0);
        self.line("use std::ffi::c_void;", 1);
        self.line("use std::os::raw::c_char;", 1);
        self.blank();

        for e in &module.enums {
            let repr = e.repr.as_str();
            if !e.is_anonymous {
                self.line(&format!("pub type {} = {};", e.name, repr), 1);
            }
            for v in &e.values {
                let ty: &str = if e.is_anonymous { repr } else { &e.name };
                self.line(&format!("pub const {}: {} = {};", v.name, ty, v.value), 1);
            }
        }
        self.blank();

        for (name, s) in &module.structs {
            if s.is_opaque {
                // Zero-sized marker: preserves distinct pointer identity
                // without exposing any layout.
                self.line(
                    &format!(
                        "#[repr(C)] #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)] \
                         pub struct {name} {{ _unused: [u8; 0] }}"
                    ),
                    1,
                );
                continue;
            }
            let derive = if classify::is_debug_safe(s, &self.names.unions) {
                "#[derive(Debug, Copy, Clone)]"
            } else {
                "#[derive(Copy, Clone)]"
            };
            self.line(&format!("#[repr(C)] {derive}"), 1);
            let keyword = if s.is_union { "union" } else { "struct" };
            self.line(&format!("pub {keyword} {name} {{"), 1);
            for f in &s.fields {
                let fname = naming::escape_reserved(&f.name);
                let fty = self.rust_type(&f.ty, true);
                self.line(&format!("pub {fname}: {fty},"), 2);
            }
            self.line("}", 1);
        }
        self.blank();

        for td in &module.typedefs {
            let target = self.rust_type(&td.target, true);
            self.line(&format!("pub type {} = {};", td.name, target), 1);
        }

        if !module.functions.is_empty() {
            self.blank();
            self.line("unsafe extern \"C\" {", 1);
            for f in &module.functions {
                let params: Vec<String> = f
                    .params
                    .iter()
                    .map(|p| {
                        format!(
                            "{}: {}",
                            naming::escape_reserved(&p.name),
                            self.rust_type(&p.ty, true)
                        )
                    })
                    .collect();
                let ret = if self.is_void_return(&f.ret) {
                    String::new()
                } else {
                    format!(" -> {}", self.rust_type(&f.ret, true))
                };
                self.line(
                    &format!("pub fn {}({}){};", f.name, params.join(", "), ret),
                    2,
                );
            }
            self.line("}", 1);
        }
        self.line("}", 0);
    }

    // -----------------------------------------------------------------
    // Safe layer: typedef aliases
    // -----------------------------------------------------------------

    /// Typedefs that don't resolve to a defined entity become plain
    /// aliases onto the raw type.
    fn safe_typedefs(&mut self) {
        let module = self.module;
        let names = self.names;
        self.section("Typedefs");
        for (raw, safe) in names.iter() {
            let is_defined = names.handles.contains(raw)
                || module.structs.contains_key(raw)
                || module.enums.iter().any(|e| e.name == *raw);
            if is_defined {
                continue;
            }
            let doc = module
                .typedefs
                .iter()
                .find(|td| td.name == *raw)
                .and_then(|td| td.doc.clone());
            self.doc(doc.as_deref(), 0);
            self.line(&format!("pub type {safe} = sys::{raw};"), 0);
        }
        self.blank();
    }

    // -----------------------------------------------------------------
    // Safe layer: enums
    // -----------------------------------------------------------------

    fn safe_enums(&mut self) {
        let module = self.module;
        let names = self.names;
        self.section("Enums");
        for e in &module.enums {
            if e.is_anonymous {
                continue;
            }
            let Some(name) = names.get(&e.name).map(str::to_string) else {
                continue;
            };
            let prefix = naming::common_prefix(&e.values);
            let repr = e.repr.as_str();
            self.doc(e.doc.as_deref(), 0);

            if e.is_bitflags {
                self.line("bitflags::bitflags! {", 0);
                self.line(
                    "#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]",
                    1,
                );
                self.line(&format!("pub struct {name}: {repr} {{"), 1);
                for v in &e.values {
                    let stripped = v.name.strip_prefix(&prefix).unwrap_or(&v.name);
                    let mut vname = stripped.to_string();
                    if vname.is_empty() || vname.starts_with(|c: char| c.is_ascii_digit()) {
                        vname.insert(0, 'F');
                    }
                    self.doc(v.doc.as_deref(), 2);
                    self.line(&format!("const {vname} = sys::{};", v.name), 2);
                }
                self.line("}", 1);
                self.line("}", 0);
            } else {
                self.line(&format!("#[repr({repr})]"), 0);
                self.line("#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]", 0);
                self.line(&format!("pub enum {name} {{"), 0);
                let mut seen = std::collections::HashSet::new();
                for v in &e.values {
                    // Duplicate discriminants collapse; the first name wins.
                    if !seen.insert(v.value) {
                        continue;
                    }
                    let stripped = v.name.strip_prefix(&prefix).unwrap_or(&v.name);
                    let mut vname = naming::to_pascal_case(stripped);
                    if matches!(vname.as_str(), "None" | "Default" | "Self") {
                        vname.push('_');
                    }
                    if vname.is_empty() || vname.starts_with(|c: char| c.is_ascii_digit()) {
                        vname.insert(0, 'V');
                    }
                    self.doc(v.doc.as_deref(), 1);
                    self.line(&format!("{vname} = sys::{} as {repr},", v.name), 1);
                }
                self.line("}", 0);
            }
            self.blank();
        }
    }

    // -----------------------------------------------------------------
    // Safe layer: handles and structs
    // -----------------------------------------------------------------

    fn safe_handles_and_structs(&mut self) {
        let module = self.module;
        let names = self.names;
        self.section("Handles and structs");

        for raw in &names.handles {
            let name = names.public(raw);
            let doc = module
                .structs
                .get(raw)
                .and_then(|s| s.doc.clone())
                .or_else(|| {
                    module
                        .typedefs
                        .iter()
                        .find(|td| td.name == *raw)
                        .and_then(|td| td.doc.clone())
                });
            self.doc(doc.as_deref(), 0);
            self.line(
                &format!(
                    "#[repr(transparent)] #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)] \
                     pub struct {name}(pub sys::{raw});"
                ),
                0,
            );
            self.line(&format!("impl {name} {{"), 0);
            self.line(&format!("pub fn as_raw(&self) -> sys::{raw} {{"), 1);
            self.line("self.0", 2);
            self.line("}", 1);
            self.line("}", 0);
            self.blank();
        }

        for (raw, s) in &module.structs {
            if s.is_opaque || names.handles.contains(raw) {
                continue;
            }
            let name = names.public(raw);
            let derive = if classify::is_debug_safe(s, &names.unions) {
                "#[derive(Debug, Copy, Clone)]"
            } else {
                "#[derive(Copy, Clone)]"
            };
            self.doc(s.doc.as_deref(), 0);
            self.line(&format!("#[repr(C)] {derive}"), 0);
            let keyword = if s.is_union { "union" } else { "struct" };
            self.line(&format!("pub {keyword} {name} {{"), 0);
            for f in &s.fields {
                let fname = naming::escape_reserved(&self.policy.snake_case(&f.name));
                let fty = self.rust_type(&f.ty, false);
                self.doc(f.doc.as_deref(), 1);
                self.line(&format!("pub {fname}: {fty},"), 1);
            }
            self.line("}", 0);
            // Zero-initialization is valid because the raw layer keeps
            // the exact C layout with no padding-sensitive invariants.
            self.line(&format!("impl Default for {name} {{"), 0);
            self.line("fn default() -> Self {", 1);
            self.line("unsafe { std::mem::zeroed() }", 2);
            self.line("}", 1);
            self.line("}", 0);
            self.blank();
        }
    }

    // -----------------------------------------------------------------
    // Safe layer: functions
    // -----------------------------------------------------------------

    fn safe_functions(&mut self) {
        let module = self.module;
        let names = self.names;
        self.section("Functions");

        for raw_handle in &names.handles {
            let methods: Vec<&Function> = module
                .functions
                .iter()
                .filter(|f| {
                    f.params
                        .first()
                        .is_some_and(|p| p.ty.name == *raw_handle && !p.ty.is_pointer)
                })
                .collect();
            if methods.is_empty() {
                continue;
            }
            let handle = names.public(raw_handle);
            self.line(&format!("impl {handle} {{"), 0);
            for f in methods {
                self.emit_fn(f, Some(raw_handle));
            }
            self.line("}", 0);
            self.blank();
        }

        for f in &module.functions {
            let is_method = f
                .params
                .first()
                .is_some_and(|p| names.handles.contains(&p.ty.name) && !p.ty.is_pointer);
            if !is_method {
                self.emit_fn(f, None);
                self.blank();
            }
        }
    }

    fn emit_fn(&mut self, f: &Function, method_of: Option<&str>) {
        let names = self.names;
        let indent = usize::from(method_of.is_some());

        let mut name = self.policy.snake_case(&f.name);
        if let Some(handle) = method_of {
            // Strip the redundant handle name from the method, and the
            // `cmd` prefix convention on command-list handles.
            let handle_snake = self.policy.snake_case(handle);
            name = name
                .replace(&format!("_{handle_snake}"), "")
                .replace(&format!("{handle_snake}_"), "");
            if handle_snake.contains("command_list")
                && let Some(rest) = name.strip_prefix("cmd_")
            {
                name = rest.to_string();
            }
        }

        let mut params = Vec::new();
        let mut locals: Vec<String> = Vec::new();
        let mut args = Vec::new();
        let skip = if method_of.is_some() {
            params.push("&self".to_string());
            args.push("self.0".to_string());
            1
        } else {
            0
        };

        for p in f.params.iter().skip(skip) {
            let pname = naming::escape_reserved(&self.policy.snake_case(&p.name));
            let t = &p.ty;

            if t.is_pointer && matches!(t.name.as_str(), "char" | "c_char") {
                // Null-terminated string: own the CString for the whole
                // call so the pointer cannot dangle.
                params.push(format!("{pname}: &str"));
                locals.push(format!(
                    "let {pname} = std::ffi::CString::new({pname}).unwrap_or_default();"
                ));
                args.push(format!("{pname}.as_ptr()"));
            } else if t.is_pointer {
                let safe_base = names.public(&t.name).to_string();
                let sys_base = if classify::is_primitive(&t.name) {
                    t.name.clone()
                } else {
                    format!("sys::{}", t.name)
                };
                params.push(format!("{pname}: *mut {safe_base}"));
                args.push(format!("{pname} as *mut {sys_base}"));
            } else if let Some(safe) = names.get(&t.name) {
                params.push(format!("{pname}: {safe}"));
                if names.handles.contains(&t.name) {
                    args.push(format!("{pname}.0"));
                } else if let Some(e) = self
                    .module
                    .enums
                    .iter()
                    .find(|e| !e.name.is_empty() && e.name == t.name)
                {
                    if e.is_bitflags {
                        args.push(format!("{pname}.bits()"));
                    } else {
                        args.push(format!("{pname} as {}", e.repr.as_str()));
                    }
                } else {
                    // Safe struct by value; layouts match the raw layer.
                    args.push(format!("unsafe {{ std::mem::transmute({pname}) }}"));
                }
            } else {
                params.push(format!("{pname}: {}", self.rust_type(t, false)));
                args.push(pname);
            }
        }

        let ret = if self.is_void_return(&f.ret) {
            String::new()
        } else {
            format!(" -> {}", self.rust_type(&f.ret, false))
        };

        self.doc(f.doc.as_deref(), indent);
        self.line(
            &format!("pub fn {name}({}){ret} {{", params.join(", ")),
            indent,
        );
        for local in &locals {
            self.line(local, indent + 1);
        }
        let call = format!("unsafe {{ sys::{}({}) }}", f.name, args.join(", "));
        if names.handles.contains(&f.ret.name) && !f.ret.is_pointer {
            let wrapper = names.public(&f.ret.name);
            self.line(&format!("{wrapper}({call})"), indent + 1);
        } else if names.get(&f.ret.name).is_some() && !f.ret.is_pointer {
            self.line(
                &format!("unsafe {{ std::mem::transmute({call}) }}"),
                indent + 1,
            );
        } else {
            self.line(&call, indent + 1);
        }
        self.line("}", indent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> NamingPolicy {
        NamingPolicy::default()
    }

    fn enum_of(name: &str, values: &[(&str, i64)]) -> Enum {
        Enum {
            name: name.to_string(),
            repr: IntRepr::U32,
            values: values
                .iter()
                .map(|(n, v)| EnumValue {
                    name: n.to_string(),
                    value: *v,
                    doc: None,
                })
                .collect(),
            is_anonymous: name.is_empty(),
            is_bitflags: classify::is_bitflags_name(name),
            doc: None,
            node_id: None,
        }
    }

    #[test]
    fn enum_variants_lose_their_common_prefix() {
        let mut module = ApiModule::default();
        module.push_enum(enum_of(
            "RfxFormat",
            &[("Rfx_Format_Unknown", 0), ("Rfx_Format_Rgba8", 1)],
        ));
        let text = emit(&module, &policy());
        assert!(text.contains("pub enum Format {"), "{text}");
        assert!(text.contains("Unknown = sys::Rfx_Format_Unknown as u32,"), "{text}");
        assert!(text.contains("Rgba8 = sys::Rfx_Format_Rgba8 as u32,"), "{text}");
    }

    #[test]
    fn duplicate_enum_values_collapse_to_the_first_name() {
        let mut module = ApiModule::default();
        module.push_enum(enum_of(
            "RfxLoadOp",
            &[
                ("RFX_LOAD_OP_CLEAR", 0),
                ("RFX_LOAD_OP_DEFAULT", 0),
                ("RFX_LOAD_OP_KEEP", 1),
            ],
        ));
        let text = emit(&module, &policy());
        assert!(text.contains("Clear = sys::RFX_LOAD_OP_CLEAR as u32,"), "{text}");
        assert!(!text.contains("Default = sys::RFX_LOAD_OP_DEFAULT"), "{text}");
    }

    #[test]
    fn bitflag_enums_become_bitflags_sets() {
        let mut module = ApiModule::default();
        module.push_enum(enum_of(
            "RfxShaderStageFlags",
            &[
                ("RFX_SHADER_STAGE_VERTEX", 1),
                ("RFX_SHADER_STAGE_FRAGMENT", 2),
            ],
        ));
        let text = emit(&module, &policy());
        assert!(text.contains("bitflags::bitflags! {"), "{text}");
        assert!(text.contains("pub struct ShaderStageFlags: u32 {"), "{text}");
        assert!(text.contains("const VERTEX = sys::RFX_SHADER_STAGE_VERTEX;"), "{text}");
    }

    #[test]
    fn anonymous_enums_emit_only_raw_constants() {
        let mut module = ApiModule::default();
        module.push_enum(enum_of("", &[("RFX_MAX_FRAMES", 3)]));
        let text = emit(&module, &policy());
        assert!(text.contains("pub const RFX_MAX_FRAMES: u32 = 3;"), "{text}");
        assert!(!text.contains("pub enum "), "{text}");
    }

    #[test]
    fn opaque_structs_are_zero_sized_markers() {
        let mut module = ApiModule::default();
        module.upsert_struct(Struct {
            name: "RfxDeviceT".to_string(),
            fields: vec![],
            is_union: false,
            is_opaque: true,
            doc: None,
        });
        let text = emit(&module, &policy());
        assert!(
            text.contains("pub struct RfxDeviceT { _unused: [u8; 0] }"),
            "{text}"
        );
        // Opaque structs are handles: they get a transparent wrapper.
        assert!(
            text.contains("pub struct DeviceT(pub sys::RfxDeviceT);"),
            "{text}"
        );
        assert!(text.contains("pub fn as_raw(&self) -> sys::RfxDeviceT {"), "{text}");
    }

    #[test]
    fn reserved_field_names_are_escaped_and_snake_cased() {
        let mut module = ApiModule::default();
        module.upsert_struct(Struct {
            name: "RfxBufferDesc".to_string(),
            fields: vec![
                Field {
                    name: "type".to_string(),
                    ty: TypeInfo::named("u32"),
                    doc: None,
                },
                Field {
                    name: "byteSize".to_string(),
                    ty: TypeInfo::named("u64"),
                    doc: None,
                },
            ],
            is_union: false,
            is_opaque: false,
            doc: None,
        });
        let text = emit(&module, &policy());
        assert!(text.contains("pub r#type: u32,"), "{text}");
        assert!(text.contains("pub byte_size: u64,"), "{text}");
        assert!(text.contains("impl Default for BufferDesc {"), "{text}");
    }

    #[test]
    fn string_parameters_bind_their_cstring_before_the_call() {
        let mut module = ApiModule::default();
        module.functions.push(Function {
            name: "rfxSetLabel".to_string(),
            ret: TypeInfo::named("void"),
            params: vec![Field {
                name: "label".to_string(),
                ty: TypeInfo {
                    is_pointer: true,
                    is_const: true,
                    ..TypeInfo::named("c_char")
                },
                doc: None,
            }],
            doc: None,
        });
        let text = emit(&module, &policy());
        assert!(text.contains("pub fn set_label(label: &str) {"), "{text}");
        assert!(
            text.contains("let label = std::ffi::CString::new(label).unwrap_or_default();"),
            "{text}"
        );
        assert!(text.contains("unsafe { sys::rfxSetLabel(label.as_ptr()) }"), "{text}");
    }

    #[test]
    fn void_returns_are_omitted_in_both_layers() {
        let mut module = ApiModule::default();
        module.functions.push(Function {
            name: "rfxFlush".to_string(),
            ret: TypeInfo::named("void"),
            params: vec![],
            doc: None,
        });
        let text = emit(&module, &policy());
        assert!(text.contains("pub fn rfxFlush();"), "{text}");
        assert!(text.contains("pub fn flush() {"), "{text}");
    }
}
