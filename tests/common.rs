//! Common test utilities shared between integration tests
//!
//! Modules are assembled from raw bytes so the tests go through the decoder
//! exactly like a `.wasm` file would.

#![allow(dead_code)]

pub const I32: u8 = 0x7F;
pub const I64: u8 = 0x7E;
pub const F32: u8 = 0x7D;
pub const F64: u8 = 0x7C;
pub const FUNCREF: u8 = 0x70;

pub fn uleb(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

pub fn sleb(mut value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

pub fn name(s: &str) -> Vec<u8> {
    let mut out = uleb(s.len() as u32);
    out.extend_from_slice(s.as_bytes());
    out
}

/// `i32.const value` followed by `end`
pub fn i32_const_expr(value: i32) -> Vec<u8> {
    let mut out = vec![0x41];
    out.extend(sleb(value as i64));
    out.push(0x0B);
    out
}

fn limits(min: u32, max: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    match max {
        Some(max) => {
            out.push(0x01);
            out.extend(uleb(min));
            out.extend(uleb(max));
        }
        None => {
            out.push(0x00);
            out.extend(uleb(min));
        }
    }
    out
}

fn vector(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = uleb(items.len() as u32);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Builds a binary module section by section. Function bodies are given
/// without their final `end`.
#[derive(Default)]
pub struct ModuleBuilder {
    types: Vec<Vec<u8>>,
    imports: Vec<Vec<u8>>,
    functions: Vec<u32>,
    tables: Vec<Vec<u8>>,
    memories: Vec<Vec<u8>>,
    globals: Vec<Vec<u8>>,
    exports: Vec<Vec<u8>>,
    start: Option<u32>,
    elements: Vec<Vec<u8>>,
    code: Vec<Vec<u8>>,
    data: Vec<Vec<u8>>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder::default()
    }

    pub fn func_type(mut self, params: &[u8], results: &[u8]) -> Self {
        let mut t = vec![0x60];
        t.extend(uleb(params.len() as u32));
        t.extend_from_slice(params);
        t.extend(uleb(results.len() as u32));
        t.extend_from_slice(results);
        self.types.push(t);
        self
    }

    pub fn import_func(mut self, module: &str, field: &str, type_idx: u32) -> Self {
        let mut i = name(module);
        i.extend(name(field));
        i.push(0x00);
        i.extend(uleb(type_idx));
        self.imports.push(i);
        self
    }

    pub fn import_table(mut self, module: &str, field: &str, min: u32, max: Option<u32>) -> Self {
        let mut i = name(module);
        i.extend(name(field));
        i.push(0x01);
        i.push(FUNCREF);
        i.extend(limits(min, max));
        self.imports.push(i);
        self
    }

    pub fn import_memory(mut self, module: &str, field: &str, min: u32, max: Option<u32>) -> Self {
        let mut i = name(module);
        i.extend(name(field));
        i.push(0x02);
        i.extend(limits(min, max));
        self.imports.push(i);
        self
    }

    pub fn import_global(mut self, module: &str, field: &str, value_type: u8, mutable: bool) -> Self {
        let mut i = name(module);
        i.extend(name(field));
        i.push(0x03);
        i.push(value_type);
        i.push(mutable as u8);
        self.imports.push(i);
        self
    }

    /// `locals` are (count, type) groups as they appear in the code section
    pub fn function(mut self, type_idx: u32, locals: &[(u32, u8)], body: &[u8]) -> Self {
        self.functions.push(type_idx);
        let mut f = uleb(locals.len() as u32);
        for (count, value_type) in locals {
            f.extend(uleb(*count));
            f.push(*value_type);
        }
        f.extend_from_slice(body);
        f.push(0x0B);
        let mut sized = uleb(f.len() as u32);
        sized.extend(f);
        self.code.push(sized);
        self
    }

    pub fn table(mut self, min: u32, max: Option<u32>) -> Self {
        let mut t = vec![FUNCREF];
        t.extend(limits(min, max));
        self.tables.push(t);
        self
    }

    pub fn memory(mut self, min: u32, max: Option<u32>) -> Self {
        self.memories.push(limits(min, max));
        self
    }

    /// `init` is a complete constant expression, including `end`
    pub fn global(mut self, value_type: u8, mutable: bool, init: &[u8]) -> Self {
        let mut g = vec![value_type, mutable as u8];
        g.extend_from_slice(init);
        self.globals.push(g);
        self
    }

    fn export(mut self, field: &str, kind: u8, idx: u32) -> Self {
        let mut e = name(field);
        e.push(kind);
        e.extend(uleb(idx));
        self.exports.push(e);
        self
    }

    pub fn export_func(self, field: &str, idx: u32) -> Self {
        self.export(field, 0x00, idx)
    }

    pub fn export_memory(self, field: &str, idx: u32) -> Self {
        self.export(field, 0x02, idx)
    }

    pub fn export_global(self, field: &str, idx: u32) -> Self {
        self.export(field, 0x03, idx)
    }

    pub fn start(mut self, idx: u32) -> Self {
        self.start = Some(idx);
        self
    }

    pub fn element(mut self, offset: i32, funcs: &[u32]) -> Self {
        let mut e = uleb(0);
        e.extend(i32_const_expr(offset));
        e.extend(uleb(funcs.len() as u32));
        for f in funcs {
            e.extend(uleb(*f));
        }
        self.elements.push(e);
        self
    }

    pub fn data(mut self, offset: i32, bytes: &[u8]) -> Self {
        let mut d = uleb(0);
        d.extend(i32_const_expr(offset));
        d.extend(uleb(bytes.len() as u32));
        d.extend_from_slice(bytes);
        self.data.push(d);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        let mut section = |id: u8, contents: Vec<u8>| {
            out.push(id);
            out.extend(uleb(contents.len() as u32));
            out.extend(contents);
        };

        if !self.types.is_empty() {
            section(1, vector(&self.types));
        }
        if !self.imports.is_empty() {
            section(2, vector(&self.imports));
        }
        if !self.functions.is_empty() {
            let indices: Vec<Vec<u8>> = self.functions.iter().map(|t| uleb(*t)).collect();
            section(3, vector(&indices));
        }
        if !self.tables.is_empty() {
            section(4, vector(&self.tables));
        }
        if !self.memories.is_empty() {
            section(5, vector(&self.memories));
        }
        if !self.globals.is_empty() {
            section(6, vector(&self.globals));
        }
        if !self.exports.is_empty() {
            section(7, vector(&self.exports));
        }
        if let Some(start) = self.start {
            section(8, uleb(start));
        }
        if !self.elements.is_empty() {
            section(9, vector(&self.elements));
        }
        if !self.code.is_empty() {
            section(10, vector(&self.code));
        }
        if !self.data.is_empty() {
            section(11, vector(&self.data));
        }
        out
    }
}
