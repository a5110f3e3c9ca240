//! A WebAssembly MVP decoder, validator and interpreter written in Rust.
//!
//! wasmite takes a module from its binary encoding to execution:
//!
//! - [`parser`] -- Binary format decoder. Reads `.wasm` bytes into a
//!   [`parser::module::Module`], and [`parser::validate`] type-checks it.
//! - [`runtime`] -- The store, instantiation and linking, and a stack-machine
//!   interpreter over the decoded instruction tree.
//!
//! # Example
//!
//! Decode a module exporting `add`, instantiate it, and call the export:
//!
//! ```
//! use wasmite::parser;
//! use wasmite::runtime::Value;
//!
//! let bytes = [
//!     0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00,
//!     // type section: (i32, i32) -> i32
//!     0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F,
//!     // function section
//!     0x03, 0x02, 0x01, 0x00,
//!     // export section: "add"
//!     0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00,
//!     // code section: local.get 0 local.get 1 i32.add end
//!     0x0A, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B,
//! ];
//!
//! let module = parser::parse(&bytes).unwrap();
//! let mut vm = module.instantiate(&[]).unwrap();
//! let results = vm.invoke_export("add", &[Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(results, vec![Value::I32(5)]);
//! ```
//!
//! # Specification
//!
//! Targets the [WebAssembly 1.0 (MVP) specification](https://www.w3.org/TR/wasm-core-1/).
//! Post-MVP proposals such as SIMD, bulk memory and reference types are
//! rejected at decode time.

pub mod parser;
pub mod runtime;
