//! Binary module decoding.
//!
//! [`parse`] turns the bytes of a `.wasm` file into a [`module::Module`].
//! Decoding is purely structural: indices are not resolved and types are not
//! checked here, that is left to [`validate`].

pub mod instruction;
pub mod limits;
pub mod module;
pub mod reader;
pub mod validate;

use log::debug;
use thiserror::Error;

use instruction::decode_expr;
use module::{
    CustomSection, Data, Element, Export, ExportDescriptor, Function, FunctionType, Global,
    GlobalType, Import, ImportDescriptor, Limits, MemoryType, Module, TableType, ElementType,
    ValueType,
};
use reader::Reader;

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected byte {received:#04x} reading {context}, expected one of {expected:02x?}")]
    UnexpectedByte {
        received: u8,
        expected: Vec<u8>,
        context: &'static str,
    },
    #[error("invalid utf-8 in name: {0:02x?}")]
    InvalidUtf8(Vec<u8>),
    #[error("invalid value type {0:#04x}")]
    InvalidValueType(u8),
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    #[error("invalid section id {0}")]
    InvalidSectionId(u8),
    #[error("invalid import descriptor {0:#04x}")]
    InvalidImportDescriptor(u8),
    #[error("invalid export descriptor {0:#04x}")]
    InvalidExportDescriptor(u8),
    #[error("function and code section lengths differ: {functions} functions, {bodies} bodies")]
    FunctionCodeMismatch { functions: usize, bodies: usize },
    #[error("implementation limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

/// One decoded section, before it is folded into the [`Module`].
#[derive(Debug)]
enum Section {
    /// `None` when the section's name could not be read
    Custom(Option<CustomSection>),
    Type(Vec<FunctionType>),
    Import(Vec<Import>),
    Function(Vec<u32>),
    Table(Vec<TableType>),
    Memory(Vec<MemoryType>),
    Global(Vec<Global>),
    Export(Vec<Export>),
    Start(u32),
    Element(Vec<Element>),
    Code(Vec<(Vec<ValueType>, Vec<instruction::Instruction>)>),
    Data(Vec<Data>),
}

/// Decode a complete binary module. Sections may appear in any order; when a
/// section id repeats, the later one wins.
pub fn parse(bytes: &[u8]) -> Result<Module, DecodeError> {
    let mut reader = Reader::new(bytes.to_vec());

    for b in MAGIC {
        reader.expect_byte(&[b], "magic")?;
    }
    for b in VERSION {
        reader.expect_byte(&[b], "version")?;
    }

    let mut module = Module::default();
    let mut function_types: Vec<u32> = Vec::new();
    let mut code: Vec<(Vec<ValueType>, Vec<instruction::Instruction>)> = Vec::new();

    while reader.has_more_bytes() {
        match read_section(&mut reader)? {
            Section::Custom(custom) => module.customs.extend(custom),
            Section::Type(types) => module.types = types,
            Section::Import(imports) => module.imports = imports,
            Section::Function(indices) => function_types = indices,
            Section::Table(tables) => module.tables = tables,
            Section::Memory(memories) => module.memories = memories,
            Section::Global(globals) => module.globals = globals,
            Section::Export(exports) => module.exports = exports,
            Section::Start(start) => module.start = Some(start),
            Section::Element(elements) => module.elements = elements,
            Section::Code(bodies) => code = bodies,
            Section::Data(data) => module.data = data,
        }
    }

    if function_types.len() != code.len() {
        return Err(DecodeError::FunctionCodeMismatch {
            functions: function_types.len(),
            bodies: code.len(),
        });
    }

    module.functions = function_types
        .into_iter()
        .zip(code)
        .map(|(type_idx, (locals, body))| Function {
            type_idx,
            locals,
            body,
        })
        .collect();

    Ok(module)
}

fn read_section(reader: &mut Reader) -> Result<Section, DecodeError> {
    let id = reader.read_byte()?;
    let size = reader.read_vu32()?;
    if id > 11 {
        return Err(DecodeError::InvalidSectionId(id));
    }
    debug!("section #{} at offset {}, size = {}", id, reader.pos(), size);

    let section = match id {
        0 => Section::Custom(read_custom_section(reader, size)?),
        1 => Section::Type(reader.read_vec(read_function_type)?),
        2 => Section::Import(reader.read_vec(read_import)?),
        3 => Section::Function(reader.read_vec(|r| r.read_vu32())?),
        4 => Section::Table(reader.read_vec(read_table_type)?),
        5 => Section::Memory(reader.read_vec(read_memory_type)?),
        6 => Section::Global(reader.read_vec(read_global)?),
        7 => Section::Export(reader.read_vec(read_export)?),
        8 => Section::Start(reader.read_vu32()?),
        9 => Section::Element(reader.read_vec(read_element)?),
        10 => Section::Code(reader.read_vec(read_code)?),
        _ => Section::Data(reader.read_vec(read_data)?),
    };
    Ok(section)
}

/// Custom sections never fail decoding. Their bytes are consumed whatever
/// they hold, and one whose name cannot be read is dropped.
fn read_custom_section(reader: &mut Reader, size: u32) -> Result<Option<CustomSection>, DecodeError> {
    let mut contents = Reader::new(reader.read_bytes(size as usize)?);
    match contents.read_name() {
        Ok(name) => {
            let data = contents.read_bytes(contents.remaining())?;
            debug!("skipping custom section \"{}\" ({} bytes)", name, data.len());
            Ok(Some(CustomSection { name, data }))
        }
        Err(e) => {
            debug!("dropping unnamed custom section ({} bytes): {}", size, e);
            Ok(None)
        }
    }
}

// Types -----------------------------------------------------------------------

fn read_value_type(reader: &mut Reader) -> Result<ValueType, DecodeError> {
    let b = reader.read_byte()?;
    ValueType::decode(b).ok_or(DecodeError::InvalidValueType(b))
}

fn read_value_types(reader: &mut Reader, max: u32, what: &'static str) -> Result<Vec<ValueType>, DecodeError> {
    let count = reader.read_vu32()?;
    if count > max {
        return Err(DecodeError::LimitExceeded(what));
    }
    let mut types = Vec::with_capacity((count as usize).min(reader.remaining()));
    for _ in 0..count {
        types.push(read_value_type(reader)?);
    }
    Ok(types)
}

fn read_function_type(reader: &mut Reader) -> Result<FunctionType, DecodeError> {
    reader.expect_byte(&[0x60], "function type")?;
    let parameters = read_value_types(reader, limits::MAX_FUNCTION_PARAMS, "function parameter count")?;
    let return_types = read_value_types(reader, limits::MAX_FUNCTION_RETURNS, "function result count")?;
    Ok(FunctionType {
        parameters,
        return_types,
    })
}

fn read_limits(reader: &mut Reader) -> Result<Limits, DecodeError> {
    let flag = reader.expect_byte(&[0x00, 0x01], "limits")?;
    let min = reader.read_vu32()?;
    let max = if flag == 0x01 {
        Some(reader.read_vu32()?)
    } else {
        None
    };
    Ok(Limits { min, max })
}

fn read_table_type(reader: &mut Reader) -> Result<TableType, DecodeError> {
    reader.expect_byte(&[0x70], "table element type")?;
    Ok(TableType {
        element_type: ElementType::FuncRef,
        limits: read_limits(reader)?,
    })
}

fn read_memory_type(reader: &mut Reader) -> Result<MemoryType, DecodeError> {
    Ok(MemoryType {
        limits: read_limits(reader)?,
    })
}

fn read_global_type(reader: &mut Reader) -> Result<GlobalType, DecodeError> {
    let value_type = read_value_type(reader)?;
    let mutable = reader.expect_byte(&[0x00, 0x01], "global mutability")? == 0x01;
    Ok(GlobalType { value_type, mutable })
}

// Sections --------------------------------------------------------------------

fn read_import(reader: &mut Reader) -> Result<Import, DecodeError> {
    let module = reader.read_name()?;
    let name = reader.read_name()?;
    let descriptor = match reader.read_byte()? {
        0x00 => ImportDescriptor::Function(reader.read_vu32()?),
        0x01 => ImportDescriptor::Table(read_table_type(reader)?),
        0x02 => ImportDescriptor::Memory(read_memory_type(reader)?),
        0x03 => ImportDescriptor::Global(read_global_type(reader)?),
        b => return Err(DecodeError::InvalidImportDescriptor(b)),
    };
    Ok(Import {
        module,
        name,
        descriptor,
    })
}

fn read_global(reader: &mut Reader) -> Result<Global, DecodeError> {
    let global_type = read_global_type(reader)?;
    let init = decode_expr(reader)?;
    Ok(Global { global_type, init })
}

fn read_export(reader: &mut Reader) -> Result<Export, DecodeError> {
    let name = reader.read_name()?;
    let descriptor = match reader.read_byte()? {
        0x00 => ExportDescriptor::Function(reader.read_vu32()?),
        0x01 => ExportDescriptor::Table(reader.read_vu32()?),
        0x02 => ExportDescriptor::Memory(reader.read_vu32()?),
        0x03 => ExportDescriptor::Global(reader.read_vu32()?),
        b => return Err(DecodeError::InvalidExportDescriptor(b)),
    };
    Ok(Export { name, descriptor })
}

fn read_element(reader: &mut Reader) -> Result<Element, DecodeError> {
    let table_idx = reader.read_vu32()?;
    let offset = decode_expr(reader)?;
    let init = reader.read_vec(|r| r.read_vu32())?;
    Ok(Element {
        table_idx,
        offset,
        init,
    })
}

fn read_code(reader: &mut Reader) -> Result<(Vec<ValueType>, Vec<instruction::Instruction>), DecodeError> {
    // the body size; bodies are decoded in place so it goes unused
    let _size = reader.read_vu32()?;

    let mut locals = Vec::new();
    let groups = reader.read_vu32()?;
    for _ in 0..groups {
        let count = reader.read_vu32()?;
        let value_type = read_value_type(reader)?;
        let total = locals.len() as u64 + count as u64;
        if total > limits::MAX_FUNCTION_LOCALS as u64 {
            return Err(DecodeError::LimitExceeded("function local count"));
        }
        locals.extend(std::iter::repeat(value_type).take(count as usize));
    }

    let body = decode_expr(reader)?;
    Ok((locals, body))
}

fn read_data(reader: &mut Reader) -> Result<Data, DecodeError> {
    let memory_idx = reader.read_vu32()?;
    let offset = decode_expr(reader)?;
    let init = reader.read_u8vec()?;
    Ok(Data {
        memory_idx,
        offset,
        init,
    })
}
