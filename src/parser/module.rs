use std::fmt;

use super::instruction::Instruction;

/// A decoded module. Indices in here are only meaningful relative to this
/// module's own vectors, offset by whatever is imported at instantiation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub types: Vec<FunctionType>,
    pub functions: Vec<Function>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<Global>,
    pub elements: Vec<Element>,
    pub data: Vec<Data>,
    pub start: Option<u32>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub customs: Vec<CustomSection>,
}

impl Module {
    pub fn imported_functions(&self) -> impl Iterator<Item = u32> + '_ {
        self.imports.iter().filter_map(|i| match i.descriptor {
            ImportDescriptor::Function(type_idx) => Some(type_idx),
            _ => None,
        })
    }

    pub fn imported_tables(&self) -> impl Iterator<Item = &TableType> + '_ {
        self.imports.iter().filter_map(|i| match &i.descriptor {
            ImportDescriptor::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn imported_memories(&self) -> impl Iterator<Item = &MemoryType> + '_ {
        self.imports.iter().filter_map(|i| match &i.descriptor {
            ImportDescriptor::Memory(m) => Some(m),
            _ => None,
        })
    }

    pub fn imported_globals(&self) -> impl Iterator<Item = &GlobalType> + '_ {
        self.imports.iter().filter_map(|i| match &i.descriptor {
            ImportDescriptor::Global(g) => Some(g),
            _ => None,
        })
    }

    pub fn get_function_name(&self, index: u32) -> Option<&String> {
        self.exports.iter().find_map(|export| match export.descriptor {
            ExportDescriptor::Function(idx) if idx == index => Some(&export.name),
            _ => None,
        })
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Type[{}]:", self.types.len())?;
        for (i, t) in self.types.iter().enumerate() {
            writeln!(f, " - type[{}] {}", i, t)?;
        }
        writeln!(f, "Import[{}]:", self.imports.len())?;
        for import in &self.imports {
            writeln!(f, " - {}", import)?;
        }
        writeln!(f, "Function[{}]:", self.functions.len())?;
        let imported = self.imported_functions().count() as u32;
        for (i, func) in self.functions.iter().enumerate() {
            let idx = imported + i as u32;
            write!(f, " - func[{}] {}", idx, func)?;
            if let Some(name) = self.get_function_name(idx) {
                write!(f, " <{}>", name)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Table[{}]:", self.tables.len())?;
        for (i, t) in self.tables.iter().enumerate() {
            writeln!(f, " - table[{}] {}", i, t)?;
        }
        writeln!(f, "Memory[{}]:", self.memories.len())?;
        for (i, m) in self.memories.iter().enumerate() {
            writeln!(f, " - memory[{}] {}", i, m)?;
        }
        writeln!(f, "Global[{}]:", self.globals.len())?;
        for (i, g) in self.globals.iter().enumerate() {
            writeln!(f, " - global[{}] {}", i, g)?;
        }
        writeln!(f, "Export[{}]:", self.exports.len())?;
        for export in &self.exports {
            writeln!(f, " - {}", export)?;
        }
        if let Some(start) = self.start {
            writeln!(f, "Start: func[{}]", start)?;
        }
        writeln!(f, "Elem[{}]:", self.elements.len())?;
        for (i, e) in self.elements.iter().enumerate() {
            writeln!(f, " - segment[{}] {}", i, e)?;
        }
        writeln!(f, "Data[{}]:", self.data.len())?;
        for (i, d) in self.data.iter().enumerate() {
            writeln!(f, " - segment[{}] {}", i, d)?;
        }
        for custom in &self.customs {
            writeln!(f, "Custom: \"{}\" size={}", custom.name, custom.data.len())?;
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn decode(byte: u8) -> Option<Self> {
        match byte {
            0x7f => Some(ValueType::I32),
            0x7e => Some(ValueType::I64),
            0x7d => Some(ValueType::F32),
            0x7c => Some(ValueType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValueType::I32 => "i32",
                ValueType::I64 => "i64",
                ValueType::F32 => "f32",
                ValueType::F64 => "f64",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionType {
    pub parameters: Vec<ValueType>,
    pub return_types: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(parameters: Vec<ValueType>, return_types: Vec<ValueType>) -> FunctionType {
        FunctionType {
            parameters,
            return_types,
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}) -> {}",
            self.parameters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join(", "),
            if self.return_types.is_empty() {
                "nil".to_string()
            } else {
                self.return_types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<String>>()
                    .join(", ")
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    /// `self` can stand in where `expected` is declared: at least as large,
    /// and bounded at least as tightly when `expected` has a maximum.
    pub fn is_subtype_of(&self, expected: &Limits) -> bool {
        if self.min < expected.min {
            return false;
        }
        match (self.max, expected.max) {
            (_, None) => true,
            (Some(given), Some(expected)) => given <= expected,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "initial={} max={}", self.min, max),
            None => write!(f, "initial={}", self.min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pages: {}", self.limits)
    }
}

/// The MVP only has tables of function references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    FuncRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element_type: ElementType,
    pub limits: Limits,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "type=funcref {}", self.limits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} mutable={}", self.value_type, if self.mutable { 1 } else { 0 })
    }
}

/// A function declared in the function section paired with its body from the
/// code section. `locals` is the expanded list of declared locals, not
/// including parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub type_idx: u32,
    pub locals: Vec<ValueType>,
    pub body: Vec<Instruction>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "sig={} locals={} instructions={}",
            self.type_idx,
            self.locals.len(),
            self.body.len()
        )
    }
}

/// A constant expression, the initializer of a global or the offset of a segment.
pub type Expr = Vec<Instruction>;

fn write_expr(f: &mut fmt::Formatter, expr: &Expr) -> fmt::Result {
    for (i, instruction) in expr.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", instruction)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: Expr,
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - init ", self.global_type)?;
        write_expr(f, &self.init)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub table_idx: u32,
    pub offset: Expr,
    pub init: Vec<u32>,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "table={} offset=", self.table_idx)?;
        write_expr(f, &self.offset)?;
        write!(f, " count={} funcs={:?}", self.init.len(), self.init)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub memory_idx: u32,
    pub offset: Expr,
    pub init: Vec<u8>,
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "memory={} offset=", self.memory_idx)?;
        write_expr(f, &self.offset)?;
        const PREVIEW: usize = 32;
        let shown = &self.init[..self.init.len().min(PREVIEW)];
        write!(f, " size={} - {}", self.init.len(), hex::encode(shown))?;
        if self.init.len() > PREVIEW {
            write!(f, "...")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDescriptor {
    Function(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub descriptor: ImportDescriptor,
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.descriptor {
            ImportDescriptor::Function(type_idx) => {
                write!(f, "func sig={} <- {}.{}", type_idx, self.module, self.name)
            }
            ImportDescriptor::Table(t) => write!(f, "table {} <- {}.{}", t, self.module, self.name),
            ImportDescriptor::Memory(m) => {
                write!(f, "memory {} <- {}.{}", m, self.module, self.name)
            }
            ImportDescriptor::Global(g) => {
                write!(f, "global {} <- {}.{}", g, self.module, self.name)
            }
        }
    }
}

/// A custom section, kept uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDescriptor {
    Function(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub descriptor: ExportDescriptor,
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let typ = match self.descriptor {
            ExportDescriptor::Function(i) => format!("func[{}]", i),
            ExportDescriptor::Table(i) => format!("table[{}]", i),
            ExportDescriptor::Memory(i) => format!("memory[{}]", i),
            ExportDescriptor::Global(i) => format!("global[{}]", i),
        };
        write!(f, "{} -> \"{}\"", typ, self.name)
    }
}

/// The signature of something crossing a module boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternType {
    Function(FunctionType),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ExternType {
    /// Extern subtyping: functions and globals must match exactly, tables and
    /// memories match when their limits do.
    pub fn is_subtype_of(&self, expected: &ExternType) -> bool {
        match (self, expected) {
            (ExternType::Function(given), ExternType::Function(expected)) => given == expected,
            (ExternType::Table(given), ExternType::Table(expected)) => {
                given.element_type == expected.element_type
                    && given.limits.is_subtype_of(&expected.limits)
            }
            (ExternType::Memory(given), ExternType::Memory(expected)) => {
                given.limits.is_subtype_of(&expected.limits)
            }
            (ExternType::Global(given), ExternType::Global(expected)) => given == expected,
            _ => false,
        }
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExternType::Function(t) => write!(f, "func {}", t),
            ExternType::Table(t) => write!(f, "table {}", t),
            ExternType::Memory(m) => write!(f, "memory {}", m),
            ExternType::Global(g) => write!(f, "global {}", g),
        }
    }
}
