//! Test utilities for runtime testing
//!
//! Runtime tests describe a single function body and check what it leaves on
//! the stack. The builder wraps the body in a real module, so everything goes
//! through validation and instantiation exactly like a decoded module would.

pub mod test {
    use crate::parser::instruction::Instruction;
    use crate::parser::module::{
        Data, Export, ExportDescriptor, Function, FunctionType, Global, GlobalType, Limits, MemoryType, Module,
        ValueType,
    };
    use crate::runtime::{RuntimeError, Value};

    /// Test builder for creating executor tests fluently
    pub struct ExecutorTest {
        instructions: Vec<Instruction>,
        params: Option<Vec<ValueType>>,
        args: Vec<Value>,
        locals: Vec<ValueType>,
        return_types: Vec<ValueType>,
        globals: Vec<Global>,
        memory: Option<Limits>,
        data: Vec<Data>,
    }

    /// The instruction that pushes `value`
    pub fn const_instruction(value: Value) -> Instruction {
        match value {
            Value::I32(value) => Instruction::I32Const { value },
            Value::I64(value) => Instruction::I64Const { value },
            Value::F32(value) => Instruction::F32Const { value },
            Value::F64(value) => Instruction::F64Const { value },
        }
    }

    impl ExecutorTest {
        pub fn new() -> Self {
            ExecutorTest {
                instructions: Vec::new(),
                params: None,
                args: Vec::new(),
                locals: Vec::new(),
                return_types: Vec::new(),
                globals: Vec::new(),
                memory: None,
                data: Vec::new(),
            }
        }

        pub fn inst(mut self, instruction: Instruction) -> Self {
            self.instructions.push(instruction);
            self
        }

        pub fn insts(mut self, instructions: Vec<Instruction>) -> Self {
            self.instructions.extend(instructions);
            self
        }

        /// Push a constant onto the stack
        pub fn push(self, value: Value) -> Self {
            self.inst(const_instruction(value))
        }

        /// Parameter types; when unset they follow the arguments
        pub fn params(mut self, params: Vec<ValueType>) -> Self {
            self.params = Some(params);
            self
        }

        pub fn arg(mut self, value: Value) -> Self {
            self.args.push(value);
            self
        }

        pub fn args(mut self, args: Vec<Value>) -> Self {
            self.args = args;
            self
        }

        pub fn locals(mut self, locals: Vec<ValueType>) -> Self {
            self.locals = locals;
            self
        }

        pub fn returns(mut self, types: Vec<ValueType>) -> Self {
            self.return_types = types;
            self
        }

        pub fn global(mut self, value_type: ValueType, mutable: bool, init: Value) -> Self {
            self.globals.push(Global {
                global_type: GlobalType { value_type, mutable },
                init: vec![const_instruction(init)],
            });
            self
        }

        /// One page of memory with no maximum
        pub fn with_memory(self) -> Self {
            self.with_memory_limits(1, None)
        }

        pub fn with_memory_limits(mut self, min: u32, max: Option<u32>) -> Self {
            self.memory = Some(Limits { min, max });
            self
        }

        /// Initialise memory at `offset`, adding a memory if there isn't one
        pub fn with_data(mut self, offset: u32, bytes: &[u8]) -> Self {
            if self.memory.is_none() {
                self.memory = Some(Limits { min: 1, max: None });
            }
            self.data.push(Data {
                memory_idx: 0,
                offset: vec![Instruction::I32Const { value: offset as i32 }],
                init: bytes.to_vec(),
            });
            self
        }

        pub fn module(&self) -> Module {
            let parameters = self
                .params
                .clone()
                .unwrap_or_else(|| self.args.iter().map(Value::typ).collect());
            Module {
                types: vec![FunctionType {
                    parameters,
                    return_types: self.return_types.clone(),
                }],
                functions: vec![Function {
                    type_idx: 0,
                    locals: self.locals.clone(),
                    body: self.instructions.clone(),
                }],
                memories: self.memory.iter().map(|limits| MemoryType { limits: *limits }).collect(),
                globals: self.globals.clone(),
                data: self.data.clone(),
                exports: vec![Export {
                    name: "test".to_string(),
                    descriptor: ExportDescriptor::Function(0),
                }],
                ..Module::default()
            }
        }

        /// Instantiate the module and call the function under test
        pub fn run(&self) -> Result<Vec<Value>, RuntimeError> {
            let mut vm = self.module().instantiate(&[])?;
            vm.invoke_export("test", &self.args)
        }

        pub fn expect_stack(self, expected: Vec<Value>) {
            let actual = match self.run() {
                Ok(values) => values,
                Err(e) => panic!("execution failed: {}", e),
            };
            assert_eq!(
                actual.len(),
                expected.len(),
                "expected {:?}, got {:?}",
                expected,
                actual
            );
            for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
                assert!(
                    same_value(a, e),
                    "value {} differs: expected {:?}, got {:?}",
                    i,
                    e,
                    a
                );
            }
        }

        pub fn expect_error(self, contains: &str) {
            match self.run() {
                Ok(values) => panic!("expected error containing {:?}, got {:?}", contains, values),
                Err(e) => assert!(
                    e.to_string().contains(contains),
                    "expected error containing {:?}, got {:?}",
                    contains,
                    e.to_string()
                ),
            }
        }
    }

    impl Default for ExecutorTest {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Bitwise equality, except any two NaNs of the same type match
    fn same_value(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::F32(x), Value::F32(y)) if x.is_nan() && y.is_nan() => true,
            (Value::F64(x), Value::F64(y)) if x.is_nan() && y.is_nan() => true,
            _ => a.bit_eq(b),
        }
    }
}
