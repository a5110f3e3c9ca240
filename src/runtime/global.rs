use super::{RuntimeError, Value};
use crate::parser::module::GlobalType;

#[derive(Debug, Clone)]
pub struct GlobalInstance {
    pub global_type: GlobalType,
    value: Value,
}

impl GlobalInstance {
    pub fn new(global_type: GlobalType, value: Value) -> Result<Self, RuntimeError> {
        if value.typ() != global_type.value_type {
            return Err(RuntimeError::TypeMismatch {
                expected: global_type.value_type,
                actual: value.typ(),
            });
        }
        Ok(GlobalInstance { global_type, value })
    }

    pub fn get(&self) -> Value {
        self.value
    }

    /// Overwrite a mutable global; the value must keep the global's type
    pub fn set(&mut self, value: Value) -> Result<(), RuntimeError> {
        if !self.global_type.mutable {
            return Err(RuntimeError::ImmutableGlobal);
        }
        if value.typ() != self.global_type.value_type {
            return Err(RuntimeError::TypeMismatch {
                expected: self.global_type.value_type,
                actual: value.typ(),
            });
        }
        self.value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::ValueType;

    #[test]
    fn test_global_set() {
        let mut g = GlobalInstance::new(
            GlobalType {
                value_type: ValueType::I64,
                mutable: true,
            },
            Value::I64(1),
        )
        .unwrap();
        g.set(Value::I64(2)).unwrap();
        assert_eq!(g.get(), Value::I64(2));
        assert!(matches!(g.set(Value::I32(3)), Err(RuntimeError::TypeMismatch { .. })));
    }

    #[test]
    fn test_immutable_global() {
        let typ = GlobalType {
            value_type: ValueType::F32,
            mutable: false,
        };
        let mut g = GlobalInstance::new(typ, Value::F32(1.5)).unwrap();
        assert!(matches!(g.set(Value::F32(2.0)), Err(RuntimeError::ImmutableGlobal)));
        assert_eq!(g.get(), Value::F32(1.5));
        assert!(GlobalInstance::new(typ, Value::I32(0)).is_err());
    }
}
