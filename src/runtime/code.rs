//! Function bodies laid out for execution
//!
//! The decoder hands out nested bodies. When a function is allocated its body
//! is laid out as one sequence in which every `block`, `loop` and `if` refers
//! to its matching `else` and `end` by position. The executor then needs
//! nothing but a program counter per call, however deeply the body nests.

use crate::parser::instruction::Instruction;
use crate::parser::module::{Function, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Enter a block whose `end` is at the given position
    Block { arity: usize, end: usize },
    /// Enter a loop; branching to it comes back to this op
    Loop,
    /// Pop the condition and enter the then arm, or jump past `else_pc`
    If { arity: usize, else_pc: usize, end: usize },
    /// Reached when a then arm runs out; skips the else arm
    Else { end: usize },
    /// Leave the innermost block, loop or if
    End,
    Instr(Instruction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    /// Declared locals, not counting parameters
    pub locals: Vec<ValueType>,
    pub ops: Vec<Op>,
}

impl Code {
    pub fn compile(function: &Function) -> Code {
        let mut ops = Vec::new();
        flatten(&function.body, &mut ops);
        Code {
            locals: function.locals.clone(),
            ops,
        }
    }
}

fn flatten(body: &[Instruction], ops: &mut Vec<Op>) {
    for instruction in body {
        match instruction {
            Instruction::Block { block_type, body } => {
                let start = ops.len();
                ops.push(Op::End);
                flatten(body, ops);
                let end = ops.len();
                ops.push(Op::End);
                ops[start] = Op::Block {
                    arity: block_type.arity(),
                    end,
                };
            }
            Instruction::Loop { body, .. } => {
                ops.push(Op::Loop);
                flatten(body, ops);
                ops.push(Op::End);
            }
            Instruction::If {
                block_type,
                then_body,
                else_body,
            } => {
                let start = ops.len();
                ops.push(Op::End);
                flatten(then_body, ops);
                let else_pc = ops.len();
                ops.push(Op::End);
                flatten(else_body, ops);
                let end = ops.len();
                ops.push(Op::End);
                ops[start] = Op::If {
                    arity: block_type.arity(),
                    else_pc,
                    end,
                };
                ops[else_pc] = Op::Else { end };
            }
            other => ops.push(Op::Instr(other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::BlockType;
    use Instruction::*;

    fn compile(body: Vec<Instruction>) -> Vec<Op> {
        Code::compile(&Function {
            type_idx: 0,
            locals: vec![],
            body,
        })
        .ops
    }

    #[test]
    fn test_straight_line_is_unchanged() {
        assert_eq!(
            compile(vec![I32Const { value: 1 }, Drop]),
            vec![Op::Instr(I32Const { value: 1 }), Op::Instr(Drop)]
        );
    }

    #[test]
    fn test_nested_positions() {
        let ops = compile(vec![Block {
            block_type: BlockType::Value(ValueType::I32),
            body: vec![
                I32Const { value: 1 },
                If {
                    block_type: BlockType::Empty,
                    then_body: vec![Nop],
                    else_body: vec![],
                },
                Loop {
                    block_type: BlockType::Empty,
                    body: vec![],
                },
            ],
        }]);
        assert_eq!(
            ops,
            vec![
                Op::Block { arity: 1, end: 8 },
                Op::Instr(I32Const { value: 1 }),
                Op::If {
                    arity: 0,
                    else_pc: 4,
                    end: 5
                },
                Op::Instr(Nop),
                Op::Else { end: 5 },
                Op::End,
                Op::Loop,
                Op::End,
                Op::End,
            ]
        );
    }
}
