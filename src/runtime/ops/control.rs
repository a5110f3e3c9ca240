//! Control flow operations for WebAssembly
//!
//! Branches unwind the operand stack at the branch site and then report the
//! label they target through [`BlockEnd`]. The executor drops the labels in
//! between and resumes at the target's continuation.

use super::*;
use crate::runtime::control::{Label, LabelStack};
use crate::runtime::Trap;

/// How a sequence of instructions finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEnd {
    /// Carry on with the next instruction
    Normal,
    /// `return` was executed
    Return,
    /// Branch to the label this many levels out
    Branch(u32),
}

/// Keep the top `label.arity` values and drop everything else above the
/// label's entry height.
pub fn unwind(stack: &mut Stack, label: &Label) -> Result<(), RuntimeError> {
    let values = stack.pop_n(label.arity)?;
    stack.truncate(label.stack_height);
    stack.push_all(values);
    Ok(())
}

fn perform_branch(stack: &mut Stack, labels: &LabelStack, label_idx: u32) -> Result<BlockEnd, RuntimeError> {
    let label = labels.get(label_idx).ok_or(RuntimeError::InvalidIndex {
        kind: "label",
        index: label_idx,
    })?;
    unwind(stack, label)?;
    Ok(BlockEnd::Branch(label_idx))
}

/// br l
pub fn br(stack: &mut Stack, labels: &LabelStack, label_idx: u32) -> Result<BlockEnd, RuntimeError> {
    perform_branch(stack, labels, label_idx)
}

/// br_if l: branch when the popped condition is non-zero
pub fn br_if(stack: &mut Stack, labels: &LabelStack, label_idx: u32) -> Result<BlockEnd, RuntimeError> {
    if stack.pop_i32()? != 0 {
        perform_branch(stack, labels, label_idx)
    } else {
        Ok(BlockEnd::Normal)
    }
}

/// br_table l* lN: the popped operand, read as unsigned, indexes `targets`;
/// anything out of range takes `default`
pub fn br_table(
    stack: &mut Stack,
    labels: &LabelStack,
    targets: &[u32],
    default: u32,
) -> Result<BlockEnd, RuntimeError> {
    let index = stack.pop_i32()? as u32;
    let target = targets.get(index as usize).copied().unwrap_or(default);
    perform_branch(stack, labels, target)
}

pub fn unreachable() -> Result<BlockEnd, RuntimeError> {
    Err(Trap::Unreachable.into())
}

#[cfg(test)]
mod tests {
    use crate::parser::instruction::{BlockType, Instruction};
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::Value;
    use Instruction::*;

    fn i32c(value: i32) -> Instruction {
        I32Const { value }
    }

    fn block(block_type: BlockType, body: Vec<Instruction>) -> Instruction {
        Block { block_type, body }
    }

    const I32: BlockType = BlockType::Value(ValueType::I32);

    #[test]
    fn block_empty() {
        ExecutorTest::new()
            .inst(block(BlockType::Empty, vec![]))
            .inst(i32c(42))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(42)]);
    }

    #[test]
    fn block_with_value() {
        ExecutorTest::new()
            .inst(block(I32, vec![i32c(42)]))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(42)]);
    }

    #[test]
    fn br_skips_rest_of_block() {
        ExecutorTest::new()
            .inst(block(I32, vec![i32c(42), Br { label_idx: 0 }, i32c(99), Drop]))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(42)]);
    }

    #[test]
    fn br_discards_intermediate_values() {
        ExecutorTest::new()
            .inst(i32c(7))
            .inst(block(I32, vec![i32c(1), i32c(2), i32c(42), Br { label_idx: 0 }]))
            .inst(I32Add)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(49)]);
    }

    #[test]
    fn br_nested() {
        ExecutorTest::new()
            .inst(block(
                I32,
                vec![
                    block(BlockType::Empty, vec![i32c(42), Br { label_idx: 1 }, i32c(99), Drop]),
                    i32c(88),
                ],
            ))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(42)]);
    }

    #[test]
    fn br_if() {
        let body = |cond: i32| {
            vec![block(
                I32,
                vec![i32c(42), i32c(cond), BrIf { label_idx: 0 }, Drop, i32c(99)],
            )]
        };
        ExecutorTest::new()
            .insts(body(1))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(42)]);
        ExecutorTest::new()
            .insts(body(0))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(99)]);
    }

    #[test]
    fn br_table() {
        // returns 10 for 0, 20 for 1, 30 for anything else
        let body = |index: i32| {
            vec![block(
                BlockType::Empty,
                vec![
                    block(
                        BlockType::Empty,
                        vec![
                            block(
                                BlockType::Empty,
                                vec![
                                    i32c(index),
                                    BrTable {
                                        labels: vec![0, 1],
                                        default: 2,
                                    },
                                ],
                            ),
                            i32c(10),
                            Return,
                        ],
                    ),
                    i32c(20),
                    Return,
                ],
            ),
            i32c(30)]
        };
        for (index, expected) in [(0, 10), (1, 20), (2, 30), (-1, 30)] {
            ExecutorTest::new()
                .insts(body(index))
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::I32(expected)]);
        }
    }

    #[test]
    fn loop_counts_down() {
        // local 0 counts down from 5, local 1 accumulates
        ExecutorTest::new()
            .locals(vec![ValueType::I32, ValueType::I32])
            .inst(i32c(5))
            .inst(LocalSet { local_idx: 0 })
            .inst(Loop {
                block_type: BlockType::Empty,
                body: vec![
                    LocalGet { local_idx: 1 },
                    LocalGet { local_idx: 0 },
                    I32Add,
                    LocalSet { local_idx: 1 },
                    LocalGet { local_idx: 0 },
                    i32c(1),
                    I32Sub,
                    LocalTee { local_idx: 0 },
                    BrIf { label_idx: 0 },
                ],
            })
            .inst(LocalGet { local_idx: 1 })
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(15)]);
    }

    #[test]
    fn loop_falls_through_with_value() {
        ExecutorTest::new()
            .inst(Loop {
                block_type: I32,
                body: vec![i32c(3)],
            })
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(3)]);
    }

    #[test]
    fn if_else() {
        let body = |cond: i32| {
            vec![
                i32c(cond),
                If {
                    block_type: I32,
                    then_body: vec![i32c(1)],
                    else_body: vec![i32c(2)],
                },
            ]
        };
        ExecutorTest::new()
            .insts(body(7))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(1)]);
        ExecutorTest::new()
            .insts(body(0))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(2)]);
    }

    #[test]
    fn if_without_else() {
        ExecutorTest::new()
            .inst(i32c(0))
            .inst(If {
                block_type: BlockType::Empty,
                then_body: vec![Unreachable],
                else_body: vec![],
            })
            .inst(i32c(5))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(5)]);
    }

    #[test]
    fn br_out_of_if() {
        ExecutorTest::new()
            .inst(i32c(1))
            .inst(If {
                block_type: I32,
                then_body: vec![i32c(4), Br { label_idx: 0 }, Unreachable],
                else_body: vec![i32c(5)],
            })
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(4)]);
    }

    #[test]
    fn return_from_nested_blocks() {
        ExecutorTest::new()
            .inst(block(
                BlockType::Empty,
                vec![Loop {
                    block_type: BlockType::Empty,
                    body: vec![i32c(1), i32c(9), Return],
                }],
            ))
            .inst(i32c(99))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(9)]);
    }

    #[test]
    fn br_to_function_label_returns() {
        ExecutorTest::new()
            .inst(i32c(6))
            .inst(Br { label_idx: 0 })
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(6)]);
    }

    #[test]
    fn unreachable_traps() {
        ExecutorTest::new().inst(Unreachable).expect_error("unreachable");
    }

    #[test]
    fn nop() {
        ExecutorTest::new()
            .inst(Nop)
            .inst(i32c(1))
            .inst(Nop)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::I32(1)]);
    }
}
