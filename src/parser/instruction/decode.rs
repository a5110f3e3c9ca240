//! Instruction decoding from binary format

use super::super::limits;
use super::{BlockType, Instruction, MemArg};
use crate::parser::module::ValueType;
use crate::parser::reader::Reader;
use crate::parser::DecodeError;

const OPCODE_ELSE: u8 = 0x05;
const OPCODE_END: u8 = 0x0B;
const BLOCK_TYPE_EMPTY: u8 = 0x40;

impl MemArg {
    /// Decode a memory argument from the reader
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let align = reader.read_vu32()?;
        let offset = reader.read_vu32()?;
        Ok(MemArg { align, offset })
    }
}

impl BlockType {
    /// Decode a block type from the reader
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let b = reader.read_byte()?;
        if b == BLOCK_TYPE_EMPTY {
            return Ok(BlockType::Empty);
        }
        ValueType::decode(b)
            .map(BlockType::Value)
            .ok_or(DecodeError::InvalidValueType(b))
    }
}

/// Decode an instruction sequence up to and including its terminating `end`.
/// Used for function bodies and constant expressions.
pub fn decode_expr(reader: &mut Reader) -> Result<Vec<Instruction>, DecodeError> {
    let (body, _) = decode_sequence(reader, false)?;
    Ok(body)
}

/// Decode instructions until `end`, or until `else` when `allow_else` is set.
/// Returns the body along with whichever terminator was consumed.
fn decode_sequence(reader: &mut Reader, allow_else: bool) -> Result<(Vec<Instruction>, u8), DecodeError> {
    let mut body = Vec::new();
    loop {
        match reader.peek_byte() {
            None => return Err(DecodeError::UnexpectedEof),
            Some(OPCODE_END) => break,
            Some(OPCODE_ELSE) if allow_else => break,
            Some(_) => body.push(Instruction::decode(reader)?),
        }
    }
    let allowed: &[u8] = if allow_else {
        &[OPCODE_ELSE, OPCODE_END]
    } else {
        &[OPCODE_END]
    };
    let terminator = reader.expect_byte(allowed, "end of instruction sequence")?;
    Ok((body, terminator))
}

fn decode_block(reader: &mut Reader) -> Result<(BlockType, Vec<Instruction>), DecodeError> {
    let block_type = BlockType::decode(reader)?;
    reader.enter_block()?;
    let body = decode_expr(reader)?;
    reader.exit_block();
    Ok((block_type, body))
}

fn decode_if(reader: &mut Reader) -> Result<Instruction, DecodeError> {
    let block_type = BlockType::decode(reader)?;
    reader.enter_block()?;
    let (then_body, terminator) = decode_sequence(reader, true)?;
    let else_body = if terminator == OPCODE_ELSE {
        decode_expr(reader)?
    } else {
        Vec::new()
    };
    reader.exit_block();
    Ok(Instruction::If {
        block_type,
        then_body,
        else_body,
    })
}

impl Instruction {
    /// Decode a single instruction from the reader. `block`, `loop` and `if`
    /// consume their whole nested body, including the closing `end`.
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let opcode = reader.read_byte()?;

        // structured instructions recurse; keep the large match below off
        // that path so each nesting level costs a small native frame
        match opcode {
            0x02 => {
                let (block_type, body) = decode_block(reader)?;
                Ok(Instruction::Block { block_type, body })
            }
            0x03 => {
                let (block_type, body) = decode_block(reader)?;
                Ok(Instruction::Loop { block_type, body })
            }
            0x04 => decode_if(reader),
            _ => Instruction::decode_plain(opcode, reader),
        }
    }

    fn decode_plain(opcode: u8, reader: &mut Reader) -> Result<Self, DecodeError> {
        use Instruction::*;
        match opcode {
            // Control instructions (0x00-0x11)
            0x00 => Ok(Unreachable),
            0x01 => Ok(Nop),
            0x0C => Ok(Br {
                label_idx: reader.read_vu32()?,
            }),
            0x0D => Ok(BrIf {
                label_idx: reader.read_vu32()?,
            }),
            0x0E => {
                // BrTable
                let count = reader.read_vu32()?;
                if count > limits::MAX_BR_TABLE_LABELS {
                    return Err(DecodeError::LimitExceeded("br_table label count"));
                }
                let mut labels = Vec::with_capacity((count as usize).min(reader.remaining()));
                for _ in 0..count {
                    labels.push(reader.read_vu32()?);
                }
                let default = reader.read_vu32()?;
                Ok(BrTable { labels, default })
            }
            0x0F => Ok(Return),
            0x10 => Ok(Call {
                func_idx: reader.read_vu32()?,
            }),
            0x11 => {
                let type_idx = reader.read_vu32()?;
                reader.expect_byte(&[0x00], "call_indirect reserved byte")?;
                Ok(CallIndirect { type_idx })
            }

            // Parametric instructions (0x1A-0x1B)
            0x1A => Ok(Drop),
            0x1B => Ok(Select),

            // Variable instructions (0x20-0x24)
            0x20 => Ok(LocalGet {
                local_idx: reader.read_vu32()?,
            }),
            0x21 => Ok(LocalSet {
                local_idx: reader.read_vu32()?,
            }),
            0x22 => Ok(LocalTee {
                local_idx: reader.read_vu32()?,
            }),
            0x23 => Ok(GlobalGet {
                global_idx: reader.read_vu32()?,
            }),
            0x24 => Ok(GlobalSet {
                global_idx: reader.read_vu32()?,
            }),

            // Memory instructions (0x28-0x40)
            0x28 => Ok(I32Load {
                memarg: MemArg::decode(reader)?,
            }),
            0x29 => Ok(I64Load {
                memarg: MemArg::decode(reader)?,
            }),
            0x2A => Ok(F32Load {
                memarg: MemArg::decode(reader)?,
            }),
            0x2B => Ok(F64Load {
                memarg: MemArg::decode(reader)?,
            }),
            0x2C => Ok(I32Load8S {
                memarg: MemArg::decode(reader)?,
            }),
            0x2D => Ok(I32Load8U {
                memarg: MemArg::decode(reader)?,
            }),
            0x2E => Ok(I32Load16S {
                memarg: MemArg::decode(reader)?,
            }),
            0x2F => Ok(I32Load16U {
                memarg: MemArg::decode(reader)?,
            }),
            0x30 => Ok(I64Load8S {
                memarg: MemArg::decode(reader)?,
            }),
            0x31 => Ok(I64Load8U {
                memarg: MemArg::decode(reader)?,
            }),
            0x32 => Ok(I64Load16S {
                memarg: MemArg::decode(reader)?,
            }),
            0x33 => Ok(I64Load16U {
                memarg: MemArg::decode(reader)?,
            }),
            0x34 => Ok(I64Load32S {
                memarg: MemArg::decode(reader)?,
            }),
            0x35 => Ok(I64Load32U {
                memarg: MemArg::decode(reader)?,
            }),
            0x36 => Ok(I32Store {
                memarg: MemArg::decode(reader)?,
            }),
            0x37 => Ok(I64Store {
                memarg: MemArg::decode(reader)?,
            }),
            0x38 => Ok(F32Store {
                memarg: MemArg::decode(reader)?,
            }),
            0x39 => Ok(F64Store {
                memarg: MemArg::decode(reader)?,
            }),
            0x3A => Ok(I32Store8 {
                memarg: MemArg::decode(reader)?,
            }),
            0x3B => Ok(I32Store16 {
                memarg: MemArg::decode(reader)?,
            }),
            0x3C => Ok(I64Store8 {
                memarg: MemArg::decode(reader)?,
            }),
            0x3D => Ok(I64Store16 {
                memarg: MemArg::decode(reader)?,
            }),
            0x3E => Ok(I64Store32 {
                memarg: MemArg::decode(reader)?,
            }),
            0x3F => {
                reader.expect_byte(&[0x00], "memory.size reserved byte")?;
                Ok(MemorySize)
            }
            0x40 => {
                reader.expect_byte(&[0x00], "memory.grow reserved byte")?;
                Ok(MemoryGrow)
            }

            // Numeric instructions - constants (0x41-0x44)
            0x41 => Ok(I32Const {
                value: reader.read_vs32()?,
            }),
            0x42 => Ok(I64Const {
                value: reader.read_vs64()?,
            }),
            0x43 => Ok(F32Const {
                value: reader.read_f32()?,
            }),
            0x44 => Ok(F64Const {
                value: reader.read_f64()?,
            }),

            // Numeric instructions - comparison (0x45-0x66)
            0x45 => Ok(I32Eqz),
            0x46 => Ok(I32Eq),
            0x47 => Ok(I32Ne),
            0x48 => Ok(I32LtS),
            0x49 => Ok(I32LtU),
            0x4A => Ok(I32GtS),
            0x4B => Ok(I32GtU),
            0x4C => Ok(I32LeS),
            0x4D => Ok(I32LeU),
            0x4E => Ok(I32GeS),
            0x4F => Ok(I32GeU),
            0x50 => Ok(I64Eqz),
            0x51 => Ok(I64Eq),
            0x52 => Ok(I64Ne),
            0x53 => Ok(I64LtS),
            0x54 => Ok(I64LtU),
            0x55 => Ok(I64GtS),
            0x56 => Ok(I64GtU),
            0x57 => Ok(I64LeS),
            0x58 => Ok(I64LeU),
            0x59 => Ok(I64GeS),
            0x5A => Ok(I64GeU),
            0x5B => Ok(F32Eq),
            0x5C => Ok(F32Ne),
            0x5D => Ok(F32Lt),
            0x5E => Ok(F32Gt),
            0x5F => Ok(F32Le),
            0x60 => Ok(F32Ge),
            0x61 => Ok(F64Eq),
            0x62 => Ok(F64Ne),
            0x63 => Ok(F64Lt),
            0x64 => Ok(F64Gt),
            0x65 => Ok(F64Le),
            0x66 => Ok(F64Ge),

            // Numeric instructions - arithmetic (0x67-0xA6)
            0x67 => Ok(I32Clz),
            0x68 => Ok(I32Ctz),
            0x69 => Ok(I32Popcnt),
            0x6A => Ok(I32Add),
            0x6B => Ok(I32Sub),
            0x6C => Ok(I32Mul),
            0x6D => Ok(I32DivS),
            0x6E => Ok(I32DivU),
            0x6F => Ok(I32RemS),
            0x70 => Ok(I32RemU),
            0x71 => Ok(I32And),
            0x72 => Ok(I32Or),
            0x73 => Ok(I32Xor),
            0x74 => Ok(I32Shl),
            0x75 => Ok(I32ShrS),
            0x76 => Ok(I32ShrU),
            0x77 => Ok(I32Rotl),
            0x78 => Ok(I32Rotr),
            0x79 => Ok(I64Clz),
            0x7A => Ok(I64Ctz),
            0x7B => Ok(I64Popcnt),
            0x7C => Ok(I64Add),
            0x7D => Ok(I64Sub),
            0x7E => Ok(I64Mul),
            0x7F => Ok(I64DivS),
            0x80 => Ok(I64DivU),
            0x81 => Ok(I64RemS),
            0x82 => Ok(I64RemU),
            0x83 => Ok(I64And),
            0x84 => Ok(I64Or),
            0x85 => Ok(I64Xor),
            0x86 => Ok(I64Shl),
            0x87 => Ok(I64ShrS),
            0x88 => Ok(I64ShrU),
            0x89 => Ok(I64Rotl),
            0x8A => Ok(I64Rotr),
            0x8B => Ok(F32Abs),
            0x8C => Ok(F32Neg),
            0x8D => Ok(F32Ceil),
            0x8E => Ok(F32Floor),
            0x8F => Ok(F32Trunc),
            0x90 => Ok(F32Nearest),
            0x91 => Ok(F32Sqrt),
            0x92 => Ok(F32Add),
            0x93 => Ok(F32Sub),
            0x94 => Ok(F32Mul),
            0x95 => Ok(F32Div),
            0x96 => Ok(F32Min),
            0x97 => Ok(F32Max),
            0x98 => Ok(F32Copysign),
            0x99 => Ok(F64Abs),
            0x9A => Ok(F64Neg),
            0x9B => Ok(F64Ceil),
            0x9C => Ok(F64Floor),
            0x9D => Ok(F64Trunc),
            0x9E => Ok(F64Nearest),
            0x9F => Ok(F64Sqrt),
            0xA0 => Ok(F64Add),
            0xA1 => Ok(F64Sub),
            0xA2 => Ok(F64Mul),
            0xA3 => Ok(F64Div),
            0xA4 => Ok(F64Min),
            0xA5 => Ok(F64Max),
            0xA6 => Ok(F64Copysign),

            // Numeric instructions - conversions (0xA7-0xBF)
            0xA7 => Ok(I32WrapI64),
            0xA8 => Ok(I32TruncF32S),
            0xA9 => Ok(I32TruncF32U),
            0xAA => Ok(I32TruncF64S),
            0xAB => Ok(I32TruncF64U),
            0xAC => Ok(I64ExtendI32S),
            0xAD => Ok(I64ExtendI32U),
            0xAE => Ok(I64TruncF32S),
            0xAF => Ok(I64TruncF32U),
            0xB0 => Ok(I64TruncF64S),
            0xB1 => Ok(I64TruncF64U),
            0xB2 => Ok(F32ConvertI32S),
            0xB3 => Ok(F32ConvertI32U),
            0xB4 => Ok(F32ConvertI64S),
            0xB5 => Ok(F32ConvertI64U),
            0xB6 => Ok(F32DemoteF64),
            0xB7 => Ok(F64ConvertI32S),
            0xB8 => Ok(F64ConvertI32U),
            0xB9 => Ok(F64ConvertI64S),
            0xBA => Ok(F64ConvertI64U),
            0xBB => Ok(F64PromoteF32),
            0xBC => Ok(I32ReinterpretF32),
            0xBD => Ok(I64ReinterpretF64),
            0xBE => Ok(F32ReinterpretI32),
            0xBF => Ok(F64ReinterpretI64),

            // else/end outside their construct land here too
            _ => Err(DecodeError::InvalidOpcode(opcode)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
        decode_expr(&mut Reader::new(bytes.to_vec()))
    }

    #[test]
    fn test_decode_flat() {
        let body = decode_all(&[0x41, 0x7E, 0x41, 0x03, 0x6A, 0x1A, 0x0B]).unwrap();
        assert_eq!(
            body,
            vec![
                Instruction::I32Const { value: -2 },
                Instruction::I32Const { value: 3 },
                Instruction::I32Add,
                Instruction::Drop,
            ]
        );
    }

    #[test]
    fn test_decode_nested_blocks() {
        // block (result i32) loop i32.const 1 br_if 0 end i32.const 2 end end
        let bytes = [
            0x02, 0x7F, 0x03, 0x40, 0x41, 0x01, 0x0D, 0x00, 0x0B, 0x41, 0x02, 0x0B, 0x0B,
        ];
        let body = decode_all(&bytes).unwrap();
        assert_eq!(
            body,
            vec![Instruction::Block {
                block_type: BlockType::Value(ValueType::I32),
                body: vec![
                    Instruction::Loop {
                        block_type: BlockType::Empty,
                        body: vec![
                            Instruction::I32Const { value: 1 },
                            Instruction::BrIf { label_idx: 0 },
                        ],
                    },
                    Instruction::I32Const { value: 2 },
                ],
            }]
        );
    }

    #[test]
    fn test_decode_if_else() {
        let with_else = decode_all(&[0x04, 0x40, 0x01, 0x05, 0x00, 0x0B, 0x0B]).unwrap();
        assert_eq!(
            with_else,
            vec![Instruction::If {
                block_type: BlockType::Empty,
                then_body: vec![Instruction::Nop],
                else_body: vec![Instruction::Unreachable],
            }]
        );

        let without_else = decode_all(&[0x04, 0x40, 0x01, 0x0B, 0x0B]).unwrap();
        assert_eq!(
            without_else,
            vec![Instruction::If {
                block_type: BlockType::Empty,
                then_body: vec![Instruction::Nop],
                else_body: vec![],
            }]
        );
    }

    #[test]
    fn test_reserved_bytes() {
        assert_eq!(
            decode_all(&[0x3F, 0x00, 0x40, 0x00, 0x11, 0x02, 0x00, 0x0B]).unwrap(),
            vec![
                Instruction::MemorySize,
                Instruction::MemoryGrow,
                Instruction::CallIndirect { type_idx: 2 },
            ]
        );

        match decode_all(&[0x3F, 0x01, 0x0B]) {
            Err(DecodeError::UnexpectedByte {
                received, expected, ..
            }) => {
                assert_eq!(received, 0x01);
                assert_eq!(expected, vec![0x00]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_memarg_and_br_table() {
        assert_eq!(
            decode_all(&[0x28, 0x02, 0x10, 0x0E, 0x02, 0x00, 0x01, 0x02, 0x0B]).unwrap(),
            vec![
                Instruction::I32Load {
                    memarg: MemArg { align: 2, offset: 16 }
                },
                Instruction::BrTable {
                    labels: vec![0, 1],
                    default: 2
                },
            ]
        );
    }

    #[test]
    fn test_invalid_opcodes() {
        // sign extension (post-MVP), a stray else, and SIMD prefix
        for op in [0xC0u8, 0x05, 0xFD, 0xFC, 0x06] {
            match decode_all(&[op, 0x0B]) {
                Err(DecodeError::InvalidOpcode(got)) => assert_eq!(got, op),
                other => panic!("unexpected result for {:#04x}: {:?}", op, other),
            }
        }
    }

    #[test]
    fn test_invalid_block_type() {
        assert!(matches!(
            decode_all(&[0x02, 0x70, 0x0B, 0x0B]),
            Err(DecodeError::InvalidValueType(0x70))
        ));
    }

    #[test]
    fn test_truncated_body() {
        assert!(matches!(
            decode_all(&[0x02, 0x40, 0x01]),
            Err(DecodeError::UnexpectedEof)
        ));
        assert!(matches!(decode_all(&[0x41]), Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn test_nesting_limit() {
        let depth = limits::MAX_NESTING_DEPTH + 1;
        let mut bytes = Vec::new();
        for _ in 0..depth {
            bytes.extend_from_slice(&[0x02, 0x40]);
        }
        bytes.extend(std::iter::repeat(0x0B).take(depth + 1));
        assert!(matches!(
            decode_all(&bytes),
            Err(DecodeError::LimitExceeded(_))
        ));
    }
}
