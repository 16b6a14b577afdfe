//! Binary encoding of a [`CompiledProgram`].
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! magic          16 bytes  "MANDRILLBYTECODE"
//! version        u32
//! slot_count     u32
//! constant_count u32
//! instr_count    u32
//! slot names     slot_count x (u32 length, UTF-8 bytes)
//! constants      constant_count x (u8 tag, payload)
//! instructions   instr_count x (u32 opcode, u32 operand)
//! ```
//!
//! Constant payloads: tag 0 is an f64, tag 1 a single 0/1 byte, tag 2 a
//! length-prefixed string and tag 3 an f64 followed by the literal's scale
//! (the digit count printed after the decimal point).

use thiserror::Error;
use tracing::debug;

use crate::runtime::{BuiltinFunction, Number, Value};

use super::{CompiledProgram, Instruction};

pub const MAGIC: &[u8; 16] = b"MANDRILLBYTECODE";
pub const VERSION: u32 = 1;

const TAG_NUMBER: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_SCALED_NUMBER: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Not a bytecode file: bad magic number")]
    BadMagic,
    #[error("Unsupported bytecode version {version} (expected {VERSION})")]
    UnsupportedVersion { version: u32 },
    #[error("Unexpected end of bytecode at byte {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("Unknown constant tag {tag} at byte {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },
    #[error("Invalid boolean constant {value} at byte {offset}")]
    InvalidBoolean { value: u8, offset: usize },
    #[error("Invalid UTF-8 string at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("Unknown opcode {opcode} at instruction {index}")]
    UnknownOpcode { opcode: u32, index: usize },
    #[error("Unknown builtin function id {id} at instruction {index}")]
    UnknownBuiltin { id: u32, index: usize },
    #[error("{count} trailing bytes after the last instruction")]
    TrailingBytes { count: usize },
    #[error("{what} of {len} does not fit the bytecode format")]
    TooLarge { what: &'static str, len: usize },
}

type DecodeResult<T> = std::result::Result<T, DecodeError>;

fn opcode(instruction: Instruction) -> (u32, u32) {
    match instruction {
        Instruction::Halt => (0, 0),
        Instruction::PushConstant(index) => (1, index),
        Instruction::Load(slot) => (2, slot),
        Instruction::Store(slot) => (3, slot),
        Instruction::Add => (4, 0),
        Instruction::Subtract => (5, 0),
        Instruction::Multiply => (6, 0),
        Instruction::Divide => (7, 0),
        Instruction::Modulo => (8, 0),
        Instruction::Equal => (9, 0),
        Instruction::NotEqual => (10, 0),
        Instruction::Less => (11, 0),
        Instruction::LessEqual => (12, 0),
        Instruction::Greater => (13, 0),
        Instruction::GreaterEqual => (14, 0),
        Instruction::And => (15, 0),
        Instruction::Or => (16, 0),
        Instruction::Negate => (17, 0),
        Instruction::Not => (18, 0),
        Instruction::Jump(target) => (19, target),
        Instruction::JumpIfFalse(target) => (20, target),
        Instruction::Print => (21, 0),
        Instruction::Pop => (22, 0),
        Instruction::CallBuiltin(builtin) => (23, builtin.id()),
    }
}

fn instruction(opcode: u32, operand: u32, index: usize) -> DecodeResult<Instruction> {
    let instruction = match opcode {
        0 => Instruction::Halt,
        1 => Instruction::PushConstant(operand),
        2 => Instruction::Load(operand),
        3 => Instruction::Store(operand),
        4 => Instruction::Add,
        5 => Instruction::Subtract,
        6 => Instruction::Multiply,
        7 => Instruction::Divide,
        8 => Instruction::Modulo,
        9 => Instruction::Equal,
        10 => Instruction::NotEqual,
        11 => Instruction::Less,
        12 => Instruction::LessEqual,
        13 => Instruction::Greater,
        14 => Instruction::GreaterEqual,
        15 => Instruction::And,
        16 => Instruction::Or,
        17 => Instruction::Negate,
        18 => Instruction::Not,
        19 => Instruction::Jump(operand),
        20 => Instruction::JumpIfFalse(operand),
        21 => Instruction::Print,
        22 => Instruction::Pop,
        23 => Instruction::CallBuiltin(
            BuiltinFunction::from_id(operand)
                .ok_or(DecodeError::UnknownBuiltin { id: operand, index })?,
        ),
        _ => return Err(DecodeError::UnknownOpcode { opcode, index }),
    };
    Ok(instruction)
}

pub fn encode(program: &CompiledProgram) -> DecodeResult<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    write_u32(&mut out, VERSION);
    write_len(&mut out, program.slot_names.len(), "slot count")?;
    write_len(&mut out, program.constants.len(), "constant count")?;
    write_len(&mut out, program.instructions.len(), "instruction count")?;

    for name in &program.slot_names {
        write_str(&mut out, name)?;
    }
    for constant in &program.constants {
        match constant {
            Value::Number(number) => {
                match number.scale {
                    Some(_) => out.push(TAG_SCALED_NUMBER),
                    None => out.push(TAG_NUMBER),
                }
                out.extend_from_slice(&number.value.to_bits().to_be_bytes());
                out.extend(number.scale);
            }
            Value::Boolean(value) => {
                out.push(TAG_BOOLEAN);
                out.push(u8::from(*value));
            }
            Value::String(value) => {
                out.push(TAG_STRING);
                write_str(&mut out, value)?;
            }
        }
    }
    for instruction in &program.instructions {
        let (opcode, operand) = opcode(*instruction);
        write_u32(&mut out, opcode);
        write_u32(&mut out, operand);
    }

    debug!(bytes = out.len(), "encoded bytecode");
    Ok(out)
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_len(out: &mut Vec<u8>, len: usize, what: &'static str) -> DecodeResult<()> {
    let value = u32::try_from(len).map_err(|_| DecodeError::TooLarge { what, len })?;
    write_u32(out, value);
    Ok(())
}

fn write_str(out: &mut Vec<u8>, value: &str) -> DecodeResult<()> {
    write_len(out, value.len(), "string length")?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

pub fn decode(bytes: &[u8]) -> DecodeResult<CompiledProgram> {
    let mut reader = Reader { bytes, offset: 0 };

    if reader.take(MAGIC.len()).ok() != Some(MAGIC.as_slice()) {
        return Err(DecodeError::BadMagic);
    }
    let version = reader.u32()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    let slot_count = reader.u32()? as usize;
    let constant_count = reader.u32()? as usize;
    let instruction_count = reader.u32()? as usize;

    let mut slot_names = Vec::new();
    for _ in 0..slot_count {
        slot_names.push(reader.string()?);
    }

    let mut constants = Vec::new();
    for _ in 0..constant_count {
        let offset = reader.offset;
        let constant = match reader.u8()? {
            TAG_NUMBER => Value::number(reader.f64()?),
            TAG_SCALED_NUMBER => {
                let value = reader.f64()?;
                Value::Number(Number::with_scale(value, reader.u8()?))
            }
            TAG_BOOLEAN => {
                let offset = reader.offset;
                match reader.u8()? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    value => return Err(DecodeError::InvalidBoolean { value, offset }),
                }
            }
            TAG_STRING => Value::String(reader.string()?),
            tag => return Err(DecodeError::UnknownConstantTag { tag, offset }),
        };
        constants.push(constant);
    }

    let mut instructions = Vec::new();
    for index in 0..instruction_count {
        let opcode = reader.u32()?;
        let operand = reader.u32()?;
        instructions.push(instruction(opcode, operand, index)?);
    }

    let remaining = bytes.len() - reader.offset;
    if remaining != 0 {
        return Err(DecodeError::TrailingBytes { count: remaining });
    }

    debug!(
        instructions = instructions.len(),
        constants = constants.len(),
        "decoded bytecode"
    );
    Ok(CompiledProgram {
        constants,
        instructions,
        slot_names,
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let available = self.bytes.len() - self.offset;
        if available < len {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: len - available,
            });
        }
        let bytes = self.bytes;
        let slice = &bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn f64(&mut self) -> DecodeResult<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.array()?)))
    }

    fn string(&mut self) -> DecodeResult<String> {
        let len = self.u32()? as usize;
        let offset = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }
}
