use super::{Io, OpError, Value};

/// Functions callable from source programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    /// `read()`: next integer token of the input, `0` when none is left.
    Read,
    /// `getc()`: code point of the next input character, `0` at end of input.
    GetChar,
    /// `putc(c)`: writes the ASCII character `c` without a newline and
    /// evaluates to `c`. Codes outside `0..=127` write nothing.
    PutChar,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 3] = [
        BuiltinFunction::Read,
        BuiltinFunction::GetChar,
        BuiltinFunction::PutChar,
    ];

    /// Stable id used as the operand of `CallBuiltin` in bytecode.
    pub fn id(self) -> u32 {
        match self {
            Self::Read => 1,
            Self::GetChar => 2,
            Self::PutChar => 3,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::GetChar => "getc",
            Self::PutChar => "putc",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Read | Self::GetChar => 0,
            Self::PutChar => 1,
        }
    }

    /// Runs the builtin on already evaluated arguments; `args.len()` has been
    /// checked against [`BuiltinFunction::arity`] by the caller.
    pub fn call(self, args: &[Value], io: &mut Io) -> Result<Value, OpError> {
        match self {
            Self::Read => Ok(Value::number(
                io.input.read_integer().unwrap_or(0) as f64,
            )),
            Self::GetChar => Ok(Value::number(
                io.input.read_char().map_or(0.0, |c| f64::from(u32::from(c))),
            )),
            Self::PutChar => match args {
                [Value::Number(number)] => {
                    if let Some(c) = ascii(number.value) {
                        io.output.push_char(c);
                    }
                    Ok(Value::Number(*number))
                }
                [other] => Err(OpError::UnsupportedOperand {
                    operator: self.name(),
                    operand: other.type_name(),
                }),
                _ => Err(OpError::UnsupportedOperand {
                    operator: self.name(),
                    operand: "argument list",
                }),
            },
        }
    }
}

fn ascii(code: f64) -> Option<char> {
    if code.fract() != 0.0 || !(0.0..=127.0).contains(&code) {
        return None;
    }
    char::from_u32(code as u32)
}
