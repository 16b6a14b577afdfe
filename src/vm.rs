use tracing::debug;

use crate::ast::Program;
use crate::backend::{Backend, PreparedBackend};
use crate::bytecode::{CompiledProgram, compile};
use crate::error::Error;
use crate::runtime::{ExecutionLimits, Io};

mod error;
mod runtime;

pub use error::{VmError, VmResult};
use runtime::VmRuntime;

/// Runtime settings for the bytecode VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmConfig {
    /// Instruction budget; `None` runs without a limit.
    pub max_steps: Option<u64>,
}

/// Bytecode backend: `prepare` compiles the AST, `execute` runs it on a fresh
/// machine.
#[derive(Debug, Clone, Default)]
pub struct VM {
    config: VmConfig,
}

impl VM {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self { config }
    }
}

/// Validated compiled unit, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct PreparedVM {
    compiled: CompiledProgram,
    config: VmConfig,
}

impl PreparedVM {
    /// Validates jump targets, constant indices and slots before any step runs.
    pub fn load(compiled: CompiledProgram, config: VmConfig) -> VmResult<Self> {
        runtime::validate(&compiled)?;
        debug!(
            instructions = compiled.instructions.len(),
            "loaded bytecode"
        );
        Ok(Self { compiled, config })
    }

    pub fn compiled(&self) -> &CompiledProgram {
        &self.compiled
    }

    pub fn run_with_io(&self, io: &mut Io) -> VmResult<()> {
        let limits = ExecutionLimits {
            max_steps: self.config.max_steps,
        };
        VmRuntime::new(&self.compiled, io, limits).execute()
    }
}

impl PreparedBackend for PreparedVM {
    fn execute(&self, io: &mut Io) -> Result<(), Error> {
        Ok(self.run_with_io(io)?)
    }
}

impl Backend for VM {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>, Error> {
        let compiled = compile(program)?;
        Ok(Box::new(PreparedVM::load(compiled, self.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Instruction;
    use crate::runtime::{BuiltinFunction, Value};
    use crate::{lexer, parser};
    use indoc::indoc;

    fn load_source(source: &str, config: VmConfig) -> PreparedVM {
        let tokens = lexer::tokenize(source).expect("tokenize failed");
        let program = parser::parse_tokens(tokens).expect("parse failed");
        PreparedVM::load(compile(&program).expect("compile failed"), config).expect("load failed")
    }

    fn run(source: &str) -> (VmResult<()>, Vec<String>) {
        let mut io = Io::default();
        let result = load_source(source, VmConfig::default()).run_with_io(&mut io);
        (result, io.output.lines().to_vec())
    }

    fn handcrafted(instructions: Vec<Instruction>) -> CompiledProgram {
        CompiledProgram {
            constants: vec![Value::number(1.0)],
            instructions,
            slot_names: vec!["x".to_string()],
        }
    }

    #[test]
    fn prints_arithmetic_with_precedence() {
        let (result, lines) = run("x = 2 + 3 * 4; print x;");
        result.expect("run failed");
        assert_eq!(lines, vec!["14"]);
    }

    #[test]
    fn runs_while_loop_and_else_branch() {
        let source = indoc! {r#"
            i = 0;
            while i < 3 { print i; i = i + 1; }
            if 1 > 2 { print "a"; } else { print "b"; }
        "#};
        let (result, lines) = run(source);
        result.expect("run failed");
        assert_eq!(lines, vec!["0", "1", "2", "b"]);
    }

    #[test]
    fn division_by_zero_faults_before_any_output() {
        let (result, lines) = run("x = 1 / 0; print x;");
        assert_eq!(
            result,
            Err(VmError::DivisionByZero {
                pc: 2,
                operator: "/"
            })
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn type_mismatch_keeps_earlier_output() {
        let (result, lines) = run(r#"print 1; print true + 1;"#);
        let err = result.expect_err("expected fault");
        assert!(matches!(err, VmError::InvalidOperands { pc: 4, .. }));
        assert_eq!(
            err.to_string(),
            "Unsupported operand types for '+': boolean and number at pc 4"
        );
        assert_eq!(lines, vec!["1"]);
    }

    #[test]
    fn unset_slot_names_the_variable() {
        let (result, _) = run("if false { z = 1; } print z;");
        assert_eq!(
            result,
            Err(VmError::UnsetSlot {
                pc: 4,
                slot: 0,
                name: "z".to_string()
            })
        );
    }

    #[test]
    fn non_boolean_condition_faults() {
        let (result, _) = run("if 1 { print 1; }");
        assert_eq!(
            result,
            Err(VmError::NonBooleanCondition {
                pc: 1,
                type_name: "number"
            })
        );
    }

    #[test]
    fn stack_underflow_on_handcrafted_code() {
        let prepared =
            PreparedVM::load(handcrafted(vec![Instruction::Add]), VmConfig::default())
                .expect("load");
        let mut io = Io::default();
        assert_eq!(
            prepared.run_with_io(&mut io),
            Err(VmError::StackUnderflow { pc: 0 })
        );

        let prepared = PreparedVM::load(
            handcrafted(vec![Instruction::CallBuiltin(BuiltinFunction::PutChar)]),
            VmConfig::default(),
        )
        .expect("load");
        let mut io = Io::default();
        assert_eq!(
            prepared.run_with_io(&mut io),
            Err(VmError::StackUnderflow { pc: 0 })
        );

        let prepared = PreparedVM::load(
            handcrafted(vec![
                Instruction::PushConstant(0),
                Instruction::Print,
                Instruction::CallBuiltin(BuiltinFunction::PutChar),
            ]),
            VmConfig::default(),
        )
        .expect("load");
        let mut io = Io::default();
        assert_eq!(
            prepared.run_with_io(&mut io),
            Err(VmError::StackUnderflow { pc: 2 })
        );
        assert_eq!(io.output.lines(), ["1"]);
    }

    #[test]
    fn load_rejects_out_of_range_operands() {
        let cases = [
            (
                vec![Instruction::Jump(5)],
                VmError::InvalidJumpTarget { pc: 0, target: 5 },
            ),
            (
                vec![Instruction::Halt, Instruction::PushConstant(1)],
                VmError::InvalidConstant { pc: 1, index: 1 },
            ),
            (
                vec![Instruction::PushConstant(0), Instruction::Store(3)],
                VmError::InvalidSlot { pc: 1, slot: 3 },
            ),
        ];
        for (instructions, expected) in cases {
            let err = PreparedVM::load(handcrafted(instructions), VmConfig::default())
                .expect_err("load should fail");
            assert_eq!(err, expected);
        }
    }

    #[test]
    fn jump_to_end_halts_cleanly() {
        let prepared = PreparedVM::load(
            handcrafted(vec![Instruction::Jump(2), Instruction::Add]),
            VmConfig::default(),
        )
        .expect("load");
        assert_eq!(prepared.run().expect("run"), "");
    }

    #[test]
    fn step_limit_is_reported_separately() {
        let prepared = load_source(
            "i = 0; while true { i = i + 1; }",
            VmConfig {
                max_steps: Some(50),
            },
        );
        let mut io = Io::default();
        let err = prepared.run_with_io(&mut io).expect_err("limit");
        assert_eq!(err, VmError::ExecutionLimitExceeded { limit: 50 });
        assert_eq!(err.pc(), None);
    }

    #[test]
    fn builtins_read_program_input() {
        let prepared = load_source(
            "a = read(); b = read(); print a * b; print getc();",
            VmConfig::default(),
        );
        let mut io = Io::new("6 7\n");
        prepared.run_with_io(&mut io).expect("run");
        // getc() has its own cursor, still at the first character.
        assert_eq!(io.output.lines(), ["42", "54"]);
        assert_eq!(
            prepared.compiled().instructions[0],
            Instruction::CallBuiltin(BuiltinFunction::Read)
        );
    }

    #[test]
    fn putc_writes_characters_between_lines() {
        let prepared = load_source(
            "print 1; c = 72; putc(c); putc(c + 33); putc(10); print putc(300);",
            VmConfig::default(),
        );
        let mut io = Io::new("");
        prepared.run_with_io(&mut io).expect("run");
        assert_eq!(io.output.text(), "1\nHi\n300\n");
    }

    #[test]
    fn runs_are_deterministic() {
        let prepared = load_source(
            "n = 0; s = 0; while n < 20 { s = s + n % 7; n = n + 1; } print s / 3;",
            VmConfig::default(),
        );
        let first = prepared.run().expect("first run");
        let second = prepared.run().expect("second run");
        assert_eq!(first, second);
        assert_eq!(first, "19\n");
    }
}
