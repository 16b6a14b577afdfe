use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::ast::{Block, Expression, Program, Statement};
use crate::runtime::{BuiltinFunction, Value};

use super::{CompiledProgram, Instruction};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    FunctionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Program exceeds the {what} limit of {limit}")]
    TooLarge { what: &'static str, limit: u32 },
    #[error("Jump label {label} was never bound")]
    UnboundLabel { label: usize },
}

type CompileResult<T> = std::result::Result<T, CompileError>;

/// Compiles a program into a flat instruction sequence ending in `Halt`.
pub fn compile(program: &Program) -> CompileResult<CompiledProgram> {
    let mut generator = CodeGenerator::default();
    generator.block(&program.body)?;
    generator.emit(Instruction::Halt);
    let compiled = generator.finish()?;
    debug!(
        instructions = compiled.instructions.len(),
        constants = compiled.constants.len(),
        slots = compiled.slot_names.len(),
        "compiled program"
    );
    Ok(compiled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label(usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    /// Bit pattern and literal scale, so `1` and `1.0` stay distinct.
    Number(u64, Option<u8>),
    Boolean(bool),
    String(String),
}

/// Name to slot mapping, in order of first assignment.
#[derive(Debug, Default)]
struct SymbolTable {
    slots: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl SymbolTable {
    fn resolve(&self, name: &str) -> Option<u32> {
        self.slots.get(name).copied()
    }

    fn define(&mut self, name: &str) -> CompileResult<u32> {
        if let Some(slot) = self.resolve(name) {
            return Ok(slot);
        }
        let slot = to_operand(self.names.len(), "slot")?;
        self.slots.insert(name.to_string(), slot);
        self.names.push(name.to_string());
        Ok(slot)
    }
}

#[derive(Debug, Default)]
struct CodeGenerator {
    instructions: Vec<Instruction>,
    constants: Vec<Value>,
    constant_index: FxHashMap<ConstantKey, u32>,
    symbols: SymbolTable,
    /// Bound offset per label, `None` until `bind_label`.
    labels: Vec<Option<u32>>,
    /// Placeholder jumps waiting for their label's offset.
    patches: Vec<(usize, Label)>,
}

impl CodeGenerator {
    fn block(&mut self, block: &Block) -> CompileResult<()> {
        for statement in &block.statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> CompileResult<()> {
        match statement {
            Statement::Assign { name, value } => {
                self.expression(value)?;
                let slot = self.symbols.define(name)?;
                self.emit(Instruction::Store(slot));
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                self.expression(condition)?;
                let else_label = self.new_label();
                self.emit_jump_if_false(else_label);
                self.block(then_body)?;
                match else_body {
                    Some(else_body) => {
                        let end_label = self.new_label();
                        self.emit_jump(end_label);
                        self.bind_label(else_label)?;
                        self.block(else_body)?;
                        self.bind_label(end_label)?;
                    }
                    None => self.bind_label(else_label)?,
                }
            }
            Statement::While { condition, body } => {
                let start_label = self.new_label();
                let end_label = self.new_label();
                self.bind_label(start_label)?;
                self.expression(condition)?;
                self.emit_jump_if_false(end_label);
                self.block(body)?;
                self.emit_jump(start_label);
                self.bind_label(end_label)?;
            }
            Statement::Print(value) => {
                self.expression(value)?;
                self.emit(Instruction::Print);
            }
            Statement::Expr(value) => {
                self.expression(value)?;
                self.emit(Instruction::Pop);
            }
            Statement::Block(block) => self.block(block)?,
        }
        Ok(())
    }

    fn expression(&mut self, expression: &Expression) -> CompileResult<()> {
        match expression {
            Expression::Number(value) => self.constant(Value::Number(*value))?,
            Expression::Boolean(value) => self.constant(Value::Boolean(*value))?,
            Expression::String(value) => self.constant(Value::String(value.clone()))?,
            Expression::Identifier(name) => {
                let slot =
                    self.symbols
                        .resolve(name)
                        .ok_or_else(|| CompileError::UndefinedVariable {
                            name: name.to_string(),
                        })?;
                self.emit(Instruction::Load(slot));
            }
            Expression::Unary { op, operand } => {
                self.expression(operand)?;
                self.emit(Instruction::unary(*op));
            }
            Expression::Binary { left, op, right } => {
                self.expression(left)?;
                self.expression(right)?;
                self.emit(Instruction::binary(*op));
            }
            Expression::Call { callee, args } => {
                let builtin = BuiltinFunction::from_name(callee).ok_or_else(|| {
                    CompileError::UndefinedFunction {
                        name: callee.to_string(),
                    }
                })?;
                if args.len() != builtin.arity() {
                    return Err(CompileError::FunctionArityMismatch {
                        name: callee.to_string(),
                        expected: builtin.arity(),
                        found: args.len(),
                    });
                }
                for arg in args {
                    self.expression(arg)?;
                }
                self.emit(Instruction::CallBuiltin(builtin));
            }
        }
        Ok(())
    }

    fn constant(&mut self, value: Value) -> CompileResult<()> {
        let key = match &value {
            Value::Number(number) => ConstantKey::Number(number.value.to_bits(), number.scale),
            Value::Boolean(boolean) => ConstantKey::Boolean(*boolean),
            Value::String(text) => ConstantKey::String(text.clone()),
        };
        let index = match self.constant_index.get(&key) {
            Some(index) => *index,
            None => {
                let index = to_operand(self.constants.len(), "constant")?;
                self.constants.push(value);
                self.constant_index.insert(key, index);
                index
            }
        };
        self.emit(Instruction::PushConstant(index));
        Ok(())
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    fn bind_label(&mut self, label: Label) -> CompileResult<()> {
        self.labels[label.0] = Some(to_operand(self.instructions.len(), "instruction")?);
        Ok(())
    }

    fn emit_jump(&mut self, label: Label) {
        self.patches.push((self.instructions.len(), label));
        self.emit(Instruction::Jump(0));
    }

    fn emit_jump_if_false(&mut self, label: Label) {
        self.patches.push((self.instructions.len(), label));
        self.emit(Instruction::JumpIfFalse(0));
    }

    /// Rewrites every placeholder jump to its label's absolute offset.
    fn finish(mut self) -> CompileResult<CompiledProgram> {
        for (position, label) in std::mem::take(&mut self.patches) {
            let target = self.labels[label.0].ok_or(CompileError::UnboundLabel { label: label.0 })?;
            self.instructions[position] = match self.instructions[position] {
                Instruction::Jump(_) => Instruction::Jump(target),
                Instruction::JumpIfFalse(_) => Instruction::JumpIfFalse(target),
                other => other,
            };
        }
        Ok(CompiledProgram {
            constants: self.constants,
            instructions: self.instructions,
            slot_names: self.symbols.names,
        })
    }
}

fn to_operand(value: usize, what: &'static str) -> CompileResult<u32> {
    u32::try_from(value).map_err(|_| CompileError::TooLarge {
        what,
        limit: u32::MAX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Number;
    use crate::{lexer, parser};
    use indoc::indoc;

    fn compile_source(source: &str) -> CompileResult<CompiledProgram> {
        let tokens = lexer::tokenize(source).expect("tokenize failed");
        let program = parser::parse_tokens(tokens).expect("parse failed");
        compile(&program)
    }

    #[test]
    fn emits_postfix_code_for_assignment() {
        let compiled = compile_source("x = 2 + 3 * 4; print x;").expect("compile");
        assert_eq!(
            compiled.instructions,
            vec![
                Instruction::PushConstant(0),
                Instruction::PushConstant(1),
                Instruction::PushConstant(2),
                Instruction::Multiply,
                Instruction::Add,
                Instruction::Store(0),
                Instruction::Load(0),
                Instruction::Print,
                Instruction::Halt,
            ]
        );
        assert_eq!(
            compiled.constants,
            vec![Value::number(2.0), Value::number(3.0), Value::number(4.0)]
        );
        assert_eq!(compiled.slot_names, vec!["x".to_string()]);
    }

    #[test]
    fn if_else_jumps_to_resolved_offsets() {
        let compiled =
            compile_source(r#"if 1 > 2 { print "a"; } else { print "b"; }"#).expect("compile");
        assert_eq!(
            compiled.instructions,
            vec![
                Instruction::PushConstant(0),
                Instruction::PushConstant(1),
                Instruction::Greater,
                Instruction::JumpIfFalse(7),
                Instruction::PushConstant(2),
                Instruction::Print,
                Instruction::Jump(9),
                Instruction::PushConstant(3),
                Instruction::Print,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn while_loop_jumps_back_to_condition() {
        let source = indoc! {"
            i = 0;
            while i < 3 {
                print i;
                i = i + 1;
            }
        "};
        let compiled = compile_source(source).expect("compile");
        assert_eq!(
            compiled.instructions,
            vec![
                Instruction::PushConstant(0),
                Instruction::Store(0),
                Instruction::Load(0),
                Instruction::PushConstant(1),
                Instruction::Less,
                Instruction::JumpIfFalse(13),
                Instruction::Load(0),
                Instruction::Print,
                Instruction::Load(0),
                Instruction::PushConstant(2),
                Instruction::Add,
                Instruction::Store(0),
                Instruction::Jump(2),
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn constants_are_deduplicated() {
        let compiled = compile_source(r#"a = 1; b = 1; c = "s"; d = "s"; e = true;"#)
            .expect("compile");
        assert_eq!(
            compiled.constants,
            vec![
                Value::number(1.0),
                Value::String("s".to_string()),
                Value::Boolean(true)
            ]
        );
    }

    #[test]
    fn negative_literal_negates_pooled_constant() {
        let compiled = compile_source("a = 0; b = -0;").expect("compile");
        assert_eq!(compiled.constants, vec![Value::number(0.0)]);
        assert_eq!(compiled.instructions[3], Instruction::Negate);
    }

    #[test]
    fn statement_code_is_stack_balanced() {
        let source = indoc! {r#"
            n = 10;
            while n > 0 {
                if n % 2 == 0 { print n; } else { n - 1; }
                n = n - 1;
            }
            print "done";
        "#};
        let compiled = compile_source(source).expect("compile");
        let net: i32 = compiled
            .instructions
            .iter()
            .map(|instruction| instruction.stack_effect())
            .sum();
        assert_eq!(net, 0);
    }

    #[test]
    fn literal_scale_keeps_constants_apart() {
        let compiled = compile_source("a = 1; b = 1.0; c = 1.00; d = 1.0;").expect("compile");
        assert_eq!(
            compiled.constants,
            vec![
                Value::number(1.0),
                Value::Number(Number::with_scale(1.0, 1)),
                Value::Number(Number::with_scale(1.0, 2)),
            ]
        );
    }

    /// Replays `instructions` from an empty stack and returns the final depth.
    fn simulate_depth(instructions: &[Instruction]) -> i32 {
        let mut depth = 0;
        for instruction in instructions {
            assert!(
                depth >= instruction.pops() as i32,
                "{instruction:?} pops below the expression's own values"
            );
            depth += instruction.stack_effect();
        }
        depth
    }

    #[test]
    fn every_expression_leaves_exactly_one_value() {
        let expressions = [
            "7",
            "x",
            "-x",
            "not not flag",
            "2 + 3 * 4",
            "(1 + 2) * (3 - x) / 4 % 5",
            "-(x + 1) * -2",
            "x < 3 and not (x == 2) or flag",
            r#""a" < "b" == true"#,
            "read()",
            "putc(getc() + read() * 2)",
            "putc(putc(65))",
        ];
        for source in expressions {
            let text = format!("print {source};");
            let tokens = lexer::tokenize(&text).expect("tokenize");
            let program = parser::parse_tokens(tokens).expect("parse");
            let [Statement::Print(expression)] = program.body.statements.as_slice() else {
                panic!("expected a print statement for {source}");
            };

            let mut generator = CodeGenerator::default();
            generator.symbols.define("x").expect("slot");
            generator.symbols.define("flag").expect("slot");
            generator.expression(expression).expect("compile");
            assert!(
                generator.patches.is_empty(),
                "expressions never jump: {source}"
            );
            assert_eq!(simulate_depth(&generator.instructions), 1, "{source}");
        }
    }

    #[test]
    fn unassigned_variable_is_compile_time_name_error() {
        assert_eq!(
            compile_source("print y;"),
            Err(CompileError::UndefinedVariable {
                name: "y".to_string()
            })
        );
        assert_eq!(
            compile_source("x = x + 1;"),
            Err(CompileError::UndefinedVariable {
                name: "x".to_string()
            })
        );
    }

    #[test]
    fn assignment_on_any_branch_defines_slot() {
        let compiled = compile_source("if false { z = 1; } print z;").expect("compile");
        assert_eq!(compiled.slot_names, vec!["z".to_string()]);
    }

    #[test]
    fn rejects_unknown_functions_and_bad_arity() {
        assert_eq!(
            compile_source("print f();"),
            Err(CompileError::UndefinedFunction {
                name: "f".to_string()
            })
        );
        assert_eq!(
            compile_source("print getc(1, 2);"),
            Err(CompileError::FunctionArityMismatch {
                name: "getc".to_string(),
                expected: 0,
                found: 2
            })
        );
    }

    #[test]
    fn builtin_calls_compile_to_call_instruction() {
        let compiled = compile_source("x = read();").expect("compile");
        assert_eq!(
            compiled.instructions[0],
            Instruction::CallBuiltin(BuiltinFunction::Read)
        );
    }
}
