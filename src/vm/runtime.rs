use tracing::{debug, trace};

use crate::ast::UnaryOperator;
use crate::bytecode::{CompiledProgram, Instruction};
use crate::runtime::{ExecutionLimits, Io, StepBudget, Value, ops};

use super::{VmError, VmResult};

/// Checks every operand against the unit's tables before the first step.
pub(super) fn validate(program: &CompiledProgram) -> VmResult<()> {
    let len = program.instructions.len();
    for (pc, instruction) in program.instructions.iter().enumerate() {
        match *instruction {
            Instruction::Jump(target) | Instruction::JumpIfFalse(target) => {
                if target as usize > len {
                    return Err(VmError::InvalidJumpTarget { pc, target });
                }
            }
            Instruction::PushConstant(index) => {
                if index as usize >= program.constants.len() {
                    return Err(VmError::InvalidConstant { pc, index });
                }
            }
            Instruction::Load(slot) | Instruction::Store(slot) => {
                if slot as usize >= program.slot_names.len() {
                    return Err(VmError::InvalidSlot { pc, slot });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Per-run machine state: operand stack, program counter and slot array.
pub(super) struct VmRuntime<'a> {
    program: &'a CompiledProgram,
    io: &'a mut Io,
    stack: Vec<Value>,
    slots: Vec<Option<Value>>,
    pc: usize,
    budget: StepBudget,
}

impl<'a> VmRuntime<'a> {
    pub(super) fn new(
        program: &'a CompiledProgram,
        io: &'a mut Io,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            program,
            io,
            stack: Vec::new(),
            slots: vec![None; program.slot_names.len()],
            pc: 0,
            budget: StepBudget::new(limits),
        }
    }

    /// Runs until `Halt`, the end of the code, or the first fault.
    pub(super) fn execute(&mut self) -> VmResult<()> {
        let result = self.execute_loop();
        debug!(
            steps = self.budget.taken(),
            pc = self.pc,
            ok = result.is_ok(),
            "vm run finished"
        );
        result
    }

    fn execute_loop(&mut self) -> VmResult<()> {
        let program = self.program;
        while let Some(&instruction) = program.instructions.get(self.pc) {
            self.budget
                .tick()
                .map_err(|limit| VmError::ExecutionLimitExceeded { limit })?;
            trace!(pc = self.pc, ?instruction, depth = self.stack.len(), "step");

            let pc = self.pc;
            if self.stack.len() < instruction.pops() {
                return Err(VmError::StackUnderflow { pc });
            }
            let mut next = pc + 1;
            match instruction {
                Instruction::PushConstant(index) => {
                    let value = program
                        .constants
                        .get(index as usize)
                        .cloned()
                        .ok_or(VmError::InvalidConstant { pc, index })?;
                    self.stack.push(value);
                }
                Instruction::Load(slot) => {
                    let value = match self.slots.get(slot as usize) {
                        Some(Some(value)) => value.clone(),
                        Some(None) => {
                            return Err(VmError::UnsetSlot {
                                pc,
                                slot,
                                name: program.slot_name(slot).unwrap_or("?").to_string(),
                            });
                        }
                        None => return Err(VmError::InvalidSlot { pc, slot }),
                    };
                    self.stack.push(value);
                }
                Instruction::Store(slot) => {
                    let value = self.pop_stack()?;
                    let target = self
                        .slots
                        .get_mut(slot as usize)
                        .ok_or(VmError::InvalidSlot { pc, slot })?;
                    *target = Some(value);
                }
                Instruction::Negate | Instruction::Not => {
                    let operand = self.pop_stack()?;
                    let op = match instruction {
                        Instruction::Negate => UnaryOperator::Negate,
                        _ => UnaryOperator::Not,
                    };
                    let result =
                        ops::unary(op, &operand).map_err(|error| VmError::from_op(pc, error))?;
                    self.stack.push(result);
                }
                Instruction::Jump(target) => {
                    next = self.jump_target(target)?;
                }
                Instruction::JumpIfFalse(target) => {
                    let condition = self.pop_stack()?;
                    let condition =
                        condition
                            .as_bool()
                            .ok_or(VmError::NonBooleanCondition {
                                pc,
                                type_name: condition.type_name(),
                            })?;
                    if !condition {
                        next = self.jump_target(target)?;
                    }
                }
                Instruction::Print => {
                    let value = self.pop_stack()?;
                    self.io.output.push(&value.to_output());
                }
                Instruction::Pop => {
                    self.pop_stack()?;
                }
                Instruction::CallBuiltin(builtin) => {
                    let args = self.stack.split_off(self.stack.len() - builtin.arity());
                    let result = builtin
                        .call(&args, self.io)
                        .map_err(|error| VmError::from_op(pc, error))?;
                    self.stack.push(result);
                }
                Instruction::Halt => return Ok(()),
                binary => {
                    let Some(op) = binary.binary_operator() else {
                        unreachable!("every remaining instruction is a binary operator");
                    };
                    let right = self.pop_stack()?;
                    let left = self.pop_stack()?;
                    let result = ops::binary(op, &left, &right)
                        .map_err(|error| VmError::from_op(pc, error))?;
                    self.stack.push(result);
                }
            }
            self.pc = next;
        }
        Ok(())
    }

    fn jump_target(&self, target: u32) -> VmResult<usize> {
        let target_pc = target as usize;
        if target_pc > self.program.instructions.len() {
            return Err(VmError::InvalidJumpTarget {
                pc: self.pc,
                target,
            });
        }
        Ok(target_pc)
    }

    fn pop_stack(&mut self) -> VmResult<Value> {
        self.stack
            .pop()
            .ok_or(VmError::StackUnderflow { pc: self.pc })
    }
}
