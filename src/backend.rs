use crate::ast::Program;
use crate::error::Error;
use crate::runtime::{ExecutionLimits, Io};

/// Executable artifact produced by a backend `prepare` step.
///
/// This keeps compilation and execution separated so benchmarks and tests can
/// measure/validate prepare-vs-run phases independently.
pub trait PreparedBackend {
    /// Runs once against `io`. Output printed before a failure stays in `io.output`.
    fn execute(&self, io: &mut Io) -> Result<(), Error>;

    /// One-shot run with empty input, returning the printed text.
    fn run(&self) -> Result<String, Error> {
        let mut io = Io::default();
        self.execute(&mut io)?;
        Ok(io.output.text().to_string())
    }
}

/// Common interface implemented by each execution backend.
///
/// `prepare` translates AST into backend-owned executable state, while `run`
/// offers the convenience path for one-shot execution.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>, Error>;

    fn run(&self, program: &Program) -> Result<String, Error> {
        self.prepare(program)?.run()
    }
}

pub fn backends(limits: ExecutionLimits) -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(crate::interpreter::Interpreter::with_limits(limits)),
        Box::new(crate::vm::VM::with_config(crate::vm::VmConfig {
            max_steps: limits.max_steps,
        })),
    ]
}

/// Looks a backend up by the name it reports.
pub fn backend_by_name(name: &str, limits: ExecutionLimits) -> Option<Box<dyn Backend>> {
    backends(limits)
        .into_iter()
        .find(|backend| backend.name() == name)
}
