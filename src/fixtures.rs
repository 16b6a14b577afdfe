//! Loader for the on-disk program corpus under `tests/programs/`.
//!
//! Each case directory holds `case.yaml`, `program.mdl` and the files the
//! YAML points at (expected stdout, optional program input).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    RuntimeSuccess,
    FrontendError,
    RuntimeError,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BenchConfig {
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Expected error class per backend, as printed before the colon.
#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedErrors {
    pub interpreter: String,
    pub vm: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedOutcome {
    pub stdout_file: Option<String>,
    pub error: Option<ExpectedErrors>,
    pub message_contains: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    pub input_file: Option<String>,
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub bench: BenchConfig,
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn source(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading {}", self.program_path.display()))
    }

    /// Program input, empty when the case has none.
    pub fn input(&self) -> Result<String> {
        match self.spec.input_file.as_deref() {
            Some(path) => self.read_text(path),
            None => Ok(String::new()),
        }
    }

    pub fn expected_stdout(&self) -> Result<String> {
        match &self.spec.expected.stdout_file {
            Some(path) => self.read_text(path),
            None => Ok(String::new()),
        }
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let program_path = path.join("program.mdl");
        ensure!(
            program_path.exists(),
            "Missing program.mdl for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;
        ensure!(
            (spec.class == CaseClass::RuntimeSuccess) == spec.expected.error.is_none(),
            "Case {case_name}: expected.error must be set exactly when the class is an error class"
        );

        cases.push(Case {
            name: case_name,
            dir: path,
            program_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}
