use std::{
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

/// Runs an external model program once per call.
///
/// The program receives `--input <file> --params <file>`, both JSON, and must
/// print a single JSON document on stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRunner {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ScriptRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Arguments placed before `--input`, e.g. the script path for an interpreter
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn run<I: Serialize>(&self, input: &I, params: &Value) -> Result<Value> {
        let input_file = write_json(input)?;
        let params_file = write_json(params)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--input")
            .arg(input_file.path())
            .arg("--params")
            .arg(params_file.path());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!("Running {:?}", command);
        let output = command.output().map_err(|source| BridgeError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} failed: {}", self.program.display(), stderr);
            return Err(BridgeError::Failed {
                program: self.program.clone(),
                status: output.status.code(),
                stderr,
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().map_err(BridgeError::Staging)?;
    serde_json::to_writer(&mut file, value)?;
    file.flush().map_err(BridgeError::Staging)?;
    Ok(file)
}
