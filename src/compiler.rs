use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::error::{JudgeError, Result};
use crate::utils;

/// Everything needed for one `<compiler> <flags...> -o <executable> <source>` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSpec {
    source: PathBuf,
    executable: PathBuf,
    compiler: String,
    flags: Vec<String>,
}

impl CompileSpec {
    pub fn new(
        source: impl Into<PathBuf>,
        executable: impl Into<PathBuf>,
        compiler: impl Into<String>,
        flags: Vec<String>,
    ) -> Self {
        Self {
            source: source.into(),
            executable: executable.into(),
            compiler: compiler.into(),
            flags,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Absolute path of the built executable.
    pub executable: PathBuf,
    /// Compiler chatter on success, usually warnings.
    pub diagnostics: String,
}

/// Builds the executable. A nonzero compiler exit is fatal for the run and
/// carries the compiler's own output untouched.
pub fn compile(spec: CompileSpec) -> Result<CompileOutput> {
    let program = utils::find_path(&spec.compiler)
        .ok_or_else(|| JudgeError::CompilerNotFound(spec.compiler.clone()))?;

    tracing::info!(
        "compiling {} with {} {}",
        spec.source.display(),
        program.display(),
        spec.flags.join(" ")
    );
    let begin = Instant::now();
    let output = Command::new(&program)
        .args(&spec.flags)
        .arg("-o")
        .arg(&spec.executable)
        .arg(&spec.source)
        .output()
        .map_err(|source| JudgeError::Spawn {
            program: program.clone(),
            source,
        })?;
    let time = begin.elapsed();

    let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
    diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

    if !output.status.success() {
        return Err(JudgeError::Compile {
            status: output.status,
            diagnostics,
        });
    }

    let executable = spec
        .executable
        .canonicalize()
        .map_err(|e| JudgeError::file(&spec.executable, e))?;
    tracing::info!("compiled {} in {}ms", executable.display(), time.as_millis());
    if !diagnostics.is_empty() {
        tracing::debug!("compiler output:\n{diagnostics}");
    }

    Ok(CompileOutput {
        executable,
        diagnostics,
    })
}
