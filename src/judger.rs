use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::{ColoredString, Colorize};
use serde::Serialize;
use tempfile::TempDir;

use crate::compare;
use crate::compiler::{self, CompileSpec};
use crate::config::RunConfig;
use crate::error::{JudgeError, Result};
use crate::locator::{CaseLocator, TestCase};
use crate::runner::{
    CaseRunner, ExecutionContext, ExecutionOutcome, ExitKind, ProcessRunner, RlimitRunner, Usage,
};
use crate::utils::{serialize_millis, serialize_opt_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuntimeErrorKind {
    FloatingPointError,
    SegmentationFault,
    Aborted,
    BusError,
    Signal(i32),
}

impl RuntimeErrorKind {
    fn from_signal(signal: i32) -> Self {
        match signal {
            libc::SIGFPE => Self::FloatingPointError,
            libc::SIGSEGV => Self::SegmentationFault,
            libc::SIGABRT => Self::Aborted,
            libc::SIGBUS => Self::BusError,
            other => Self::Signal(other),
        }
    }
}

impl Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match &self {
            Self::FloatingPointError => "FloatingPointError",
            Self::SegmentationFault => "SegmentationFault",
            Self::Aborted => "Aborted",
            Self::BusError => "BusError",
            Self::Signal(sig) => return write!(f, "Signal {sig}"),
        };
        f.write_str(str)
    }
}

/// Why a case passed or failed. Everything except `Accepted` counts as a
/// failure; the variants only differ in what they tell the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail")]
pub enum JudgeStatus {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    RuntimeError(RuntimeErrorKind),
    ReturnNonZero(i32),
    OutputMissing,
    /// The judge itself failed on this case (staging, spawning, reading files).
    SystemError(String),
}

/// Coarse grouping of [`JudgeStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerdictClass {
    Pass,
    Fail,
    LimitExceeded,
    Error,
}

impl JudgeStatus {
    pub fn abbr(&self) -> &'static str {
        match &self {
            Self::Accepted => "AC",
            Self::WrongAnswer => "WA",
            Self::TimeLimitExceeded => "TLE",
            Self::RuntimeError(_) => "RE",
            Self::ReturnNonZero(_) => "RNZ",
            Self::OutputMissing => "NO",
            Self::SystemError(_) => "SE",
        }
    }

    pub fn class(&self) -> VerdictClass {
        match self {
            Self::Accepted => VerdictClass::Pass,
            Self::TimeLimitExceeded => VerdictClass::LimitExceeded,
            Self::SystemError(_) => VerdictClass::Error,
            Self::WrongAnswer | Self::RuntimeError(_) | Self::ReturnNonZero(_) | Self::OutputMissing => {
                VerdictClass::Fail
            }
        }
    }

    fn from_exit(status: ExitKind) -> Self {
        match status {
            ExitKind::Signal(sig) => Self::RuntimeError(RuntimeErrorKind::from_signal(sig)),
            ExitKind::Code(code) => Self::ReturnNonZero(code),
        }
    }

    fn colored_abbr(&self) -> ColoredString {
        match self.class() {
            VerdictClass::Pass => self.abbr().green().bold(),
            VerdictClass::LimitExceeded => self.abbr().yellow().bold(),
            VerdictClass::Fail => self.abbr().red().bold(),
            VerdictClass::Error => self.abbr().magenta().bold(),
        }
    }
}

impl Display for JudgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match &self {
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "Wrong Answer",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::OutputMissing => "Output File Missing",
            Self::RuntimeError(ek) => {
                return write!(f, "{}: Runtime Error ({ek})", self.abbr());
            }
            Self::ReturnNonZero(ret_val) => {
                return write!(f, "{}: Return Value Not Zero ({ret_val})", self.abbr());
            }
            Self::SystemError(msg) => {
                return write!(f, "{}: System Error ({msg})", self.abbr());
            }
        };
        write!(f, "{}: {message}", self.abbr())
    }
}

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub case: TestCase,
    #[serde(flatten)]
    pub status: JudgeStatus,
    pub class: VerdictClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(rename = "time_ms", serialize_with = "serialize_millis")]
    pub time: Duration,
    #[serde(rename = "cpu_time_ms", serialize_with = "serialize_opt_millis")]
    pub cpu_time: Option<Duration>,
}

impl Verdict {
    fn new(case: &TestCase, status: JudgeStatus, time: Duration, cpu_time: Option<Duration>) -> Self {
        Self {
            case: case.clone(),
            class: status.class(),
            status,
            diff: None,
            time,
            cpu_time,
        }
    }

    pub fn accepted(&self) -> bool {
        self.status == JudgeStatus::Accepted
    }

    /// One status line, e.g. `#1   sample/1   AC   12ms (cpu 10ms)`.
    pub fn status_line(&self, index: usize) -> String {
        let mut line = format!(
            "#{:<4} {:<24} {:<4} {:>6}ms",
            index,
            self.case.label(),
            self.status.colored_abbr(),
            self.time.as_millis()
        );
        if let Some(cpu) = self.cpu_time {
            line.push_str(&format!(" (cpu {}ms)", cpu.as_millis()));
        }
        if !self.accepted() {
            line.push_str(&format!("  {}", self.status));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JudgeReport {
    pub total: usize,
    pub failed: usize,
    pub verdicts: Vec<Verdict>,
}

impl JudgeReport {
    fn push(&mut self, verdict: Verdict) {
        self.total += 1;
        if !verdict.accepted() {
            self.failed += 1;
        }
        self.verdicts.push(verdict);
    }

    pub fn passed(&self) -> usize {
        self.total - self.failed
    }

    /// At least one case ran and none failed.
    pub fn success(&self) -> bool {
        self.total > 0 && self.failed == 0
    }

    pub fn summary(&self) -> String {
        if self.success() {
            format!("{} / {} passed", self.passed(), self.total)
        } else {
            format!("{} / {} passed, {} failed", self.passed(), self.total, self.failed)
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| JudgeError::file(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| JudgeError::file(path, e))?;
        Ok(())
    }
}

/// Compiles once, then runs every located case in order.
pub struct Judge<P = RlimitRunner> {
    config: RunConfig,
    runner: CaseRunner<P>,
}

impl Judge {
    pub fn new(config: RunConfig) -> Self {
        let process = RlimitRunner::new(config.wall_limit);
        Self::with_process(config, process)
    }
}

impl<P: ProcessRunner> Judge<P> {
    pub fn with_process(config: RunConfig, process: P) -> Self {
        let runner = CaseRunner::new(process, config.time_limit);
        Self { config, runner }
    }

    /// Only a failed build or an empty test set end the run early; every
    /// located case is judged and reported on `out`.
    pub fn run(&self, out: &mut dyn Write) -> Result<JudgeReport> {
        // Held until the end of the run so the executable outlives every case.
        let (_temp_dir, work_dir) = self.work_dir()?;

        let executable = work_dir.join(&self.config.problem);
        let spec = CompileSpec::new(
            &self.config.source,
            executable,
            &self.config.compiler,
            self.config.flags.clone(),
        );
        let built = compiler::compile(spec)?;

        let cases = CaseLocator::new(self.config.roots.clone(), &self.config.problem)
            .with_suffixes(&self.config.input_suffix, &self.config.answer_suffix)
            .locate()?;
        tracing::info!(
            "judging {} cases with a {:?} CPU limit",
            cases.len(),
            self.runner.budget().as_duration()
        );

        let ctx = ExecutionContext::new(work_dir, &self.config.problem);
        let mut report = JudgeReport::default();
        for (i, case) in cases.iter().enumerate() {
            let verdict = self.judge_case(&ctx, &built.executable, case);
            writeln!(out, "{}", verdict.status_line(i + 1))?;
            if let Some(diff) = &verdict.diff {
                write!(out, "{diff}")?;
            }
            report.push(verdict);
        }

        if report.success() {
            writeln!(out, "{}", report.summary().green().bold())?;
        } else {
            writeln!(out, "{}", report.summary().red().bold())?;
        }
        Ok(report)
    }

    fn work_dir(&self) -> Result<(Option<TempDir>, PathBuf)> {
        match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| JudgeError::file(dir, e))?;
                let dir = dir.canonicalize().map_err(|e| JudgeError::file(dir, e))?;
                Ok((None, dir))
            }
            None => {
                let temp = tempfile::Builder::new().prefix("local-judger").tempdir()?;
                let dir = temp.path().to_path_buf();
                Ok((Some(temp), dir))
            }
        }
    }

    fn judge_case(&self, ctx: &ExecutionContext, executable: &Path, case: &TestCase) -> Verdict {
        let (outcome, _staged) = match self.runner.run(ctx, executable, case) {
            Ok(run) => run,
            Err(e) => {
                tracing::error!("case {} could not be run: {e}", case.label());
                return Verdict::new(case, JudgeStatus::SystemError(e.to_string()), Duration::ZERO, None);
            }
        };
        let usage = outcome.usage();

        let status = match &outcome {
            ExecutionOutcome::Completed { output, .. } => {
                return self.check_output(case, output, usage);
            }
            ExecutionOutcome::LimitExceeded { .. } => JudgeStatus::TimeLimitExceeded,
            ExecutionOutcome::OutputMissing { .. } => JudgeStatus::OutputMissing,
            ExecutionOutcome::CrashedOrNonZeroExit { status, .. } => JudgeStatus::from_exit(*status),
        };
        Verdict::new(case, status, usage.time, Some(usage.cpu_time))
    }

    fn check_output(&self, case: &TestCase, output: &Path, usage: Usage) -> Verdict {
        match compare::compare_files(&case.answer, output) {
            Ok(cmp) if cmp.equal => {
                Verdict::new(case, JudgeStatus::Accepted, usage.time, Some(usage.cpu_time))
            }
            Ok(cmp) => Verdict {
                diff: cmp.diff,
                ..Verdict::new(case, JudgeStatus::WrongAnswer, usage.time, Some(usage.cpu_time))
            },
            Err(e) => Verdict::new(
                case,
                JudgeStatus::SystemError(e.to_string()),
                usage.time,
                Some(usage.cpu_time),
            ),
        }
    }
}
