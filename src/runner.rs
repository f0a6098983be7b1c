//! Runs the compiled program on one test case under a CPU time limit.
//!
//! The program reads `<problem>.in` and writes `<problem>.out` in its
//! working directory. Both files are staged per case and removed when the
//! returned [`StagedIo`] guard is dropped, so cases sharing one working
//! directory must run one after another.

use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{JudgeError, Result};
use crate::locator::TestCase;

/// CPU time a single case may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuBudget(Duration);

impl CpuBudget {
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(JudgeError::Config(format!(
                "time limit must be a positive number of seconds, got {secs}"
            )));
        }
        Duration::try_from_secs_f64(secs)
            .map(Self)
            .map_err(|e| JudgeError::Config(format!("time limit {secs} is out of range: {e}")))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Whole seconds for `RLIMIT_CPU`, rounded up. The exact fractional
    /// budget is enforced afterwards from the measured CPU time.
    pub fn rlimit_secs(&self) -> u64 {
        let secs = self.0.as_secs() + u64::from(self.0.subsec_nanos() > 0);
        secs.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Code(i32),
    Signal(i32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Wall-clock time from just before spawn to just after the wait returned.
    pub time: Duration,
    /// User plus system CPU time of the process.
    pub cpu_time: Duration,
}

/// What the operating system reported about a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub status: ExitKind,
    pub usage: Usage,
    /// Set when the wall-clock backstop had to kill the process.
    pub wall_killed: bool,
}

/// Platform seam for spawning a program under a CPU time limit.
pub trait ProcessRunner {
    fn run(&self, program: &Path, workdir: &Path, budget: CpuBudget) -> Result<ProcessExit>;
}

/// Unix runner: `RLIMIT_CPU` set in the child before `exec`, reaped with
/// `wait4` to collect its resource usage.
#[derive(Debug, Clone, Default)]
pub struct RlimitRunner {
    wall_limit: Option<Duration>,
}

impl RlimitRunner {
    pub fn new(wall_limit: Option<Duration>) -> Self {
        Self { wall_limit }
    }
}

impl ProcessRunner for RlimitRunner {
    fn run(&self, program: &Path, workdir: &Path, budget: CpuBudget) -> Result<ProcessExit> {
        const WAIT_DURATION: Duration = Duration::from_micros(100);

        let soft = budget.rlimit_secs();
        let mut cmd = Command::new(program);
        cmd.current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // SAFETY: setrlimit is async-signal-safe and touches no shared state.
        unsafe {
            cmd.pre_exec(move || set_cpu_limit(soft, soft + 1));
        }

        let begin_instant = Instant::now();
        let child = cmd.spawn().map_err(|source| JudgeError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;
        let pid = child.id() as libc::pid_t;

        let mut kill_sent = false;
        let (raw_status, rusage) = match self.wall_limit {
            None => wait4(pid, 0)?.ok_or_else(|| io::Error::other("wait4 returned no child"))?,
            Some(limit) => loop {
                if let Some(reaped) = wait4(pid, libc::WNOHANG)? {
                    break reaped;
                }
                if !kill_sent && begin_instant.elapsed() > limit {
                    tracing::debug!(pid, "wall-clock backstop reached, killing");
                    // SAFETY: pid is our unreaped child, so it cannot have been recycled.
                    unsafe {
                        libc::kill(pid, libc::SIGKILL);
                    }
                    kill_sent = true;
                } else {
                    std::thread::sleep(WAIT_DURATION);
                }
            },
        };
        // Record time as soon as the tested program is reaped.
        let stop_instant = Instant::now();
        let wall_killed = backstop_fired(kill_sent, raw_status);

        let status = if libc::WIFSIGNALED(raw_status) {
            ExitKind::Signal(libc::WTERMSIG(raw_status))
        } else {
            ExitKind::Code(libc::WEXITSTATUS(raw_status))
        };
        let usage = Usage {
            time: stop_instant.saturating_duration_since(begin_instant),
            cpu_time: timeval_to_duration(rusage.ru_utime) + timeval_to_duration(rusage.ru_stime),
        };
        Ok(ProcessExit {
            status,
            usage,
            wall_killed,
        })
    }
}

/// A kill sent to a child that had already exited does not count.
fn backstop_fired(kill_sent: bool, raw_status: libc::c_int) -> bool {
    kill_sent && libc::WIFSIGNALED(raw_status) && libc::WTERMSIG(raw_status) == libc::SIGKILL
}

fn set_cpu_limit(soft: u64, hard: u64) -> io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    };
    // SAFETY: `limit` is a valid, initialised rlimit.
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CPU, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Reaps `pid`. Returns `None` only with `WNOHANG` while the child still runs.
fn wait4(pid: libc::pid_t, options: libc::c_int) -> io::Result<Option<(libc::c_int, libc::rusage)>> {
    let mut status: libc::c_int = 0;
    // SAFETY: rusage is plain old data; all-zero is a valid value.
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: both out-pointers reference live locals.
        let rc = unsafe { libc::wait4(pid, &mut status, options, &mut rusage) };
        if rc == pid {
            return Ok(Some((status, rusage)));
        }
        if rc == 0 {
            return Ok(None);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { usage: Usage, output: PathBuf },
    LimitExceeded { usage: Usage },
    CrashedOrNonZeroExit { status: ExitKind, usage: Usage },
    OutputMissing { usage: Usage },
}

impl ExecutionOutcome {
    pub fn usage(&self) -> Usage {
        match self {
            Self::Completed { usage, .. }
            | Self::LimitExceeded { usage }
            | Self::CrashedOrNonZeroExit { usage, .. }
            | Self::OutputMissing { usage } => *usage,
        }
    }
}

/// Maps a finished process onto an outcome. The CPU limit wins over every
/// other signal of failure.
pub fn classify(exit: &ProcessExit, budget: CpuBudget, output: &Path) -> ExecutionOutcome {
    let usage = exit.usage;
    if exit.wall_killed
        || exit.status == ExitKind::Signal(libc::SIGXCPU)
        || usage.cpu_time > budget.as_duration()
    {
        return ExecutionOutcome::LimitExceeded { usage };
    }
    if exit.status != ExitKind::Code(0) {
        return ExecutionOutcome::CrashedOrNonZeroExit {
            status: exit.status,
            usage,
        };
    }
    if output.is_file() {
        ExecutionOutcome::Completed {
            usage,
            output: output.to_path_buf(),
        }
    } else {
        ExecutionOutcome::OutputMissing { usage }
    }
}

/// Working directory plus problem identifier: everything needed to derive
/// the conventional I/O file names. One context per concurrently running
/// case keeps their files apart.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    work_dir: PathBuf,
    problem: String,
}

impl ExecutionContext {
    pub fn new(work_dir: impl Into<PathBuf>, problem: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            problem: problem.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn input_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.in", self.problem))
    }

    pub fn output_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.out", self.problem))
    }

    /// Copies the case input into place and clears any stale output.
    pub fn stage(&self, case: &TestCase) -> Result<StagedIo> {
        let staged = StagedIo {
            input: self.input_path(),
            output: self.output_path(),
        };
        remove_stale(&staged.output)?;
        fs::copy(&case.input, &staged.input).map_err(|e| JudgeError::file(&case.input, e))?;
        Ok(staged)
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    remove_path(path).map_err(|e| JudgeError::file(path, e))
}

/// Removes a file or a directory tree; a missing path is fine.
fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Staged `<problem>.in` / `<problem>.out` pair, removed on drop.
#[derive(Debug)]
pub struct StagedIo {
    input: PathBuf,
    output: PathBuf,
}

impl StagedIo {
    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl Drop for StagedIo {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            if let Err(e) = remove_path(path) {
                tracing::warn!("failed to clean up {}: {e}", path.display());
            }
        }
    }
}

/// Stages one case, runs the program on it and classifies the result.
#[derive(Debug, Clone)]
pub struct CaseRunner<P = RlimitRunner> {
    process: P,
    budget: CpuBudget,
}

impl<P: ProcessRunner> CaseRunner<P> {
    pub fn new(process: P, budget: CpuBudget) -> Self {
        Self { process, budget }
    }

    pub fn budget(&self) -> CpuBudget {
        self.budget
    }

    /// The outcome's output path stays valid until the returned guard drops.
    pub fn run(
        &self,
        ctx: &ExecutionContext,
        executable: &Path,
        case: &TestCase,
    ) -> Result<(ExecutionOutcome, StagedIo)> {
        let staged = ctx.stage(case)?;
        let exit = self.process.run(executable, ctx.work_dir(), self.budget)?;
        tracing::debug!(case = %case.label(), ?exit, "process finished");
        let outcome = classify(&exit, self.budget, staged.output());
        Ok((outcome, staged))
    }
}
