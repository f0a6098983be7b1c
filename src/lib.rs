//! Local judge: compile one solution, run it on every paired test case
//! under a CPU time limit and compare its output with the reference answers.

pub mod compare;
pub mod compiler;
pub mod config;
pub mod error;
pub mod judger;
pub mod locator;
pub mod runner;
pub mod utils;

pub use config::{resolve_configuration, ConfigLayer, RunConfig};
pub use error::{JudgeError, Result};
pub use judger::{Judge, JudgeReport, JudgeStatus, Verdict, VerdictClass};
pub use locator::{CaseLocator, TestCase};
pub use runner::{CpuBudget, ExecutionContext, ExecutionOutcome, ProcessRunner, RlimitRunner};
