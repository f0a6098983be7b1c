#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use local_judger::{CpuBudget, RunConfig};
use tempfile::TempDir;

pub const PROBLEM: &str = "sum";

/// Stand-in compiler, invoked as `sh fake-cc <flags...> -o <exe> <src>`.
/// Copies the shell-script "source" to the executable path, or fails like a
/// real compiler when the source contains `COMPILE_ERROR`.
const FAKE_CC: &str = r#"
out=""; src=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -*) shift ;;
    *) src="$1"; shift ;;
  esac
done
if grep -q COMPILE_ERROR "$src"; then
  echo "$src:1:1: error: expected ';' before '}' token" >&2
  exit 1
fi
cp "$src" "$out" && chmod +x "$out"
"#;

pub const ADD: &str = "read a b < sum.in\necho $((a + b)) > sum.out\n";
pub const SPIN: &str = "while :; do :; done\n";

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fake-cc"), FAKE_CC).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn fake_cc(&self) -> PathBuf {
        self.path().join("fake-cc")
    }

    /// Writes the solution "source" as `sum.cpp`.
    pub fn solution(&self, body: &str) -> PathBuf {
        let path = self.path().join(format!("{PROBLEM}.cpp"));
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        path
    }

    pub fn case(&self, root: &str, name: &str, input: &str, answer: Option<&str>) {
        let dir = self.path().join(root).join(PROBLEM);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.in")), input).unwrap();
        if let Some(answer) = answer {
            fs::write(dir.join(format!("{name}.ans")), answer).unwrap();
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn config(&self, source: PathBuf) -> RunConfig {
        RunConfig {
            problem: PROBLEM.to_string(),
            source,
            compiler: "sh".to_string(),
            flags: vec![self.fake_cc().display().to_string(), "-O2".to_string()],
            time_limit: CpuBudget::from_secs_f64(1.0).unwrap(),
            wall_limit: None,
            roots: vec![self.path().join("sample"), self.path().join("data")],
            work_dir: Some(self.work_dir()),
            input_suffix: ".in".to_string(),
            answer_suffix: ".ans".to_string(),
        }
    }
}
