use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{JudgeError, Result};
use crate::utils;

/// One input / expected-output pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    /// Label of the root the case was found under, e.g. `sample`.
    pub set: String,
    pub input: PathBuf,
    pub answer: PathBuf,
}

impl TestCase {
    pub fn label(&self) -> String {
        format!("{}/{}", self.set, self.name)
    }
}

/// Finds `<root>/<problem>/<case><input_suffix>` files and pairs each with
/// `<case><answer_suffix>` next to it.
#[derive(Debug, Clone)]
pub struct CaseLocator {
    roots: Vec<PathBuf>,
    problem: String,
    input_suffix: String,
    answer_suffix: String,
}

impl CaseLocator {
    pub fn new(roots: Vec<PathBuf>, problem: impl Into<String>) -> Self {
        Self {
            roots,
            problem: problem.into(),
            input_suffix: ".in".to_string(),
            answer_suffix: ".ans".to_string(),
        }
    }

    pub fn with_suffixes(mut self, input: impl Into<String>, answer: impl Into<String>) -> Self {
        self.input_suffix = input.into();
        self.answer_suffix = answer.into();
        self
    }

    /// Every root in order, each sorted on its own. Fails when nothing at
    /// all was found.
    pub fn locate(&self) -> Result<Vec<TestCase>> {
        let mut cases = Vec::new();
        for root in &self.roots {
            cases.extend(self.scan_root(root)?);
        }

        if cases.is_empty() {
            let roots = self
                .roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(JudgeError::NoTestCases {
                problem: self.problem.clone(),
                roots: if roots.is_empty() { "no roots".to_string() } else { roots },
            });
        }
        Ok(cases)
    }

    fn scan_root(&self, root: &Path) -> Result<Vec<TestCase>> {
        let dir = root.join(&self.problem);
        if !dir.is_dir() {
            tracing::debug!("skipping {}: not a directory", dir.display());
            return Ok(Vec::new());
        }
        let set = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let mut inputs: Vec<(String, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                tracing::warn!("skipping non UTF-8 file name {}", entry.path().display());
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(self.input_suffix.as_str()) {
                if !stem.is_empty() {
                    inputs.push((stem.to_string(), entry.into_path()));
                }
            }
        }
        inputs.sort_by(|(a, _), (b, _)| utils::version_cmp(a, b));

        let mut cases = Vec::with_capacity(inputs.len());
        for (name, input) in inputs {
            let answer = dir.join(format!("{name}{}", self.answer_suffix));
            if !answer.is_file() {
                tracing::warn!(
                    "no answer file {} for {}, skipping",
                    answer.display(),
                    input.display()
                );
                continue;
            }
            cases.push(TestCase {
                name,
                set: set.clone(),
                input,
                answer,
            });
        }
        tracing::debug!("found {} cases in {}", cases.len(), dir.display());
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn pair(root: &Path, problem: &str, name: &str) {
        touch(&root.join(problem).join(format!("{name}.in")));
        touch(&root.join(problem).join(format!("{name}.ans")));
    }

    fn labels(cases: &[TestCase]) -> Vec<String> {
        cases.iter().map(TestCase::label).collect()
    }

    #[test]
    fn cases_are_version_sorted_within_a_root() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        for name in ["case10", "case2", "case9", "case1"] {
            pair(&data, "sum", name);
        }

        let cases = CaseLocator::new(vec![data], "sum").locate().unwrap();
        assert_eq!(
            labels(&cases),
            vec!["data/case1", "data/case2", "data/case9", "data/case10"]
        );
    }

    #[test]
    fn sample_set_runs_before_data_set() {
        let tmp = TempDir::new().unwrap();
        let sample = tmp.path().join("sample");
        let data = tmp.path().join("data");
        pair(&data, "sum", "1");
        pair(&data, "sum", "2");
        pair(&sample, "sum", "10");
        pair(&sample, "sum", "3");

        let cases = CaseLocator::new(vec![sample, data], "sum").locate().unwrap();
        assert_eq!(
            labels(&cases),
            vec!["sample/3", "sample/10", "data/1", "data/2"]
        );
    }

    #[test]
    fn inputs_without_answers_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        pair(&data, "sum", "1");
        touch(&data.join("sum").join("2.in"));

        let cases = CaseLocator::new(vec![data.clone()], "sum").locate().unwrap();
        assert_eq!(labels(&cases), vec!["data/1"]);
        assert_eq!(cases[0].answer, data.join("sum").join("1.ans"));
    }

    #[test]
    fn only_the_problem_directory_is_searched() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        pair(&data, "sum", "1");
        pair(&data, "other", "2");
        pair(&data.join("sum"), "nested", "3");
        touch(&data.join("sum").join("notes.txt"));

        let cases = CaseLocator::new(vec![data], "sum").locate().unwrap();
        assert_eq!(labels(&cases), vec!["data/1"]);
    }

    #[test]
    fn custom_suffixes_are_honoured() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        touch(&data.join("sum").join("a.txt"));
        touch(&data.join("sum").join("a.out"));

        let cases = CaseLocator::new(vec![data], "sum")
            .with_suffixes(".txt", ".out")
            .locate()
            .unwrap();
        assert_eq!(labels(&cases), vec!["data/a"]);
    }

    #[test]
    fn nothing_found_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        touch(&data.join("sum").join("1.in"));

        let err = CaseLocator::new(vec![data, tmp.path().join("missing")], "sum")
            .locate()
            .unwrap_err();
        assert!(matches!(err, JudgeError::NoTestCases { ref problem, .. } if problem == "sum"));
    }
}
