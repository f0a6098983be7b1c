//! Run configuration.
//!
//! Settings come from, in order of precedence: the command line, a TOML
//! file, the environment (`CXX`, `CXXFLAGS`) and built-in defaults.
//! [`resolve_configuration`] merges them without touching the filesystem
//! except through an [`FsProbe`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JudgeError, Result};
use crate::runner::CpuBudget;

pub const DEFAULT_CONFIG_FILE: &str = "judge.toml";
pub const DEFAULT_COMPILER: &str = "g++";
pub const DEFAULT_FLAGS: &[&str] = &["-O2", "-std=c++14"];
pub const DEFAULT_TIME_LIMIT: f64 = 1.0;
pub const DEFAULT_ROOTS: &[&str] = &["sample", "data"];

/// One source of settings. Every field is optional so layers can be stacked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub problem: Option<String>,
    pub source: Option<PathBuf>,
    pub compiler: Option<String>,
    pub flags: Option<Vec<String>>,
    /// CPU seconds per case.
    pub time_limit: Option<f64>,
    /// Wall-clock seconds after which a case is killed regardless of CPU use.
    pub wall_limit: Option<f64>,
    pub roots: Option<Vec<PathBuf>>,
    pub work_dir: Option<PathBuf>,
    pub input_suffix: Option<String>,
    pub answer_suffix: Option<String>,
}

impl ConfigLayer {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| JudgeError::file(path, e))?;
        toml::from_str(&content).map_err(|source| JudgeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fields set in `self` win over those in `lower`.
    pub fn merge(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            problem: self.problem.or(lower.problem),
            source: self.source.or(lower.source),
            compiler: self.compiler.or(lower.compiler),
            flags: self.flags.or(lower.flags),
            time_limit: self.time_limit.or(lower.time_limit),
            wall_limit: self.wall_limit.or(lower.wall_limit),
            roots: self.roots.or(lower.roots),
            work_dir: self.work_dir.or(lower.work_dir),
            input_suffix: self.input_suffix.or(lower.input_suffix),
            answer_suffix: self.answer_suffix.or(lower.answer_suffix),
        }
    }

    fn from_env(env: &dyn Fn(&str) -> Option<String>) -> ConfigLayer {
        let compiler = env("CXX").filter(|c| !c.trim().is_empty());
        let flags = env("CXXFLAGS")
            .map(|f| f.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|f| !f.is_empty());
        ConfigLayer {
            compiler,
            flags,
            ..Default::default()
        }
    }
}

/// The only filesystem access configuration resolution needs.
pub trait FsProbe {
    fn is_file(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// The explicitly requested file, else `judge.toml` when it exists.
pub fn discover_config_file(explicit: Option<&Path>, probe: &dyn FsProbe) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            probe.is_file(&default).then_some(default)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub problem: String,
    pub source: PathBuf,
    pub compiler: String,
    pub flags: Vec<String>,
    pub time_limit: CpuBudget,
    pub wall_limit: Option<Duration>,
    pub roots: Vec<PathBuf>,
    /// Where the executable and staged I/O live; a temporary directory when unset.
    pub work_dir: Option<PathBuf>,
    pub input_suffix: String,
    pub answer_suffix: String,
}

pub fn resolve_configuration(
    cli: ConfigLayer,
    file: Option<ConfigLayer>,
    env: &dyn Fn(&str) -> Option<String>,
    probe: &dyn FsProbe,
) -> Result<RunConfig> {
    let layer = cli
        .merge(file.unwrap_or_default())
        .merge(ConfigLayer::from_env(env));

    let problem = match (&layer.problem, &layer.source) {
        (Some(problem), _) => problem.clone(),
        (None, Some(source)) => source
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                JudgeError::Config(format!(
                    "cannot derive a problem name from {}",
                    source.display()
                ))
            })?,
        (None, None) => {
            return Err(JudgeError::Config(
                "no problem given; pass a problem name or a source file".to_string(),
            ))
        }
    };
    if problem.is_empty() || problem.contains(['/', '\\']) || problem == "." || problem == ".." {
        return Err(JudgeError::Config(format!("invalid problem name `{problem}`")));
    }

    let source = layer
        .source
        .unwrap_or_else(|| PathBuf::from(format!("{problem}.cpp")));
    if !probe.is_file(&source) {
        return Err(JudgeError::Config(format!(
            "source file {} does not exist",
            source.display()
        )));
    }

    let time_limit = CpuBudget::from_secs_f64(layer.time_limit.unwrap_or(DEFAULT_TIME_LIMIT))?;
    let wall_limit = layer
        .wall_limit
        .map(|secs| {
            if secs.is_finite() && secs > 0.0 {
                Duration::try_from_secs_f64(secs).map_err(|e| JudgeError::Config(e.to_string()))
            } else {
                Err(JudgeError::Config(format!(
                    "wall limit must be a positive number of seconds, got {secs}"
                )))
            }
        })
        .transpose()?;

    let roots = layer
        .roots
        .unwrap_or_else(|| DEFAULT_ROOTS.iter().map(PathBuf::from).collect());
    if roots.is_empty() {
        return Err(JudgeError::Config("no test data roots configured".to_string()));
    }

    let input_suffix = layer.input_suffix.unwrap_or_else(|| ".in".to_string());
    let answer_suffix = layer.answer_suffix.unwrap_or_else(|| ".ans".to_string());
    if input_suffix.is_empty() || answer_suffix.is_empty() || input_suffix == answer_suffix {
        return Err(JudgeError::Config(format!(
            "input and answer suffixes must be distinct and non-empty, got `{input_suffix}` and `{answer_suffix}`"
        )));
    }

    Ok(RunConfig {
        problem,
        source,
        compiler: layer.compiler.unwrap_or_else(|| DEFAULT_COMPILER.to_string()),
        flags: layer
            .flags
            .unwrap_or_else(|| DEFAULT_FLAGS.iter().map(|f| f.to_string()).collect()),
        time_limit,
        wall_limit,
        roots,
        work_dir: layer.work_dir,
        input_suffix,
        answer_suffix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    struct FakeFs(HashSet<PathBuf>);

    impl FakeFs {
        fn with(files: &[&str]) -> Self {
            Self(files.iter().map(PathBuf::from).collect())
        }
    }

    impl FsProbe for FakeFs {
        fn is_file(&self, path: &Path) -> bool {
            self.0.contains(path)
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn cli_problem(problem: &str) -> ConfigLayer {
        ConfigLayer {
            problem: Some(problem.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_everything_else() {
        let config =
            resolve_configuration(cli_problem("sum"), None, &no_env, &FakeFs::with(&["sum.cpp"]))
                .unwrap();
        assert_eq!(config.problem, "sum");
        assert_eq!(config.source, PathBuf::from("sum.cpp"));
        assert_eq!(config.compiler, "g++");
        assert_eq!(config.flags, vec!["-O2", "-std=c++14"]);
        assert_eq!(config.time_limit.as_duration(), Duration::from_secs(1));
        assert_eq!(config.roots, vec![PathBuf::from("sample"), PathBuf::from("data")]);
        assert_eq!(config.wall_limit, None);
        assert_eq!(config.work_dir, None);
        assert_eq!((config.input_suffix.as_str(), config.answer_suffix.as_str()), (".in", ".ans"));
    }

    #[test]
    fn command_line_beats_file_beats_environment() {
        let env: HashMap<&str, &str> = [("CXX", "clang++"), ("CXXFLAGS", "-O3 -g")].into();
        let env = |key: &str| env.get(key).map(|v| v.to_string());

        let file = ConfigLayer {
            compiler: Some("g++-13".to_string()),
            time_limit: Some(2.5),
            ..Default::default()
        };
        let cli = ConfigLayer {
            time_limit: Some(0.5),
            ..cli_problem("sum")
        };

        let config =
            resolve_configuration(cli, Some(file), &env, &FakeFs::with(&["sum.cpp"])).unwrap();
        assert_eq!(config.compiler, "g++-13");
        assert_eq!(config.flags, vec!["-O3", "-g"]);
        assert_eq!(config.time_limit.as_duration(), Duration::from_millis(500));
    }

    #[test]
    fn problem_is_derived_from_source() {
        let cli = ConfigLayer {
            source: Some(PathBuf::from("src/knapsack.cpp")),
            ..Default::default()
        };
        let config =
            resolve_configuration(cli, None, &no_env, &FakeFs::with(&["src/knapsack.cpp"]))
                .unwrap();
        assert_eq!(config.problem, "knapsack");
    }

    #[test]
    fn missing_problem_or_source_is_rejected() {
        let err = resolve_configuration(ConfigLayer::default(), None, &no_env, &FakeFs::with(&[]));
        assert!(matches!(err, Err(JudgeError::Config(_))));

        let err = resolve_configuration(cli_problem("sum"), None, &no_env, &FakeFs::with(&[]));
        assert!(matches!(err, Err(JudgeError::Config(msg)) if msg.contains("sum.cpp")));

        let err = resolve_configuration(cli_problem("../x"), None, &no_env, &FakeFs::with(&[]));
        assert!(matches!(err, Err(JudgeError::Config(_))));
    }

    #[test]
    fn limits_must_be_positive() {
        let fs = FakeFs::with(&["sum.cpp"]);
        for time_limit in [0.0, -2.0, f64::NAN] {
            let cli = ConfigLayer {
                time_limit: Some(time_limit),
                ..cli_problem("sum")
            };
            assert!(resolve_configuration(cli, None, &no_env, &fs).is_err());
        }
        let cli = ConfigLayer {
            wall_limit: Some(0.0),
            ..cli_problem("sum")
        };
        assert!(resolve_configuration(cli, None, &no_env, &fs).is_err());

        let cli = ConfigLayer {
            wall_limit: Some(10.0),
            ..cli_problem("sum")
        };
        let config = resolve_configuration(cli, None, &no_env, &fs).unwrap();
        assert_eq!(config.wall_limit, Some(Duration::from_secs(10)));
    }

    #[test]
    fn toml_layer_parses_and_rejects_unknown_keys() {
        let layer: ConfigLayer = toml::from_str(
            r#"
problem = "sum"
flags = ["-O2", "-DLOCAL"]
time_limit = 2
roots = ["tests"]
"#,
        )
        .unwrap();
        assert_eq!(layer.problem.as_deref(), Some("sum"));
        assert_eq!(layer.time_limit, Some(2.0));
        assert_eq!(layer.roots, Some(vec![PathBuf::from("tests")]));

        assert!(toml::from_str::<ConfigLayer>("timelimit = 2").is_err());
    }

    #[test]
    fn config_file_is_discovered_only_when_present() {
        assert_eq!(discover_config_file(None, &FakeFs::with(&[])), None);
        assert_eq!(
            discover_config_file(None, &FakeFs::with(&["judge.toml"])),
            Some(PathBuf::from("judge.toml"))
        );
        assert_eq!(
            discover_config_file(Some(Path::new("other.toml")), &FakeFs::with(&[])),
            Some(PathBuf::from("other.toml"))
        );
    }
}
