//! Step executor.
//!
//! Runs individual [`BuildStep`]s: evaluates the step's condition, layers
//! the environment, streams output to the log and enforces the deadline.
//! The same subprocess primitive ([`StepExecutor::run_command`]) is used by
//! the platform dispatcher for toolchain invocations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::{Captures, Regex};

use crate::core::condition::ConditionContext;
use crate::core::errors::BuildError;
use crate::core::step::BuildStep;
use crate::util::process::{ExecOutcome, OutputStream, ProcessBuilder};

/// What happened to a step that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The command ran and exited successfully.
    Completed { duration: Duration },
    /// The condition was false; nothing was spawned.
    Skipped { reason: String },
}

/// A step whose failure was tolerated.
#[derive(Debug, Clone)]
pub struct StepWarning {
    pub step: String,
    pub message: String,
}

/// Summary of running a step list.
#[derive(Debug, Clone, Default)]
pub struct StepsReport {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub warnings: Vec<StepWarning>,
}

/// Observer notified as steps finish. Used for the build event log.
pub trait StepObserver {
    fn step_finished(&mut self, label: &str, step: &BuildStep, outcome: &Result<StepOutcome, BuildError>);
}

impl StepObserver for () {
    fn step_finished(&mut self, _: &str, _: &BuildStep, _: &Result<StepOutcome, BuildError>) {}
}

/// Runs shell steps for one project.
#[derive(Debug, Clone)]
pub struct StepExecutor {
    project_root: PathBuf,
    env: BTreeMap<String, String>,
}

impl StepExecutor {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        StepExecutor {
            project_root: project_root.into(),
            env: BTreeMap::new(),
        }
    }

    /// Add an executor-level environment variable.
    ///
    /// These sit between the ambient process environment and step-level
    /// variables.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Absolute working directory for a step.
    pub fn working_dir(&self, step: &BuildStep) -> PathBuf {
        match &step.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.clone(),
        }
    }

    /// Whether a step's condition allows it to run.
    pub fn should_run(&self, step: &BuildStep) -> bool {
        match &step.condition {
            None => true,
            Some(condition) => {
                let working_dir = self.working_dir(step);
                condition.evaluate(&ConditionContext {
                    project_root: &self.project_root,
                    working_dir: &working_dir,
                })
            }
        }
    }

    /// Environment a step's command receives on top of the ambient one.
    ///
    /// Step values are expanded against the ambient and executor layers.
    pub fn step_env(&self, step: &BuildStep) -> BTreeMap<String, String> {
        let mut merged = self.env.clone();
        for (key, value) in &step.environment {
            let expanded = expand_vars(value, |name| {
                self.env
                    .get(name)
                    .cloned()
                    .or_else(|| std::env::var(name).ok())
            });
            merged.insert(key.clone(), expanded);
        }
        merged
    }

    /// Run one step.
    pub fn run_step(&self, step: &BuildStep) -> Result<StepOutcome, BuildError> {
        if !self.should_run(step) {
            let reason = match &step.condition {
                Some(condition) => format!("condition `{}` is false", condition),
                None => "condition is false".to_string(),
            };
            tracing::info!("Skipping step `{}`: {}", step.name, reason);
            return Ok(StepOutcome::Skipped { reason });
        }

        tracing::info!("Running step `{}`: {}", step.name, step.command);

        let process = ProcessBuilder::shell(&step.command)
            .cwd(self.working_dir(step))
            .envs(&self.step_env(step));

        let start = Instant::now();
        self.run_command(&step.name, &process, step.timeout())?;
        let duration = start.elapsed();

        tracing::debug!("Step `{}` finished in {:.2}s", step.name, duration.as_secs_f64());
        Ok(StepOutcome::Completed { duration })
    }

    /// Run a step list with the required/optional policy.
    ///
    /// Optional failures are collected as warnings and the list continues.
    /// The first required failure stops the list and is returned.
    pub fn run_steps(
        &self,
        label: &str,
        steps: &[BuildStep],
        observer: &mut dyn StepObserver,
    ) -> Result<StepsReport, BuildError> {
        let mut report = StepsReport::default();

        for step in steps {
            let outcome = self.run_step(step);
            observer.step_finished(label, step, &outcome);

            match outcome {
                Ok(StepOutcome::Completed { .. }) => report.completed.push(step.name.clone()),
                Ok(StepOutcome::Skipped { .. }) => report.skipped.push(step.name.clone()),
                Err(err) if !step.required => {
                    tracing::warn!("Optional {} step `{}` failed: {}", label, step.name, err);
                    report.warnings.push(StepWarning {
                        step: step.name.clone(),
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::error!("Required {} step `{}` failed: {}", label, step.name, err);
                    return Err(err);
                }
            }
        }

        Ok(report)
    }

    /// Run a process under a deadline, logging its output line by line.
    ///
    /// Executor-level environment is applied beneath whatever the process
    /// already sets. Non-zero exit, spawn failure and timeout are all
    /// reported as [`BuildError::StepFailed`].
    pub fn run_command(
        &self,
        label: &str,
        process: &ProcessBuilder,
        timeout: Duration,
    ) -> Result<(), BuildError> {
        let process = ProcessBuilder::new(process.get_program())
            .args(process.get_args())
            .envs(&self.env)
            .envs(process.get_env())
            .cwd(process.get_cwd().unwrap_or(self.project_root.as_path()));

        tracing::debug!("Executing: {}", process.display_command());

        let prefix = label.to_string();
        let outcome = process
            .exec_streaming(Some(timeout), move |stream, line| match stream {
                OutputStream::Stdout => tracing::info!("[{}] {}", prefix, line),
                OutputStream::Stderr => tracing::info!("[{}] ! {}", prefix, line),
            })
            .map_err(|e| BuildError::StepFailed {
                step: label.to_string(),
                message: format!("{:#}", e),
            })?;

        match outcome {
            ExecOutcome::Exited(status) if status.success() => Ok(()),
            ExecOutcome::Exited(status) => Err(BuildError::StepFailed {
                step: label.to_string(),
                message: match status.code() {
                    Some(code) => format!("`{}` exited with code {}", process.display_command(), code),
                    None => format!("`{}` was terminated by a signal", process.display_command()),
                },
            }),
            ExecOutcome::TimedOut(elapsed) => Err(BuildError::StepFailed {
                step: label.to_string(),
                message: format!(
                    "timed out after {}s (limit {}s)",
                    elapsed.as_secs(),
                    timeout.as_secs()
                ),
            }),
        }
    }
}

/// Expand `$VAR` and `${VAR}` references; unknown variables become empty.
pub fn expand_vars<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let re = match Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)") {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };

    re.replace_all(value, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_default()
    })
    .into_owned()
}
