//! WC-009: Step executor, task runner, and recipe runner.
//!
//! open session → navigate → tasks in order → close session → report.
//! Steps run strictly one after another. The first step that fails without
//! `ignore_errors` stops the recipe (jidoka); the session is still closed
//! exactly once on every path after a successful open.

use super::config::BrowserConfig;
use super::error::StepError;
use super::parser;
use super::resolver;
use super::store::VariableStore;
use super::types::*;
use crate::journal::{self, Journal, RunEvent};
use crate::plugins::PluginRegistry;
use crate::session::{Session, SessionProvider};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a single step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Plugin ran; its result was registered if requested.
    Completed,
    /// `when` evaluated false. Nothing ran.
    Skipped,
    /// Failed, but the step has `ignore_errors`.
    Ignored(StepError),
    /// Failed and stops the recipe.
    Fatal(StepError),
}

/// Outcome of a task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed,
    Aborted(StepError),
}

/// Condition, substitution, dispatch. `Ok(None)` means the condition was false.
async fn invoke_step(
    step: &Step,
    session: &dyn Session,
    store: &VariableStore,
    registry: &PluginRegistry,
) -> Result<Option<Value>, StepError> {
    let namespace = &step.operation.namespace;

    if let Some(when) = &step.control.when {
        if !resolver::evaluate_condition(when, store)? {
            info!(when = %when, "Condition not met");
            return Ok(None);
        }
    }

    let payload = resolver::resolve_payload(&step.operation.payload, store)?;
    let command = payload
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::InvalidCommand {
            namespace: namespace.clone(),
        })?;
    let capability = registry.resolve(namespace, command)?;

    let shown = Value::Object(masked(&payload));
    debug!(payload = %shown, "Invoking {}.{}",
        namespace,
        command
    );
    capability
        .invoke(session, &payload)
        .await
        .map(Some)
        .map_err(|source| StepError::Plugin {
            namespace: namespace.clone(),
            command: command.to_string(),
            source,
        })
}

/// Execute one step against the session, writing its result to the store
/// when it completes and has `register`.
pub async fn execute_step(
    step: &Step,
    session: &dyn Session,
    store: &mut VariableStore,
    registry: &PluginRegistry,
) -> StepOutcome {
    match invoke_step(step, session, store, registry).await {
        Ok(None) => StepOutcome::Skipped,
        Ok(Some(value)) => {
            if let Some(name) = &step.control.register {
                info!("Registering variable {} with value {}", name, value);
                store.set(name.clone(), value);
            }
            StepOutcome::Completed
        }
        Err(e) if step.control.ignore_errors => {
            warn!(kind = %e.kind(), "Ignoring error: {}", e);
            StepOutcome::Ignored(e)
        }
        Err(e) => {
            error!(kind = %e.kind(), "Error executing plugin {}: {}", step.operation.namespace, e);
            StepOutcome::Fatal(e)
        }
    }
}

/// Everything a task needs besides the store.
pub struct StepContext<'a> {
    pub session: &'a dyn Session,
    pub registry: &'a PluginRegistry,
    pub journal: Option<&'a Journal>,
}

impl StepContext<'_> {
    fn record(&self, event: RunEvent) {
        if let Some(journal) = self.journal {
            journal.record(event);
        }
    }
}

/// Run a task's steps in order; the first fatal step aborts it.
pub async fn run_task(
    task: &Task,
    ctx: &StepContext<'_>,
    store: &mut VariableStore,
    report: &mut RunReport,
) -> TaskOutcome {
    info!("Executing task: {}", task.name);
    ctx.record(RunEvent::TaskStarted {
        task: task.name.clone(),
    });

    if task.steps.is_empty() {
        info!("No steps to perform for this task.");
        return TaskOutcome::Completed;
    }

    for (i, step) in task.steps.iter().enumerate() {
        let operation = Value::Object(masked(&step.operation.payload));
        debug!(step = i, operation = %operation, "{}", step.operation.namespace);
        match execute_step(step, ctx.session, store, ctx.registry).await {
            StepOutcome::Completed => {
                report.steps_completed += 1;
                ctx.record(RunEvent::StepCompleted {
                    task: task.name.clone(),
                    step: i,
                    namespace: step.operation.namespace.clone(),
                    registered: step.control.register.clone(),
                });
            }
            StepOutcome::Skipped => {
                report.steps_skipped += 1;
                ctx.record(RunEvent::StepSkipped {
                    task: task.name.clone(),
                    step: i,
                });
            }
            StepOutcome::Ignored(e) => {
                report.steps_ignored += 1;
                ctx.record(step_failed(&task.name, i, &e, true));
            }
            StepOutcome::Fatal(e) => {
                ctx.record(step_failed(&task.name, i, &e, false));
                return TaskOutcome::Aborted(e);
            }
        }
    }

    TaskOutcome::Completed
}

fn step_failed(task: &str, step: usize, e: &StepError, ignored: bool) -> RunEvent {
    RunEvent::StepFailed {
        task: task.to_string(),
        step,
        kind: e.kind().to_string(),
        error: e.to_string(),
        ignored,
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!("run state: {} -> {}", state, next);
    *state = next;
}

/// Runs recipes against sessions from one provider.
pub struct RecipeRunner<'a> {
    registry: &'a PluginRegistry,
    provider: &'a dyn SessionProvider,
    browser: BrowserConfig,
    journal: Option<PathBuf>,
}

impl<'a> RecipeRunner<'a> {
    pub fn new(registry: &'a PluginRegistry, provider: &'a dyn SessionProvider) -> Self {
        Self {
            registry,
            provider,
            browser: BrowserConfig::default(),
            journal: None,
        }
    }

    pub fn with_browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }

    /// Append run events to a JSONL journal.
    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal = Some(path.into());
        self
    }

    /// Validate and run a raw recipe document. An invalid document fails
    /// with 255 before any session is opened.
    pub async fn run_document(&self, doc: &Value) -> RunReport {
        match parser::recipe_from_value(doc) {
            Ok(recipe) => self.run(&recipe).await,
            Err(e) => {
                error!("{}", e);
                let name = doc.get("name").and_then(Value::as_str).unwrap_or_default();
                let mut report = RunReport::new(name, &journal::generate_run_id());
                report.fail(e.to_string());
                report
            }
        }
    }

    /// Run a validated recipe.
    pub async fn run(&self, recipe: &Recipe) -> RunReport {
        let started = Instant::now();
        let run_id = journal::generate_run_id();
        let journal = self.journal.as_ref().map(|p| Journal::new(p, &run_id));
        let mut report = RunReport::new(&recipe.name, &run_id);
        let mut state = RunState::Init;
        let mut store = VariableStore::new();

        debug!(run_id = %run_id, "run state: {}", state);
        if let Some(j) = &journal {
            j.record(RunEvent::RunStarted {
                recipe: recipe.name.clone(),
                url: recipe.url.clone(),
                webchef_version: env!("CARGO_PKG_VERSION").to_string(),
            });
        }

        match self.provider.open(&self.browser).await {
            Err(e) => {
                error!("{}", e);
                report.fail(e.to_string());
            }
            Ok(session) => {
                self.drive(
                    recipe,
                    session.as_ref(),
                    journal.as_ref(),
                    &mut state,
                    &mut store,
                    &mut report,
                )
                .await;
                transition(&mut state, RunState::ClosingSession);
                if let Err(e) = session.close().await {
                    error!("{}", e);
                    report.fail(e.to_string());
                }
            }
        }

        transition(&mut state, RunState::Done);
        report.variables = store.snapshot();
        report.duration = started.elapsed();

        if let Some(j) = &journal {
            j.record(RunEvent::RunCompleted {
                result_code: report.result_code,
                tasks_completed: report.tasks_completed,
                total_seconds: report.duration.as_secs_f64(),
            });
        }
        info!(
            result_code = report.result_code,
            "Recipe '{}' finished in {:.2}s",
            recipe.name,
            report.duration.as_secs_f64()
        );
        report
    }

    /// Navigate and run every task. Never closes the session.
    async fn drive(
        &self,
        recipe: &Recipe,
        session: &dyn Session,
        journal: Option<&Journal>,
        state: &mut RunState,
        store: &mut VariableStore,
        report: &mut RunReport,
    ) {
        transition(state, RunState::Navigating);
        info!("Navigating to {}", recipe.url);
        if let Err(e) = session.navigate(&recipe.url).await {
            error!("{}", e);
            report.fail(e.to_string());
            return;
        }

        transition(state, RunState::RunningTasks);
        let ctx = StepContext {
            session,
            registry: self.registry,
            journal,
        };
        for task in &recipe.tasks {
            match run_task(task, &ctx, store, report).await {
                TaskOutcome::Completed => report.tasks_completed += 1,
                TaskOutcome::Aborted(e) => {
                    report.fail(format!("task '{}' aborted: {}", task.name, e));
                    return;
                }
            }
        }
    }
}
