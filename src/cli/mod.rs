//! WC-015: CLI subcommands (run, validate, schema, init, plugins).

use crate::core::config::{self, ChefConfig, DEFAULT_RC_FILE};
use crate::core::executor::RecipeRunner;
use crate::core::parser;
use crate::core::types::{RecipeDocument, RunReport, RESULT_FAILED, RESULT_OK};
use crate::plugins::PluginRegistry;
use crate::session::memory::{MemoryProvider, PageFixture};
use clap::Subcommand;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate and run a recipe; exits with the run's result code
    Run {
        /// Path to the recipe (YAML or JSON)
        recipe: PathBuf,

        /// Runner configuration file (default: ./webchefrc if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Page fixture backing the session (overrides the rc file)
        #[arg(long)]
        page: Option<PathBuf>,

        /// Append run events to this JSONL journal (overrides the rc file)
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Only check the recipe, do not run it
        #[arg(long)]
        syntax_check: bool,
    },

    /// Validate a recipe without running it
    Validate {
        /// Path to the recipe
        recipe: PathBuf,
    },

    /// Print the JSON Schema of the recipe format
    Schema,

    /// Scaffold a recipe and an rc file
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List registered plugin namespaces and commands
    Plugins,
}

/// Dispatch a CLI command. `Ok` carries the process exit code.
pub async fn dispatch(cmd: Commands) -> Result<i32, String> {
    match cmd {
        Commands::Run {
            recipe,
            config,
            page,
            journal,
            syntax_check,
        } => {
            let rc = load_rc(config.as_deref())?;
            if syntax_check {
                return cmd_validate(&recipe);
            }
            cmd_run(&recipe, &rc, page, journal).await
        }
        Commands::Validate { recipe } => cmd_validate(&recipe),
        Commands::Schema => cmd_schema(),
        Commands::Init { path } => cmd_init(&path),
        Commands::Plugins => cmd_plugins(&PluginRegistry::with_builtins()),
    }
}

/// An explicit rc path must exist; the default one is optional.
fn load_rc(path: Option<&Path>) -> Result<ChefConfig, String> {
    match path {
        Some(p) => config::load_config(p, true),
        None => config::load_config(Path::new(DEFAULT_RC_FILE), false),
    }
}

async fn cmd_run(
    recipe: &Path,
    rc: &ChefConfig,
    page: Option<PathBuf>,
    journal: Option<PathBuf>,
) -> Result<i32, String> {
    let text = parser::read_recipe_file(recipe)?;
    let doc = match parser::parse_document(&text) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("  ERROR: {}", e);
            return Ok(RESULT_FAILED);
        }
    };

    let fixture = match page.or_else(|| rc.page.clone()) {
        Some(p) => PageFixture::load(&p)?,
        None => PageFixture::default(),
    };
    let provider = MemoryProvider::new(fixture);
    let registry = PluginRegistry::with_builtins();

    let mut runner = RecipeRunner::new(&registry, &provider).with_browser(rc.browser_config());
    if let Some(path) = journal.or_else(|| rc.journal.clone()) {
        runner = runner.with_journal(path);
    }

    let report = runner.run_document(&doc).await;
    print_report(&report);
    Ok(report.result_code)
}

fn print_report(report: &RunReport) {
    println!(
        "{}: {} task(s) completed, {} step(s) ok, {} skipped, {} ignored ({:.1}s)",
        report.recipe,
        report.tasks_completed,
        report.steps_completed,
        report.steps_skipped,
        report.steps_ignored,
        report.duration.as_secs_f64()
    );
    match &report.failure {
        Some(reason) => println!("FAILED (exit {}): {}", report.result_code, reason),
        None => println!("Run complete: {}", report.run_id),
    }
}

fn cmd_validate(file: &Path) -> Result<i32, String> {
    let text = parser::read_recipe_file(file)?;
    let result = parser::parse_document(&text).and_then(|doc| parser::recipe_from_value(&doc));

    match result {
        Ok(recipe) => {
            println!(
                "OK: {} ({} tasks, {} steps)",
                recipe.name,
                recipe.tasks.len(),
                recipe.step_count()
            );
            Ok(RESULT_OK)
        }
        Err(e) => {
            let errors = e.errors();
            for err in &errors {
                eprintln!("  ERROR: {}", err);
            }
            Err(format!("{} validation error(s)", errors.len()))
        }
    }
}

/// JSON Schema of [`RecipeDocument`].
pub fn recipe_schema() -> Result<Value, String> {
    serde_json::to_value(schemars::schema_for!(RecipeDocument))
        .map_err(|e| format!("JSON serialize error: {}", e))
}

fn cmd_schema() -> Result<i32, String> {
    let schema = recipe_schema()?;
    let text = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("JSON serialize error: {}", e))?;
    println!("{}", text);
    Ok(RESULT_OK)
}

const RECIPE_TEMPLATE: &str = r##"url: https://example.com
name: my-recipe
tasks:
  - name: read the heading
    steps:
      - webchef.builtin.common:
          command: select
          selector: h1
        register: heading
      - webchef.builtin.common:
          command: debug
          format: "heading: {{ heading }}"
        when: "heading != null"
"##;

const RC_TEMPLATE: &str = r#"{
  "browser": { "headless": true, "args": [] },
  "viewport": { "width": 1920, "height": 1080 }
}
"#;

fn cmd_init(path: &Path) -> Result<i32, String> {
    let recipe_path = path.join("recipe.yaml");
    let rc_path = path.join(DEFAULT_RC_FILE);
    for existing in [&recipe_path, &rc_path] {
        if existing.exists() {
            return Err(format!("{} already exists", existing.display()));
        }
    }

    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    for (target, content) in [(&recipe_path, RECIPE_TEMPLATE), (&rc_path, RC_TEMPLATE)] {
        std::fs::write(target, content)
            .map_err(|e| format!("cannot write {}: {}", target.display(), e))?;
    }

    println!("Initialized webchef project at {}", path.display());
    println!("  Created: {}", recipe_path.display());
    println!("  Created: {}", rc_path.display());
    Ok(RESULT_OK)
}

fn cmd_plugins(registry: &PluginRegistry) -> Result<i32, String> {
    for (name, namespace) in registry.namespaces() {
        println!("{} ({} commands)", name, namespace.len());
        for command in namespace.commands() {
            println!("  {}", command);
        }
    }
    Ok(RESULT_OK)
}
