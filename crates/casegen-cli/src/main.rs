//! Casegen CLI
//!
//! The `casegen` command drives the case generation pipeline and its
//! offline tooling.
//!
//! ## Commands
//!
//! - `generate`: run the full pipeline for one request and persist the case
//! - `parse`: recover structured JSON from a raw generator response
//! - `validate`: check an asset file against its content-type rules
//! - `case-check`: check a case draft against the case rules
//! - `arena`, `competency`, `user`: register reference data

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use case_store::{
    ArenaRecord, CaseStore, CompetencyRecord, FsMirrorStore, MirrorStore, NoopMirror,
    SurrealCaseStore, UserRecord,
};
use casegen_core::{
    init_tracing, validate_asset, validate_case, CaseDraft, ContentType, GenerationOptions,
    GenerationOrchestrator, GenerationReport, GenerationRequest, HttpGenerator, LogFormat,
    Overrides, PipelineConfig, Shape, StructuralParser, ValidationResult,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "casegen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate, validate and repair LLM-authored case studies", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "CASEGEN_LOG_JSON")]
    json: bool,

    /// Print command results as JSON instead of text
    #[arg(long, global = true, value_enum, default_value_t = Output::Text)]
    output: Output,

    /// Pipeline configuration file (TOML)
    #[arg(long, global = true, env = "CASEGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ShapeArg {
    Object,
    Array,
    Either,
}

impl From<ShapeArg> for Shape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::Object => Shape::Object,
            ShapeArg::Array => Shape::Array,
            ShapeArg::Either => Shape::Either,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and persist a case with all of its files
    Generate {
        /// Arena the case belongs to
        #[arg(long)]
        arena: String,

        /// Competency the case exercises
        #[arg(long)]
        competency: String,

        /// Blueprint identifier used for duplicate detection
        #[arg(long)]
        blueprint: Option<String>,

        /// Working title (required when no blueprint is given)
        #[arg(long)]
        title: Option<String>,

        /// User the case is attributed to
        #[arg(long)]
        created_by: Option<String>,

        /// Provider name reported in logs
        #[arg(long, default_value = "openai")]
        provider: String,

        /// Model to request
        #[arg(long, env = "CASEGEN_LLM_MODEL", default_value = "gpt-4o")]
        model: String,

        /// Target description length in words
        #[arg(long, default_value_t = 1500)]
        words: u32,

        /// Override the generated difficulty
        #[arg(long)]
        difficulty: Option<String>,

        /// Override the generated duration (minutes)
        #[arg(long)]
        duration: Option<u32>,

        /// Mirror final asset content into this directory
        #[arg(long)]
        mirror_dir: Option<PathBuf>,
    },

    /// Recover structured JSON from a raw response file
    Parse {
        /// File holding the raw response
        file: PathBuf,

        /// Expected top-level structure
        #[arg(long, value_enum, default_value_t = ShapeArg::Object)]
        shape: ShapeArg,

        /// Parse attempts, including the first
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },

    /// Validate an asset file
    Validate {
        /// File holding the asset content
        file: PathBuf,

        /// Content type name (e.g. presentation, tabular) or a declared
        /// file type such as "financial statements"
        #[arg(long = "type")]
        content_type: String,
    },

    /// Validate a case draft (JSON)
    CaseCheck {
        /// File holding the case JSON
        file: PathBuf,
    },

    /// Manage arenas
    Arena {
        #[command(subcommand)]
        action: ArenaAction,
    },

    /// Manage competencies
    Competency {
        #[command(subcommand)]
        action: CompetencyAction,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum ArenaAction {
    /// Register or rename an arena
    Add { id: String, name: String },
}

#[derive(Subcommand)]
enum CompetencyAction {
    /// Register or rename a competency within an arena
    Add {
        id: String,
        name: String,
        #[arg(long)]
        arena: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register or rename a user
    Add { id: String, name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    };
    init_tracing(format, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            arena,
            competency,
            blueprint,
            title,
            created_by,
            provider,
            model,
            words,
            difficulty,
            duration,
            mirror_dir,
        } => {
            let request = GenerationRequest {
                arena_id: arena,
                competency_id: competency,
                blueprint_id: blueprint,
                title,
                created_by,
                options: GenerationOptions {
                    provider,
                    model,
                    target_word_count: words,
                    track_usage: true,
                },
                overrides: Overrides {
                    difficulty,
                    duration_minutes: duration,
                },
            };
            cmd_generate(request, config, mirror_dir.as_deref(), cli.output).await
        }
        Commands::Parse {
            file,
            shape,
            attempts,
        } => cmd_parse(&file, shape.into(), attempts, cli.output),
        Commands::Validate { file, content_type } => {
            cmd_validate(&file, &content_type, &config, cli.output)
        }
        Commands::CaseCheck { file } => cmd_case_check(&file, &config, cli.output),
        Commands::Arena {
            action: ArenaAction::Add { id, name },
        } => {
            let store = open_store().await?;
            store
                .register_arena(ArenaRecord {
                    arena_id: id.clone(),
                    name,
                })
                .await?;
            println!("Registered arena '{}'", id);
            Ok(())
        }
        Commands::Competency {
            action: CompetencyAction::Add { id, name, arena },
        } => {
            let store = open_store().await?;
            store
                .register_competency(CompetencyRecord {
                    competency_id: id.clone(),
                    arena_id: arena.clone(),
                    name,
                })
                .await?;
            println!("Registered competency '{}' in arena '{}'", id, arena);
            Ok(())
        }
        Commands::User {
            action: UserAction::Add { id, name },
        } => {
            let store = open_store().await?;
            store
                .register_user(UserRecord {
                    user_id: id.clone(),
                    display_name: name,
                })
                .await?;
            println!("Registered user '{}'", id);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

async fn open_store() -> Result<SurrealCaseStore> {
    SurrealCaseStore::from_env()
        .await
        .context("Failed to connect to the case database")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the whole pipeline for one request
async fn cmd_generate(
    request: GenerationRequest,
    config: PipelineConfig,
    mirror_dir: Option<&Path>,
    output: Output,
) -> Result<()> {
    let store = Arc::new(open_store().await?);
    let generator = Arc::new(HttpGenerator::from_env().context("Failed to build HTTP client")?);
    let mirror: Arc<dyn MirrorStore> = match mirror_dir {
        Some(dir) => Arc::new(
            FsMirrorStore::new(dir)
                .with_context(|| format!("Failed to open mirror directory {}", dir.display()))?,
        ),
        None => Arc::new(NoopMirror),
    };

    let orchestrator = GenerationOrchestrator::new(generator, store)
        .with_config(config)
        .with_mirror(mirror);

    info!(dedupe_key = %request.dedupe_key(), "Starting generation");
    match orchestrator.run(request).await {
        Ok(report) => {
            match output {
                Output::Json => print_json(&report)?,
                Output::Text => print_report(&report),
            }
            Ok(())
        }
        Err(err) => {
            let response = err.to_response();
            match output {
                Output::Json => print_json(&response)?,
                Output::Text => {
                    eprintln!("error [{}]: {}", response.code, response.message);
                    for violation in &response.violations {
                        eprintln!("  - {}", violation);
                    }
                    if let Some(context) = &response.context {
                        eprintln!("  near: {}", context);
                    }
                }
            }
            bail!("generation failed: {}", response.code)
        }
    }
}

fn print_report(report: &GenerationReport) {
    println!("Case {} ({})", report.case_id, report.blueprint_id);
    println!("Title:     {}", report.draft.title);
    println!(
        "Repaired:  {}{}",
        report.case_repaired,
        if report.flagged { " (flagged)" } else { "" }
    );
    println!("Generator calls: {}", report.generator_calls);
    println!("Latency bound:   {}s", report.latency_bound_ms / 1000);
    for asset in &report.assets {
        let status = if asset.success { "ok" } else { "FAILED" };
        println!(
            "  [{}] {} ({}, {} bytes{})",
            status,
            asset.file_name,
            asset.content_type,
            asset.content_length,
            if asset.repaired { ", repaired" } else { "" }
        );
        for violation in &asset.violations {
            println!("      - {}", violation);
        }
        if let Some(error) = &asset.error {
            println!("      ! {}", error);
        }
    }
}

/// Recover JSON from a raw response file
fn cmd_parse(file: &Path, shape: Shape, attempts: u32, output: Output) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    match StructuralParser::new(attempts).with_shape(shape).parse(&raw) {
        Ok(ok) => {
            info!(attempts = ok.attempts.len(), repaired = ok.repaired(), "Parsed");
            match output {
                Output::Json => print_json(&ok.value),
                Output::Text => {
                    println!("{}", serde_json::to_string_pretty(&ok.value)?);
                    if ok.repaired() {
                        eprintln!("(repaired after {} attempts)", ok.attempts.len());
                    }
                    Ok(())
                }
            }
        }
        Err(failure) => {
            if output == Output::Json {
                print_json(&serde_json::json!({
                    "code": "structural_parse_failure",
                    "message": failure.to_string(),
                    "error_offset": failure.detail.offset,
                    "context": failure.detail.context,
                    "attempts": failure.history,
                }))?;
            } else {
                eprintln!("{}", failure);
                eprintln!("  near: {}", failure.detail.context);
            }
            bail!("parse failed")
        }
    }
}

/// Interpret `--type` as a content type name first, then as a declared type.
fn resolve_content_type(arg: &str, file: &Path) -> ContentType {
    arg.parse().unwrap_or_else(|_| {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ContentType::classify(arg, &name)
    })
}

fn report_validation(result: &ValidationResult, output: Output) -> Result<()> {
    match output {
        Output::Json => print_json(result)?,
        Output::Text => {
            if result.valid {
                println!("valid");
            } else {
                println!("{} violation(s):", result.violations.len());
                for violation in &result.violations {
                    println!("  - {}", violation);
                }
            }
        }
    }
    if !result.valid {
        bail!("validation failed");
    }
    Ok(())
}

/// Validate an asset file
fn cmd_validate(file: &Path, content_type: &str, config: &PipelineConfig, output: Output) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let content_type = resolve_content_type(content_type, file);
    info!(content_type = %content_type, "Validating asset");
    let result = validate_asset(content_type, &raw, &config.asset_thresholds);
    report_validation(&result, output)
}

/// Validate a case draft file
fn cmd_case_check(file: &Path, config: &PipelineConfig, output: Output) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let parsed = StructuralParser::new(config.parse_attempts)
        .parse(&raw)
        .context("Case file is not recoverable JSON")?;
    let draft = CaseDraft::from_value(parsed.value).context("Case file does not match the case schema")?;
    let result = validate_case(&draft, &config.case_thresholds);
    report_validation(&result, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_arguments() {
        let cli = Cli::try_parse_from([
            "casegen",
            "--output",
            "json",
            "generate",
            "--arena",
            "finance",
            "--competency",
            "valuation",
            "--blueprint",
            "bp-1",
            "--duration",
            "45",
        ])
        .unwrap();
        assert_eq!(cli.output, Output::Json);
        match cli.command {
            Commands::Generate {
                arena,
                blueprint,
                duration,
                words,
                ..
            } => {
                assert_eq!(arena, "finance");
                assert_eq!(blueprint.as_deref(), Some("bp-1"));
                assert_eq!(duration, Some(45));
                assert_eq!(words, 1500);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn parses_competency_add() {
        let cli = Cli::try_parse_from([
            "casegen", "competency", "add", "valuation", "Valuation", "--arena", "finance",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Competency {
                action: CompetencyAction::Add { .. }
            }
        ));
    }

    #[test]
    fn content_type_argument_falls_back_to_classification() {
        let file = Path::new("pnl.csv");
        assert_eq!(resolve_content_type("tabular", file), ContentType::Tabular);
        assert_eq!(
            resolve_content_type("org-chart", file),
            ContentType::OrgChart
        );
        assert_eq!(
            resolve_content_type("financial statements", file),
            ContentType::Tabular
        );
        assert_eq!(resolve_content_type("unknown", Path::new("notes.md")), ContentType::Prose);
    }

    #[test]
    fn parse_command_recovers_fenced_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        std::fs::write(&path, "```json\n{\"a\": [1, 2,],}\n```").unwrap();
        assert!(cmd_parse(&path, Shape::Object, 3, Output::Json).is_ok());
        assert!(cmd_parse(&path, Shape::Object, 1, Output::Json).is_err());
    }

    #[test]
    fn validate_command_fails_on_violations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.md");
        std::fs::write(&path, "---\nmarp: true\n---\n# Only slide").unwrap();
        let config = PipelineConfig::default();
        assert!(cmd_validate(&path, "presentation", &config, Output::Text).is_err());

        let relaxed = PipelineConfig::from_toml_str("[asset_thresholds]\nmin_slides = 1").unwrap();
        assert!(cmd_validate(&path, "presentation", &relaxed, Output::Text).is_ok());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/definitely/not/here.toml"))).is_err());
        assert!(load_config(None).is_ok());
    }
}
