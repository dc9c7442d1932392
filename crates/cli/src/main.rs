use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use cohort_core::config::{as_of_from_env_value, bulk_import_threshold_from_env_value};
use cohort_core::constants::{AS_OF_ENV_VAR, BULK_IMPORT_WARN_THRESHOLD_ENV_VAR};
use cohort_core::validation::parse_instant;
use cohort_core::{Cohort, CoreConfig, Membership, SetOperation};
use std::fmt::Write as _;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Cohort membership set tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Union,
    Intersect,
    Subtract,
}

impl From<Operation> for SetOperation {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Union => SetOperation::Union,
            Operation::Intersect => SetOperation::Intersect,
            Operation::Subtract => SetOperation::Subtract,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Combine two cohorts
    Combine {
        /// Set operation to apply
        #[arg(value_enum)]
        operation: Operation,
        /// Left cohort: comma-separated ids or a cohort JSON file
        left: String,
        /// Right cohort: comma-separated ids or a cohort JSON file
        right: String,
        /// Print the resulting cohort as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether a cohort contains a subject
    Contains {
        /// Cohort: comma-separated ids or a cohort JSON file
        cohort: String,
        /// Subject id
        subject_id: i32,
    },
    /// List memberships active at an instant
    Active {
        /// Cohort: comma-separated ids or a cohort JSON file
        cohort: String,
        /// Instant to test (YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339); defaults to now
        #[arg(long)]
        as_of: Option<String>,
    },
    /// List memberships in display order
    Sort {
        /// Cohort: comma-separated ids or a cohort JSON file
        cohort: String,
    },
}

/// Loads an operand: a path to a cohort JSON file, or else a comma-separated id list.
fn load_cohort(operand: &str) -> anyhow::Result<Cohort> {
    let path = Path::new(operand);
    if path.extension().is_some_and(|ext| ext == "json") {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cohort file {}", path.display()))?;
        let cohort = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse cohort file {}", path.display()))?;
        return Ok(cohort);
    }

    Cohort::from_id_str(operand).with_context(|| format!("invalid id list '{}'", operand))
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into())
}

fn format_membership(m: &Membership) -> String {
    format!(
        "subject={} start={} end={} voided={} uuid={}",
        m.subject_id(),
        format_date(m.start_date()),
        format_date(m.end_date()),
        m.voided(),
        m.uuid()
    )
}

fn render_cohort(cohort: &Cohort) -> anyhow::Result<String> {
    let mut out = String::new();
    if let Some(name) = cohort.name() {
        writeln!(out, "Cohort: {}", name)?;
    }
    for m in cohort.memberships() {
        writeln!(out, "{}", format_membership(m))?;
    }
    write!(
        out,
        "Members: {}, records: {}",
        cohort.size(),
        cohort.memberships().len()
    )?;
    Ok(out)
}

fn combine(operation: Operation, left: &str, right: &str, json: bool) -> anyhow::Result<String> {
    let a = load_cohort(left)?;
    let b = load_cohort(right)?;
    let op = SetOperation::from(operation);
    let result = op.apply(Some(&a), Some(&b))?;
    tracing::debug!(%op, records = result.memberships().len(), "combined operands");

    if json {
        return Ok(serde_json::to_string_pretty(&result)?);
    }
    render_cohort(&result)
}

fn contains(cfg: &CoreConfig, operand: &str, subject_id: i32) -> anyhow::Result<String> {
    let cohort = load_cohort(operand)?;
    Ok(format!(
        "contains: {}, active: {}",
        cohort.contains(subject_id),
        cohort.has_active_membership(subject_id, Some(cfg.now()))
    ))
}

fn active(cfg: &CoreConfig, operand: &str, as_of: Option<&str>) -> anyhow::Result<String> {
    let cohort = load_cohort(operand)?;
    let as_of = match as_of {
        Some(raw) => parse_instant(raw)?,
        None => cfg.now(),
    };

    let active = cohort.active_memberships(Some(as_of));
    let mut out = String::new();
    for m in &active {
        writeln!(out, "{}", format_membership(m))?;
    }
    write!(
        out,
        "Active records as of {}: {}",
        as_of.format("%Y-%m-%d %H:%M:%S"),
        active.len()
    )?;
    Ok(out)
}

fn sort(operand: &str) -> anyhow::Result<String> {
    let cohort = load_cohort(operand)?;
    Ok(cohort
        .sorted_memberships()
        .into_iter()
        .map(format_membership)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn load_config() -> anyhow::Result<CoreConfig> {
    let as_of = as_of_from_env_value(std::env::var(AS_OF_ENV_VAR).ok())?;
    let threshold =
        bulk_import_threshold_from_env_value(std::env::var(BULK_IMPORT_WARN_THRESHOLD_ENV_VAR).ok())?;
    Ok(CoreConfig::new(as_of, threshold)?)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("cohort=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config()?;

    let output = match cli.command {
        Some(Commands::Combine {
            operation,
            left,
            right,
            json,
        }) => combine(operation, &left, &right, json)?,
        Some(Commands::Contains { cohort, subject_id }) => contains(&cfg, &cohort, subject_id)?,
        Some(Commands::Active { cohort, as_of }) => active(&cfg, &cohort, as_of.as_deref())?,
        Some(Commands::Sort { cohort }) => sort(&cohort)?,
        None => "Use 'cohort --help' for commands".to_string(),
    };
    println!("{}", output);

    Ok(())
}
