// LC Compliance - command line
// Compile SWIFT formats, validate values, check presentations, work the
// discrepancy queue.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use lc_compliance::{
    compile_format, config, db, validate, AppConfig, ConfigOverrides, DiscrepancyClassifier,
    DiscrepancyReport, DiscrepancyStatus, FieldCatalog, Presentation, ResolveOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "lc-compliance")]
#[command(about = "SWIFT field validation and UCP 600 discrepancy checks for letters of credit")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Reference data JSON (UCP articles, equivalence map, deadlines)
    #[arg(long, global = true)]
    reference: Option<PathBuf>,

    /// Actor recorded in the audit trail
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a SWIFT format string into validation rules
    Compile {
        format: String,
        #[arg(long)]
        json: bool,
    },

    /// Validate a value against a SWIFT format string
    Validate { format: String, value: String },

    /// Classify a presentation (JSON from the OCR step) and store the findings
    Check {
        presentation: PathBuf,
        /// Print the report without storing it
        #[arg(long)]
        no_save: bool,
        #[arg(long)]
        json: bool,
    },

    /// List stored discrepancies
    List {
        #[arg(long)]
        status: Option<DiscrepancyStatus>,
    },

    /// Show one discrepancy with its audit trail
    Show { record_id: String },

    /// Mark a discrepancy resolved
    Resolve {
        record_id: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Report for a stored run
    Report { run_id: String },

    /// Store a field format catalogue CSV in the database
    ImportFormats { csv: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lc_compliance=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        database_path: cli.db.clone(),
        reference_path: cli.reference.clone(),
        actor: cli.actor.clone(),
    };

    match cli.command {
        Command::Compile { format, json } => run_compile(&format, json),
        Command::Validate { format, value } => run_validate(&format, &value),
        Command::Check {
            presentation,
            no_save,
            json,
        } => run_check(&AppConfig::load(&overrides)?, &presentation, no_save, json),
        Command::List { status } => run_list(&AppConfig::load(&overrides)?, status),
        Command::Show { record_id } => run_show(&AppConfig::load(&overrides)?, &record_id),
        Command::Resolve { record_id, note } => {
            run_resolve(&AppConfig::load(&overrides)?, &record_id, note.as_deref())
        }
        Command::Report { run_id } => run_report(&AppConfig::load(&overrides)?, &run_id),
        Command::ImportFormats { csv } => run_import_formats(&AppConfig::load(&overrides)?, &csv),
    }
}

fn run_compile(format: &str, json: bool) -> Result<()> {
    let rules = compile_format(format);

    if json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    println!("🧩 Format {} → {} rule(s)", format, rules.len());
    for rule in &rules {
        println!(
            "  [{}] {:?} - {}{}",
            rule.priority,
            rule.rule_type,
            rule.description,
            if rule.is_mandatory { " (mandatory)" } else { "" }
        );
    }
    Ok(())
}

fn run_validate(format: &str, value: &str) -> Result<()> {
    let outcome = validate(value, &compile_format(format));

    if outcome.passed {
        println!("✅ '{}' matches {}", value, format);
    } else {
        println!("❌ '{}' does not match {}", value, format);
        for violation in &outcome.violations {
            println!("   - {}", violation.reason);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_check(config: &AppConfig, path: &Path, no_save: bool, json: bool) -> Result<()> {
    let presentation = Presentation::from_file(path)?;
    let lc_reference = presentation.lc_reference.clone();
    let documents = presentation.into_document_set();

    let conn = db::open_database(&config.database_path)?;
    let mut reference = config.load_reference()?;
    if config.field_formats_path.is_none() {
        // An imported catalogue replaces the built-in one
        let stored = db::load_field_formats(&conn)?;
        if !stored.is_empty() {
            reference.field_formats = stored;
        }
    }

    let classifier = DiscrepancyClassifier::new(reference);
    let run = classifier
        .classify(&documents)
        .context("Classification failed")?;

    for error in &run.configuration_errors {
        eprintln!("⚠️  {}", error);
    }

    let report = DiscrepancyReport::from_run(&run, lc_reference.clone());

    if !no_save {
        let run_id = db::save_run(&conn, &run, lc_reference.as_deref(), &config.actor)?;
        eprintln!("💾 Stored as run {}", run_id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &DiscrepancyReport) {
    println!("⚖️  {}", report.summary());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for record in &report.records {
        println!(
            "[{}] {} on '{}' ({})",
            record.severity,
            record.discrepancy_type,
            record.field_name,
            record.ucp_reference.as_deref().unwrap_or("no UCP article")
        );
        println!("    {}", record.description);
        for (document, value) in &record.values_by_document {
            println!("    {}: {}", document, value);
        }
        if let Some(advice) = &record.advice {
            println!("    → {}", advice);
        }
    }
}

fn run_list(config: &AppConfig, status: Option<DiscrepancyStatus>) -> Result<()> {
    let conn = db::open_database(&config.database_path)?;
    let records = db::get_all_discrepancies(&conn, status)?;

    println!("📋 {} discrepancies", records.len());
    for stored in &records {
        println!(
            "{}  {:<8} {:<9} {:<25} {}",
            stored.record_id,
            stored.record.status.as_str(),
            stored.record.severity.as_str(),
            stored.record.discrepancy_type.as_str(),
            stored.record.field_name
        );
    }
    Ok(())
}

fn run_show(config: &AppConfig, record_id: &str) -> Result<()> {
    let conn = db::open_database(&config.database_path)?;
    let Some(stored) = db::get_discrepancy(&conn, record_id)? else {
        bail!("No discrepancy with id {}", record_id);
    };

    println!("{}", serde_json::to_string_pretty(&stored)?);

    println!("\n🕒 History");
    for event in db::get_events_for_entity(&conn, "discrepancy", record_id)? {
        println!(
            "  {} {} by {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.actor
        );
    }
    Ok(())
}

fn run_resolve(config: &AppConfig, record_id: &str, note: Option<&str>) -> Result<()> {
    let conn = db::open_database(&config.database_path)?;

    match db::resolve_discrepancy(&conn, record_id, &config.actor, note)? {
        ResolveOutcome::Resolved => println!("✅ Resolved {}", record_id),
        ResolveOutcome::AlreadyResolved => println!("✓ {} was already resolved", record_id),
        ResolveOutcome::NotFound => bail!("No discrepancy with id {}", record_id),
    }
    Ok(())
}

fn run_report(config: &AppConfig, run_id: &str) -> Result<()> {
    let conn = db::open_database(&config.database_path)?;
    let Some(run) = db::get_run(&conn, run_id)? else {
        bail!("No classification run with id {}", run_id);
    };

    let records = db::get_discrepancies_for_run(&conn, run_id)?
        .into_iter()
        .map(|stored| stored.record)
        .collect();
    print_report(&DiscrepancyReport::from_records(
        records,
        run.documents_examined,
        run.lc_reference,
    ));
    Ok(())
}

fn run_import_formats(config: &AppConfig, csv: &Path) -> Result<()> {
    let catalog = FieldCatalog::from_csv(csv)?;
    let conn = db::open_database(&config.database_path)?;

    let inserted = db::import_field_formats(&conn, &catalog, &config.actor)?;
    println!(
        "✓ Imported {} of {} field formats ({} already present)",
        inserted,
        catalog.len(),
        catalog.len() - inserted
    );
    Ok(())
}
