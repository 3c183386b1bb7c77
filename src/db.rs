use crate::catalog::FieldCatalog;
use crate::classifier::ClassificationRun;
use crate::discrepancy::{DiscrepancyRecord, DiscrepancyStatus};
use crate::format::FieldFormatSpec;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A discrepancy record as persisted: the classifier's record plus the
/// identity and timestamps the store assigns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDiscrepancy {
    pub record_id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,

    #[serde(flatten)]
    pub record: DiscrepancyRecord,
}

/// One classification run over one presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub lc_reference: Option<String>,
    pub documents_examined: usize,
    pub discrepancy_count: usize,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Resolved,
    AlreadyResolved,
    NotFound,
}

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (creating if needed) the database file and its schema
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;

    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Classification runs (one per checked presentation)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classification_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            lc_reference TEXT,
            documents_examined INTEGER NOT NULL,
            actor TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Discrepancies (never deleted; only status moves)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS discrepancies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT UNIQUE NOT NULL,
            run_id TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            discrepancy_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            field_name TEXT NOT NULL,
            documents_involved TEXT NOT NULL,
            values_by_document TEXT NOT NULL,
            ucp_reference TEXT,
            description TEXT NOT NULL,
            rule_explanation TEXT,
            advice TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            resolved_at TEXT,
            resolved_by TEXT,
            UNIQUE (run_id, fingerprint)
        )",
        [],
    )?;

    // ==========================================================================
    // Field format catalogue
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS field_formats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_type TEXT NOT NULL,
            tag TEXT NOT NULL,
            name TEXT NOT NULL,
            format TEXT NOT NULL,
            mandatory INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (message_type, tag)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail / event sourcing)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_discrepancies_run ON discrepancies(run_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_discrepancies_status ON discrepancies(status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// RUNS
// ============================================================================

/// Persist a classification run and its records in one transaction;
/// returns the new run id
pub fn save_run(
    conn: &Connection,
    run: &ClassificationRun,
    lc_reference: Option<&str>,
    actor: &str,
) -> Result<String> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to begin run transaction")?;

    let run_id = create_run(&tx, lc_reference, run.documents_examined, actor)?;
    insert_discrepancies(&tx, &run_id, &run.records, actor)?;

    tx.commit().context("Failed to commit classification run")?;
    Ok(run_id)
}

pub fn create_run(
    conn: &Connection,
    lc_reference: Option<&str>,
    documents_examined: usize,
    actor: &str,
) -> Result<String> {
    let run_id = uuid::Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO classification_runs (run_id, lc_reference, documents_examined, actor, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run_id,
            lc_reference,
            documents_examined as i64,
            actor,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("Failed to insert classification run")?;

    let event = Event::new(
        "classification_run_created",
        "classification_run",
        &run_id,
        serde_json::json!({
            "lc_reference": lc_reference,
            "documents_examined": documents_examined,
        }),
        actor,
    );
    insert_event(conn, &event)?;

    Ok(run_id)
}

/// Insert records of a run. A record whose fingerprint the run already holds
/// is skipped, so saving the same records twice inserts nothing new.
pub fn insert_discrepancies(
    conn: &Connection,
    run_id: &str,
    records: &[DiscrepancyRecord],
    actor: &str,
) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for record in records {
        let record_id = uuid::Uuid::new_v4().to_string();
        let documents_json = serde_json::to_string(&record.documents_involved)?;
        let values_json = serde_json::to_string(&record.values_by_document)?;

        let result = conn.execute(
            "INSERT INTO discrepancies (
                record_id, run_id, fingerprint, discrepancy_type, severity, field_name,
                documents_involved, values_by_document, ucp_reference, description,
                rule_explanation, advice, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record_id,
                run_id,
                record.fingerprint,
                record.discrepancy_type.as_str(),
                record.severity.as_str(),
                record.field_name,
                documents_json,
                values_json,
                record.ucp_reference,
                record.description,
                record.rule_explanation,
                record.advice,
                record.status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                inserted += 1;

                let event = Event::new(
                    "discrepancy_recorded",
                    "discrepancy",
                    &record_id,
                    serde_json::json!({
                        "run_id": run_id,
                        "type": record.discrepancy_type.as_str(),
                        "severity": record.severity.as_str(),
                        "field_name": record.field_name,
                    }),
                    actor,
                );
                insert_event(conn, &event)?;
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(run_id, inserted, duplicates, "stored discrepancy records");
    Ok(inserted)
}

pub fn get_run(conn: &Connection, run_id: &str) -> Result<Option<RunSummary>> {
    let run = conn
        .query_row(
            "SELECT r.run_id, r.lc_reference, r.documents_examined, r.actor, r.created_at,
                    (SELECT COUNT(*) FROM discrepancies d WHERE d.run_id = r.run_id)
             FROM classification_runs r
             WHERE r.run_id = ?1",
            params![run_id],
            |row| {
                let documents: i64 = row.get(2)?;
                let count: i64 = row.get(5)?;
                Ok(RunSummary {
                    run_id: row.get(0)?,
                    lc_reference: row.get(1)?,
                    documents_examined: documents as usize,
                    actor: row.get(3)?,
                    created_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
                    discrepancy_count: count as usize,
                })
            },
        )
        .optional()?;

    Ok(run)
}

// ============================================================================
// DISCREPANCIES
// ============================================================================

const DISCREPANCY_COLUMNS: &str = "record_id, run_id, fingerprint, discrepancy_type, severity, field_name,
    documents_involved, values_by_document, ucp_reference, description, rule_explanation,
    advice, status, created_at, resolved_at, resolved_by";

fn conversion_error(column: usize, message: impl Into<String>) -> rusqlite::Error {
    let message: String = message.into();
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, message.into())
}

fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e.to_string()))
}

fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredDiscrepancy> {
    let discrepancy_type: String = row.get(3)?;
    let severity: String = row.get(4)?;
    let documents_json: String = row.get(6)?;
    let values_json: String = row.get(7)?;
    let status: String = row.get(12)?;
    let created_at: String = row.get(13)?;
    let resolved_at: Option<String> = row.get(14)?;

    let documents_involved: BTreeSet<String> = serde_json::from_str(&documents_json)
        .map_err(|e| conversion_error(6, e.to_string()))?;
    let values_by_document: BTreeMap<String, String> = serde_json::from_str(&values_json)
        .map_err(|e| conversion_error(7, e.to_string()))?;

    Ok(StoredDiscrepancy {
        record_id: row.get(0)?,
        run_id: row.get(1)?,
        created_at: parse_timestamp(13, &created_at)?,
        resolved_at: resolved_at
            .map(|text| parse_timestamp(14, &text))
            .transpose()?,
        resolved_by: row.get(15)?,
        record: DiscrepancyRecord {
            discrepancy_type: discrepancy_type.parse().map_err(|e: String| conversion_error(3, e))?,
            severity: severity.parse().map_err(|e: String| conversion_error(4, e))?,
            field_name: row.get(5)?,
            documents_involved,
            values_by_document,
            ucp_reference: row.get(8)?,
            description: row.get(9)?,
            rule_explanation: row.get(10)?,
            advice: row.get(11)?,
            status: status.parse().map_err(|e: String| conversion_error(12, e))?,
            fingerprint: row.get(2)?,
        },
    })
}

/// All stored discrepancies, oldest first, optionally filtered by status
pub fn get_all_discrepancies(
    conn: &Connection,
    status: Option<DiscrepancyStatus>,
) -> Result<Vec<StoredDiscrepancy>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM discrepancies
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY id",
        DISCREPANCY_COLUMNS
    ))?;

    let records = stmt
        .query_map(params![status.map(|s| s.as_str())], row_to_stored)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get_discrepancies_for_run(conn: &Connection, run_id: &str) -> Result<Vec<StoredDiscrepancy>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM discrepancies WHERE run_id = ?1 ORDER BY id",
        DISCREPANCY_COLUMNS
    ))?;

    let records = stmt
        .query_map(params![run_id], row_to_stored)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get_discrepancy(conn: &Connection, record_id: &str) -> Result<Option<StoredDiscrepancy>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM discrepancies WHERE record_id = ?1", DISCREPANCY_COLUMNS),
            params![record_id],
            row_to_stored,
        )
        .optional()?;

    Ok(record)
}

/// Move an active discrepancy to resolved and log who did it
pub fn resolve_discrepancy(
    conn: &Connection,
    record_id: &str,
    actor: &str,
    note: Option<&str>,
) -> Result<ResolveOutcome> {
    let Some(existing) = get_discrepancy(conn, record_id)? else {
        return Ok(ResolveOutcome::NotFound);
    };
    if !existing.record.is_active() {
        return Ok(ResolveOutcome::AlreadyResolved);
    }

    let resolved_at = Utc::now();
    let updated = conn.execute(
        "UPDATE discrepancies
         SET status = ?1, resolved_at = ?2, resolved_by = ?3
         WHERE record_id = ?4 AND status = ?5",
        params![
            DiscrepancyStatus::Resolved.as_str(),
            resolved_at.to_rfc3339(),
            actor,
            record_id,
            DiscrepancyStatus::Active.as_str(),
        ],
    )?;
    if updated == 0 {
        return Ok(ResolveOutcome::AlreadyResolved);
    }

    let event = Event::new(
        "discrepancy_resolved",
        "discrepancy",
        record_id,
        serde_json::json!({
            "run_id": existing.run_id,
            "previous_status": existing.record.status.as_str(),
            "note": note,
        }),
        actor,
    );
    insert_event(conn, &event)?;

    tracing::info!(record_id, actor, "discrepancy resolved");
    Ok(ResolveOutcome::Resolved)
}

// ============================================================================
// FIELD FORMATS
// ============================================================================

/// Store catalogue rows; rows already present for (message type, tag) are kept
pub fn import_field_formats(conn: &Connection, catalog: &FieldCatalog, actor: &str) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for spec in catalog.specs() {
        let result = conn.execute(
            "INSERT INTO field_formats (message_type, tag, name, format, mandatory)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![spec.message_type, spec.tag, spec.name, spec.format, spec.mandatory],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if inserted > 0 {
        let event = Event::new(
            "field_formats_imported",
            "field_format",
            "catalogue",
            serde_json::json!({ "inserted": inserted, "skipped": duplicates }),
            actor,
        );
        insert_event(conn, &event)?;
    }

    tracing::info!(inserted, duplicates, "imported field formats");
    Ok(inserted)
}

pub fn load_field_formats(conn: &Connection) -> Result<FieldCatalog> {
    let mut stmt = conn.prepare(
        "SELECT message_type, tag, name, format, mandatory
         FROM field_formats
         ORDER BY id",
    )?;

    let specs = stmt
        .query_map([], |row| {
            Ok(FieldFormatSpec {
                message_type: row.get(0)?,
                tag: row.get(1)?,
                name: row.get(2)?,
                format: row.get(3)?,
                mandatory: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FieldCatalog::from_specs(specs))
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| conversion_error(5, e.to_string()))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_discrepancies(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM discrepancies", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrepancy::{DiscrepancyType, Severity};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn create_test_record(field: &str, invoice_value: &str) -> DiscrepancyRecord {
        let values = BTreeMap::from([
            ("inv-1".to_string(), invoice_value.to_string()),
            ("lc-1".to_string(), "45000".to_string()),
        ]);
        let mut record = DiscrepancyRecord::new(
            DiscrepancyType::QuantitativeDiscrepancy,
            Severity::High,
            field,
            values,
            "Invoice amount exceeds credit amount",
        );
        record.ucp_reference = Some("article_18b".to_string());
        record
    }

    fn create_test_run(records: Vec<DiscrepancyRecord>) -> ClassificationRun {
        ClassificationRun {
            records,
            field_validations: vec![],
            configuration_errors: vec![],
            documents_examined: 2,
        }
    }

    #[test]
    fn test_save_run_round_trips_records() {
        let conn = test_conn();
        let run = create_test_run(vec![create_test_record("amount", "50000")]);

        let run_id = save_run(&conn, &run, Some("LC123456789"), "examiner").unwrap();

        let stored = get_discrepancies_for_run(&conn, &run_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record, run.records[0]);
        assert_eq!(stored[0].run_id, run_id);
        assert!(stored[0].resolved_at.is_none());

        let summary = get_run(&conn, &run_id).unwrap().unwrap();
        assert_eq!(summary.lc_reference.as_deref(), Some("LC123456789"));
        assert_eq!(summary.discrepancy_count, 1);
        assert_eq!(summary.documents_examined, 2);

        println!("✅ Save run test PASSED: run {}", run_id);
    }

    #[test]
    fn test_failed_save_leaves_no_partial_run() {
        let conn = test_conn();
        conn.execute_batch(
            "CREATE TRIGGER audit_offline BEFORE INSERT ON events
             WHEN NEW.event_type = 'discrepancy_recorded'
             BEGIN SELECT RAISE(ABORT, 'audit log offline'); END;",
        )
        .unwrap();

        let run = create_test_run(vec![
            create_test_record("amount", "50000"),
            create_test_record("amount", "51000"),
        ]);
        let result = save_run(&conn, &run, Some("LC123456789"), "examiner");
        assert!(result.is_err());

        let runs: i64 = conn
            .query_row("SELECT COUNT(*) FROM classification_runs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(runs, 0);
        assert_eq!(count_discrepancies(&conn).unwrap(), 0);

        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(events, 0);

        println!("✅ Rollback test PASSED: nothing stored after a failed save");
    }

    #[test]
    fn test_insert_twice_is_idempotent() {
        let conn = test_conn();
        let records = vec![
            create_test_record("amount", "50000"),
            create_test_record("amount", "51000"),
        ];
        let run_id = create_run(&conn, None, 2, "examiner").unwrap();

        let first = insert_discrepancies(&conn, &run_id, &records, "examiner").unwrap();
        let second = insert_discrepancies(&conn, &run_id, &records, "examiner").unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(count_discrepancies(&conn).unwrap(), 2);

        // A new run stores its own copy of the same finding
        let other_run = create_run(&conn, None, 2, "examiner").unwrap();
        assert_eq!(insert_discrepancies(&conn, &other_run, &records[..1], "examiner").unwrap(), 1);

        println!("✅ Idempotency test PASSED: 0 duplicates inserted on second save");
    }

    #[test]
    fn test_resolve_moves_status_once() {
        let conn = test_conn();
        let run_id = save_run(&conn, &create_test_run(vec![create_test_record("amount", "50000")]), None, "examiner").unwrap();
        let record_id = get_discrepancies_for_run(&conn, &run_id).unwrap()[0].record_id.clone();

        let outcome = resolve_discrepancy(&conn, &record_id, "officer", Some("waiver received")).unwrap();
        assert_eq!(outcome, ResolveOutcome::Resolved);

        let stored = get_discrepancy(&conn, &record_id).unwrap().unwrap();
        assert_eq!(stored.record.status, DiscrepancyStatus::Resolved);
        assert_eq!(stored.resolved_by.as_deref(), Some("officer"));
        assert!(stored.resolved_at.is_some());

        assert_eq!(
            resolve_discrepancy(&conn, &record_id, "officer", None).unwrap(),
            ResolveOutcome::AlreadyResolved
        );
        assert_eq!(
            resolve_discrepancy(&conn, "no-such-record", "officer", None).unwrap(),
            ResolveOutcome::NotFound
        );

        let events = get_events_for_entity(&conn, "discrepancy", &record_id).unwrap();
        assert_eq!(events[0].event_type, "discrepancy_resolved");
        assert_eq!(events[0].actor, "officer");
        assert_eq!(events[0].data["note"], "waiver received");
        assert_eq!(events.len(), 2);

        println!("✅ Resolve test PASSED");
    }

    #[test]
    fn test_status_filter() {
        let conn = test_conn();
        let run = create_test_run(vec![
            create_test_record("amount", "50000"),
            create_test_record("amount", "52000"),
        ]);
        let run_id = save_run(&conn, &run, None, "examiner").unwrap();
        let first = get_discrepancies_for_run(&conn, &run_id).unwrap()[0].record_id.clone();
        resolve_discrepancy(&conn, &first, "officer", None).unwrap();

        assert_eq!(get_all_discrepancies(&conn, None).unwrap().len(), 2);
        assert_eq!(get_all_discrepancies(&conn, Some(DiscrepancyStatus::Active)).unwrap().len(), 1);

        let resolved = get_all_discrepancies(&conn, Some(DiscrepancyStatus::Resolved)).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].record_id, first);
    }

    #[test]
    fn test_field_formats_import_and_load() {
        let conn = test_conn();
        let catalog = FieldCatalog::standard_mt700();

        let inserted = import_field_formats(&conn, &catalog, "importer").unwrap();
        assert_eq!(inserted, catalog.len());
        assert_eq!(import_field_formats(&conn, &catalog, "importer").unwrap(), 0);

        let loaded = load_field_formats(&conn).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(loaded.get("mt700", "32B").unwrap().format, "3!a15d");
    }

    #[test]
    fn test_event_log() {
        let conn = test_conn();

        let event = Event::new(
            "test_event",
            "discrepancy",
            "test_id_123",
            serde_json::json!({"test": "data"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "discrepancy", "test_id_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");

        println!("✅ Event log test PASSED");
    }

    #[test]
    fn test_open_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lc.db");

        let conn = open_database(&path).unwrap();
        assert!(path.exists());
        assert_eq!(count_discrepancies(&conn).unwrap(), 0);
    }
}
