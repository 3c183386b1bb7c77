// LC Compliance - Core Library
// SWIFT field-format compiler, field validator and UCP 600 discrepancy
// classifier, exposed for the CLI, the API server and tests.

pub mod catalog;        // MT700 field format catalogue
pub mod classifier;     // Cross-document discrepancy classification
pub mod config;         // CLI / env / TOML configuration
pub mod db;             // SQLite persistence + audit trail
pub mod discrepancy;    // Discrepancy records and taxonomy
pub mod error;
pub mod fields;         // Typed extracted fields
pub mod format;         // SWIFT format rule compiler
pub mod reference;      // UCP articles, equivalence map, deadlines
pub mod report;         // Per-run report and recommendation
pub mod validator;      // Rule application

// Re-export commonly used types
pub use catalog::FieldCatalog;
pub use classifier::{
    compare_text, ClassificationRun, DiscrepancyClassifier, FieldValidation, TextComparison,
};
pub use config::{AppConfig, ConfigOverrides};
pub use db::{
    Event, ResolveOutcome, RunSummary, StoredDiscrepancy,
    setup_database, open_database, save_run, get_all_discrepancies, get_discrepancy,
    resolve_discrepancy, insert_event, get_events_for_entity,
};
pub use discrepancy::{DiscrepancyRecord, DiscrepancyStatus, DiscrepancyType, Severity};
pub use error::{ClassifyError, ConfigError};
pub use fields::{
    DataType, DocumentFields, DocumentSet, ExtractedField, FieldValue, Presentation, Tolerance,
};
pub use format::{
    compile, compile_format, CharacterClass, FieldFormatSpec, RuleType, ValidationRule,
};
pub use reference::{EquivalenceGroup, FieldRef, ReferenceData, UcpArticle, ValueKind};
pub use report::{DiscrepancyReport, Recommendation};
pub use validator::{validate, ValidationOutcome, Violation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
