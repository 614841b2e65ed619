//! Security enforcement layer: every user input passes through here before
//! any downstream component runs.
//!
//! The pipeline is validate → redact → audit. Validation failure short
//! circuits with `success = false` and the violation categories; no
//! downstream component sees the input. On success the caller receives the
//! sanitized, PII-redacted text. Every call appends exactly one record to
//! the append-only security audit log.
//!
//! Request ids are monotone per process and carry a timestamp prefix
//! (`REQ_20250801143000_000001`) so log lines sort chronologically.

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audit::JsonlWriter;
use crate::config::SecurityConfig;
use crate::error::Result;
use crate::redactor::PiiRedactor;
use crate::validator::{InputValidator, ValidationReport};

const SECURITY_LOG_FILE: &str = "security_audit.log";

/// One security audit record, serialized as a JSON line.
#[derive(Debug, Serialize)]
pub struct SecurityAuditRecord {
    pub timestamp: String,
    pub request_id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub original_input_hash: String,
    pub pii_types_detected: Vec<String>,
    pub num_redactions: usize,
    pub redaction_confidence_score: f64,
    pub validation_passed: bool,
    pub risk_score: f64,
    pub violations: Vec<String>,
    pub ip_address: Option<String>,
}

/// Security metadata returned alongside processed text.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityMetadata {
    pub validation_passed: bool,
    pub risk_score: f64,
    pub pii_types_detected: Vec<String>,
    pub num_redactions: usize,
    pub redaction_confidence: f64,
    pub original_input_hash: String,
}

/// Result of processing one input through the enforcement pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedInput {
    pub success: bool,
    pub request_id: String,
    /// Sanitized, PII-redacted text; empty when validation failed.
    pub processed_text: String,
    pub metadata: SecurityMetadata,
    /// Violation categories; empty on success.
    pub violations: Vec<String>,
}

/// Runs validation and redaction and writes the security audit trail.
pub struct SecurityEnforcer {
    validator: InputValidator,
    redactor: PiiRedactor,
    log: JsonlWriter,
    request_counter: AtomicU64,
}

impl SecurityEnforcer {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        Self::with_audit_dir(config, &config.audit_dir)
    }

    pub fn with_audit_dir(config: &SecurityConfig, audit_dir: &Path) -> Result<Self> {
        Ok(Self {
            validator: InputValidator::new(config),
            redactor: PiiRedactor::new(config.min_pii_confidence),
            log: JsonlWriter::open(&audit_dir.join(SECURITY_LOG_FILE))?,
            request_counter: AtomicU64::new(0),
        })
    }

    /// Process case text: validate, then redact, then audit.
    pub fn process_case_input(
        &self,
        case_text: &str,
        user_id: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<ProcessedInput> {
        let request_id = self.next_request_id();
        let original_input_hash = hash_hex(case_text);

        let validation = self.validator.validate_case_text(case_text);

        if !validation.is_valid {
            let result = ProcessedInput {
                success: false,
                request_id: request_id.clone(),
                processed_text: String::new(),
                metadata: SecurityMetadata {
                    validation_passed: false,
                    risk_score: validation.risk_score,
                    pii_types_detected: Vec::new(),
                    num_redactions: 0,
                    redaction_confidence: 1.0,
                    original_input_hash: original_input_hash.clone(),
                },
                violations: validation.violation_labels(),
            };
            self.write_audit(
                &request_id,
                user_id,
                ip_address,
                "INPUT_VALIDATION_FAILED",
                &original_input_hash,
                &result.metadata,
                &validation,
            )?;
            return Ok(result);
        }

        let redaction = self.redactor.redact(&validation.sanitized_input);

        let metadata = SecurityMetadata {
            validation_passed: true,
            risk_score: validation.risk_score,
            pii_types_detected: redaction
                .kinds_detected()
                .into_iter()
                .map(String::from)
                .collect(),
            num_redactions: redaction.detections.len(),
            redaction_confidence: redaction.confidence,
            original_input_hash: original_input_hash.clone(),
        };

        self.write_audit(
            &request_id,
            user_id,
            ip_address,
            "CASE_INPUT_PROCESSED",
            &original_input_hash,
            &metadata,
            &validation,
        )?;

        Ok(ProcessedInput {
            success: true,
            request_id,
            processed_text: redaction.redacted_text,
            metadata,
            violations: Vec::new(),
        })
    }

    /// Validate a file upload (name, size) and audit the outcome.
    pub fn process_file_upload(
        &self,
        filename: &str,
        file_size_bytes: u64,
        user_id: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<ProcessedInput> {
        let request_id = self.next_request_id();
        let original_input_hash = hash_hex(filename);

        let validation = self.validator.validate_file_upload(filename, file_size_bytes);

        let metadata = SecurityMetadata {
            validation_passed: validation.is_valid,
            risk_score: validation.risk_score,
            pii_types_detected: Vec::new(),
            num_redactions: 0,
            redaction_confidence: 1.0,
            original_input_hash: original_input_hash.clone(),
        };

        self.write_audit(
            &request_id,
            user_id,
            ip_address,
            "FILE_UPLOAD_VALIDATION",
            &original_input_hash,
            &metadata,
            &validation,
        )?;

        Ok(ProcessedInput {
            success: validation.is_valid,
            request_id,
            processed_text: validation.sanitized_input.clone(),
            metadata,
            violations: validation.violation_labels(),
        })
    }

    /// Total requests processed by this enforcer instance.
    pub fn request_count(&self) -> u64 {
        self.request_counter.load(Ordering::Relaxed)
    }

    fn next_request_id(&self) -> String {
        let seq = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        format!("REQ_{}_{:06}", stamp, seq)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_audit(
        &self,
        request_id: &str,
        user_id: Option<&str>,
        ip_address: Option<&str>,
        action: &str,
        original_input_hash: &str,
        metadata: &SecurityMetadata,
        validation: &ValidationReport,
    ) -> Result<()> {
        let record = SecurityAuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            request_id: request_id.to_string(),
            user_id: user_id.map(String::from),
            action: action.to_string(),
            original_input_hash: original_input_hash.to_string(),
            pii_types_detected: metadata.pii_types_detected.clone(),
            num_redactions: metadata.num_redactions,
            redaction_confidence_score: metadata.redaction_confidence,
            validation_passed: validation.is_valid,
            risk_score: validation.risk_score,
            violations: validation.violation_labels(),
            ip_address: ip_address.map(String::from),
        };
        self.log.append(&record)
    }
}

fn hash_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}
