//! # Error and Recovery Ledger
//!
//! Every operational fault is classified and appended here with a correlation
//! id. Sessions keep only the correlation ids; the payloads stay in the ledger.

pub mod classifier;
pub mod error_ledger;

pub use classifier::{
    FaultClassification, FaultClassifier, FaultClassifierConfig, FaultContext,
    StandardFaultClassifier,
};
pub use error_ledger::{ErrorLedger, FaultReport, LedgerError, LedgerResult};
