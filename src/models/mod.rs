//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod verification;
pub mod group;
pub mod whitelist;
pub mod judgment;
pub mod audit;

// Re-export commonly used models
pub use verification::{
    VerificationRecord, VerificationType, VerificationState, VerificationMethod,
};
pub use group::{Group, GroupAdmin};
pub use whitelist::{WhitelistEntry, CreateWhitelistRequest};
pub use judgment::{Judgment, WebsiteJudgment, DocumentJudgment, Confidence};
pub use audit::{VerificationAuditLog, CreateAuditLogRequest};
