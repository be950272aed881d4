//! State management module
//!
//! This module handles the per-user verification conversation state

pub mod session;
pub mod storage;

// Re-export commonly used state components
pub use session::{VerificationSession, SessionStep, DocumentEvidence};
pub use storage::SessionStorage;
