//! Database service layer
//!
//! This module provides a high-level interface to database operations

use crate::database::{
    DatabasePool, VerificationRepository, GroupRepository, WhitelistRepository,
    OffenseRepository, AuditRepository,
};

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub verifications: VerificationRepository,
    pub groups: GroupRepository,
    pub whitelist: WhitelistRepository,
    pub offenses: OffenseRepository,
    pub audit: AuditRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            verifications: VerificationRepository::new(pool.clone()),
            groups: GroupRepository::new(pool.clone()),
            whitelist: WhitelistRepository::new(pool.clone()),
            offenses: OffenseRepository::new(pool.clone()),
            audit: AuditRepository::new(pool),
        }
    }
}
