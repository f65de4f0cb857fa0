//! Relational store seams used by the workflows.
//!
//! `Database` implements them on PostgreSQL; `MemoryStore` backs local
//! development and tests.

use crate::error::InvoicingError;
use crate::models::{Account, DailySummary, Member, NewDailySummary, NewIncome};
use async_trait::async_trait;
use std::sync::Arc;

/// Read access to the member registry.
#[async_trait]
pub trait MemberRegistry: Send + Sync {
    /// Exact match on DNI. `Ok(None)` is a definitive "not found", which
    /// includes an ambiguous match on more than one member.
    async fn find_member(&self, dni: &str) -> Result<Option<Member>, InvoicingError>;
}

#[async_trait]
pub trait IncomeLedger: Send + Sync {
    async fn create_income(&self, income: &NewIncome) -> Result<(), InvoicingError>;
}

/// Persistence for summaries already accepted by the authority.
#[async_trait]
pub trait SummaryArchive: Send + Sync {
    /// Insert the header row and return its id.
    async fn insert_header(&self, header: &NewDailySummary) -> Result<i64, InvoicingError>;

    /// Insert one detail row per receipt, all or nothing.
    async fn insert_details(
        &self,
        header_id: i64,
        serie_numeros: &[String],
    ) -> Result<(), InvoicingError>;

    async fn delete_header(&self, header_id: i64) -> Result<(), InvoicingError>;

    /// History, newest summary date first.
    async fn list_summaries(&self) -> Result<Vec<DailySummary>, InvoicingError>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>, InvoicingError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), InvoicingError>;

    async fn close(&self);
}

/// Store handles shared by the application.
#[derive(Clone)]
pub struct Stores {
    pub members: Arc<dyn MemberRegistry>,
    pub incomes: Arc<dyn IncomeLedger>,
    pub summaries: Arc<dyn SummaryArchive>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub health: Arc<dyn StoreHealth>,
}

impl Stores {
    /// Use one backend for every concern.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: MemberRegistry
            + IncomeLedger
            + SummaryArchive
            + AccountDirectory
            + StoreHealth
            + 'static,
    {
        Self {
            members: store.clone(),
            incomes: store.clone(),
            summaries: store.clone(),
            accounts: store.clone(),
            health: store,
        }
    }
}
