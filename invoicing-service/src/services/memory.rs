//! In-memory store used in development (no `DATABASE_URL`) and in tests.
//!
//! Individual operations can be made to fail with [`Fault`] to exercise the
//! partial-failure paths of the workflows.

use crate::error::InvoicingError;
use crate::models::{Account, DailySummary, Member, NewDailySummary, NewIncome};
use crate::services::store::{
    AccountDirectory, IncomeLedger, MemberRegistry, StoreHealth, SummaryArchive,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;

/// Store operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    MemberLookup,
    IncomeInsert,
    SummaryHeaderInsert,
    SummaryDetailInsert,
    SummaryHeaderDelete,
}

/// A persisted detail row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryDetailRow {
    pub resumen_id: i64,
    pub serie_numero: String,
}

#[derive(Default)]
struct Tables {
    members: Vec<Member>,
    accounts: Vec<Account>,
    incomes: Vec<NewIncome>,
    summaries: Vec<DailySummary>,
    details: Vec<SummaryDetailRow>,
    next_summary_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    faults: RwLock<HashSet<Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the default income account.
    pub fn with_default_account(name: &str) -> Self {
        Self {
            tables: RwLock::new(Tables {
                accounts: vec![Account {
                    name: name.to_string(),
                }],
                ..Tables::default()
            }),
            faults: RwLock::default(),
        }
    }

    pub async fn add_member(&self, member: Member) {
        self.tables.write().await.members.push(member);
    }

    pub async fn add_account(&self, name: &str) {
        self.tables.write().await.accounts.push(Account {
            name: name.to_string(),
        });
    }

    pub async fn inject_fault(&self, fault: Fault) {
        self.faults.write().await.insert(fault);
    }

    pub async fn clear_fault(&self, fault: Fault) {
        self.faults.write().await.remove(&fault);
    }

    pub async fn incomes(&self) -> Vec<NewIncome> {
        self.tables.read().await.incomes.clone()
    }

    pub async fn summary_rows(&self) -> Vec<DailySummary> {
        self.tables.read().await.summaries.clone()
    }

    pub async fn detail_rows(&self) -> Vec<SummaryDetailRow> {
        self.tables.read().await.details.clone()
    }

    async fn check(&self, fault: Fault, message: &str) -> Result<(), InvoicingError> {
        if self.faults.read().await.contains(&fault) {
            return Err(InvoicingError::Database(message.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MemberRegistry for MemoryStore {
    async fn find_member(&self, dni: &str) -> Result<Option<Member>, InvoicingError> {
        self.check(Fault::MemberLookup, "connection reset by peer").await?;
        let tables = self.tables.read().await;
        let mut matches = tables.members.iter().filter(|m| m.dni == dni);
        match (matches.next(), matches.next()) {
            (Some(member), None) => Ok(Some(member.clone())),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl IncomeLedger for MemoryStore {
    async fn create_income(&self, income: &NewIncome) -> Result<(), InvoicingError> {
        self.check(Fault::IncomeInsert, "insert into ingresos rejected").await?;
        self.tables.write().await.incomes.push(income.clone());
        Ok(())
    }
}

#[async_trait]
impl SummaryArchive for MemoryStore {
    async fn insert_header(&self, header: &NewDailySummary) -> Result<i64, InvoicingError> {
        self.check(Fault::SummaryHeaderInsert, "insert into resumenes_diarios rejected")
            .await?;
        let fecha_resumen = header
            .fecha_resumen
            .parse::<NaiveDate>()
            .map_err(|e| InvoicingError::Database(format!("invalid fecha_resumen: {e}")))?;
        let mut tables = self.tables.write().await;
        tables.next_summary_id += 1;
        let id = tables.next_summary_id;
        tables.summaries.push(DailySummary {
            id,
            created_at: Utc::now(),
            fecha_resumen,
            numero_completo: header.numero_completo.clone(),
            correlativo: header.correlativo.clone(),
            ticket: header.ticket.clone(),
            estado_sunat: header.estado_sunat.clone(),
            summary_api_id: header.summary_api_id,
        });
        Ok(id)
    }

    async fn insert_details(
        &self,
        header_id: i64,
        serie_numeros: &[String],
    ) -> Result<(), InvoicingError> {
        self.check(Fault::SummaryDetailInsert, "insert into resumen_diario_boletas rejected")
            .await?;
        let mut tables = self.tables.write().await;
        if !tables.summaries.iter().any(|s| s.id == header_id) {
            return Err(InvoicingError::Database(format!(
                "resumen_id {header_id} does not exist"
            )));
        }
        tables
            .details
            .extend(serie_numeros.iter().map(|serie_numero| SummaryDetailRow {
                resumen_id: header_id,
                serie_numero: serie_numero.clone(),
            }));
        Ok(())
    }

    async fn delete_header(&self, header_id: i64) -> Result<(), InvoicingError> {
        self.check(Fault::SummaryHeaderDelete, "delete from resumenes_diarios rejected")
            .await?;
        let mut tables = self.tables.write().await;
        tables.summaries.retain(|s| s.id != header_id);
        tables.details.retain(|d| d.resumen_id != header_id);
        Ok(())
    }

    async fn list_summaries(&self) -> Result<Vec<DailySummary>, InvoicingError> {
        let mut summaries = self.tables.read().await.summaries.clone();
        summaries.sort_by(|a, b| {
            b.fecha_resumen
                .cmp(&a.fecha_resumen)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(summaries)
    }
}

#[async_trait]
impl AccountDirectory for MemoryStore {
    async fn list_accounts(&self) -> Result<Vec<Account>, InvoicingError> {
        Ok(self.tables.read().await.accounts.clone())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn health_check(&self) -> Result<(), InvoicingError> {
        Ok(())
    }

    async fn close(&self) {}
}
