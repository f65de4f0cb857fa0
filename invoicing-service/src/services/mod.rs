//! Services for invoicing-service.

pub mod billing_api;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod sessions;
pub mod storage;
pub mod store;

pub use billing_api::{BillingApi, HttpBillingApi};
pub use database::Database;
pub use memory::{Fault, MemoryStore};
pub use metrics::{get_metrics, init_metrics};
pub use sessions::SessionRegistry;
pub use storage::{HttpObjectStorage, LocalStorage, Storage};
pub use store::{
    AccountDirectory, IncomeLedger, MemberRegistry, StoreHealth, Stores, SummaryArchive,
};
