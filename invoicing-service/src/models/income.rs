//! Income ledger rows created from issued boletas.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Transaction type recorded for boleta sales.
pub const SALE_TRANSACTION_TYPE: &str = "Venta";

/// Row to insert into `ingresos`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIncome {
    pub account: String,
    pub amount: Decimal,
    pub transaction_type: String,
    pub receipt_number: String,
    pub dni: String,
    pub full_name: String,
    #[serde(rename = "numeroOperacion")]
    pub operation_number: String,
    pub date: NaiveDate,
}

/// An account income can be booked against (`cuentas`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub name: String,
}
