//! Database service for invoicing-service.

use crate::error::InvoicingError;
use crate::models::{Account, DailySummary, Member, NewDailySummary, NewIncome};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    AccountDirectory, IncomeLedger, MemberRegistry, StoreHealth, SummaryArchive,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, InvoicingError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| InvoicingError::Database(format!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), InvoicingError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InvoicingError::Database(format!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), InvoicingError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| InvoicingError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL connection pool closed");
    }
}

#[async_trait]
impl MemberRegistry for Database {
    #[instrument(skip(self))]
    async fn find_member(&self, dni: &str) -> Result<Option<Member>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_member"])
            .start_timer();

        // Two rows are enough to tell a unique match from an ambiguous one.
        let mut members = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, dni, nombres, "apellidoPaterno", "apellidoMaterno",
                   "direccionDNI", "direccionVivienda", "distritoDNI", "distritoVivienda",
                   "provinciaDNI", "provinciaVivienda", "regionDNI", "regionVivienda", celular
            FROM socio_titulares
            WHERE dni = $1
            LIMIT 2
            "#,
        )
        .bind(dni)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::Database(format!("Error de base de datos: {}", e)))?;

        timer.observe_duration();

        if members.len() > 1 {
            warn!(dni = %dni, "More than one member shares this DNI; treating as not found");
            return Ok(None);
        }
        Ok(members.pop())
    }
}

#[async_trait]
impl IncomeLedger for Database {
    #[instrument(skip(self, income), fields(receipt_number = %income.receipt_number))]
    async fn create_income(&self, income: &NewIncome) -> Result<(), InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_income"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO ingresos (account, amount, transaction_type, receipt_number, dni, full_name, "numeroOperacion", date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&income.account)
        .bind(income.amount)
        .bind(&income.transaction_type)
        .bind(&income.receipt_number)
        .bind(&income.dni)
        .bind(&income.full_name)
        .bind(&income.operation_number)
        .bind(income.date)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            InvoicingError::Database(format!("Error de base de datos al crear ingreso: {}", e))
        })?;

        timer.observe_duration();

        info!(amount = %income.amount, account = %income.account, "Income recorded");
        Ok(())
    }
}

#[async_trait]
impl SummaryArchive for Database {
    #[instrument(skip(self, header), fields(ticket = %header.ticket))]
    async fn insert_header(&self, header: &NewDailySummary) -> Result<i64, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_summary_header"])
            .start_timer();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO resumenes_diarios (fecha_resumen, numero_completo, correlativo, ticket, estado_sunat, summary_api_id)
            VALUES ($1::date, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&header.fecha_resumen)
        .bind(&header.numero_completo)
        .bind(&header.correlativo)
        .bind(&header.ticket)
        .bind(&header.estado_sunat)
        .bind(header.summary_api_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| InvoicingError::Database(format!("Error al guardar cabecera: {}", e)))?;

        timer.observe_duration();
        Ok(id)
    }

    #[instrument(skip(self, serie_numeros), fields(rows = serie_numeros.len()))]
    async fn insert_details(
        &self,
        header_id: i64,
        serie_numeros: &[String],
    ) -> Result<(), InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_summary_details"])
            .start_timer();

        // Single statement, so a failure leaves no partial detail rows.
        sqlx::query(
            r#"
            INSERT INTO resumen_diario_boletas (resumen_id, serie_numero)
            SELECT $1, UNNEST($2::text[])
            "#,
        )
        .bind(header_id)
        .bind(serie_numeros)
        .execute(&self.pool)
        .await
        .map_err(|e| InvoicingError::Database(format!("Error al guardar detalle: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_header(&self, header_id: i64) -> Result<(), InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_summary_header"])
            .start_timer();

        sqlx::query("DELETE FROM resumenes_diarios WHERE id = $1")
            .bind(header_id)
            .execute(&self.pool)
            .await
            .map_err(|e| InvoicingError::Database(format!("Error al eliminar cabecera: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_summaries(&self) -> Result<Vec<DailySummary>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_summaries"])
            .start_timer();

        let summaries = sqlx::query_as::<_, DailySummary>(
            r#"
            SELECT id, created_at, fecha_resumen, numero_completo, correlativo, ticket, estado_sunat, summary_api_id
            FROM resumenes_diarios
            ORDER BY fecha_resumen DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(summaries)
    }
}

#[async_trait]
impl AccountDirectory for Database {
    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<Account>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_accounts"])
            .start_timer();

        let accounts = sqlx::query_as::<_, Account>("SELECT name FROM cuentas ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(accounts)
    }
}
