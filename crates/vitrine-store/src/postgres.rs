//! PostgreSQL record store.
//!
//! Rows live in `catalog_records`, scoped by tenant. Saves run in a
//! transaction that locks the existing row before checking remote-id
//! immutability, so concurrent saves of one record serialize.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};
use uuid::Uuid;
use vitrine_core::{normalize_key, CatalogRecord, RemoteEntryId, TenantId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ensure_remote_id_unchanged, RecordStore};

/// A row of `catalog_records`.
#[derive(Debug, Clone, FromRow)]
struct CatalogRecordRow {
    tag_number: String,
    description: Option<String>,
    designer: Option<String>,
    model: Option<String>,
    material: Option<String>,
    dial: Option<String>,
    diameter: Option<String>,
    condition: Option<String>,
    year: Option<String>,
    serial_number: Option<String>,
    reference_number: Option<String>,
    category: Option<String>,
    style: Option<String>,
    image_urls: Vec<String>,
    price: Option<Decimal>,
    cost_price: Option<Decimal>,
    wholesale_price: Option<Decimal>,
    list_price: Option<Decimal>,
    status: String,
    remote_id: Option<String>,
    publish_status: String,
    last_synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<CatalogRecordRow> for CatalogRecord {
    type Error = StoreError;

    fn try_from(row: CatalogRecordRow) -> StoreResult<Self> {
        Ok(CatalogRecord {
            tag_number: row.tag_number,
            description: row.description,
            designer: row.designer,
            model: row.model,
            material: row.material,
            dial: row.dial,
            diameter: row.diameter,
            condition: row.condition,
            year: row.year,
            serial_number: row.serial_number,
            reference_number: row.reference_number,
            category: row.category,
            style: row.style,
            image_urls: row.image_urls,
            price: row.price,
            cost_price: row.cost_price,
            wholesale_price: row.wholesale_price,
            list_price: row.list_price,
            status: row.status,
            remote_id: row.remote_id.map(RemoteEntryId::new),
            publish_status: row.publish_status.parse()?,
            last_synced_at: row.last_synced_at,
        })
    }
}

const SELECT_COLUMNS: &str = r"
    tag_number, description, designer, model, material, dial, diameter,
    condition, year, serial_number, reference_number, category, style,
    image_urls, price, cost_price, wholesale_price, list_price, status,
    remote_id, publish_status, last_synced_at
";

/// Record store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    tenant_id: TenantId,
}

impl PgRecordStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool, tenant_id: TenantId) -> Self {
        Self { pool, tenant_id }
    }

    /// Connect to `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        tenant_id: TenantId,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(StoreError::ConnectionFailed)?;
        Ok(Self::new(pool, tenant_id))
    }

    /// Run all pending migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running record store migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::MigrationFailed)?;
        info!("Record store migrations completed");
        Ok(())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn tenant(&self) -> Uuid {
        *self.tenant_id.as_uuid()
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_all(&self) -> StoreResult<Vec<CatalogRecord>> {
        let rows: Vec<CatalogRecordRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog_records WHERE tenant_id = $1 ORDER BY tag_number"
        ))
        .bind(self.tenant())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CatalogRecord::try_from).collect()
    }

    async fn find_by_key(&self, business_key: &str) -> StoreResult<Option<CatalogRecord>> {
        let row: Option<CatalogRecordRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog_records WHERE tenant_id = $1 AND tag_number = $2"
        ))
        .bind(self.tenant())
        .bind(normalize_key(business_key))
        .fetch_optional(&self.pool)
        .await?;

        row.map(CatalogRecord::try_from).transpose()
    }

    async fn save(&self, record: &CatalogRecord) -> StoreResult<CatalogRecord> {
        record.validate()?;
        let key = normalize_key(&record.tag_number);

        let mut tx = self.pool.begin().await?;

        let existing: Option<CatalogRecordRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM catalog_records \
             WHERE tenant_id = $1 AND tag_number = $2 FOR UPDATE"
        ))
        .bind(self.tenant())
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;
        let existing = existing.map(CatalogRecord::try_from).transpose()?;
        ensure_remote_id_unchanged(existing.as_ref(), record)?;

        let row: CatalogRecordRow = sqlx::query_as(&format!(
            r"
            INSERT INTO catalog_records (
                tenant_id, tag_number, description, designer, model, material, dial,
                diameter, condition, year, serial_number, reference_number, category,
                style, image_urls, price, cost_price, wholesale_price, list_price,
                status, remote_id, publish_status, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23)
            ON CONFLICT (tenant_id, tag_number) DO UPDATE SET
                description = EXCLUDED.description,
                designer = EXCLUDED.designer,
                model = EXCLUDED.model,
                material = EXCLUDED.material,
                dial = EXCLUDED.dial,
                diameter = EXCLUDED.diameter,
                condition = EXCLUDED.condition,
                year = EXCLUDED.year,
                serial_number = EXCLUDED.serial_number,
                reference_number = EXCLUDED.reference_number,
                category = EXCLUDED.category,
                style = EXCLUDED.style,
                image_urls = EXCLUDED.image_urls,
                price = EXCLUDED.price,
                cost_price = EXCLUDED.cost_price,
                wholesale_price = EXCLUDED.wholesale_price,
                list_price = EXCLUDED.list_price,
                status = EXCLUDED.status,
                remote_id = EXCLUDED.remote_id,
                publish_status = EXCLUDED.publish_status,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = NOW()
            RETURNING {SELECT_COLUMNS}
            "
        ))
        .bind(self.tenant())
        .bind(&key)
        .bind(&record.description)
        .bind(&record.designer)
        .bind(&record.model)
        .bind(&record.material)
        .bind(&record.dial)
        .bind(&record.diameter)
        .bind(&record.condition)
        .bind(&record.year)
        .bind(&record.serial_number)
        .bind(&record.reference_number)
        .bind(&record.category)
        .bind(&record.style)
        .bind(&record.image_urls)
        .bind(record.price)
        .bind(record.cost_price)
        .bind(record.wholesale_price)
        .bind(record.list_price)
        .bind(&record.status)
        .bind(record.remote_id.as_ref().map(RemoteEntryId::as_str))
        .bind(record.publish_status.as_str())
        .bind(record.last_synced_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(business_key = %key, "Saved catalog record");
        CatalogRecord::try_from(row)
    }

    async fn delete(&self, business_key: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM catalog_records WHERE tenant_id = $1 AND tag_number = $2")
                .bind(self.tenant())
                .bind(normalize_key(business_key))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM catalog_records WHERE tenant_id = $1")
            .bind(self.tenant())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn correct_remote_id(
        &self,
        business_key: &str,
        remote_id: Option<&RemoteEntryId>,
        reason: &str,
    ) -> StoreResult<CatalogRecord> {
        let key = normalize_key(business_key);
        let mut tx = self.pool.begin().await?;

        let previous: Option<(Option<String>,)> = sqlx::query_as(
            r"
            SELECT remote_id FROM catalog_records
            WHERE tenant_id = $1 AND tag_number = $2
            FOR UPDATE
            ",
        )
        .bind(self.tenant())
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((previous,)) = previous else {
            return Err(StoreError::NotFound(key));
        };

        let new_id = remote_id.map(RemoteEntryId::as_str);
        let publish_status = if new_id.is_some() { "published" } else { "pending" };

        let row: CatalogRecordRow = sqlx::query_as(&format!(
            r"
            UPDATE catalog_records
            SET remote_id = $3, publish_status = $4, updated_at = NOW()
            WHERE tenant_id = $1 AND tag_number = $2
            RETURNING {SELECT_COLUMNS}
            "
        ))
        .bind(self.tenant())
        .bind(&key)
        .bind(new_id)
        .bind(publish_status)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO catalog_record_remote_id_corrections
                (id, tenant_id, tag_number, previous_remote_id, new_remote_id, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(Uuid::new_v4())
        .bind(self.tenant())
        .bind(&key)
        .bind(&previous)
        .bind(new_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            business_key = %key,
            previous = ?previous,
            new = ?new_id,
            reason,
            "Corrected remote id"
        );
        CatalogRecord::try_from(row)
    }
}
