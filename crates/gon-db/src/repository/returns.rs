//! # Return Repository
//!
//! Return headers and lines. A return belongs to exactly one sale; its stock
//! effect is written by [`crate::StockLedger::restore_from_return`] in the
//! same transaction as [`insert_return`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gon_core::dto::{ReturnLineView, ReturnView, SaleRefFilter};
use gon_core::{AccessScope, Money, ReturnLineItem, ReturnStatus, SaleReturn};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const RETURN_COLUMNS: &str =
    "id, sale_id, actor_user_id, reason, refund_amount, status, created_at, updated_at";

const LINE_COLUMNS: &str = "id, return_id, product_id, quantity, unit_price, created_at";

// =============================================================================
// Writes
// =============================================================================

pub async fn insert_return<'e, E>(
    executor: E,
    sale_id: i64,
    actor_user_id: i64,
    reason: Option<&str>,
    refund_amount: Money,
    created_at: DateTime<Utc>,
) -> DbResult<SaleReturn>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        INSERT INTO sale_returns (sale_id, actor_user_id, reason, refund_amount, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING {}
        "#,
        RETURN_COLUMNS
    );
    let row = sqlx::query_as::<_, SaleReturn>(&sql)
        .bind(sale_id)
        .bind(actor_user_id)
        .bind(reason)
        .bind(refund_amount)
        .bind(ReturnStatus::Pending)
        .bind(created_at)
        .fetch_one(executor)
        .await?;

    debug!(return_id = row.id, sale_id, "Return inserted");
    Ok(row)
}

pub async fn insert_return_line<'e, E>(
    executor: E,
    return_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: Money,
    created_at: DateTime<Utc>,
) -> DbResult<ReturnLineItem>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        INSERT INTO return_line_items (return_id, product_id, quantity, unit_price, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING {}
        "#,
        LINE_COLUMNS
    );
    let row = sqlx::query_as::<_, ReturnLineItem>(&sql)
        .bind(return_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(created_at)
        .fetch_one(executor)
        .await?;
    Ok(row)
}

/// Overwrites the mutable header fields of a return.
pub async fn update_return<'e, E>(
    executor: E,
    id: i64,
    reason: Option<&str>,
    refund_amount: Money,
    status: ReturnStatus,
    updated_at: DateTime<Utc>,
) -> DbResult<SaleReturn>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        UPDATE sale_returns
        SET reason = ?1, refund_amount = ?2, status = ?3, updated_at = ?4
        WHERE id = ?5
        RETURNING {}
        "#,
        RETURN_COLUMNS
    );
    let row = sqlx::query_as::<_, SaleReturn>(&sql)
        .bind(reason)
        .bind(refund_amount)
        .bind(status)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.ok_or_else(|| DbError::not_found("Return", id))
}

/// Removes a return; its lines cascade. The caller reverses the stock first.
pub async fn delete_return<'e, E>(executor: E, id: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM sale_returns WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Return", id));
    }
    debug!(return_id = id, "Return deleted");
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

pub async fn get_return<'e, E>(executor: E, id: i64) -> DbResult<Option<SaleReturn>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM sale_returns WHERE id = ?1", RETURN_COLUMNS);
    let row = sqlx::query_as::<_, SaleReturn>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn return_lines<'e, E>(executor: E, return_id: i64) -> DbResult<Vec<ReturnLineItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM return_line_items WHERE return_id = ?1 ORDER BY id",
        LINE_COLUMNS
    );
    let rows = sqlx::query_as::<_, ReturnLineItem>(&sql)
        .bind(return_id)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Quantity already returned per product on one sale. Rejected returns
/// do not count.
pub async fn returned_quantities<'e, E>(executor: E, sale_id: i64) -> DbResult<HashMap<i64, i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT rl.product_id, SUM(rl.quantity)
        FROM return_line_items rl
        JOIN sale_returns r ON r.id = rl.return_id
        WHERE r.sale_id = ?1 AND r.status != 'rejected'
        GROUP BY rl.product_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().collect())
}

// =============================================================================
// Read Model
// =============================================================================

#[derive(Debug, FromRow)]
struct ReturnHeaderRow {
    id: i64,
    sale_id: i64,
    actor_user_id: i64,
    actor_name: String,
    reason: Option<String>,
    refund_amount: Money,
    status: ReturnStatus,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ReturnLineRow {
    id: i64,
    return_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i64,
    unit_price: Money,
}

const HEADER_SELECT: &str = r#"
    SELECT
        r.id, r.sale_id, r.actor_user_id, u.name AS actor_name,
        r.reason, r.refund_amount, r.status, r.created_at, r.updated_at
    FROM sale_returns r
    JOIN users u ON u.id = r.actor_user_id
"#;

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<SaleReturn>> {
        get_return(&self.pool, id).await
    }

    pub async fn lines(&self, return_id: i64) -> DbResult<Vec<ReturnLineItem>> {
        return_lines(&self.pool, return_id).await
    }

    pub async fn view(&self, id: i64) -> DbResult<Option<ReturnView>> {
        let sql = format!("{} WHERE r.id = ?1", HEADER_SELECT);
        let header = sqlx::query_as::<_, ReturnHeaderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(header) = header else {
            return Ok(None);
        };
        let mut lines = self.line_views(&[header.id]).await?;
        let lines = lines.remove(&header.id).unwrap_or_default();
        Ok(Some(into_view(header, lines)))
    }

    /// Returns recorded against one sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: i64) -> DbResult<Vec<ReturnView>> {
        let sql = format!("{} WHERE r.sale_id = ?1 ORDER BY r.id", HEADER_SELECT);
        let headers = sqlx::query_as::<_, ReturnHeaderRow>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let mut lines = self.line_views(&ids).await?;
        Ok(headers
            .into_iter()
            .map(|h| {
                let return_lines = lines.remove(&h.id).unwrap_or_default();
                into_view(h, return_lines)
            })
            .collect())
    }

    /// Returns visible inside `scope`, judged by the owning sale; oldest first.
    pub async fn list(&self, scope: &AccessScope, filter: &SaleRefFilter) -> DbResult<Vec<ReturnView>> {
        let mut qb = QueryBuilder::<Sqlite>::new(HEADER_SELECT);
        qb.push(" JOIN sales s ON s.id = r.sale_id WHERE 1 = 1");

        if let Some(company_id) = scope.company_filter {
            qb.push(" AND s.company_id = ").push_bind(company_id);
        }
        if let Some(branch_id) = scope.branch_filter {
            qb.push(" AND s.branch_id = ").push_bind(branch_id);
        }
        if let Some(sale_id) = filter.sale_id {
            qb.push(" AND r.sale_id = ").push_bind(sale_id);
        }
        qb.push(" ORDER BY r.id");

        let headers = qb.build_query_as::<ReturnHeaderRow>().fetch_all(&self.pool).await?;

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let mut lines = self.line_views(&ids).await?;
        Ok(headers
            .into_iter()
            .map(|h| {
                let return_lines = lines.remove(&h.id).unwrap_or_default();
                into_view(h, return_lines)
            })
            .collect())
    }

    async fn line_views(&self, return_ids: &[i64]) -> DbResult<HashMap<i64, Vec<ReturnLineView>>> {
        let mut grouped: HashMap<i64, Vec<ReturnLineView>> = HashMap::new();
        if return_ids.is_empty() {
            return Ok(grouped);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT rl.id, rl.return_id, rl.product_id, p.name AS product_name, rl.quantity, rl.unit_price
            FROM return_line_items rl
            JOIN products p ON p.id = rl.product_id
            WHERE rl.return_id IN (
            "#,
        );
        let mut separated = qb.separated(", ");
        for id in return_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY rl.id");

        let rows = qb.build_query_as::<ReturnLineRow>().fetch_all(&self.pool).await?;
        for row in rows {
            grouped.entry(row.return_id).or_default().push(ReturnLineView {
                id: row.id,
                product_id: row.product_id,
                product_name: row.product_name,
                quantity: row.quantity,
                unit_price: row.unit_price,
            });
        }
        Ok(grouped)
    }
}

fn into_view(row: ReturnHeaderRow, lines: Vec<ReturnLineView>) -> ReturnView {
    ReturnView {
        id: row.id,
        sale_id: row.sale_id,
        actor_user_id: row.actor_user_id,
        actor_name: row.actor_name,
        reason: row.reason,
        refund_amount: row.refund_amount,
        status: row.status,
        created_at: row.created_at,
        updated_at: row.updated_at,
        lines,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
