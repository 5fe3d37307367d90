//! # Payment Repository
//!
//! Payments settle a sale; a sale can take several. They never touch stock.

use chrono::{DateTime, Utc};
use gon_core::dto::{PaymentView, SaleRefFilter};
use gon_core::{AccessScope, Money, Payment, PaymentStatus};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const PAYMENT_COLUMNS: &str =
    "id, sale_id, payment_method_id, amount, reference, status, created_at";

pub async fn insert_payment<'e, E>(
    executor: E,
    sale_id: i64,
    payment_method_id: i64,
    amount: Money,
    reference: Option<&str>,
    status: PaymentStatus,
    created_at: DateTime<Utc>,
) -> DbResult<Payment>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        INSERT INTO payments (sale_id, payment_method_id, amount, reference, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    );
    let row = sqlx::query_as::<_, Payment>(&sql)
        .bind(sale_id)
        .bind(payment_method_id)
        .bind(amount)
        .bind(reference)
        .bind(status)
        .bind(created_at)
        .fetch_one(executor)
        .await?;

    debug!(payment_id = row.id, sale_id, amount = %amount, "Payment inserted");
    Ok(row)
}

pub async fn get_payment<'e, E>(executor: E, id: i64) -> DbResult<Option<Payment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS);
    let row = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn delete_payment<'e, E>(executor: E, id: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM payments WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Payment", id));
    }
    Ok(())
}

/// Sum of non-cancelled payments on a sale.
pub async fn total_paid<'e, E>(executor: E, sale_id: i64) -> DbResult<Money>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE sale_id = ?1 AND status != 'cancelled'",
    )
    .bind(sale_id)
    .fetch_one(executor)
    .await?;
    Ok(Money::from_minor(total))
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: i64,
    sale_id: i64,
    payment_method_id: i64,
    payment_method_name: String,
    amount: Money,
    reference: Option<String>,
    status: PaymentStatus,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentView {
    fn from(row: PaymentRow) -> Self {
        PaymentView {
            id: row.id,
            sale_id: row.sale_id,
            payment_method_id: row.payment_method_id,
            payment_method_name: row.payment_method_name,
            amount: row.amount,
            reference: row.reference,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

const VIEW_SELECT: &str = r#"
    SELECT p.id, p.sale_id, p.payment_method_id, m.name AS payment_method_name,
           p.amount, p.reference, p.status, p.created_at
    FROM payments p
    JOIN payment_methods m ON m.id = p.payment_method_id
"#;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Payment>> {
        get_payment(&self.pool, id).await
    }

    pub async fn total_paid(&self, sale_id: i64) -> DbResult<Money> {
        total_paid(&self.pool, sale_id).await
    }

    pub async fn view(&self, id: i64) -> DbResult<Option<PaymentView>> {
        let sql = format!("{} WHERE p.id = ?1", VIEW_SELECT);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PaymentView::from))
    }

    /// Payments on one sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: i64) -> DbResult<Vec<PaymentView>> {
        let sql = format!("{} WHERE p.sale_id = ?1 ORDER BY p.id", VIEW_SELECT);
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PaymentView::from).collect())
    }

    /// Payments visible inside `scope`, judged by the owning sale; oldest first.
    pub async fn list(&self, scope: &AccessScope, filter: &SaleRefFilter) -> DbResult<Vec<PaymentView>> {
        let mut qb = QueryBuilder::<Sqlite>::new(VIEW_SELECT);
        qb.push(" JOIN sales s ON s.id = p.sale_id WHERE 1 = 1");

        if let Some(company_id) = scope.company_filter {
            qb.push(" AND s.company_id = ").push_bind(company_id);
        }
        if let Some(branch_id) = scope.branch_filter {
            qb.push(" AND s.branch_id = ").push_bind(branch_id);
        }
        if let Some(sale_id) = filter.sale_id {
            qb.push(" AND p.sale_id = ").push_bind(sale_id);
        }
        qb.push(" ORDER BY p.id");

        let rows = qb.build_query_as::<PaymentRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(PaymentView::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::sale::{insert_sale, NewSale};
    use crate::{Database, DbConfig};
    use gon_core::pricing::Totals;
    use gon_core::{Role, SaleStatus, SaleType};

    #[tokio::test]
    async fn test_payments_sum_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let company = catalog.insert_company("Acme").await.unwrap();
        let branch = catalog.insert_branch(company, "Centro").await.unwrap();
        let user = catalog.insert_user(company, Some(branch), "Caro", Role::Salesperson).await.unwrap();
        let cash = catalog.insert_payment_method(company, "Efectivo", true).await.unwrap();
        let sale = insert_sale(
            db.pool(),
            &NewSale {
                company_id: company,
                branch_id: branch,
                customer_id: None,
                cashier_user_id: user,
                totals: Totals {
                    subtotal: Money::from_minor(1000),
                    tax: Money::from_minor(190),
                    total: Money::from_minor(1190),
                },
                sale_type: SaleType::InPerson,
                status: SaleStatus::Completed,
                receipt_number: None,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let first = insert_payment(db.pool(), sale.id, cash, Money::from_minor(1000), None, PaymentStatus::Completed, Utc::now())
            .await
            .unwrap();
        insert_payment(db.pool(), sale.id, cash, Money::from_minor(190), Some("VOUCHER-1"), PaymentStatus::Cancelled, Utc::now())
            .await
            .unwrap();

        assert_eq!(db.payments().total_paid(sale.id).await.unwrap(), Money::from_minor(1000));

        let views = db.payments().list_for_sale(sale.id).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].payment_method_name, "Efectivo");

        let own = AccessScope {
            company_filter: Some(company),
            branch_filter: Some(branch),
        };
        assert_eq!(db.payments().list(&own, &SaleRefFilter::default()).await.unwrap().len(), 2);
        let foreign = AccessScope {
            company_filter: Some(company + 1),
            branch_filter: None,
        };
        assert!(db.payments().list(&foreign, &SaleRefFilter::default()).await.unwrap().is_empty());

        delete_payment(db.pool(), first.id).await.unwrap();
        assert!(db.payments().get(first.id).await.unwrap().is_none());
        assert!(matches!(delete_payment(db.pool(), first.id).await, Err(DbError::NotFound { .. })));
    }
}
