//! # Catalog Lookups
//!
//! Read access to the reference data the workflows cross-check: companies,
//! branches, products, customers, users and payment methods.
//!
//! The lookup functions are generic over the executor so a workflow can run
//! them on its open transaction (`&mut *tx`) while read endpoints use the
//! pool. Maintaining this data is plain CRUD owned elsewhere; the insert
//! helpers on [`CatalogRepository`] exist for provisioning (seed binary,
//! tests).

use std::collections::HashMap;

use gon_core::{
    BranchRef, CompanyRef, CustomerRef, Money, PaymentMethodRef, ProductRef, Role, UserRef,
};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

// =============================================================================
// Single Lookups
// =============================================================================

pub async fn find_company<'e, E>(executor: E, id: i64) -> DbResult<Option<CompanyRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, CompanyRef>("SELECT id, name FROM companies WHERE id = ?1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_branch<'e, E>(executor: E, id: i64) -> DbResult<Option<BranchRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, BranchRef>(
        "SELECT id, company_id, name FROM branches WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_product<'e, E>(executor: E, id: i64) -> DbResult<Option<ProductRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ProductRef>(
        "SELECT id, company_id, name, barcode, list_price FROM products WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_customer<'e, E>(executor: E, id: i64) -> DbResult<Option<CustomerRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, CustomerRef>(
        "SELECT id, company_id, name, rut FROM customers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_user<'e, E>(executor: E, id: i64) -> DbResult<Option<UserRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, UserRef>(
        "SELECT id, company_id, branch_id, name, role, active FROM users WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_payment_method<'e, E>(executor: E, id: i64) -> DbResult<Option<PaymentMethodRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, PaymentMethodRef>(
        "SELECT id, company_id, name, active FROM payment_methods WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

// =============================================================================
// Batch Lookups (read-model assembly)
// =============================================================================

/// Loads the given products keyed by id. Unknown ids are simply absent.
pub async fn products_by_ids<'e, E>(executor: E, ids: &[i64]) -> DbResult<HashMap<i64, ProductRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, company_id, name, barcode, list_price FROM products WHERE id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows = qb.build_query_as::<ProductRef>().fetch_all(executor).await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

// =============================================================================
// Repository (pool-backed)
// =============================================================================

/// Pool-backed access to reference data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn product(&self, id: i64) -> DbResult<Option<ProductRef>> {
        find_product(&self.pool, id).await
    }

    pub async fn user(&self, id: i64) -> DbResult<Option<UserRef>> {
        find_user(&self.pool, id).await
    }

    /// Number of companies; the seed binary uses it to detect a seeded database.
    pub async fn company_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert_company(&self, name: &str) -> DbResult<i64> {
        debug!(name, "Inserting company");
        let id: i64 = sqlx::query_scalar("INSERT INTO companies (name) VALUES (?1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn insert_branch(&self, company_id: i64, name: &str) -> DbResult<i64> {
        debug!(company_id, name, "Inserting branch");
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO branches (company_id, name) VALUES (?1, ?2) RETURNING id",
        )
        .bind(company_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_product(
        &self,
        company_id: i64,
        name: &str,
        barcode: Option<&str>,
        list_price: Money,
    ) -> DbResult<i64> {
        debug!(company_id, name, %list_price, "Inserting product");
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (company_id, name, barcode, list_price)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(name)
        .bind(barcode)
        .bind(list_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_customer(&self, company_id: i64, name: &str, rut: Option<&str>) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO customers (company_id, name, rut) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(company_id)
        .bind(name)
        .bind(rut)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_user(
        &self,
        company_id: i64,
        branch_id: Option<i64>,
        name: &str,
        role: Role,
    ) -> DbResult<i64> {
        debug!(company_id, ?branch_id, ?role, "Inserting user");
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (company_id, branch_id, name, role, active)
            VALUES (?1, ?2, ?3, ?4, 1)
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(name)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_payment_method(&self, company_id: i64, name: &str, active: bool) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO payment_methods (company_id, name, active) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(company_id)
        .bind(name)
        .bind(active)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_lookups_resolve_ownership() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let company = catalog.insert_company("Ferretería Los Andes").await.unwrap();
        let branch = catalog.insert_branch(company, "Casa Matriz").await.unwrap();
        let product = catalog
            .insert_product(company, "Martillo", Some("7800000000011"), Money::from_minor(4990))
            .await
            .unwrap();

        let b = find_branch(db.pool(), branch).await.unwrap().unwrap();
        assert_eq!(b.company_id, company);

        let p = catalog.product(product).await.unwrap().unwrap();
        assert_eq!(p.list_price, Money::from_minor(4990));
        assert_eq!(p.barcode.as_deref(), Some("7800000000011"));

        assert!(find_branch(db.pool(), 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_role_round_trips_through_storage() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let company = catalog.insert_company("Acme").await.unwrap();
        let branch = catalog.insert_branch(company, "Centro").await.unwrap();
        let user = catalog
            .insert_user(company, Some(branch), "Ana", Role::Salesperson)
            .await
            .unwrap();

        let u = catalog.user(user).await.unwrap().unwrap();
        assert_eq!(u.role, Role::Salesperson);
        assert_eq!(u.branch_id, Some(branch));
        assert!(u.active);
    }

    #[tokio::test]
    async fn test_products_by_ids() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let company = catalog.insert_company("Acme").await.unwrap();
        let a = catalog.insert_product(company, "A", None, Money::from_minor(10)).await.unwrap();
        let b = catalog.insert_product(company, "B", None, Money::from_minor(20)).await.unwrap();

        let map = products_by_ids(db.pool(), &[a, b, 404]).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&b].name, "B");
        assert!(products_by_ids(db.pool(), &[]).await.unwrap().is_empty());
    }
}
