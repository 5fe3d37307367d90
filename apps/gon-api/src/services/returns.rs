//! # Return Workflow
//!
//! Compensating transaction against an existing sale: the return header and
//! lines are recorded and every returned unit goes back into the sale's
//! branch stock, in one transaction.
//!
//! Returning more than was sold (or a product that was never on the sale) is
//! accepted and logged; the refund is reviewed through the return's status.

use std::sync::Arc;

use gon_core::dto::{CreateReturnRequest, ReturnView, SaleRefFilter, UpdateReturnRequest};
use gon_core::scope::resolve_scope;
use gon_core::validation::{validate_create_return, validate_id, validate_update_return};
use gon_core::{CallerIdentity, Capability, Clock, SaleReturn};
use gon_db::repository::{catalog, returns, sale};
use gon_db::{Database, StockLedger};
use tracing::{info, warn};

use super::TxPolicy;
use crate::error::{ServiceError, ServiceResult};

pub fn return_reason(sale_id: i64) -> String {
    format!("Return of sale #{}", sale_id)
}

/// Reason recorded on the movements that take back a deleted return's stock.
pub fn return_deletion_reason(return_id: i64) -> String {
    format!("Deletion of return #{}", return_id)
}

#[derive(Clone)]
pub struct ReturnService {
    db: Database,
    clock: Arc<dyn Clock>,
    policy: TxPolicy,
}

impl ReturnService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, policy: TxPolicy) -> Self {
        ReturnService { db, clock, policy }
    }

    pub async fn create_return(&self, request: &CreateReturnRequest, caller: &CallerIdentity) -> ServiceResult<ReturnView> {
        validate_create_return(request)?;

        let created = self
            .policy
            .run("create_return", || self.create_return_tx(request, caller))
            .await?;

        info!(
            return_id = created.id,
            sale_id = created.sale_id,
            refund = %created.refund_amount,
            lines = request.lines.len(),
            "Return created"
        );

        self.view(created.id).await
    }

    async fn create_return_tx(&self, request: &CreateReturnRequest, caller: &CallerIdentity) -> ServiceResult<SaleReturn> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let target = sale::get_sale(&mut *tx, request.sale_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", request.sale_id))?;
        caller.authorize(Capability::CreateReturn, target.company_id, target.branch_id)?;

        let actor = catalog::find_user(&mut *tx, request.actor_user_id)
            .await?
            .filter(|u| u.company_id == target.company_id)
            .ok_or_else(|| {
                ServiceError::invalid_reference(format!(
                    "User {} does not exist in company {}",
                    request.actor_user_id, target.company_id
                ))
            })?;

        let sold = sale::sold_quantities(&mut *tx, target.id).await?;
        let mut returned = returns::returned_quantities(&mut *tx, target.id).await?;

        let created = returns::insert_return(
            &mut *tx,
            target.id,
            actor.id,
            request.reason.as_deref(),
            request.refund_amount,
            now,
        )
        .await?;

        let reason = return_reason(target.id);
        for line in &request.lines {
            let product = catalog::find_product(&mut *tx, line.product_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::invalid_reference(format!("Product {} does not exist", line.product_id))
                })?;

            returns::insert_return_line(&mut *tx, created.id, product.id, line.quantity, line.unit_price, now)
                .await?;

            StockLedger::new(&mut tx, now)
                .restore_from_return(
                    product.id,
                    target.branch_id,
                    line.quantity,
                    &reason,
                    Some(actor.id),
                    Some(created.id),
                )
                .await?;

            let total_returned = returned.entry(product.id).or_insert(0);
            *total_returned += line.quantity;
            let sold_quantity = sold.get(&product.id).copied().unwrap_or(0);
            if *total_returned > sold_quantity {
                warn!(
                    sale_id = target.id,
                    return_id = created.id,
                    product_id = product.id,
                    sold = sold_quantity,
                    returned = *total_returned,
                    "Return exceeds quantity sold"
                );
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Partial update: absent fields keep their stored value.
    pub async fn update_return(
        &self,
        id: i64,
        request: &UpdateReturnRequest,
        caller: &CallerIdentity,
    ) -> ServiceResult<ReturnView> {
        validate_id("id", id)?;
        validate_update_return(request)?;

        let updated = self
            .policy
            .run("update_return", || self.update_return_tx(id, request, caller))
            .await?;

        info!(return_id = id, status = ?updated.status, refund = %updated.refund_amount, "Return updated");
        self.view(id).await
    }

    async fn update_return_tx(
        &self,
        id: i64,
        request: &UpdateReturnRequest,
        caller: &CallerIdentity,
    ) -> ServiceResult<SaleReturn> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current = returns::get_return(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Return", id))?;
        let target = sale::get_sale(&mut *tx, current.sale_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", current.sale_id))?;
        caller.authorize(Capability::ModifyReturn, target.company_id, target.branch_id)?;

        let updated = returns::update_return(
            &mut *tx,
            id,
            request.reason.as_deref().or(current.reason.as_deref()),
            request.refund_amount.unwrap_or(current.refund_amount),
            request.status.unwrap_or(current.status),
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a return and takes its restored units back out of stock.
    pub async fn delete_return(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<()> {
        validate_id("id", id)?;

        let removed = self
            .policy
            .run("delete_return", || self.delete_return_tx(id, caller))
            .await?;

        warn!(
            return_id = id,
            sale_id = removed.sale_id,
            refund = %removed.refund_amount,
            actor_user_id = caller.user_id,
            "Return deleted"
        );
        Ok(())
    }

    async fn delete_return_tx(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<SaleReturn> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current = returns::get_return(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Return", id))?;
        let target = sale::get_sale(&mut *tx, current.sale_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", current.sale_id))?;
        caller.authorize(Capability::DeleteReturn, target.company_id, target.branch_id)?;

        let lines = returns::return_lines(&mut *tx, id).await?;
        let reason = return_deletion_reason(id);
        for line in &lines {
            StockLedger::new(&mut tx, now)
                .reverse_return(
                    line.product_id,
                    target.branch_id,
                    line.quantity,
                    &reason,
                    Some(caller.user_id),
                    id,
                )
                .await?;
        }

        returns::delete_return(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(current)
    }

    pub async fn get_return(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<ReturnView> {
        let view = self.view(id).await?;
        self.ensure_sale_visible(view.sale_id, caller).await?;
        Ok(view)
    }

    pub async fn list_returns_for_sale(&self, sale_id: i64, caller: &CallerIdentity) -> ServiceResult<Vec<ReturnView>> {
        self.ensure_sale_visible(sale_id, caller).await?;
        Ok(self.db.returns().list_for_sale(sale_id).await?)
    }

    /// Returns visible to the caller, optionally for one sale.
    pub async fn list_returns(&self, caller: &CallerIdentity, filter: &SaleRefFilter) -> ServiceResult<Vec<ReturnView>> {
        let scope = resolve_scope(caller)?;
        Ok(self.db.returns().list(&scope, filter).await?)
    }

    async fn ensure_sale_visible(&self, sale_id: i64, caller: &CallerIdentity) -> ServiceResult<()> {
        let target = self
            .db
            .sales()
            .get(sale_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", sale_id))?;
        if !caller.can_view(target.company_id, target.branch_id)? {
            return Err(ServiceError::Forbidden(format!(
                "Sale #{} is outside the caller's scope",
                sale_id
            )));
        }
        Ok(())
    }

    async fn view(&self, id: i64) -> ServiceResult<ReturnView> {
        self.db
            .returns()
            .view(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Return", id))
    }
}
