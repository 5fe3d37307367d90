//! # Payments
//!
//! Records money received against a sale. Several payments may settle one
//! sale; overpayment is allowed but logged.

use std::sync::Arc;

use gon_core::dto::{CreatePaymentRequest, PaymentView, SaleRefFilter};
use gon_core::scope::resolve_scope;
use gon_core::validation::{validate_create_payment, validate_id};
use gon_core::{CallerIdentity, Capability, Clock, Payment, PaymentStatus, SaleStatus};
use gon_db::repository::{catalog, payment, sale};
use gon_db::Database;
use tracing::{info, warn};

use super::TxPolicy;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct PaymentService {
    db: Database,
    clock: Arc<dyn Clock>,
    policy: TxPolicy,
}

impl PaymentService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, policy: TxPolicy) -> Self {
        PaymentService { db, clock, policy }
    }

    pub async fn create_payment(&self, request: &CreatePaymentRequest, caller: &CallerIdentity) -> ServiceResult<PaymentView> {
        validate_create_payment(request)?;

        let created = self
            .policy
            .run("create_payment", || self.create_payment_tx(request, caller))
            .await?;

        info!(
            payment_id = created.id,
            sale_id = created.sale_id,
            amount = %created.amount,
            status = ?created.status,
            "Payment recorded"
        );

        self.db
            .payments()
            .view(created.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Payment", created.id))
    }

    async fn create_payment_tx(&self, request: &CreatePaymentRequest, caller: &CallerIdentity) -> ServiceResult<Payment> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let target = sale::get_sale(&mut *tx, request.sale_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", request.sale_id))?;
        caller.authorize(Capability::RecordPayment, target.company_id, target.branch_id)?;

        catalog::find_payment_method(&mut *tx, request.payment_method_id)
            .await?
            .filter(|m| m.active && m.company_id == target.company_id)
            .ok_or_else(|| {
                ServiceError::invalid_reference(format!(
                    "Payment method {} is unknown, inactive or belongs to another company",
                    request.payment_method_id
                ))
            })?;

        if target.status == SaleStatus::Cancelled {
            return Err(ServiceError::InvalidTransition(format!(
                "Sale #{} is cancelled and cannot take payments",
                target.id
            )));
        }

        let paid = payment::total_paid(&mut *tx, target.id).await?;

        let created = payment::insert_payment(
            &mut *tx,
            target.id,
            request.payment_method_id,
            request.amount,
            request.reference.as_deref(),
            request.status,
            now,
        )
        .await?;

        if request.status != PaymentStatus::Cancelled && paid + request.amount > target.total {
            warn!(
                sale_id = target.id,
                total = %target.total,
                paid = %(paid + request.amount),
                "Payments exceed sale total"
            );
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn delete_payment(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<()> {
        validate_id("id", id)?;

        let removed = self
            .policy
            .run("delete_payment", || self.delete_payment_tx(id, caller))
            .await?;

        warn!(
            payment_id = id,
            sale_id = removed.sale_id,
            amount = %removed.amount,
            actor_user_id = caller.user_id,
            "Payment deleted"
        );
        Ok(())
    }

    async fn delete_payment_tx(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<Payment> {
        let mut tx = self.db.begin().await?;

        let existing = payment::get_payment(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Payment", id))?;
        let target = sale::get_sale(&mut *tx, existing.sale_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", existing.sale_id))?;
        caller.authorize(Capability::DeletePayment, target.company_id, target.branch_id)?;

        payment::delete_payment(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(existing)
    }

    pub async fn get_payment(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<PaymentView> {
        let view = self
            .db
            .payments()
            .view(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Payment", id))?;
        self.ensure_sale_visible(view.sale_id, caller).await?;
        Ok(view)
    }

    pub async fn list_payments_for_sale(&self, sale_id: i64, caller: &CallerIdentity) -> ServiceResult<Vec<PaymentView>> {
        self.ensure_sale_visible(sale_id, caller).await?;
        Ok(self.db.payments().list_for_sale(sale_id).await?)
    }

    /// Payments visible to the caller, optionally for one sale.
    pub async fn list_payments(&self, caller: &CallerIdentity, filter: &SaleRefFilter) -> ServiceResult<Vec<PaymentView>> {
        let scope = resolve_scope(caller)?;
        Ok(self.db.payments().list(&scope, filter).await?)
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
}
