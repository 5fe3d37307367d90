//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Transaction roots            Owned lines          Ledger               │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │      Sale       │──►│  SaleLineItem    │   │    StockItem     │     │
//! │  │  totals derived │   └──────────────────┘   │ (product,branch) │     │
//! │  └────────┬────────┘                          │  quantity ≥ 0    │     │
//! │           │ 1..n                              └────────┬─────────┘     │
//! │  ┌────────▼────────┐   ┌──────────────────┐            │ 1..n          │
//! │  │   SaleReturn    │──►│  ReturnLineItem  │   ┌────────▼─────────┐     │
//! │  └─────────────────┘   └──────────────────┘   │  StockMovement   │     │
//! │  ┌─────────────────┐                          │  append-only     │     │
//! │  │    Payment      │                          └──────────────────┘     │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  Lookup refs (owned by plain CRUD, read here):                          │
//! │  CompanyRef · BranchRef · ProductRef · CustomerRef · UserRef ·          │
//! │  PaymentMethodRef                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity id is a database-assigned positive integer (`i64`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1900 bps = 19%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Chilean IVA, applied to every sale subtotal.
pub const IVA_RATE: TaxRate = TaxRate::from_bps(1900);

// =============================================================================
// Role
// =============================================================================

/// Role carried in the caller's token.
///
/// The legacy role strings issued by the identity provider are accepted as
/// aliases, so tokens minted before the rename keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and acts on every company.
    #[serde(alias = "AdminGlobal")]
    GlobalAdmin,
    /// Acts on one company (optionally pinned to one branch).
    #[serde(alias = "AdminEmpresa", alias = "Administrador")]
    CompanyAdmin,
    /// Acts on one branch of one company.
    #[serde(alias = "AdminSucursal")]
    BranchAdmin,
    /// Cashier; acts on one branch.
    #[serde(alias = "Vendedor")]
    Salesperson,
}

// =============================================================================
// Sale Type & Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    InPerson,
    Online,
}

impl Default for SaleType {
    fn default() -> Self {
        SaleType::InPerson
    }
}

/// The status of a sale.
///
/// ## Transitions
/// ```text
///            ┌──────────► Completed
///  Pending ──┤
///            └──────────► Cancelled
///
///  Completed ──✗──► Cancelled   (only a return reverses a completed sale)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Pending,
    Cancelled,
}

impl SaleStatus {
    /// Returns true when a sale in `self` may be moved to `next`.
    ///
    /// Re-applying the current status is a no-op and always allowed.
    pub fn can_transition_to(self, next: SaleStatus) -> bool {
        use SaleStatus::*;
        matches!(
            (self, next),
            (Completed, Completed)
                | (Pending, Pending)
                | (Cancelled, Cancelled)
                | (Pending, Completed)
                | (Pending, Cancelled)
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but as a `Result`.
    pub fn ensure_transition(self, next: SaleStatus) -> CoreResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", next),
            })
        }
    }
}

// =============================================================================
// Return & Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Completed
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementDirection {
    Inbound,
    Outbound,
}

impl MovementDirection {
    /// +1 for inbound, -1 for outbound.
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            MovementDirection::Inbound => 1,
            MovementDirection::Outbound => -1,
        }
    }
}

/// On-hand quantity of one product at one branch.
///
/// Only the stock ledger writes `quantity`; its value always equals the net
/// of the item's movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: i64,
    pub product_id: i64,
    pub branch_id: i64,
    pub quantity: i64,
    pub minimum_threshold: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockItem {
    /// True when on-hand quantity has dropped to or below the threshold.
    pub fn is_below_threshold(&self) -> bool {
        self.quantity <= self.minimum_threshold
    }
}

/// Immutable ledger entry explaining one quantity change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: i64,
    pub stock_item_id: i64,
    /// Positive magnitude; the sign comes from `direction`.
    pub quantity: i64,
    pub direction: MovementDirection,
    pub reason: String,
    pub actor_user_id: Option<i64>,
    pub sale_id: Option<i64>,
    pub return_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Quantity with the direction applied.
    #[inline]
    pub fn signed_quantity(&self) -> i64 {
        self.quantity * self.direction.sign()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale header. Totals are always computed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub customer_id: Option<i64>,
    pub cashier_user_id: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub sale_type: SaleType,
    pub status: SaleStatus,
    pub receipt_number: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Price actually charged (override or list price at time of sale).
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub line_subtotal: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Return
// =============================================================================

/// A return (devolución) against a prior sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturn {
    pub id: i64,
    pub sale_id: i64,
    pub actor_user_id: i64,
    pub reason: Option<String>,
    pub refund_amount: Money,
    pub status: ReturnStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineItem {
    pub id: i64,
    pub return_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale. A sale can be settled by several payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub sale_id: i64,
    pub payment_method_id: i64,
    pub amount: Money,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Lookup References
// =============================================================================
// Minimal projections of entities maintained by plain CRUD elsewhere. The
// workflows only need existence, names and ownership for cross-checks.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompanyRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BranchRef {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductRef {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub barcode: Option<String>,
    pub list_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CustomerRef {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    /// Chilean tax id.
    pub rut: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserRef {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: Option<i64>,
    pub name: String,
    pub role: Role,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethodRef {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub active: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iva_rate() {
        assert_eq!(IVA_RATE.bps(), 1900);
    }

    #[test]
    fn test_sale_status_transitions() {
        use SaleStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Completed));

        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_completed_to_cancelled_is_invalid_transition() {
        let err = SaleStatus::Completed
            .ensure_transition(SaleStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_role_accepts_legacy_names() {
        let role: Role = serde_json::from_str("\"AdminEmpresa\"").unwrap();
        assert_eq!(role, Role::CompanyAdmin);
        let role: Role = serde_json::from_str("\"Administrador\"").unwrap();
        assert_eq!(role, Role::CompanyAdmin);
        let role: Role = serde_json::from_str("\"Vendedor\"").unwrap();
        assert_eq!(role, Role::Salesperson);
        let role: Role = serde_json::from_str("\"branch_admin\"").unwrap();
        assert_eq!(role, Role::BranchAdmin);
    }

    #[test]
    fn test_below_threshold_includes_the_minimum() {
        let mut item = StockItem {
            id: 1,
            product_id: 1,
            branch_id: 1,
            quantity: 3,
            minimum_threshold: 2,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert!(!item.is_below_threshold());
        item.quantity = 2;
        assert!(item.is_below_threshold());
        item.quantity = 0;
        assert!(item.is_below_threshold());
    }

    #[test]
    fn test_signed_quantity() {
        let mut movement = StockMovement {
            id: 1,
            stock_item_id: 1,
            quantity: 3,
            direction: MovementDirection::Outbound,
            reason: "Sale #1".to_string(),
            actor_user_id: None,
            sale_id: Some(1),
            return_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(movement.signed_quantity(), -3);
        movement.direction = MovementDirection::Inbound;
        assert_eq!(movement.signed_quantity(), 3);
    }
}
