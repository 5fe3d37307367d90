//! # Access Scope
//!
//! Derives what a caller may see and act on from the identity in their token.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Role           company_filter        branch_filter                     │
//! │  ─────────────  ────────────────────  ───────────────────────────────   │
//! │  GlobalAdmin    none                  none                              │
//! │  CompanyAdmin   caller.company_id     caller.branch_id (if assigned)    │
//! │  BranchAdmin    caller.company_id     caller.branch_id (required)       │
//! │  Salesperson    none                  caller.branch_id (required)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scope is recomputed per request; nothing here is cached or stateful.
//! Writes additionally check a [`Capability`] so role rules live in one table
//! instead of being repeated at every endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Role;

/// Who is calling, as asserted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub user_id: i64,
    pub role: Role,
    pub company_id: i64,
    pub branch_id: Option<i64>,
}

/// Row-level visibility predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessScope {
    pub company_filter: Option<i64>,
    pub branch_filter: Option<i64>,
}

impl AccessScope {
    /// Scope with no filters.
    pub const fn unrestricted() -> Self {
        AccessScope {
            company_filter: None,
            branch_filter: None,
        }
    }

    /// True when a row owned by `(company_id, branch_id)` is inside the scope.
    pub fn permits(&self, company_id: i64, branch_id: i64) -> bool {
        self.company_filter.map_or(true, |c| c == company_id)
            && self.branch_filter.map_or(true, |b| b == branch_id)
    }
}

/// Resolves the visibility scope for a caller.
///
/// Branch-bound roles without a branch assignment cannot see anything, so
/// they are rejected outright instead of silently widening to the company.
pub fn resolve_scope(caller: &CallerIdentity) -> CoreResult<AccessScope> {
    match caller.role {
        Role::GlobalAdmin => Ok(AccessScope::unrestricted()),
        Role::CompanyAdmin => Ok(AccessScope {
            company_filter: Some(caller.company_id),
            branch_filter: caller.branch_id,
        }),
        Role::BranchAdmin => {
            let branch = require_branch(caller)?;
            Ok(AccessScope {
                company_filter: Some(caller.company_id),
                branch_filter: Some(branch),
            })
        }
        Role::Salesperson => {
            let branch = require_branch(caller)?;
            Ok(AccessScope {
                company_filter: None,
                branch_filter: Some(branch),
            })
        }
    }
}

fn require_branch(caller: &CallerIdentity) -> CoreResult<i64> {
    caller.branch_id.ok_or_else(|| {
        CoreError::forbidden(format!(
            "{:?} user {} has no branch assignment",
            caller.role, caller.user_id
        ))
    })
}

// =============================================================================
// Capabilities
// =============================================================================

/// A named permission checked before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreateSale,
    ModifySale,
    DeleteSale,
    CreateReturn,
    ModifyReturn,
    DeleteReturn,
    RecordPayment,
    DeletePayment,
    ProvisionStock,
    AdjustStock,
}

impl Role {
    /// Whether this role holds `capability`.
    pub fn grants(self, capability: Capability) -> bool {
        use Capability::*;
        match capability {
            CreateSale | RecordPayment => true,
            ModifySale | DeleteSale | DeleteReturn | DeletePayment | ProvisionStock => {
                matches!(self, Role::GlobalAdmin | Role::CompanyAdmin)
            }
            CreateReturn | ModifyReturn | AdjustStock => matches!(
                self,
                Role::GlobalAdmin | Role::CompanyAdmin | Role::BranchAdmin
            ),
        }
    }
}

impl CallerIdentity {
    /// Authorizes `capability` against a row owned by `(company_id, branch_id)`.
    ///
    /// Every role except GlobalAdmin must belong to the target company, on
    /// top of the row-level scope check.
    pub fn authorize(&self, capability: Capability, company_id: i64, branch_id: i64) -> CoreResult<()> {
        if !self.role.grants(capability) {
            return Err(CoreError::forbidden(format!(
                "{:?} may not perform {:?}",
                self.role, capability
            )));
        }

        if self.role != Role::GlobalAdmin && self.company_id != company_id {
            return Err(CoreError::forbidden(format!(
                "company {} is outside the caller's company",
                company_id
            )));
        }

        let scope = resolve_scope(self)?;
        if !scope.permits(company_id, branch_id) {
            return Err(CoreError::forbidden(format!(
                "branch {} is outside the caller's scope",
                branch_id
            )));
        }

        Ok(())
    }

    /// Read-only visibility check for detail endpoints.
    pub fn can_view(&self, company_id: i64, branch_id: i64) -> CoreResult<bool> {
        Ok(resolve_scope(self)?.permits(company_id, branch_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
