//! Role-based access policy.
//!
//! Permission checks are pure lookups into a static table. Case access
//! consults the case store and fails closed: an unknown case, an unknown
//! role or a store error all deny.

use serde::{Deserialize, Serialize};

use crate::db::{CaseFilter, CaseRecord, CaseStore};
use crate::enterprise::audit::Provenance;
use crate::enterprise::case_id::CorrelationKey;
use crate::enterprise::types::{Permission, Role};
use crate::error::EnterpriseError;

const CLIENT_PERMISSIONS: &[Permission] = &[
    Permission::ViewCase,
    Permission::SendMessages,
    Permission::UploadDocuments,
    Permission::DownloadDocuments,
];

const LAWYER_PERMISSIONS: &[Permission] = &[
    Permission::ViewCase,
    Permission::CreateCase,
    Permission::EditCase,
    Permission::SendMessages,
    Permission::UploadDocuments,
    Permission::DownloadDocuments,
];

const SENIOR_LAWYER_PERMISSIONS: &[Permission] = &[
    Permission::ViewCase,
    Permission::CreateCase,
    Permission::EditCase,
    Permission::CloseCase,
    Permission::SendMessages,
    Permission::UploadDocuments,
    Permission::DownloadDocuments,
    Permission::ViewReports,
];

const CASE_MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::ViewCase,
    Permission::CreateCase,
    Permission::EditCase,
    Permission::CloseCase,
    Permission::SendMessages,
    Permission::UploadDocuments,
    Permission::DownloadDocuments,
    Permission::ManageAssignments,
    Permission::ViewReports,
];

const ADMIN_PERMISSIONS: &[Permission] = &Permission::ALL;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            provenance: Provenance::default(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::User | Role::Paralegal => CLIENT_PERMISSIONS,
        Role::Lawyer => LAWYER_PERMISSIONS,
        Role::SeniorLawyer => SENIOR_LAWYER_PERMISSIONS,
        Role::CaseManager => CASE_MANAGER_PERMISSIONS,
        Role::Admin => ADMIN_PERMISSIONS,
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// Permission set for a role given as its stored name. Unknown roles get
/// nothing.
pub fn role_permissions(raw_role: &str) -> &'static [Permission] {
    Role::from_db_value(raw_role)
        .map(permissions_for)
        .unwrap_or(&[])
}

pub fn require_permission(actor: &Actor, permission: Permission) -> Result<(), EnterpriseError> {
    if has_permission(actor.role, permission) {
        Ok(())
    } else {
        Err(EnterpriseError::AccessDenied(format!(
            "role {} lacks {}",
            actor.role, permission
        )))
    }
}

/// Access rule applied to an already-loaded case.
///
/// Paralegals are matched against the assigned lawyer; there is no
/// paralegal-to-lawyer delegation table.
pub fn case_access_decision(user_id: i64, role: Role, case: &CaseRecord) -> bool {
    match role {
        Role::Admin | Role::CaseManager => true,
        Role::Lawyer | Role::SeniorLawyer | Role::Paralegal => {
            case.assigned_lawyer_id == Some(user_id)
        }
        Role::User => case.client_id == Some(user_id),
    }
}

pub async fn has_case_access<S: CaseStore + ?Sized>(
    store: &S,
    user_id: i64,
    role: Role,
    key: CorrelationKey,
) -> bool {
    match store.get_case_by_key(key).await {
        Ok(Some(case)) => case_access_decision(user_id, role, &case),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(user_id, case_key = %key, "Case access check failed: {}", e);
            false
        }
    }
}

/// [`has_case_access`] for a role given as its stored name.
pub async fn has_case_access_str<S: CaseStore + ?Sized>(
    store: &S,
    user_id: i64,
    raw_role: &str,
    key: CorrelationKey,
) -> bool {
    match Role::from_db_value(raw_role) {
        Some(role) => has_case_access(store, user_id, role, key).await,
        None => false,
    }
}

/// Every case `user_id` may see. Store errors deny.
pub async fn accessible_cases<S: CaseStore + ?Sized>(
    store: &S,
    user_id: i64,
    role: Role,
) -> Vec<CaseRecord> {
    let filter = match role {
        Role::Admin | Role::CaseManager => CaseFilter::default(),
        Role::Lawyer | Role::SeniorLawyer | Role::Paralegal => CaseFilter {
            assigned_lawyer_id: Some(user_id),
            ..Default::default()
        },
        Role::User => CaseFilter {
            client_id: Some(user_id),
            ..Default::default()
        },
    };

    match store.list_cases(&filter).await {
        Ok(cases) => cases,
        Err(e) => {
            tracing::warn!(user_id, role = %role, "Failed to list accessible cases: {}", e);
            Vec::new()
        }
    }
}

/// Correlation keys of every case `user_id` may see.
pub async fn accessible_case_keys<S: CaseStore + ?Sized>(
    store: &S,
    user_id: i64,
    role: Role,
) -> Vec<CorrelationKey> {
    accessible_cases(store, user_id, role)
        .await
        .into_iter()
        .filter_map(|case| case.correlation_key)
        .collect()
}
