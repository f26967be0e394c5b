use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EnterpriseError;

/// Practice area a case belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PracticeArea {
    Family,
    Civil,
    Criminal,
    Corporate,
    Tax,
    Ip,
    Immigration,
    RealEstate,
    PersonalInjury,
}

impl PracticeArea {
    pub const ALL: [PracticeArea; 9] = [
        Self::Family,
        Self::Civil,
        Self::Criminal,
        Self::Corporate,
        Self::Tax,
        Self::Ip,
        Self::Immigration,
        Self::RealEstate,
        Self::PersonalInjury,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Family => "FAMILY",
            Self::Civil => "CIVIL",
            Self::Criminal => "CRIMINAL",
            Self::Corporate => "CORPORATE",
            Self::Tax => "TAX",
            Self::Ip => "IP",
            Self::Immigration => "IMMIGRATION",
            Self::RealEstate => "REAL_ESTATE",
            Self::PersonalInjury => "PERSONAL_INJURY",
        }
    }

    /// Short code embedded in display identifiers.
    pub fn code(self) -> &'static str {
        match self {
            Self::RealEstate => "REALESTATE",
            Self::PersonalInjury => "INJURY",
            other => other.as_str(),
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|area| area.as_str() == value)
    }
}

impl fmt::Display for PracticeArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PracticeArea {
    type Err = EnterpriseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_value(s).ok_or_else(|| EnterpriseError::InvalidPracticeArea(s.to_string()))
    }
}

/// Case lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Open,
    InProgress,
    Closed,
    OnHold,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Closed => "CLOSED",
            Self::OnHold => "ON_HOLD",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(Self::Open),
            "IN_PROGRESS" => Some(Self::InProgress),
            "CLOSED" => Some(Self::Closed),
            "ON_HOLD" => Some(Self::OnHold),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Lawyer,
    SeniorLawyer,
    Paralegal,
    CaseManager,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Lawyer => "LAWYER",
            Self::SeniorLawyer => "SENIOR_LAWYER",
            Self::Paralegal => "PARALEGAL",
            Self::CaseManager => "CASE_MANAGER",
            Self::Admin => "ADMIN",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "USER" => Some(Self::User),
            "LAWYER" => Some(Self::Lawyer),
            "SENIOR_LAWYER" => Some(Self::SeniorLawyer),
            "PARALEGAL" => Some(Self::Paralegal),
            "CASE_MANAGER" => Some(Self::CaseManager),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grantable capability checked by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ViewCase,
    CreateCase,
    EditCase,
    CloseCase,
    SendMessages,
    UploadDocuments,
    DownloadDocuments,
    ManageAssignments,
    ViewReports,
    ViewAuditLogs,
    ManagePhases,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 12] = [
        Self::ViewCase,
        Self::CreateCase,
        Self::EditCase,
        Self::CloseCase,
        Self::SendMessages,
        Self::UploadDocuments,
        Self::DownloadDocuments,
        Self::ManageAssignments,
        Self::ViewReports,
        Self::ViewAuditLogs,
        Self::ManagePhases,
        Self::ManageUsers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewCase => "VIEW_CASE",
            Self::CreateCase => "CREATE_CASE",
            Self::EditCase => "EDIT_CASE",
            Self::CloseCase => "CLOSE_CASE",
            Self::SendMessages => "SEND_MESSAGES",
            Self::UploadDocuments => "UPLOAD_DOCUMENTS",
            Self::DownloadDocuments => "DOWNLOAD_DOCUMENTS",
            Self::ManageAssignments => "MANAGE_ASSIGNMENTS",
            Self::ViewReports => "VIEW_REPORTS",
            Self::ViewAuditLogs => "VIEW_AUDIT_LOGS",
            Self::ManagePhases => "MANAGE_PHASES",
            Self::ManageUsers => "MANAGE_USERS",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of privileged action written to the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    Logout,
    CaseCreated,
    CaseUpdated,
    CaseClosed,
    ChatMessageSent,
    DocumentUploaded,
    DocumentDownloaded,
    InvoiceGenerated,
    RoleChanged,
    PermissionUpdated,
    PhaseTransition,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::CaseCreated => "CASE_CREATED",
            Self::CaseUpdated => "CASE_UPDATED",
            Self::CaseClosed => "CASE_CLOSED",
            Self::ChatMessageSent => "CHAT_MESSAGE_SENT",
            Self::DocumentUploaded => "DOCUMENT_UPLOADED",
            Self::DocumentDownloaded => "DOCUMENT_DOWNLOADED",
            Self::InvoiceGenerated => "INVOICE_GENERATED",
            Self::RoleChanged => "ROLE_CHANGED",
            Self::PermissionUpdated => "PERMISSION_UPDATED",
            Self::PhaseTransition => "PHASE_TRANSITION",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "LOGIN" => Some(Self::Login),
            "LOGOUT" => Some(Self::Logout),
            "CASE_CREATED" => Some(Self::CaseCreated),
            "CASE_UPDATED" => Some(Self::CaseUpdated),
            "CASE_CLOSED" => Some(Self::CaseClosed),
            "CHAT_MESSAGE_SENT" => Some(Self::ChatMessageSent),
            "DOCUMENT_UPLOADED" => Some(Self::DocumentUploaded),
            "DOCUMENT_DOWNLOADED" => Some(Self::DocumentDownloaded),
            "INVOICE_GENERATED" => Some(Self::InvoiceGenerated),
            "ROLE_CHANGED" => Some(Self::RoleChanged),
            "PERMISSION_UPDATED" => Some(Self::PermissionUpdated),
            "PHASE_TRANSITION" => Some(Self::PhaseTransition),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn practice_area_codes_compress_compound_names() {
        assert_eq!(PracticeArea::RealEstate.code(), "REALESTATE");
        assert_eq!(PracticeArea::PersonalInjury.code(), "INJURY");
        assert_eq!(PracticeArea::Family.code(), "FAMILY");
        for area in PracticeArea::ALL {
            assert!(area.code().chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn practice_area_parse_rejects_codes_and_lowercase() {
        assert_eq!(
            "REAL_ESTATE".parse::<PracticeArea>().ok(),
            Some(PracticeArea::RealEstate)
        );
        let err = "REALESTATE".parse::<PracticeArea>().unwrap_err();
        assert_eq!(err.kind(), "invalid_practice_area");
        assert!("family".parse::<PracticeArea>().is_err());
    }

    #[test]
    fn serde_names_match_db_values() {
        let json = serde_json::to_string(&Role::SeniorLawyer).unwrap();
        assert_eq!(json, "\"SENIOR_LAWYER\"");
        let json = serde_json::to_string(&AuditAction::PhaseTransition).unwrap();
        assert_eq!(json, "\"PHASE_TRANSITION\"");
        let status: CaseStatus = serde_json::from_str("\"ON_HOLD\"").unwrap();
        assert_eq!(status, CaseStatus::OnHold);
    }

    #[test]
    fn audit_actions_round_trip_through_db_values() {
        for action in [
            AuditAction::Login,
            AuditAction::CaseClosed,
            AuditAction::DocumentDownloaded,
            AuditAction::PhaseTransition,
        ] {
            assert_eq!(AuditAction::from_db_value(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::from_db_value("DELETED"), None);
    }
}
