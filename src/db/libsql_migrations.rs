//! Schema for the libSQL backend.
//!
//! Every statement is idempotent so `run_migrations` can run on each start.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_uuid TEXT UNIQUE,
    secure_case_id TEXT UNIQUE,
    case_number TEXT,
    legacy_case_number TEXT,
    type TEXT,
    title TEXT NOT NULL DEFAULT '',
    description TEXT,
    practice_area TEXT,
    status TEXT NOT NULL DEFAULT 'OPEN',
    client_id INTEGER,
    assigned_lawyer_id INTEGER,
    sla_deadline TEXT,
    last_activity_at TEXT,
    created_by INTEGER,
    updated_by INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cases_practice_area_status ON cases(practice_area, status);
CREATE INDEX IF NOT EXISTS idx_cases_assigned_lawyer ON cases(assigned_lawyer_id);
CREATE INDEX IF NOT EXISTS idx_cases_client ON cases(client_id);
CREATE INDEX IF NOT EXISTS idx_cases_sla_deadline ON cases(sla_deadline);

CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_uuid TEXT REFERENCES cases(case_uuid) ON DELETE CASCADE,
    case_id TEXT,
    sender_id INTEGER NOT NULL,
    sender_role TEXT NOT NULL,
    content TEXT NOT NULL,
    is_internal_note INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_case ON chat_messages(case_uuid, created_at);
CREATE INDEX IF NOT EXISTS idx_chat_messages_created ON chat_messages(created_at);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_uuid TEXT REFERENCES cases(case_uuid) ON DELETE CASCADE,
    case_id TEXT,
    uploaded_by INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    document_hash TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_case ON documents(case_uuid, created_at);
CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_at);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id INTEGER NOT NULL,
    actor_role TEXT NOT NULL,
    case_uuid TEXT,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    timestamp TEXT NOT NULL,
    checksum TEXT NOT NULL,
    ip_address TEXT,
    user_agent TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs(actor_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_logs_case ON audit_logs(case_uuid, timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_logs_action ON audit_logs(action, timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs(timestamp);

CREATE TABLE IF NOT EXISTS system_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
