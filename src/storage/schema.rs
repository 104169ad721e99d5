//! Database schema constants.
//!
//! This module contains the SQL schema definitions for the PostgreSQL
//! order store.

/// SQL schema for creating the orders table.
pub const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    number VARCHAR(64) NOT NULL UNIQUE,
    status VARCHAR(16) NOT NULL DEFAULT 'NEW'
        CHECK (status IN ('NEW', 'PROCESSING', 'INVALID', 'PROCESSED')),
    accrual NUMERIC(18, 2) NOT NULL DEFAULT 0,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the balances table.
pub const CREATE_BALANCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS balances (
    user_id BIGINT PRIMARY KEY,
    current NUMERIC(18, 2) NOT NULL DEFAULT 0,
    withdrawn NUMERIC(18, 2) NOT NULL DEFAULT 0
)
"#;

/// Index for the scheduler's pending-order scan.
pub const CREATE_ORDERS_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)";

/// Index for per-user order listings.
pub const CREATE_ORDERS_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders(user_id, uploaded_at DESC)";

/// A named schema step, applied at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Every schema step in the order it must be applied.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_orders",
        sql: CREATE_ORDERS_TABLE,
    },
    Migration {
        name: "0002_create_balances",
        sql: CREATE_BALANCES_TABLE,
    },
    Migration {
        name: "0003_orders_status_index",
        sql: CREATE_ORDERS_STATUS_INDEX,
    },
    Migration {
        name: "0004_orders_user_index",
        sql: CREATE_ORDERS_USER_INDEX,
    },
];

/// Returns all schema creation statements in dependency order.
pub fn all_schema_statements() -> Vec<&'static str> {
    MIGRATIONS.iter().map(|m| m.sql).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_statements_are_idempotent() {
        let statements = all_schema_statements();
        assert_eq!(statements.len(), 4);
        assert!(statements.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_tables_created_before_indexes() {
        let statements = all_schema_statements();
        assert!(statements[0].contains("TABLE IF NOT EXISTS orders"));
        assert!(statements[2].contains("ON orders(status)"));
    }

    #[test]
    fn test_migration_names_sorted_and_unique() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }
}
