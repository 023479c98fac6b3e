//! Integrity-constraint classification for store errors

use sqlx::Error as SqlxError;

/// Whether a failed statement broke a unique or foreign-key constraint
pub fn is_integrity_violation(error: &SqlxError) -> bool {
    if let SqlxError::Database(db_err) = error {
        return db_err.is_unique_violation() || db_err.is_foreign_key_violation();
    }
    false
}

/// Check if the error is a unique constraint violation
pub fn is_unique_violation(error: &SqlxError) -> bool {
    if let SqlxError::Database(db_err) = error {
        return db_err.is_unique_violation();
    }
    false
}
