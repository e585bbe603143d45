use crate::application::repos::DurableError;

/// Connection-level failures are `Unavailable`; anything the server
/// answered with is a `Query` failure.
pub fn map_sqlx_error(err: sqlx::Error) -> DurableError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DurableError::unavailable(err),
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            DurableError::query("statement timed out")
        }
        sqlx::Error::Database(db) => DurableError::query(db.message()),
        other => DurableError::query(other.to_string()),
    }
}
