//! Destructive maintenance statements.
//!
//! Truncating `events_statements_summary_global_by_event_name` resets the
//! averages the latency collector reads. It is never part of a scrape; a
//! caller needs a [`TruncateAuthorization`], which only an explicit operator
//! setting can produce.

use tracing::info;

use crate::context::ScrapeContext;
use crate::error::ScrapeError;
use crate::source::{MaintenanceSql, QueryExecutor};

pub const TRUNCATE_STATEMENT_SUMMARY: MaintenanceSql = MaintenanceSql::new(
    "TRUNCATE TABLE performance_schema.events_statements_summary_global_by_event_name",
);

/// Proof that an operator opted into resetting statement summaries.
#[derive(Debug, Clone, Copy)]
pub struct TruncateAuthorization {
    _private: (),
}

impl TruncateAuthorization {
    /// `Some` only when the operator flag is set.
    pub fn from_operator_flag(enabled: bool) -> Option<Self> {
        enabled.then_some(Self { _private: () })
    }
}

/// Reset the global statement summary table.
pub async fn truncate_statement_summary(
    ctx: &ScrapeContext,
    db: &dyn QueryExecutor,
    _auth: &TruncateAuthorization,
) -> Result<u64, ScrapeError> {
    let affected = ctx.run(db.execute(&TRUNCATE_STATEMENT_SUMMARY)).await??;
    info!("statement summary truncated");
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CancelReason, QueryError};
    use crate::testing::FakeExecutor;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn authorization_needs_the_flag() {
        assert!(TruncateAuthorization::from_operator_flag(false).is_none());
        assert!(TruncateAuthorization::from_operator_flag(true).is_some());
    }

    #[tokio::test]
    async fn truncate_issues_one_statement() {
        let db = FakeExecutor::new();
        let auth = TruncateAuthorization::from_operator_flag(true).unwrap();
        let ctx = ScrapeContext::new(CancellationToken::new());

        truncate_statement_summary(&ctx, &db, &auth).await.unwrap();

        assert_eq!(db.executed(), vec![TRUNCATE_STATEMENT_SUMMARY.as_str().to_string()]);
        assert!(db.queries().is_empty());
    }

    #[tokio::test]
    async fn truncate_failure_is_a_query_error() {
        let db = FakeExecutor::new().with_execute_error("access denied");
        let auth = TruncateAuthorization::from_operator_flag(true).unwrap();
        let ctx = ScrapeContext::new(CancellationToken::new());

        let err = truncate_statement_summary(&ctx, &db, &auth).await.unwrap_err();
        assert_eq!(err, ScrapeError::Query(QueryError::new("access denied")));
    }

    #[tokio::test]
    async fn cancelled_context_skips_truncate() {
        let db = FakeExecutor::new();
        let auth = TruncateAuthorization::from_operator_flag(true).unwrap();
        let ctx = ScrapeContext::new(CancellationToken::new());
        ctx.cancel();

        let err = truncate_statement_summary(&ctx, &db, &auth).await.unwrap_err();
        assert_eq!(err, ScrapeError::Cancelled(CancelReason::Cancelled));
        assert!(db.executed().is_empty());
    }
}
