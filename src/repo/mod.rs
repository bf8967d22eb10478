use std::future::Future;

use tracing::warn;

use crate::error::{AppError, AppResult};

pub mod customer;
pub mod dashboard;
pub mod employee;
pub mod equipment;
pub mod invoice;
pub mod leave;
pub mod payroll;
pub mod rental;
pub mod timesheet;
pub mod user;

const NUMBERING_ATTEMPTS: usize = 3;

/// Runs a transaction that allocates a document number, again if a
/// concurrent one took the same number or deadlocked on the gap lock.
pub(crate) async fn with_numbering_retry<T, F, Fut>(
    document: &'static str,
    mut run: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match run().await {
            Err(e) if e.is_write_race() => {
                if attempt >= NUMBERING_ATTEMPTS {
                    warn!(document, attempt, error = %e, "Giving up on document number");
                    return Err(AppError::conflict(format!(
                        "Could not allocate a {document} number, please retry"
                    )));
                }
                warn!(document, attempt, error = %e, "Document number race, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[actix_web::test]
    async fn other_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: AppResult<()> = with_numbering_retry("rental", || {
            calls.set(calls.get() + 1);
            async { Err(AppError::conflict("Rental not found")) }
        })
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls.get(), 1);

        let value = with_numbering_retry("invoice", || async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }
}
