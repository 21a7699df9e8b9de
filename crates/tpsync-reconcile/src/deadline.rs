use std::time::Duration;

use tpsync_core::{ApiError, ApiFuture, ApiResult};

/// Await a control plane call, failing with [`ApiError::Timeout`] once
/// `after` has elapsed.
pub(crate) async fn with_deadline<T>(
    operation: &'static str,
    after: Duration,
    call: ApiFuture<'_, T>,
) -> ApiResult<T> {
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout { operation, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out() {
        let call: ApiFuture<'_, ()> = Box::pin(std::future::pending());
        let err = with_deadline("get_target_pool", Duration::from_secs(5), call)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Timeout {
                operation: "get_target_pool",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn completed_call_passes_through() {
        let call: ApiFuture<'_, u32> = Box::pin(async { Ok(7) });
        assert_eq!(
            with_deadline("list_node_pools", Duration::from_secs(5), call)
                .await
                .unwrap(),
            7
        );
    }
}
