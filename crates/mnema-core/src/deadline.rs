//! Deadlines for capability calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut`, turning an elapsed deadline into [`Error::Timeout`].
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, Error>(1)
        };
        let err = with_deadline(Duration::from_secs(2), slow).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(2)));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        assert_eq!(
            with_deadline(Duration::from_secs(1), async { Ok::<_, Error>(7) })
                .await
                .unwrap(),
            7
        );
        let err = with_deadline(Duration::from_secs(1), async {
            Err::<(), _>(Error::Embedding("down".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
