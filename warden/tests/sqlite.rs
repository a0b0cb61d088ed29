#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use warden::{
        AttemptRepository, BlockEntry, BlockStatus, Principal, SqliteAttemptRepository, Warden,
    };

    async fn setup_repository() -> Arc<SqliteAttemptRepository> {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        let repository = SqliteAttemptRepository::new(pool);
        repository.migrate().await.unwrap();
        Arc::new(repository)
    }

    #[tokio::test]
    async fn test_lockout_flow_over_sqlite() {
        let repository = setup_repository().await;
        let warden = Warden::new(repository);
        let principal = Principal::new("alice@example.com").unwrap();
        let address = "203.0.113.7";

        for _ in 0..4 {
            let status = warden.record_attempt(Some(&principal), address, false).await;
            assert!(!status.is_blocked());
        }

        let status = warden.record_attempt(Some(&principal), address, false).await;
        assert!(status.is_blocked());
        assert_eq!(status.remaining_minutes(), Some(15));

        assert!(warden.is_blocked(address).await);
        assert!(!warden.is_blocked("203.0.113.8").await);
    }

    #[tokio::test]
    async fn test_escalation_over_sqlite() {
        let repository = setup_repository().await;
        let warden = Warden::new(repository.clone());
        let principal = Principal::new("alice@example.com").unwrap();
        let address = "203.0.113.7";

        for _ in 0..5 {
            warden.record_attempt(Some(&principal), address, false).await;
        }
        assert!(warden.is_blocked(address).await);

        // Lapse the stored block; one more violation escalates.
        repository
            .put_block(&BlockEntry {
                address: address.to_string(),
                created_at: Utc::now() - Duration::minutes(16),
                expires_at: Utc::now() - Duration::minutes(1),
                failed_attempts: 5,
                prior_blocks: 0,
            })
            .await
            .unwrap();

        let status = warden.record_attempt(Some(&principal), address, false).await;
        assert!(status.is_blocked());
        assert_eq!(status.remaining_minutes(), Some(30));
    }

    #[tokio::test]
    async fn test_unblock_over_sqlite() {
        let repository = setup_repository().await;
        let warden = Warden::new(repository.clone());
        let address = "203.0.113.7";

        for _ in 0..5 {
            warden.record_attempt(None, address, false).await;
        }
        assert!(warden.is_blocked(address).await);

        assert!(warden.unblock(address).await);
        assert_eq!(warden.block_status(address).await, BlockStatus::Clear);
        assert_eq!(repository.offense_count(address).await.unwrap(), 0);
    }
}
