//! Tests for the rate refresh state machine.
//!
//! Time is paused so backoff waits and refresh intervals elapse instantly.

use chrono::Utc;
use pricescan::rates::{
    AcquisitionSettings, AcquisitionState, JsonFileRateStore, MemoryRateStore, RateAcquisition,
    RateStore, RefreshOutcome, RetryPolicy,
};
use pricescan::{CurrencyCode, FormatOptions, RateSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{self, Instant};

mod common;
use common::*;

fn settings(retry: RetryPolicy) -> AcquisitionSettings {
    AcquisitionSettings {
        refresh_interval: Duration::from_secs(60),
        retry,
    }
}

fn acquisition(
    fiat: Arc<FakeRateSource>,
    crypto: Arc<FakeRateSource>,
    store: Arc<dyn RateStore>,
    retry: RetryPolicy,
) -> RateAcquisition {
    RateAcquisition::new(fiat, crypto, store, settings(retry))
}

fn healthy_sources() -> (Arc<FakeRateSource>, Arc<FakeRateSource>) {
    (
        Arc::new(FakeRateSource::ok("fiat", fiat_rates())),
        Arc::new(FakeRateSource::ok("crypto", crypto_rates())),
    )
}

mod refresh_cycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_success_publishes_and_persists() {
        let (fiat, crypto) = healthy_sources();
        let store = Arc::new(MemoryRateStore::new());
        let acquisition = acquisition(fiat, crypto, store.clone(), RetryPolicy::default());
        let receiver = acquisition.subscribe();
        assert!(acquisition.current().is_none());

        let outcome = acquisition.refresh().await.unwrap();
        let snapshot = match outcome {
            RefreshOutcome::Updated(snapshot) => snapshot,
            RefreshOutcome::AlreadyRunning => panic!("refresh did not run"),
        };

        assert_eq!(snapshot.rates.rate(CurrencyCode::Eur), Some(0.9));
        assert_eq!(snapshot.rates.rate(CurrencyCode::Btc), Some(0.00001));
        assert!(receiver.has_changed().unwrap());
        assert_eq!(acquisition.current().as_deref(), Some(snapshot.as_ref()));
        assert_eq!(store.load().unwrap().as_ref(), Some(snapshot.as_ref()));

        let status = acquisition.status();
        assert_eq!(status.state, AcquisitionState::Idle);
        assert_eq!(status.fetched_at, Some(snapshot.fetched_at));
        assert!(status.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_over_current_snapshot() {
        let (fiat, crypto) = healthy_sources();
        let acquisition = acquisition(
            fiat,
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::default(),
        );
        assert!(acquisition.engine(FormatOptions::default()).is_none());

        acquisition.refresh().await.unwrap();
        let engine = acquisition.engine(FormatOptions::default()).unwrap();
        assert_close(
            engine.convert(100.0, CurrencyCode::Usd, CurrencyCode::Gbp).unwrap(),
            80.0,
            1e-9,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let fiat = Arc::new(FakeRateSource::ok("fiat", fiat_rates()).failing_first(2));
        let crypto = Arc::new(FakeRateSource::ok("crypto", crypto_rates()));
        let acquisition = acquisition(
            fiat.clone(),
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::default(),
        );

        let started = Instant::now();
        let outcome = acquisition.refresh().await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Updated(_)));
        assert_eq!(fiat.calls(), 3);
        // 1s then 2s of backoff
        assert!(started.elapsed() >= Duration::from_secs(3));

        let status = acquisition.status();
        assert_eq!(status.state, AcquisitionState::Idle);
        assert_eq!(status.retry_attempt, 0);
        assert!(!status.given_up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_give_up_keeps_previous_snapshot() {
        let fiat = Arc::new(FakeRateSource::failing("fiat"));
        let crypto = Arc::new(FakeRateSource::ok("crypto", crypto_rates()));
        let store = Arc::new(MemoryRateStore::with_snapshot(sample_snapshot()));
        let acquisition = acquisition(
            fiat.clone(),
            crypto,
            store,
            RetryPolicy::exponential(2, Duration::from_millis(10), Duration::from_secs(1)),
        );

        assert!(!acquisition.load_persisted());
        let err = acquisition.refresh().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(fiat.calls(), 3);

        let status = acquisition.status();
        assert_eq!(status.state, AcquisitionState::GivenUp);
        assert!(status.given_up);
        assert_eq!(status.retry_attempt, 3);
        assert!(status
            .last_error
            .as_deref()
            .unwrap_or_default()
            .contains("connection refused"));

        let current = acquisition.current().unwrap();
        assert_eq!(current.as_ref(), &sample_snapshot());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_given_up() {
        let fiat = Arc::new(FakeRateSource::ok("fiat", fiat_rates()).failing_first(1));
        let (_, crypto) = healthy_sources();
        let acquisition = acquisition(
            fiat,
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::no_retry(),
        );

        assert!(acquisition.refresh().await.is_err());
        assert!(acquisition.status().given_up);

        acquisition.refresh().await.unwrap();
        let status = acquisition.status();
        assert!(!status.given_up);
        assert_eq!(status.state, AcquisitionState::Idle);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_refresh_is_rejected_while_running() {
        let fiat = Arc::new(FakeRateSource::ok("fiat", fiat_rates()).with_delay(Duration::from_secs(1)));
        let (_, crypto) = healthy_sources();
        let acquisition = Arc::new(acquisition(
            fiat.clone(),
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::default(),
        ));

        let running = tokio::spawn({
            let acquisition = Arc::clone(&acquisition);
            async move { acquisition.refresh().await }
        });
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(acquisition.status().state, AcquisitionState::Fetching);
        let second = acquisition.refresh().await.unwrap();
        assert!(matches!(second, RefreshOutcome::AlreadyRunning));

        let first = running.await.unwrap().unwrap();
        assert!(matches!(first, RefreshOutcome::Updated(_)));
        assert_eq!(fiat.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_cancels_backoff() {
        let fiat = Arc::new(FakeRateSource::ok("fiat", fiat_rates()).failing_first(1));
        let (_, crypto) = healthy_sources();
        let acquisition = Arc::new(acquisition(
            fiat.clone(),
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::exponential(3, Duration::from_secs(60), Duration::from_secs(60)),
        ));

        let started = Instant::now();
        let running = tokio::spawn({
            let acquisition = Arc::clone(&acquisition);
            async move { acquisition.refresh().await }
        });
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            acquisition.status().state,
            AcquisitionState::Retrying {
                attempt: 1,
                delay_ms: 60_000
            }
        );

        acquisition.force_refresh();
        let outcome = running.await.unwrap().unwrap();
        assert!(matches!(outcome, RefreshOutcome::Updated(_)));
        assert_eq!(fiat.calls(), 2);
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}

mod persistence {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_from_persisted_snapshot() {
        let (fiat, crypto) = healthy_sources();

        let fresh = RateSnapshot::new(sample_rates(), Utc::now());
        let warm = acquisition(
            fiat.clone(),
            crypto.clone(),
            Arc::new(MemoryRateStore::with_snapshot(fresh)),
            RetryPolicy::default(),
        );
        assert!(warm.load_persisted());
        assert!(warm.current().is_some());
        assert!(warm.status().fetched_at.is_some());

        let stale = acquisition(
            fiat.clone(),
            crypto.clone(),
            Arc::new(MemoryRateStore::with_snapshot(sample_snapshot())),
            RetryPolicy::default(),
        );
        assert!(!stale.load_persisted());
        assert!(stale.current().is_some());

        let empty = acquisition(
            fiat,
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::default(),
        );
        assert!(!empty.load_persisted());
        assert!(empty.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_json_file_store_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("rates.json");
        let (fiat, crypto) = healthy_sources();

        let first = acquisition(
            fiat.clone(),
            crypto.clone(),
            Arc::new(JsonFileRateStore::new(&path)),
            RetryPolicy::default(),
        );
        first.refresh().await.unwrap();
        assert!(path.exists());

        let second = acquisition(
            fiat,
            crypto,
            Arc::new(JsonFileRateStore::new(&path)),
            RetryPolicy::default(),
        );
        assert!(second.load_persisted());
        let (before, after) = (first.current().unwrap(), second.current().unwrap());
        assert_eq!(after.fetched_at, before.fetched_at);
        assert_eq!(after.rates.len(), before.rates.len());
        assert_close(
            after.rates.rate(CurrencyCode::Jpy).unwrap(),
            before.rates.rate(CurrencyCode::Jpy).unwrap(),
            1e-9,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_store_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.json");
        std::fs::write(&path, "not json").unwrap();
        let (fiat, crypto) = healthy_sources();

        let acquisition = acquisition(
            fiat,
            crypto,
            Arc::new(JsonFileRateStore::new(&path)),
            RetryPolicy::default(),
        );
        assert!(!acquisition.load_persisted());
        assert!(acquisition.current().is_none());

        acquisition.refresh().await.unwrap();
        assert!(JsonFileRateStore::new(&path).load().unwrap().is_some());
    }
}

mod background_loop {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_refreshes_on_schedule() {
        let (fiat, crypto) = healthy_sources();
        let handle = Arc::new(acquisition(
            fiat.clone(),
            crypto,
            Arc::new(MemoryRateStore::new()),
            RetryPolicy::default(),
        ))
        .spawn();
        let acquisition = Arc::clone(handle.acquisition());

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fiat.calls(), 1);
        assert!(acquisition.current().is_some());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fiat.calls(), 2);

        handle.force_refresh();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fiat.calls(), 3);

        handle.shutdown().await;
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fiat.calls(), 3);
        assert!(acquisition.current().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_persisted_rates_delay_first_fetch() {
        let (fiat, crypto) = healthy_sources();
        let store = Arc::new(MemoryRateStore::with_snapshot(RateSnapshot::new(
            sample_rates(),
            Utc::now(),
        )));
        let handle = Arc::new(acquisition(fiat.clone(), crypto, store, RetryPolicy::default()))
            .spawn();

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fiat.calls(), 0);
        assert!(handle.acquisition().current().is_some());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fiat.calls(), 1);

        handle.shutdown().await;
    }
}
