//! Background task tests for the inactivity watchdog, on paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use lora_ota_watchdog::prelude::*;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn spawn_monitor(
    timeout: Duration,
) -> Result<(Arc<WatchdogMonitor>, mpsc::UnboundedReceiver<Duration>), WatchdogError> {
    let config = WatchdogConfig::builder()
        .inactivity_timeout(timeout)
        .poll_interval(Duration::from_millis(200))
        .build()?;
    let monitor = Arc::new(WatchdogMonitor::new(config)?);
    let (tx, rx) = mpsc::unbounded_channel();
    monitor.spawn(Box::new(move |idle| {
        if tx.send(idle).is_err() {
            tracing::debug!("expiry receiver dropped");
        }
    }));
    Ok((monitor, rx))
}

async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
    tokio::task::yield_now().await;
}

mod expiry {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_exactly_once_after_timeout() -> TestResult {
        let (monitor, mut rx) = spawn_monitor(Duration::from_secs(60))?;
        monitor.arm();

        settle(Duration::from_secs(59)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        settle(Duration::from_secs(2)).await;
        let idle = rx.try_recv()?;
        assert!(idle >= Duration::from_secs(60));

        settle(Duration::from_secs(300)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(monitor.state().expiry_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_traffic_keeps_session_alive() -> TestResult {
        let (monitor, mut rx) = spawn_monitor(Duration::from_secs(10))?;
        monitor.arm();

        for _ in 0..20 {
            settle(Duration::from_secs(5)).await;
            monitor.touch();
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(monitor.is_armed());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_before_timeout_suppresses_expiry() -> TestResult {
        let (monitor, mut rx) = spawn_monitor(Duration::from_secs(10))?;
        monitor.arm();
        settle(Duration::from_secs(5)).await;
        monitor.disarm();

        settle(Duration::from_secs(60)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(monitor.status(), WatchdogStatus::Disarmed);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_expiry_fires_again() -> TestResult {
        let (monitor, mut rx) = spawn_monitor(Duration::from_secs(10))?;
        monitor.arm();
        settle(Duration::from_secs(11)).await;
        rx.try_recv()?;

        monitor.arm();
        settle(Duration::from_secs(11)).await;
        rx.try_recv()?;
        assert_eq!(monitor.state().expiry_count(), 2);
        Ok(())
    }
}
