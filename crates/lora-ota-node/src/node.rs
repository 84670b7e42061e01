//! Boot loop: runs the update engine over the radio and re-boots it in
//! process whenever the engine asks for a reboot.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lora_ota_update::{
    FileTransactionManager, HandleOutcome, OtaAgent, OtaError, Reboot, RebootReason, RevertReport,
    Transport,
};
use lora_ota_versioning::FirmwareVersion;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::clock::OffsetClock;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::radio::{Radio, RadioLink};

/// Agent as wired by the node.
pub type NodeAgent = OtaAgent<RadioLink, RebootLatch, OffsetClock>;

/// Records the engine's reboot request for the boot loop to act on.
#[derive(Debug, Clone, Default)]
pub struct RebootLatch {
    requested: Arc<Mutex<Option<RebootReason>>>,
}

impl RebootLatch {
    /// Take the pending request, if any.
    pub fn take(&self) -> Option<RebootReason> {
        self.requested.lock().take()
    }
}

impl Reboot for RebootLatch {
    fn reboot(&mut self, reason: RebootReason) {
        *self.requested.lock() = Some(reason);
    }
}

/// How a boot ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootExit {
    /// The engine requested a reboot.
    Reboot(RebootReason),
    /// The radio closed or shutdown was requested.
    Shutdown,
}

/// Read the running version from the version file, trimmed of whitespace.
///
/// # Errors
///
/// Returns [`NodeError::VersionFile`] if the file cannot be read or does not
/// hold a valid version.
pub fn read_device_version(path: &Path) -> Result<FirmwareVersion, NodeError> {
    let version_file = |reason: String| NodeError::VersionFile {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| version_file(e.to_string()))?;
    FirmwareVersion::parse(text.trim()).map_err(|e| version_file(e.to_string()))
}

/// Revert whatever an update left pending below the device root.
///
/// # Errors
///
/// Returns an error if the sweep could not complete.
pub fn revert_pending(device_root: &Path) -> Result<RevertReport, NodeError> {
    Ok(FileTransactionManager::new(device_root).revert()?)
}

/// Runs boots until shutdown or the configured boot limit.
pub struct Node {
    config: NodeConfig,
    radio: Radio,
    clock: OffsetClock,
    boots: u32,
}

impl Node {
    #[must_use]
    pub fn new(config: NodeConfig, radio: Radio) -> Self {
        let clock = if config.clock_starts_unset {
            OffsetClock::unset()
        } else {
            OffsetClock::new()
        };
        Self {
            config,
            radio,
            clock,
            boots: 0,
        }
    }

    /// Number of boots so far.
    #[must_use]
    pub fn boots(&self) -> u32 {
        self.boots
    }

    /// Boot repeatedly until `shutdown` resolves, the radio closes or the
    /// boot limit is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if a boot cannot start: unreadable version file,
    /// invalid configuration or a failed crash-recovery sweep.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            if self
                .config
                .max_boots
                .is_some_and(|limit| self.boots >= limit)
            {
                tracing::info!(boots = self.boots, "boot limit reached");
                return Ok(());
            }
            self.boots = self.boots.saturating_add(1);

            match self.boot(&mut shutdown).await? {
                BootExit::Reboot(reason) => {
                    tracing::info!(boot = self.boots, %reason, "rebooting");
                }
                BootExit::Shutdown => {
                    tracing::info!("node stopped");
                    return Ok(());
                }
            }
        }
    }

    async fn boot<F>(&mut self, shutdown: &mut std::pin::Pin<&mut F>) -> Result<BootExit>
    where
        F: Future<Output = ()>,
    {
        let version_path = self.config.version_path();
        let version = read_device_version(&version_path)?;
        tracing::info!(boot = self.boots, version = %version, "starting");

        let latch = RebootLatch::default();
        let mut agent = OtaAgent::new(
            self.config.agent.clone(),
            version,
            self.radio.link.clone(),
            latch.clone(),
            self.clock.clone(),
        )
        .context("creating update agent")?;
        match agent.recover() {
            Ok(_) => {}
            Err(OtaError::RevertIncomplete { report, source }) => {
                tracing::error!(
                    failed = report.failed.len(),
                    error = %source,
                    "crash-recovery sweep incomplete, booting with artifacts left in place"
                );
            }
            Err(e) => return Err(e).context("crash-recovery sweep"),
        }
        if let Err(e) = agent.announce() {
            tracing::warn!(error = %e, "version announcement not sent");
        }

        let (expiry_tx, mut expiries) = mpsc::unbounded_channel();
        let watchdog = agent.watchdog().spawn(Box::new(move |idle| {
            if expiry_tx.send(idle).is_err() {
                tracing::debug!("boot ended before watchdog expiry was delivered");
            }
        }));

        let mut uplink = app_uplink_interval(self.config.app.uplink_interval_secs);
        let mut uplinks_sent = 0_u64;

        let exit = loop {
            tokio::select! {
                frame = self.radio.frames.recv() => {
                    let Some(frame) = frame else {
                        tracing::warn!("radio closed");
                        break BootExit::Shutdown;
                    };
                    let outcome = agent.handle_frame(&frame);
                    tracing::debug!(?outcome, "frame handled");
                }
                Some(idle) = expiries.recv() => {
                    let outcome = agent.on_watchdog_expired(idle);
                    if outcome == HandleOutcome::Dropped {
                        tracing::debug!("late watchdog expiry ignored");
                    }
                }
                _ = tick(&mut uplink) => {
                    uplinks_sent = self.app_uplink(&agent, uplinks_sent);
                }
                () = shutdown.as_mut() => break BootExit::Shutdown,
            }

            if let Some(reason) = latch.take() {
                break BootExit::Reboot(reason);
            }
        };

        watchdog.abort();
        Ok(exit)
    }

    fn app_uplink(&self, agent: &NodeAgent, sent: u64) -> u64 {
        let received = self.radio.inbox.drain();
        if !received.is_empty() {
            tracing::debug!(frames = received.len(), "application frames received");
        }

        if agent.update_in_progress() {
            tracing::trace!("update in progress, application uplink suppressed");
            return sent;
        }

        let payload = format!("uplink,{},{}", self.boots, sent);
        let mut link = self.radio.link.clone();
        match link.send(payload.as_bytes()) {
            Ok(()) => sent.saturating_add(1),
            Err(e) => {
                tracing::warn!(error = %e, "application uplink failed");
                sent
            }
        }
    }
}

fn app_uplink_interval(secs: u64) -> Option<tokio::time::Interval> {
    (secs > 0).then(|| {
        let period = Duration::from_secs(secs);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    })
}

async fn tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
