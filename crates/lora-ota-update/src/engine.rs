//! Message router and session driver.
//!
//! [`OtaAgent`] owns the device's single [`UpdateSession`] and runs every
//! inbound message to completion before returning. The watchdog poll task
//! never touches the session; its expiry is delivered back to the owner,
//! which calls [`OtaAgent::on_watchdog_expired`].

use std::sync::Arc;
use std::time::Duration;

use lora_ota_protocol::{Message, MessageType, MulticastCredentials, MulticastKeyFields};
use lora_ota_versioning::FirmwareVersion;
use lora_ota_watchdog::WatchdogMonitor;

use crate::config::AgentConfig;
use crate::error::{OtaError, OtaResult};
use crate::session::{SessionState, UpdateSession};
use crate::transaction::{FileTransactionManager, RevertReport};
use crate::transport::{DeviceClock, Reboot, RebootReason, Transport};

/// What handling one frame led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Malformed, out of state or otherwise ignored; session untouched
    Dropped,
    /// Accepted and processed
    Processed,
    /// Negotiation abandoned, back to idle without reboot
    Aborted,
    /// Update committed, reboot requested
    Committed,
    /// Update reverted, reboot requested
    Reverted,
}

/// OTA update engine for one device.
pub struct OtaAgent<T, R, C> {
    config: AgentConfig,
    device_version: FirmwareVersion,
    session: UpdateSession,
    files: FileTransactionManager,
    watchdog: Arc<WatchdogMonitor>,
    transport: T,
    reboot: R,
    clock: C,
}

impl<T, R, C> OtaAgent<T, R, C>
where
    T: Transport,
    R: Reboot,
    C: DeviceClock,
{
    /// Create an agent for a device running `device_version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: AgentConfig,
        device_version: FirmwareVersion,
        transport: T,
        reboot: R,
        clock: C,
    ) -> OtaResult<Self> {
        config.validate()?;
        let watchdog = Arc::new(WatchdogMonitor::new(config.watchdog_config()?)?);
        Ok(Self {
            files: FileTransactionManager::new(&config.device_root),
            config,
            device_version,
            session: UpdateSession::new(),
            watchdog,
            transport,
            reboot,
            clock,
        })
    }

    /// Revert anything an interrupted session left behind. Run once at
    /// boot, before any message is handled.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep could not complete.
    pub fn recover(&mut self) -> OtaResult<RevertReport> {
        let report = self.files.revert()?;
        if report.is_empty() {
            tracing::debug!("boot sweep found no pending changes");
        } else {
            tracing::warn!(
                restored = report.restored,
                removed = report.removed,
                discarded = report.discarded,
                "recovered from interrupted update"
            );
        }
        Ok(report)
    }

    /// Announce the running version to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be sent.
    pub fn announce(&mut self) -> OtaResult<()> {
        tracing::info!(version = %self.device_version, "announcing device version");
        self.send(&Message::DeviceVersion {
            version: self.device_version.as_str().to_string(),
        })
    }

    /// Decode and handle one raw frame.
    pub fn handle_frame(&mut self, raw: &[u8]) -> HandleOutcome {
        match Message::decode(raw) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                tracing::warn!(error = %e, len = raw.len(), "dropping malformed frame");
                HandleOutcome::Dropped
            }
        }
    }

    /// Handle one decoded message.
    pub fn handle_message(&mut self, message: Message) -> HandleOutcome {
        let kind = message.kind();
        let state = self.session.state;
        tracing::debug!(message = %message.summary(), %state, "handling");

        let result = match message {
            Message::UpdateInfo { version, epoch } => self.on_update_info(&version, epoch),
            Message::MulticastKey(fields) => self.on_multicast_key(&fields),
            Message::Filename { name } => self.on_filename(name),
            Message::Patch { payload } => self.on_patch(&payload),
            Message::Checksum { digest } => self.on_checksum(&digest),
            Message::DeleteFile { name } => self.on_delete_file(&name),
            Message::Manifest { body } => self.on_manifest(&body),
            Message::DeviceVersion { .. } | Message::UpdateInfoReply { .. } | Message::Listening => {
                Err(OtaError::UnexpectedMessage {
                    message: kind,
                    state,
                })
            }
        };

        match result {
            Ok(HandleOutcome::Processed) => {
                self.watchdog.touch();
                HandleOutcome::Processed
            }
            Ok(outcome) => outcome,
            Err(e) if e.is_session_fatal() => self.revert_and_reboot(&e),
            Err(e) => {
                tracing::warn!(message = %kind, %state, error = %e, "message dropped");
                HandleOutcome::Dropped
            }
        }
    }

    /// Revert a stalled session. Ignored when no session is in progress.
    pub fn on_watchdog_expired(&mut self, idle: Duration) -> HandleOutcome {
        if !self.session.in_progress() {
            tracing::debug!("watchdog expiry after session ended, ignored");
            return HandleOutcome::Dropped;
        }
        self.revert_and_reboot(&OtaError::InactivityTimeout { idle })
    }

    /// Whether an update is in progress.
    #[must_use]
    pub fn update_in_progress(&self) -> bool {
        self.session.in_progress()
    }

    /// The update session.
    #[must_use]
    pub fn session(&self) -> &UpdateSession {
        &self.session
    }

    /// Version the device is running.
    #[must_use]
    pub fn device_version(&self) -> &FirmwareVersion {
        &self.device_version
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// File transaction manager for the device root.
    #[must_use]
    pub fn files(&self) -> &FileTransactionManager {
        &self.files
    }

    /// Watchdog guarding this agent's sessions. The host spawns its poll
    /// task and routes expiries to [`on_watchdog_expired`](Self::on_watchdog_expired).
    #[must_use]
    pub fn watchdog(&self) -> &Arc<WatchdogMonitor> {
        &self.watchdog
    }

    /// Transport collaborator.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reboot collaborator.
    #[must_use]
    pub fn reboot_handle(&self) -> &R {
        &self.reboot
    }

    /// Clock collaborator.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn on_update_info(&mut self, version: &str, epoch: Option<i64>) -> OtaResult<HandleOutcome> {
        self.expect_state(
            MessageType::UpdateInfo,
            &[SessionState::Idle, SessionState::Negotiating],
        )?;

        match FirmwareVersion::parse(version) {
            Ok(candidate) if candidate > self.device_version => {
                if self.session.state == SessionState::Idle {
                    tracing::info!(
                        current = %self.device_version,
                        candidate = %candidate,
                        "newer firmware offered, negotiating"
                    );
                }
                self.watchdog.arm();
                self.session.target_version = Some(candidate);
                self.session.state = SessionState::Negotiating;
            }
            Ok(candidate) => {
                tracing::info!(
                    current = %self.device_version,
                    candidate = %candidate,
                    "offered firmware is not newer"
                );
            }
            Err(e) => {
                tracing::warn!(candidate = %version, error = %e, "cannot order offered version, no update");
            }
        }

        self.sync_clock(epoch);

        let reply = Message::UpdateInfoReply {
            version: self.device_version.as_str().to_string(),
        };
        if let Err(e) = self.send(&reply) {
            tracing::error!(error = %e, "UPDATE_INFO_REPLY not sent");
        }
        Ok(HandleOutcome::Processed)
    }

    fn on_multicast_key(&mut self, fields: &MulticastKeyFields) -> OtaResult<HandleOutcome> {
        self.expect_state(MessageType::MulticastKey, &[SessionState::Negotiating])?;

        if fields.is_empty() {
            tracing::info!("no multicast session offered, update cancelled");
            self.finish_idle();
            return Ok(HandleOutcome::Aborted);
        }

        let credentials = match MulticastCredentials::parse(fields) {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(error = %e, "invalid multicast credentials, negotiation aborted");
                self.finish_idle();
                return Ok(HandleOutcome::Aborted);
            }
        };

        if let Err(e) = self.transport.switch_to_multicast(&credentials) {
            tracing::error!(error = %e, "could not join multicast group, negotiation aborted");
            self.finish_idle();
            return Ok(HandleOutcome::Aborted);
        }

        tracing::info!(
            address = %format!("{:08x}", credentials.address),
            "listening on multicast group"
        );
        self.session.multicast = Some(credentials);
        self.session.manifest.reset();
        self.session.state = SessionState::Receiving;

        if let Err(e) = self.send(&Message::Listening) {
            tracing::error!(error = %e, "LISTENING not sent");
        }
        Ok(HandleOutcome::Processed)
    }

    fn on_filename(&mut self, name: String) -> OtaResult<HandleOutcome> {
        self.expect_state(MessageType::Filename, &[SessionState::Receiving])?;

        let exists = self.files.exists(&name)?;
        if let Some(abandoned) = self.session.assembler.begin(name.as_str()) {
            tracing::warn!(file = %abandoned, "file never received its checksum, session marked failed");
            self.session.checksum_failed = true;
        }

        if exists {
            self.session.manifest.record_updated();
            tracing::info!(file = %name, "receiving patch for existing file");
        } else {
            self.session.manifest.record_new();
            tracing::info!(file = %name, "receiving new file");
        }

        self.watchdog.arm();
        Ok(HandleOutcome::Processed)
    }

    fn on_patch(&mut self, payload: &[u8]) -> OtaResult<HandleOutcome> {
        self.expect_state(MessageType::Patch, &[SessionState::Receiving])?;

        if !self.session.assembler.append(payload) {
            tracing::warn!(bytes = payload.len(), "PATCH without FILENAME dropped");
            return Ok(HandleOutcome::Dropped);
        }

        tracing::trace!(
            file = self.session.assembler.pending_file().unwrap_or_default(),
            fragment = self.session.assembler.fragment_count(),
            buffered = self.session.assembler.buffered_len(),
            "patch fragment"
        );
        Ok(HandleOutcome::Processed)
    }

    fn on_checksum(&mut self, digest: &str) -> OtaResult<HandleOutcome> {
        self.expect_state(MessageType::Checksum, &[SessionState::Receiving])?;

        match self.session.assembler.finish(digest) {
            None => {
                tracing::warn!(checksum = %digest, "CHECKSUM without FILENAME dropped");
                Ok(HandleOutcome::Dropped)
            }
            Some(Ok(patch)) => {
                tracing::info!(file = %patch.file, "patch verified");
                self.session.verified_patches.insert(patch.file, patch.text);
                Ok(HandleOutcome::Processed)
            }
            Some(Err(e)) => {
                match &e {
                    OtaError::ChecksumMismatch {
                        file,
                        expected,
                        actual,
                    } => tracing::warn!(
                        file = %file,
                        expected = %expected,
                        actual = %actual,
                        "checksum mismatch, session marked failed"
                    ),
                    other => tracing::warn!(error = %other, "patch unusable, session marked failed"),
                }
                self.session.checksum_failed = true;
                Ok(HandleOutcome::Processed)
            }
        }
    }

    fn on_delete_file(&mut self, name: &str) -> OtaResult<HandleOutcome> {
        self.expect_state(MessageType::DeleteFile, &[SessionState::Receiving])?;

        if self.files.exists(name)? {
            self.files.backup(name)?;
            self.session.manifest.record_deleted();
            tracing::info!(file = %name, "file scheduled for deletion");
        } else {
            tracing::info!(file = %name, "file to delete does not exist");
        }
        Ok(HandleOutcome::Processed)
    }

    fn on_manifest(&mut self, body: &str) -> OtaResult<HandleOutcome> {
        self.expect_state(MessageType::Manifest, &[SessionState::Receiving])?;
        self.session.state = SessionState::Reconciling;

        if let Some(file) = self.session.assembler.pending_file() {
            tracing::warn!(file = %file, "file never received its checksum, session marked failed");
            self.session.checksum_failed = true;
        }

        let declared = self.session.manifest.reconcile(body)?;
        tracing::info!(manifest = %declared, "manifest reconciled");

        if self.session.checksum_failed {
            return Err(OtaError::EarlierChecksumFailure);
        }

        let applied = self.files.apply_all(&self.session.verified_patches)?;
        self.files.commit()?;

        let version = self
            .session
            .target_version
            .as_ref()
            .map(|v| v.as_str().to_string())
            .unwrap_or_default();
        tracing::info!(version = %version, files = applied, "update committed, rebooting");

        self.finish_idle();
        self.reboot.reboot(RebootReason::Committed { version });
        Ok(HandleOutcome::Committed)
    }

    fn revert_and_reboot(&mut self, cause: &OtaError) -> HandleOutcome {
        tracing::error!(state = %self.session.state, error = %cause, "update failed, reverting");
        self.finish_idle();

        if let Err(e) = self.files.revert() {
            tracing::error!(error = %e, "revert incomplete, boot sweep will retry");
        }

        self.reboot.reboot(RebootReason::Reverted {
            cause: cause.to_string(),
        });
        HandleOutcome::Reverted
    }

    fn sync_clock(&mut self, epoch: Option<i64>) {
        if self.clock.now_epoch() >= self.config.clock_sync_threshold {
            return;
        }
        let Some(epoch) = epoch else {
            tracing::debug!("device clock unset and no server time offered");
            return;
        };
        match self.clock.set_epoch(epoch) {
            Ok(()) => tracing::info!(epoch, "device clock synchronized"),
            Err(e) => tracing::warn!(error = %e, "clock sync failed"),
        }
    }

    fn expect_state(&self, message: MessageType, accepted: &[SessionState]) -> OtaResult<()> {
        if accepted.contains(&self.session.state) {
            Ok(())
        } else {
            Err(OtaError::UnexpectedMessage {
                message,
                state: self.session.state,
            })
        }
    }

    fn finish_idle(&mut self) {
        self.session.reset();
        self.watchdog.disarm();
    }

    fn send(&mut self, message: &Message) -> OtaResult<()> {
        let frame = message.encode();
        self.transport.send(&frame)?;
        tracing::debug!(message = %message.kind(), bytes = frame.len(), "sent");
        Ok(())
    }
}
