//! Mock collaborators for driving an [`OtaAgent`](lora_ota_update::OtaAgent)
//! in tests.

use lora_ota_protocol::{Message, MulticastCredentials};
use lora_ota_update::{
    AgentConfig, DeviceClock, OtaAgent, OtaError, OtaResult, Reboot, RebootReason, Transport,
    TransportError,
};
use lora_ota_versioning::FirmwareVersion;

/// Agent wired to mocks.
pub type MockAgent = OtaAgent<MockTransport, MockReboot, MockClock>;

/// Records every frame sent and every multicast switch.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub sent: Vec<Vec<u8>>,
    pub multicast: Option<MulticastCredentials>,
    pub fail_send: bool,
    pub fail_multicast: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sent frames decoded back into messages.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent
            .iter()
            .map(|frame| Message::decode(frame).expect("agent sent a malformed frame"))
            .collect()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.sent_messages().pop()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.fail_send {
            return Err(TransportError::send("mock send failure"));
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn switch_to_multicast(
        &mut self,
        credentials: &MulticastCredentials,
    ) -> Result<(), TransportError> {
        if self.fail_multicast {
            return Err(TransportError::multicast("mock multicast failure"));
        }
        self.multicast = Some(credentials.clone());
        Ok(())
    }
}

/// Records reboot requests instead of rebooting.
#[derive(Debug, Default)]
pub struct MockReboot {
    pub reasons: Vec<RebootReason>,
}

impl MockReboot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.reasons.len()
    }

    pub fn reverted(&self) -> usize {
        self.reasons
            .iter()
            .filter(|r| matches!(r, RebootReason::Reverted { .. }))
            .count()
    }

    pub fn committed(&self) -> usize {
        self.reasons
            .iter()
            .filter(|r| matches!(r, RebootReason::Committed { .. }))
            .count()
    }
}

impl Reboot for MockReboot {
    fn reboot(&mut self, reason: RebootReason) {
        self.reasons.push(reason);
    }
}

/// Settable wall clock.
#[derive(Debug, Default)]
pub struct MockClock {
    pub now: i64,
    pub fail_set: bool,
    pub set_calls: Vec<i64>,
}

impl MockClock {
    pub fn at(now: i64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }
}

impl DeviceClock for MockClock {
    fn now_epoch(&self) -> i64 {
        self.now
    }

    fn set_epoch(&mut self, epoch: i64) -> OtaResult<()> {
        self.set_calls.push(epoch);
        if self.fail_set {
            return Err(OtaError::clock_sync("mock rtc failure"));
        }
        self.now = epoch;
        Ok(())
    }
}

/// Build an agent over `config` running `version`, with a clock that is
/// already set.
pub fn mock_agent(config: AgentConfig, version: &str) -> MockAgent {
    OtaAgent::new(
        config,
        FirmwareVersion::parse(version).expect("valid test version"),
        MockTransport::new(),
        MockReboot::new(),
        MockClock::at(1_700_000_000),
    )
    .expect("valid test agent")
}
