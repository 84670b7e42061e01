//! Convenience re-exports.

pub use crate::must::{must, must_some};

#[cfg(feature = "mock")]
pub use crate::mock::{MockAgent, MockClock, MockReboot, MockTransport, mock_agent};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{DeviceRoot, ServerScript};
