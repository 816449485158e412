//! In-memory `Channel` double used by stage and orchestrator unit tests.

use std::collections::VecDeque;

use dpp_ports::{Channel, ChannelError};

pub struct ScriptedChannel {
    inbound: VecDeque<serde_json::Value>,
    pub sent: Vec<serde_json::Value>,
    delay_ms: u64,
}

impl ScriptedChannel {
    pub fn new(inbound: Vec<serde_json::Value>) -> Self {
        Self {
            inbound: inbound.into(),
            sent: Vec::new(),
            delay_ms: 0,
        }
    }

    pub fn with_delay(inbound: Vec<serde_json::Value>, delay_ms: u64) -> Self {
        Self {
            inbound: inbound.into(),
            sent: Vec::new(),
            delay_ms,
        }
    }
}

impl Channel for ScriptedChannel {
    async fn send(&mut self, frame: serde_json::Value) -> Result<(), ChannelError> {
        self.sent.push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<serde_json::Value, ChannelError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.inbound.pop_front().ok_or(ChannelError::Closed)
    }
}
