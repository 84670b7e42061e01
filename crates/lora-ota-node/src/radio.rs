//! UDP stand-in for the LoRa radio.
//!
//! Every datagram received on the listen socket is one radio frame. Frames
//! carrying the `$OTA` header go to the update engine; everything else is
//! application traffic and is queued in the [`AppInbox`].

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use lora_ota_protocol::{MulticastCredentials, is_ota_frame};
use lora_ota_update::{Transport, TransportError};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::RadioConfig;
use crate::error::NodeError;

const MAX_DATAGRAM: usize = 2048;
const APP_INBOX_CAPACITY: usize = 32;

/// Application frames received while the radio is shared with OTA.
#[derive(Debug, Clone, Default)]
pub struct AppInbox {
    frames: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl AppInbox {
    /// Queue a frame, dropping the oldest when full.
    pub fn push(&self, frame: Vec<u8>) {
        let mut frames = self.frames.lock();
        if frames.len() >= APP_INBOX_CAPACITY {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Take every queued frame.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.frames.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

/// Uplink half of the radio, handed to the update engine.
#[derive(Debug, Clone)]
pub struct RadioLink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    multicast: Arc<Mutex<Option<MulticastCredentials>>>,
}

impl RadioLink {
    /// Multicast group currently joined.
    #[must_use]
    pub fn multicast(&self) -> Option<MulticastCredentials> {
        self.multicast.lock().clone()
    }
}

impl Transport for RadioLink {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn switch_to_multicast(
        &mut self,
        credentials: &MulticastCredentials,
    ) -> Result<(), TransportError> {
        tracing::info!(address = %format!("{:08x}", credentials.address), "joined multicast group");
        *self.multicast.lock() = Some(credentials.clone());
        Ok(())
    }
}

/// Running radio: the uplink handle, the OTA frame stream and the
/// application inbox.
pub struct Radio {
    pub link: RadioLink,
    pub frames: mpsc::Receiver<Vec<u8>>,
    pub inbox: AppInbox,
    tasks: Vec<JoinHandle<()>>,
}

impl Radio {
    /// Stop the socket tasks.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for Radio {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bound but not yet running radio socket.
pub struct UdpRadio {
    socket: Arc<UdpSocket>,
    gateway: SocketAddr,
    queue_depth: usize,
}

impl UdpRadio {
    /// Bind the listen socket and resolve the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or the gateway does
    /// not resolve.
    pub async fn bind(config: &RadioConfig) -> Result<Self, NodeError> {
        let socket = UdpSocket::bind(&config.listen)
            .await
            .map_err(|e| NodeError::Radio(format!("bind {}: {e}", config.listen)))?;
        let gateway = tokio::net::lookup_host(&config.gateway)
            .await
            .map_err(|e| NodeError::Radio(format!("resolve {}: {e}", config.gateway)))?
            .next()
            .ok_or_else(|| NodeError::Radio(format!("{} resolves to nothing", config.gateway)))?;

        Ok(Self {
            socket: Arc::new(socket),
            gateway,
            queue_depth: config.queue_depth.max(1),
        })
    }

    /// Address the radio listens on.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawn the receive and transmit tasks.
    #[must_use]
    pub fn start(self) -> Radio {
        let (frames_tx, frames) = mpsc::channel(self.queue_depth);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let inbox = AppInbox::default();

        let rx_task = tokio::spawn(receive_loop(
            Arc::clone(&self.socket),
            frames_tx,
            inbox.clone(),
        ));
        let tx_task = tokio::spawn(transmit_loop(self.socket, self.gateway, outbound_rx));

        Radio {
            link: RadioLink {
                outbound,
                multicast: Arc::new(Mutex::new(None)),
            },
            frames,
            inbox,
            tasks: vec![rx_task, tx_task],
        }
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, frames: mpsc::Sender<Vec<u8>>, inbox: AppInbox) {
    let mut buf = vec![0_u8; MAX_DATAGRAM];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(error = %e, "radio receive failed");
                continue;
            }
        };
        let frame = buf.get(..len).unwrap_or_default().to_vec();

        if is_ota_frame(&frame) {
            tracing::trace!(%from, bytes = len, "ota frame");
            if frames.send(frame).await.is_err() {
                tracing::debug!("frame consumer gone, receiver stopping");
                return;
            }
        } else {
            tracing::trace!(%from, bytes = len, "application frame");
            inbox.push(frame);
        }
    }
}

async fn transmit_loop(
    socket: Arc<UdpSocket>,
    gateway: SocketAddr,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = socket.send_to(&frame, gateway).await {
            tracing::warn!(error = %e, %gateway, "radio transmit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_drops_oldest_when_full() {
        let inbox = AppInbox::default();
        for i in 0..(APP_INBOX_CAPACITY + 3) {
            inbox.push(vec![u8::try_from(i).unwrap_or(u8::MAX)]);
        }
        assert_eq!(inbox.len(), APP_INBOX_CAPACITY);

        let frames = inbox.drain();
        assert_eq!(frames.first(), Some(&vec![3_u8]));
        assert!(inbox.is_empty());
    }

    #[tokio::test]
    async fn test_frames_are_demultiplexed() -> Result<(), Box<dyn std::error::Error>> {
        let gateway = UdpSocket::bind("127.0.0.1:0").await?;
        let radio = UdpRadio::bind(&RadioConfig {
            listen: "127.0.0.1:0".to_string(),
            gateway: gateway.local_addr()?.to_string(),
            queue_depth: 4,
        })
        .await?;
        let node_addr = radio.local_addr()?;
        let mut radio = radio.start();

        gateway.send_to(b"sensor,21,55", node_addr).await?;
        gateway.send_to(b"$OTA,4,*", node_addr).await?;
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), radio.frames.recv())
            .await?;
        assert_eq!(frame.as_deref(), Some(&b"$OTA,4,*"[..]));
        assert_eq!(radio.inbox.drain(), vec![b"sensor,21,55".to_vec()]);

        radio.link.send(b"$OTA,0,1.0.0,*")?;
        let mut buf = [0_u8; 64];
        let (len, _) =
            tokio::time::timeout(std::time::Duration::from_secs(5), gateway.recv_from(&mut buf))
                .await??;
        assert_eq!(buf.get(..len), Some(&b"$OTA,0,1.0.0,*"[..]));
        Ok(())
    }
}
