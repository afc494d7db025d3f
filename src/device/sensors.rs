// SensorHub - latest sensor reading per connected device
//
// Owned by one session; there is no process-wide registry. Each connected
// device gets a tokio watch channel, so the store keeps exactly one value
// per device and subscribers see the newest value rather than a queue of
// intermediate samples. Disconnecting a device drops its sender, which ends
// every subscription with SensorStreamUnavailable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;

use super::spawn_background;
use crate::error::{log_device_error, DeviceError};

/// One point-in-time reading from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: String,
    /// Raw proximity values, one per sensor
    pub values: Vec<f32>,
    /// Per-device counter, increases with every stored reading
    pub sequence: u64,
    pub timestamp_ms: u64,
}

/// Messages pushed by the device adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorEvent {
    Connected { device_id: String },
    Reading { device_id: String, values: Vec<f32> },
    Disconnected { device_id: String },
}

struct DeviceSlot {
    tx: watch::Sender<Option<SensorReading>>,
    sequence: u64,
}

/// Per-session latest-value store
pub struct SensorHub {
    devices: RwLock<BTreeMap<String, DeviceSlot>>,
    total_readings: AtomicU64,
}

impl SensorHub {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            total_readings: AtomicU64::new(0),
        }
    }

    fn poisoned() -> DeviceError {
        DeviceError::LockPoisoned {
            component: "sensor registry".to_string(),
        }
    }

    /// Register a device. Connecting an already connected device is a no-op.
    pub fn connect(&self, device_id: &str) -> Result<(), DeviceError> {
        let mut devices = self.devices.write().map_err(|_| Self::poisoned())?;
        if !devices.contains_key(device_id) {
            let (tx, _) = watch::channel(None);
            devices.insert(device_id.to_string(), DeviceSlot { tx, sequence: 0 });
            log::info!("[SensorHub] Device connected: {}", device_id);
        }
        Ok(())
    }

    /// Remove a device, ending all of its subscriptions.
    pub fn disconnect(&self, device_id: &str) -> Result<(), DeviceError> {
        let mut devices = self.devices.write().map_err(|_| Self::poisoned())?;
        match devices.remove(device_id) {
            Some(_) => {
                log::info!("[SensorHub] Device disconnected: {}", device_id);
                Ok(())
            }
            None => Err(DeviceError::UnknownDevice {
                device_id: device_id.to_string(),
            }),
        }
    }

    /// Store `values` as the latest reading of `device_id`, replacing the
    /// previous one. Unknown devices are registered on first reading.
    pub fn update(&self, device_id: &str, values: Vec<f32>) -> Result<SensorReading, DeviceError> {
        let mut devices = self.devices.write().map_err(|_| Self::poisoned())?;
        let slot = devices.entry(device_id.to_string()).or_insert_with(|| {
            log::info!("[SensorHub] Device connected by first reading: {}", device_id);
            let (tx, _) = watch::channel(None);
            DeviceSlot { tx, sequence: 0 }
        });

        slot.sequence += 1;
        let reading = SensorReading {
            device_id: device_id.to_string(),
            values,
            sequence: slot.sequence,
            timestamp_ms: now_timestamp_ms(),
        };
        slot.tx.send_replace(Some(reading.clone()));
        self.total_readings.fetch_add(1, Ordering::Relaxed);
        Ok(reading)
    }

    /// Apply one adapter event.
    pub fn apply(&self, event: SensorEvent) -> Result<(), DeviceError> {
        match event {
            SensorEvent::Connected { device_id } => self.connect(&device_id),
            SensorEvent::Reading { device_id, values } => self.update(&device_id, values).map(|_| ()),
            SensorEvent::Disconnected { device_id } => self.disconnect(&device_id),
        }
    }

    /// Drain adapter events until every sender is dropped.
    pub async fn run_ingest(&self, mut rx: mpsc::Receiver<SensorEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(err) = self.apply(event) {
                log_device_error(&err, "run_ingest");
            }
        }
        log::debug!("[SensorHub] Ingest channel closed");
    }

    /// Connected device ids, sorted
    pub fn list_devices(&self) -> Result<Vec<String>, DeviceError> {
        let devices = self.devices.read().map_err(|_| Self::poisoned())?;
        Ok(devices.keys().cloned().collect())
    }

    pub fn is_connected(&self, device_id: &str) -> Result<bool, DeviceError> {
        let devices = self.devices.read().map_err(|_| Self::poisoned())?;
        Ok(devices.contains_key(device_id))
    }

    /// Latest stored reading; `Ok(None)` when connected but nothing arrived yet.
    pub fn latest(&self, device_id: &str) -> Result<Option<SensorReading>, DeviceError> {
        let devices = self.devices.read().map_err(|_| Self::poisoned())?;
        let slot = devices
            .get(device_id)
            .ok_or_else(|| DeviceError::UnknownDevice {
                device_id: device_id.to_string(),
            })?;
        let latest = slot.tx.borrow().clone();
        Ok(latest)
    }

    /// Readings stored since the hub was created, across devices
    pub fn total_readings(&self) -> u64 {
        self.total_readings.load(Ordering::Relaxed)
    }

    /// Subscribe to changes of one device's reading.
    pub fn subscribe(&self, device_id: &str) -> Result<SensorSubscription, DeviceError> {
        let devices = self.devices.read().map_err(|_| Self::poisoned())?;
        let slot = devices
            .get(device_id)
            .ok_or_else(|| DeviceError::UnknownDevice {
                device_id: device_id.to_string(),
            })?;
        Ok(SensorSubscription {
            device_id: device_id.to_string(),
            rx: slot.tx.subscribe(),
        })
    }

    /// Invoke `on_change` for every new reading of `device_id`.
    ///
    /// When the device disconnects, `on_change` receives a final
    /// `SensorStreamUnavailable` and delivery stops. Dropping or calling
    /// [`SubscriptionHandle::unsubscribe`] on the returned handle stops
    /// delivery early.
    pub fn subscribe_with<F>(
        &self,
        device_id: &str,
        mut on_change: F,
    ) -> Result<SubscriptionHandle, DeviceError>
    where
        F: FnMut(Result<SensorReading, DeviceError>) + Send + 'static,
    {
        let mut subscription = self.subscribe(device_id)?;
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let deliver = async move {
            loop {
                match subscription.changed().await {
                    Ok(reading) => on_change(Ok(reading)),
                    Err(err) => {
                        on_change(Err(err));
                        break;
                    }
                }
            }
        };
        let task = async move {
            tokio::select! {
                _ = cancel_rx => {}
                _ = deliver => {}
            }
        };

        spawn_background("sensor-subscription", task).map_err(|err| {
            log::error!("[SensorHub] Subscription task for {} failed: {}", device_id, err);
            DeviceError::ChannelClosed
        })?;

        Ok(SubscriptionHandle {
            device_id: device_id.to_string(),
            cancel: Some(cancel_tx),
        })
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded channel for a device adapter feeding [`SensorHub::run_ingest`]
pub fn ingest_channel(capacity: usize) -> (mpsc::Sender<SensorEvent>, mpsc::Receiver<SensorEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Receiver side of a device subscription
pub struct SensorSubscription {
    device_id: String,
    rx: watch::Receiver<Option<SensorReading>>,
}

impl SensorSubscription {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Wait for the next stored reading.
    ///
    /// Fails with `SensorStreamUnavailable` once the device disconnects.
    pub async fn changed(&mut self) -> Result<SensorReading, DeviceError> {
        loop {
            self.rx
                .changed()
                .await
                .map_err(|_| DeviceError::SensorStreamUnavailable {
                    device_id: self.device_id.clone(),
                })?;
            if let Some(reading) = self.rx.borrow_and_update().clone() {
                return Ok(reading);
            }
        }
    }

    /// Latest reading without waiting
    pub fn current(&self) -> Option<SensorReading> {
        self.rx.borrow().clone()
    }

    /// Stream of readings, starting with the current one if present.
    /// Ends when the device disconnects.
    pub fn into_stream(self) -> impl Stream<Item = SensorReading> {
        WatchStream::new(self.rx).filter_map(|reading| async move { reading })
    }
}

/// Keeps a callback subscription alive
pub struct SubscriptionHandle {
    device_id: String,
    cancel: Option<oneshot::Sender<()>>,
}

impl SubscriptionHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Stop callback delivery.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
            log::debug!("[SensorHub] Unsubscribed from {}", self.device_id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_update_keeps_only_latest_value() {
        let hub = SensorHub::new();
        hub.update("robot-1", vec![0.0; 9]).unwrap();
        hub.update("robot-1", vec![1.0; 9]).unwrap();

        let latest = hub.latest("robot-1").unwrap().unwrap();
        assert_eq!(latest.values, vec![1.0; 9]);
        assert_eq!(latest.sequence, 2);
        assert_eq!(hub.total_readings(), 2);
    }

    #[test]
    fn test_list_devices_is_sorted_and_tracks_disconnects() {
        let hub = SensorHub::new();
        hub.connect("zeta").unwrap();
        hub.update("alpha", vec![0.0; 9]).unwrap();
        hub.connect("zeta").unwrap();
        assert_eq!(hub.list_devices().unwrap(), vec!["alpha", "zeta"]);

        hub.disconnect("zeta").unwrap();
        assert_eq!(hub.list_devices().unwrap(), vec!["alpha"]);
        assert!(matches!(
            hub.disconnect("zeta"),
            Err(DeviceError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn test_latest_distinguishes_unknown_and_empty() {
        let hub = SensorHub::new();
        assert!(matches!(
            hub.latest("ghost"),
            Err(DeviceError::UnknownDevice { .. })
        ));
        hub.connect("robot").unwrap();
        assert_eq!(hub.latest("robot").unwrap(), None);
    }

    #[test]
    fn test_sessions_do_not_share_readings() {
        let a = SensorHub::new();
        let b = SensorHub::new();
        a.update("robot", vec![1.0; 9]).unwrap();
        assert!(b.list_devices().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_sees_new_readings() {
        let hub = SensorHub::new();
        hub.connect("robot").unwrap();
        let mut sub = hub.subscribe("robot").unwrap();

        hub.update("robot", vec![0.5; 9]).unwrap();
        let reading = sub.changed().await.unwrap();
        assert_eq!(reading.values, vec![0.5; 9]);
        assert_eq!(sub.current(), Some(reading));
    }

    #[tokio::test]
    async fn test_subscription_fails_after_disconnect() {
        let hub = SensorHub::new();
        hub.connect("robot").unwrap();
        let mut sub = hub.subscribe("robot").unwrap();

        hub.disconnect("robot").unwrap();
        assert_eq!(
            sub.changed().await,
            Err(DeviceError::SensorStreamUnavailable {
                device_id: "robot".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_run_ingest_applies_events_in_order() {
        let hub = SensorHub::new();
        let (tx, rx) = ingest_channel(8);
        tx.send(SensorEvent::Connected {
            device_id: "robot".into(),
        })
        .await
        .unwrap();
        tx.send(SensorEvent::Reading {
            device_id: "robot".into(),
            values: vec![2.0; 9],
        })
        .await
        .unwrap();
        tx.send(SensorEvent::Disconnected {
            device_id: "ghost".into(),
        })
        .await
        .unwrap();
        drop(tx);

        hub.run_ingest(rx).await;
        assert_eq!(hub.latest("robot").unwrap().unwrap().values, vec![2.0; 9]);
    }

    #[tokio::test]
    async fn test_stream_ends_on_disconnect() {
        let hub = SensorHub::new();
        hub.update("robot", vec![1.0; 9]).unwrap();
        let stream = hub.subscribe("robot").unwrap().into_stream();
        hub.disconnect("robot").unwrap();

        let readings: Vec<_> = stream.collect().await;
        assert!(readings.len() <= 1);
    }

    #[tokio::test]
    async fn test_callback_subscription_and_unsubscribe() {
        let hub = SensorHub::new();
        hub.connect("robot").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = hub
            .subscribe_with("robot", move |reading| {
                sink.lock().unwrap().push(reading);
            })
            .unwrap();
        assert_eq!(handle.device_id(), "robot");

        hub.update("robot", vec![1.0; 9]).unwrap();
        for _ in 0..50 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(seen.lock().unwrap().first(), Some(Ok(_))));

        handle.unsubscribe();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let before = seen.lock().unwrap().len();
        hub.update("robot", vec![0.0; 9]).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_callback_reports_disconnect() {
        let hub = SensorHub::new();
        hub.connect("robot").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _handle = hub
            .subscribe_with("robot", move |reading| sink.lock().unwrap().push(reading))
            .unwrap();

        hub.disconnect("robot").unwrap();
        for _ in 0..50 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(
            seen.lock().unwrap().last(),
            Some(Err(DeviceError::SensorStreamUnavailable { .. }))
        ));
    }
}
