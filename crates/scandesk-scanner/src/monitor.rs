//! Device Status Monitor.
//!
//! Polls the device through a [`DeviceTransport`] and caches the resolved state in a
//! `watch` channel, so readers never wait on device I/O. Transport failures are folded
//! into `ERROR`; they never surface as errors to callers of [`DeviceMonitor::poll`].

use chrono::Utc;
use scandesk_core::config::DeviceConfig;
use scandesk_core::models::{DeviceEndpoint, DeviceSnapshot, DeviceState, ScanOptions, StatusId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::status::resolve_state;
use crate::transport::{DeviceTransport, DeviceTransportFactory, RawStatus, TransportError};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Upper bound for a single status query.
    pub timeout: Duration,
    /// Pause before the single retry of a failed query.
    pub retry_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retry_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl From<&DeviceConfig> for MonitorConfig {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

pub struct DeviceMonitor {
    factory: Arc<dyn DeviceTransportFactory>,
    transport: RwLock<Arc<dyn DeviceTransport>>,
    /// Bumped on every transport swap; polls started before a bump are discarded.
    generation: AtomicU64,
    config: MonitorConfig,
    state_tx: watch::Sender<DeviceSnapshot>,
}

impl DeviceMonitor {
    pub fn new(
        factory: Arc<dyn DeviceTransportFactory>,
        endpoint: &DeviceEndpoint,
        config: MonitorConfig,
    ) -> Result<Self, TransportError> {
        let transport = factory.connect(endpoint)?;
        let (state_tx, _) = watch::channel(DeviceSnapshot::offline());
        Ok(Self {
            factory,
            transport: RwLock::new(transport),
            generation: AtomicU64::new(0),
            config,
            state_tx,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Last resolved state; `OFFLINE` before the first poll completes.
    pub fn current_state(&self) -> DeviceState {
        self.state_tx.borrow().state
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.state_tx.subscribe()
    }

    fn connection(&self) -> (u64, Arc<dyn DeviceTransport>) {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (self.generation.load(Ordering::SeqCst), transport.clone())
    }

    /// Query the device once (plus one retry) and record the resolved state.
    pub async fn poll(&self) -> DeviceState {
        let (generation, transport) = self.connection();
        let result = self.query_with_retry(transport.as_ref()).await;
        let now = Utc::now();

        let state = match &result {
            Ok(raw) => resolve_state(raw),
            Err(_) => DeviceState::Error,
        };

        // Checked under the channel lock so a concurrent swap cannot be overwritten.
        let recorded = self.state_tx.send_if_modified(|snapshot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            snapshot.state = state;
            snapshot.observed_at = Some(now);
            match &result {
                Ok(_) => {
                    snapshot.last_success_at = Some(now);
                    snapshot.last_error = None;
                }
                Err(e) => snapshot.last_error = Some(e.to_string()),
            }
            true
        });

        if !recorded {
            tracing::debug!(generation, "Discarding poll result from replaced transport");
            return self.current_state();
        }

        match &result {
            Ok(_) => tracing::debug!(state = %state, "Device status polled"),
            Err(e) => tracing::warn!(error = %e, "Device status poll failed"),
        }
        state
    }

    async fn query_with_retry(&self, transport: &dyn DeviceTransport) -> Result<RawStatus, TransportError> {
        match self.query_once(transport).await {
            Ok(raw) => Ok(raw),
            Err(first) => {
                tracing::debug!(error = %first, "Device status query failed, retrying");
                sleep(self.config.retry_delay).await;
                self.query_once(transport).await
            }
        }
    }

    async fn query_once(&self, transport: &dyn DeviceTransport) -> Result<RawStatus, TransportError> {
        match timeout(self.config.timeout, transport.query_status(&StatusId::ALL)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.config.timeout)),
        }
    }

    /// Replace the transport with one for `endpoint` and reset the cached state.
    pub fn reconfigure(&self, endpoint: &DeviceEndpoint) -> Result<(), TransportError> {
        let transport = self.factory.connect(endpoint)?;
        {
            let mut current = self
                .transport
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = transport;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.state_tx.send_replace(DeviceSnapshot::offline());
        tracing::info!(address = %endpoint.address, "Device transport replaced");
        Ok(())
    }

    /// Best-effort push of scan settings to the device.
    pub async fn apply_scan_options(&self, options: &ScanOptions) -> Result<(), TransportError> {
        let (_, transport) = self.connection();
        match timeout(self.config.timeout, transport.apply_scan_options(options)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.config.timeout)),
        }
    }

    /// Poll immediately, then every `poll_interval` until `cancel` fires.
    pub fn spawn_polling(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                poll_interval_ms = monitor.config.poll_interval.as_millis() as u64,
                "Device status polling started"
            );

            loop {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;

                    () = cancel.cancelled() => break,
                    _ = monitor.poll() => {}
                }
            }

            tracing::info!("Device status polling stopped");
        })
    }
}
