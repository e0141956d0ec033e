//! Scan Session Coordinator: entry point for status, scan requests and reconfiguration.

use chrono::{DateTime, Utc};
use scandesk_core::models::{DeviceSnapshot, DeviceState, ScanOptions, ScanTarget};
use scandesk_core::AppError;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use uuid::Uuid;
use validator::Validate;

use crate::session::{EffectiveConfig, ScanSession, SessionConfig, SessionTemplate};

pub const REFUSED_NOT_READY: &str = "device not ready";
pub const REFUSED_RECONFIGURING: &str = "scan session is being reconfigured";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanAcceptance {
    pub request_id: Uuid,
    pub accepted_at: DateTime<Utc>,
    pub device_state: DeviceState,
    pub target: ScanTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Accepted(ScanAcceptance),
    Refused { reason: String },
}

impl ScanOutcome {
    fn refused(reason: impl Into<String>) -> Self {
        ScanOutcome::Refused {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanOutcome::Accepted(_))
    }
}

pub struct ScanCoordinator {
    template: SessionTemplate,
    current: RwLock<Arc<ScanSession>>,
    /// Serializes reconfiguration; readers only take the short `current` lock.
    reconfigure_lock: tokio::sync::Mutex<()>,
}

impl ScanCoordinator {
    pub async fn start(template: SessionTemplate, config: SessionConfig) -> Result<Self, AppError> {
        let session = ScanSession::start(config, &template).await?;
        Ok(Self {
            template,
            current: RwLock::new(session),
            reconfigure_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn session(&self) -> Arc<ScanSession> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn swap(&self, session: Arc<ScanSession>) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
    }

    pub fn status(&self) -> DeviceState {
        self.session().status()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.session().snapshot()
    }

    pub fn effective_config(&self) -> EffectiveConfig {
        self.session().effective_config()
    }

    /// Ask for a scan. Returns as soon as the device has taken the settings.
    ///
    /// The resulting file is picked up by the watcher and classified with the
    /// options' target.
    #[tracing::instrument(skip_all, fields(document_type = %options.target.document_type))]
    pub async fn request_scan(&self, options: ScanOptions) -> Result<ScanOutcome, AppError> {
        options.validate()?;

        let session = self.session();
        if !session.is_active() {
            return Ok(ScanOutcome::refused(REFUSED_RECONFIGURING));
        }

        let state = session.status();
        if !state.is_ready() {
            tracing::info!(state = %state, "Scan refused, device not ready");
            return Ok(ScanOutcome::refused(REFUSED_NOT_READY));
        }

        if let Err(e) = session.monitor().apply_scan_options(&options).await {
            tracing::warn!(error = %e, "Device did not take scan options");
            return Ok(ScanOutcome::refused(format!("device rejected scan options: {}", e)));
        }

        if !session.is_active() || !Arc::ptr_eq(&session, &self.session()) {
            return Ok(ScanOutcome::refused(REFUSED_RECONFIGURING));
        }

        session.watcher().register_target(options.target.clone());

        let acceptance = ScanAcceptance {
            request_id: Uuid::new_v4(),
            accepted_at: Utc::now(),
            device_state: state,
            target: options.target,
        };
        tracing::info!(request_id = %acceptance.request_id, "Scan request accepted");
        Ok(ScanOutcome::Accepted(acceptance))
    }

    /// Replace the session with one for `config`.
    ///
    /// An identical configuration changes nothing. If the new session cannot start,
    /// the previous one is rebuilt and the start error returned.
    #[tracing::instrument(skip_all, fields(address = %config.device.address))]
    pub async fn reconfigure(&self, config: SessionConfig) -> Result<EffectiveConfig, AppError> {
        config.validate()?;
        let _guard = self.reconfigure_lock.lock().await;

        let previous = self.session();
        if previous.config() == &config {
            tracing::debug!("Scanner configuration unchanged");
            return Ok(previous.effective_config());
        }

        previous.deactivate();
        previous.shutdown().await;

        match ScanSession::start(config, &self.template).await {
            Ok(session) => {
                let effective = session.effective_config();
                self.swap(session);
                tracing::info!(
                    address = %effective.address,
                    storage_path = %effective.storage_path,
                    "Scanner reconfigured"
                );
                Ok(effective)
            }
            Err(e) => {
                tracing::error!(error = %e, "New scan session failed to start, restoring previous configuration");
                match ScanSession::start(previous.config().clone(), &self.template).await {
                    Ok(restored) => self.swap(restored),
                    Err(restore_err) => tracing::error!(
                        error = %restore_err,
                        "Previous scan session could not be restored"
                    ),
                }
                Err(e)
            }
        }
    }

    pub async fn shutdown(&self) {
        let _guard = self.reconfigure_lock.lock().await;
        self.session().shutdown().await;
    }
}
