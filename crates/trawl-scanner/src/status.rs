//! Per-worker status with duplicate-error suppression.
//!
//! Each worker owns one [`InstanceStatus`] and is its only writer. Readers
//! (the reporter, the CLI) take a [`StatusView`] copy, never a reference.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use trawl_core::WalletScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Active,
    Error,
    Success,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Error => "error",
            Self::Success => "success",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub id: usize,
    pub state: WorkerState,
    pub current_address: Option<String>,
    pub current_scheme: Option<WalletScheme>,
    pub current_endpoint: Option<String>,
    pub last_error: Option<String>,
    pub last_error_at: Option<Instant>,
}

pub struct InstanceStatus {
    view: RwLock<StatusView>,
    error_window: Duration,
}

impl InstanceStatus {
    pub fn new(id: usize, error_window: Duration) -> Self {
        Self {
            view: RwLock::new(StatusView {
                id,
                state: WorkerState::Idle,
                current_address: None,
                current_scheme: None,
                current_endpoint: None,
                last_error: None,
                last_error_at: None,
            }),
            error_window,
        }
    }

    pub fn id(&self) -> usize {
        self.view.read().id
    }

    pub fn set_idle(&self) {
        let mut v = self.view.write();
        v.state = WorkerState::Idle;
        v.current_address = None;
        v.current_scheme = None;
    }

    pub fn set_active(&self, address: &str, scheme: WalletScheme, endpoint: Option<String>) {
        let mut v = self.view.write();
        v.state = WorkerState::Active;
        v.current_address = Some(address.to_string());
        v.current_scheme = Some(scheme);
        v.current_endpoint = endpoint;
    }

    /// Mark the current address as a hit.
    pub fn set_success(&self) {
        self.view.write().state = WorkerState::Success;
    }

    /// Enter the error state.
    ///
    /// The message and timestamp are only replaced when the error differs from
    /// the last one or the suppression window has passed. Returns `true` in
    /// that case, meaning the caller should log it.
    pub fn set_error(&self, message: &str) -> bool {
        let mut v = self.view.write();
        v.state = WorkerState::Error;
        let repeated = v.last_error.as_deref() == Some(message)
            && v.last_error_at.is_some_and(|at| at.elapsed() < self.error_window);
        if repeated {
            return false;
        }
        v.last_error = Some(message.to_string());
        v.last_error_at = Some(Instant::now());
        true
    }

    pub fn state(&self) -> WorkerState {
        self.view.read().state
    }

    pub fn snapshot(&self) -> StatusView {
        self.view.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> InstanceStatus {
        InstanceStatus::new(3, Duration::from_secs(300))
    }

    #[test]
    fn starts_idle() {
        let s = status();
        let v = s.snapshot();
        assert_eq!(v.id, 3);
        assert_eq!(v.state, WorkerState::Idle);
        assert!(v.current_address.is_none());
    }

    #[test]
    fn lifecycle() {
        let s = status();
        s.set_active("bc1qxyz", WalletScheme::Bip84, Some("https://a/api".into()));
        let v = s.snapshot();
        assert_eq!(v.state, WorkerState::Active);
        assert_eq!(v.current_address.as_deref(), Some("bc1qxyz"));
        assert_eq!(v.current_scheme, Some(WalletScheme::Bip84));
        assert_eq!(v.current_endpoint.as_deref(), Some("https://a/api"));

        s.set_success();
        assert_eq!(s.state(), WorkerState::Success);
        s.set_idle();
        let v = s.snapshot();
        assert_eq!(v.state, WorkerState::Idle);
        assert!(v.current_address.is_none());
        // The endpoint stays visible while idle.
        assert_eq!(v.current_endpoint.as_deref(), Some("https://a/api"));
    }

    #[test]
    fn duplicate_errors_suppressed_within_window() {
        let s = status();
        assert!(s.set_error("timeout"));
        let first_at = s.snapshot().last_error_at;
        s.set_active("1abc", WalletScheme::Bip44, None);
        assert!(!s.set_error("timeout"));
        let v = s.snapshot();
        assert_eq!(v.state, WorkerState::Error);
        assert_eq!(v.last_error_at, first_at);
    }

    #[test]
    fn different_error_is_recorded() {
        let s = status();
        assert!(s.set_error("timeout"));
        assert!(s.set_error("status 429"));
        assert_eq!(s.snapshot().last_error.as_deref(), Some("status 429"));
    }

    #[test]
    fn duplicate_error_recorded_after_window() {
        let s = InstanceStatus::new(0, Duration::ZERO);
        assert!(s.set_error("timeout"));
        assert!(s.set_error("timeout"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let s = status();
        let before = s.snapshot();
        s.set_active("1abc", WalletScheme::LegacyBip32, None);
        assert_eq!(before.state, WorkerState::Idle);
    }

    #[test]
    fn state_display() {
        assert_eq!(WorkerState::Success.to_string(), "success");
        assert_eq!(WorkerState::Error.to_string(), "error");
    }
}
