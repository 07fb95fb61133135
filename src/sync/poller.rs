use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use super::status::SyncStatus;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::ConnectionStatusResponse;

/// Where the poller reads connection status from
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn connection_status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ApiError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Connection id must not be empty")]
    EmptyConnectionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
    /// Transient failures tolerated in a row before giving up. Zero means the first failure is final.
    pub max_transient_retries: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            timeout: Duration::from_millis(60_000),
            max_transient_retries: 0,
        }
    }
}

impl PollSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.polling.interval_ms),
            timeout: Duration::from_millis(config.polling.timeout_ms),
            max_transient_retries: config.polling.max_transient_retries,
        }
    }
}

// State shared with the running loop. A loop may only publish while its
// generation is current; the check runs under the channel's write lock.
struct Shared {
    status: watch::Sender<SyncStatus>,
    generation: AtomicU64,
}

impl Shared {
    fn publish(&self, generation: u64, next: SyncStatus) -> bool {
        let mut published = false;
        self.status.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = next;
            published = true;
            true
        });
        published
    }

    fn snapshot(&self) -> SyncStatus {
        self.status.borrow().clone()
    }
}

/// Follows one connection's synchronisation until it finishes, fails or times out.
///
/// Only one loop runs per poller: starting again cancels the previous loop,
/// and dropping the poller cancels whatever is running.
pub struct SyncPoller<S: StatusSource> {
    source: Arc<S>,
    settings: PollSettings,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: StatusSource> SyncPoller<S> {
    pub fn new(source: Arc<S>, settings: PollSettings) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            source,
            settings,
            shared: Arc::new(Shared {
                status,
                generation: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Latest published status
    pub fn status(&self) -> SyncStatus {
        self.shared.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.status.borrow().is_polling
    }

    /// Start following `connection_id`, replacing any loop already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self, connection_id: &str) -> Result<(), SyncError> {
        let connection_id = connection_id.trim();
        if connection_id.is_empty() {
            return Err(SyncError::EmptyConnectionId);
        }

        let mut task = self.lock_task();
        let generation = self.cancel_locked(&mut task);
        self.shared.status.send_replace(SyncStatus::starting());

        info!(connection_id, "Starting sync status polling");
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.source),
            connection_id.to_string(),
            generation,
            self.settings,
        ));
        *task = Some(handle);
        Ok(())
    }

    /// Cancel the running loop, if any. Safe to call at any time.
    pub fn stop_polling(&self) {
        let mut task = self.lock_task();
        let had_task = task.is_some();
        self.cancel_locked(&mut task);

        self.shared.status.send_if_modified(|current| {
            if current.is_polling {
                current.is_polling = false;
                true
            } else {
                false
            }
        });

        if had_task {
            debug!("Sync status polling stopped");
        }
    }

    /// Cancel and forget the last status, as when the connection being watched changes
    pub fn reset(&self) {
        let mut task = self.lock_task();
        self.cancel_locked(&mut task);
        self.shared.status.send_replace(SyncStatus::default());
    }

    /// Wait for the current loop to reach a non-polling status and return it
    pub async fn wait_until_settled(&self) -> SyncStatus {
        let mut receiver = self.subscribe();
        let settled = match receiver.wait_for(|status| !status.is_polling).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        settled
    }

    // Invalidates the running loop and returns the generation for the next one
    fn cancel_locked(&self, task: &mut MutexGuard<'_, Option<JoinHandle<()>>>) -> u64 {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = task.take() {
            handle.abort();
        }
        generation
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: StatusSource> Drop for SyncPoller<S> {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let task = self.task.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

// One check, then the next is scheduled only after the previous returned,
// so checks never overlap.
async fn run_loop<S: StatusSource>(
    shared: Arc<Shared>,
    source: Arc<S>,
    connection_id: String,
    generation: u64,
    settings: PollSettings,
) {
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut consecutive_failures = 0u32;

    loop {
        let next = match timeout_at(deadline, source.connection_status(&connection_id)).await {
            Ok(Ok(response)) => {
                consecutive_failures = 0;
                let status = SyncStatus::from_response(&response, started.elapsed(), settings.timeout);
                debug!(
                    connection_id = %connection_id,
                    status = ?status.status,
                    execution_status = ?status.execution_status,
                    "Sync status tick"
                );
                Some(status)
            }
            Ok(Err(err)) if err.is_transient() && consecutive_failures < settings.max_transient_retries => {
                consecutive_failures += 1;
                warn!(
                    connection_id = %connection_id,
                    attempt = consecutive_failures,
                    "Transient error checking sync status: {}", err
                );
                None
            }
            Ok(Err(err)) => {
                error!(connection_id = %connection_id, "Error checking sync status: {}", err);
                Some(SyncStatus::check_failed(&shared.snapshot(), &err))
            }
            Err(_) => Some(SyncStatus::timed_out(&shared.snapshot())),
        };

        let next = match next {
            Some(status) => status,
            // Retrying: the wall-clock budget still applies
            None if started.elapsed() >= settings.timeout => SyncStatus::timed_out(&shared.snapshot()),
            None => {
                sleep(settings.interval).await;
                continue;
            }
        };

        let finished = !next.is_polling;
        let outcome = (next.is_complete, next.has_error);
        if !shared.publish(generation, next) {
            debug!(connection_id = %connection_id, "Superseded polling loop exiting");
            return;
        }

        if finished {
            match outcome {
                (true, _) => info!(connection_id = %connection_id, "Sync completed"),
                _ => info!(connection_id = %connection_id, "Sync polling ended with an error"),
            }
            return;
        }

        sleep(settings.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionStatus, ProviderStatus};
    use crate::sync::status::{CHECK_FAILED_MESSAGE, TIMEOUT_MESSAGE};
    use std::collections::VecDeque;

    /// Scripted status source that records every connection id it is asked about
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<ConnectionStatusResponse, ApiError>>>,
        fallback: Mutex<Option<ConnectionStatusResponse>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn with(responses: Vec<Result<ConnectionStatusResponse, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            })
        }

        fn always(response: ConnectionStatusResponse) -> Arc<Self> {
            Arc::new(Self {
                fallback: Mutex::new(Some(response)),
                ..Self::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn connection_status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ApiError> {
            self.calls.lock().unwrap().push(connection_id.to_string());
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                return next;
            }
            match self.fallback.lock().unwrap().clone() {
                Some(response) => Ok(response),
                None => Ok(updating(None)),
            }
        }
    }

    fn updating(execution: Option<ExecutionStatus>) -> ConnectionStatusResponse {
        ConnectionStatusResponse {
            status: Some(ProviderStatus::Updating),
            execution_status: execution,
            ..ConnectionStatusResponse::default()
        }
    }

    fn completed() -> ConnectionStatusResponse {
        ConnectionStatusResponse {
            status: Some(ProviderStatus::Updated),
            execution_status: Some(ExecutionStatus::Success),
            sync_complete: true,
            ..ConnectionStatusResponse::default()
        }
    }

    async fn advance(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn login_then_success_stops_after_second_tick() {
        let source = ScriptedSource::with(vec![
            Ok(updating(Some(ExecutionStatus::LoginInProgress))),
            Ok(completed()),
        ]);
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("conn_1").unwrap();
        advance(1).await;

        let status = poller.status();
        assert_eq!(status.message, "Connecting to bank");
        assert!(status.is_polling);
        assert!(!status.is_complete);

        advance(3000).await;

        let status = poller.status();
        assert_eq!(status.message, "Sync completed successfully");
        assert!(status.is_complete);
        assert!(!status.is_polling);
        assert!(!status.has_error);

        advance(30_000).await;
        assert_eq!(source.calls(), vec!["conn_1".to_string(), "conn_1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_stops_the_timer() {
        let mut failed = updating(None);
        failed.status = Some(ProviderStatus::LoginError);
        failed.error_message = Some("Senha incorreta".to_string());
        let source = ScriptedSource::with(vec![Ok(updating(None)), Ok(failed)]);
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("conn_err").unwrap();
        let status = poller.wait_until_settled().await;

        assert!(status.has_error);
        assert_eq!(status.message, "Bank login failed");
        assert_eq!(status.error_message.as_deref(), Some("Senha incorreta"));

        advance(20_000).await;
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_wall_clock_bound() {
        let source = ScriptedSource::always(updating(Some(ExecutionStatus::TransactionsInProgress)));
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("conn_slow").unwrap();
        advance(59_000).await;
        assert!(poller.is_polling());

        advance(1_500).await;
        let status = poller.status();
        assert!(status.has_error);
        assert!(!status.is_polling);
        assert_eq!(status.message, TIMEOUT_MESSAGE);

        let calls = source.calls().len();
        advance(30_000).await;
        assert_eq!(source.calls().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_holds_with_a_different_interval() {
        let source = ScriptedSource::always(updating(None));
        let settings = PollSettings {
            interval: Duration::from_millis(7_000),
            ..PollSettings::default()
        };
        let poller = SyncPoller::new(Arc::clone(&source), settings);

        poller.start_polling("conn_slow").unwrap();
        let status = poller.wait_until_settled().await;

        assert_eq!(status.message, TIMEOUT_MESSAGE);
        // Ticks at 0, 7s, ..., 63s; the first one past 60s ends the loop
        assert_eq!(source.calls().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_the_previous_loop() {
        let source = ScriptedSource::always(updating(None));
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("A").unwrap();
        let before_restart = source.calls().len();
        poller.start_polling("B").unwrap();

        advance(10_000).await;

        let calls = source.calls();
        assert!(calls.len() > before_restart);
        assert!(calls[before_restart..].iter().all(|id| id == "B"));
        assert!(poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let source = ScriptedSource::always(updating(None));
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.stop_polling();
        poller.stop_polling();
        assert!(!poller.is_polling());
        assert_eq!(poller.status(), SyncStatus::default());

        poller.start_polling("conn_1").unwrap();
        advance(1).await;
        poller.stop_polling();
        poller.stop_polling();
        assert!(!poller.is_polling());

        let calls = source.calls().len();
        advance(15_000).await;
        assert_eq!(source.calls().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn request_failure_is_terminal_by_default() {
        let source = ScriptedSource::with(vec![Err(ApiError::network("connection reset"))]);
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("conn_1").unwrap();
        let status = poller.wait_until_settled().await;

        assert!(status.has_error);
        assert_eq!(status.message, CHECK_FAILED_MESSAGE);
        assert_eq!(status.error_message.as_deref(), Some("connection reset"));

        advance(10_000).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_retry_for_transient_failures() {
        let source = ScriptedSource::with(vec![
            Err(ApiError::network("reset")),
            Err(ApiError::timeout("slow")),
            Ok(completed()),
        ]);
        let settings = PollSettings {
            max_transient_retries: 2,
            ..PollSettings::default()
        };
        let poller = SyncPoller::new(Arc::clone(&source), settings);

        poller.start_polling("conn_1").unwrap();
        let status = poller.wait_until_settled().await;

        assert!(status.is_complete);
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_is_not_retried() {
        let source = ScriptedSource::with(vec![Err(ApiError::not_found("Connection not found"))]);
        let settings = PollSettings {
            max_transient_retries: 5,
            ..PollSettings::default()
        };
        let poller = SyncPoller::new(Arc::clone(&source), settings);

        poller.start_polling("missing").unwrap();
        let status = poller.wait_until_settled().await;

        assert!(status.has_error);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_connection_id_is_rejected() {
        let poller = SyncPoller::new(ScriptedSource::always(updating(None)), PollSettings::default());
        assert_eq!(poller.start_polling("  "), Err(SyncError::EmptyConnectionId));
        assert!(!poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_defaults() {
        let source = ScriptedSource::always(updating(Some(ExecutionStatus::AccountsInProgress)));
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("conn_1").unwrap();
        advance(1).await;
        assert_eq!(poller.status().message, "Loading accounts");

        poller.reset();
        assert_eq!(poller.status(), SyncStatus::default());

        let calls = source.calls().len();
        advance(10_000).await;
        assert_eq!(source.calls().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_cancels_the_loop() {
        let source = ScriptedSource::always(updating(None));
        let poller = SyncPoller::new(Arc::clone(&source), PollSettings::default());

        poller.start_polling("conn_1").unwrap();
        advance(1).await;
        drop(poller);

        let calls = source.calls().len();
        advance(10_000).await;
        assert_eq!(source.calls().len(), calls);
    }
}
