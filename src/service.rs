use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::config::RelayConfig;
use crate::detector::ChangeDetector;
use crate::error::ServiceError;
use crate::relay::DeliveryRelay;
use crate::source::ChangeSignal;

const COMMAND_QUEUE_SIZE: usize = 16;

static NEXT_SERVICE_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    // Id of the service whose loop runs the current task.
    static SERVICE_LOOP: u64;
}

/// Explicit requests accepted by a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    /// Check for records past the cursor.
    CheckSms,
    /// Replay the most recent records.
    CheckAllRecentSms,
    /// Emit a diagnostic line to prove the channel works.
    TestCommunication,
}

/// Start/stop/command surface used by the method call handler.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn start_service(&self) -> Result<(), ServiceError>;
    async fn stop_service(&self) -> Result<(), ServiceError>;
    async fn send(&self, command: ServiceCommand) -> Result<(), ServiceError>;
    fn is_running(&self) -> bool;
}

struct Running {
    command_tx: mpsc::Sender<ServiceCommand>,
    shutdown: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Background monitor driving the [`ChangeDetector`].
///
/// Reacts to change signals, explicit commands and, when configured, a
/// periodic timer. Signals that arrive while a scan is in progress are
/// coalesced into one follow-up scan.
///
/// Every bridge call the service makes happens on the loop task. The
/// consumer may call back into the service from inside such a call: a
/// stop requested there does not wait for the loop, which finishes the
/// current scan (persisting every record) and then exits.
pub struct MonitorService {
    id: u64,
    config: RelayConfig,
    detector: Arc<ChangeDetector>,
    relay: Arc<DeliveryRelay>,
    signal: ChangeSignal,
    is_running: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl MonitorService {
    pub fn new(
        config: RelayConfig,
        detector: Arc<ChangeDetector>,
        relay: Arc<DeliveryRelay>,
        signal: ChangeSignal,
    ) -> Self {
        Self {
            id: NEXT_SERVICE_ID.fetch_add(1, Ordering::Relaxed),
            config,
            detector,
            relay,
            signal,
            is_running: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    /// Spawn the service loop and wait for its first check.
    ///
    /// The loop initializes the cursor and runs an initial check before
    /// reacting to anything else. No lock is held while that happens.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let ready = {
            let mut guard = self.running.lock().await;
            if guard.is_some() {
                return Err(ServiceError::AlreadyRunning);
            }

            tracing::info!("starting sms monitoring");
            let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
            let (ready_tx, ready_rx) = oneshot::channel();
            let shutdown = Arc::new(Notify::new());
            let stopped = Arc::new(AtomicBool::new(false));
            self.is_running.store(true, Ordering::SeqCst);

            let handle = tokio::spawn(SERVICE_LOOP.scope(
                self.id,
                service_loop(
                    self.config.clone(),
                    self.detector.clone(),
                    self.relay.clone(),
                    self.signal.clone(),
                    command_rx,
                    shutdown.clone(),
                    stopped.clone(),
                    ready_tx,
                ),
            ));

            *guard = Some(Running {
                command_tx,
                shutdown,
                stopped,
                handle,
            });
            ready_rx
        };

        // A restart from inside the previous loop's bridge call cannot wait:
        // that loop still holds the cursor the new one needs.
        if !self.in_own_loop() {
            let _ = ready.await;
        }
        Ok(())
    }

    /// Stop the loop. Waits for it to exit unless called from the loop's
    /// own task.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        let running = self.running.lock().await.take();
        let Some(running) = running else {
            return Err(ServiceError::NotRunning);
        };

        self.is_running.store(false, Ordering::SeqCst);
        running.stopped.store(true, Ordering::SeqCst);
        drop(running.command_tx);
        running.shutdown.notify_one();

        if self.in_own_loop() {
            tracing::debug!("stop requested from inside the service loop, not waiting for it");
        } else {
            let _ = running.handle.await;
        }

        tracing::info!("sms monitoring stopped");
        Ok(())
    }

    /// Queue a command for the loop. Never waits for queue space, so it is
    /// safe to call from inside a bridge call.
    pub async fn send(&self, command: ServiceCommand) -> Result<(), ServiceError> {
        let tx = {
            let guard = self.running.lock().await;
            match guard.as_ref() {
                Some(running) => running.command_tx.clone(),
                None => return Err(ServiceError::NotRunning),
            }
        };
        tx.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => ServiceError::Busy,
            TrySendError::Closed(_) => ServiceError::NotRunning,
        })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    fn in_own_loop(&self) -> bool {
        SERVICE_LOOP.try_with(|id| *id == self.id).unwrap_or(false)
    }
}

#[async_trait]
impl ServiceControl for MonitorService {
    async fn start_service(&self) -> Result<(), ServiceError> {
        self.start().await
    }

    async fn stop_service(&self) -> Result<(), ServiceError> {
        self.shutdown().await
    }

    async fn send(&self, command: ServiceCommand) -> Result<(), ServiceError> {
        MonitorService::send(self, command).await
    }

    fn is_running(&self) -> bool {
        MonitorService::is_running(self)
    }
}

#[allow(clippy::too_many_arguments)]
async fn service_loop(
    config: RelayConfig,
    detector: Arc<ChangeDetector>,
    relay: Arc<DeliveryRelay>,
    signal: ChangeSignal,
    mut command_rx: mpsc::Receiver<ServiceCommand>,
    shutdown: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    ready: oneshot::Sender<()>,
) {
    relay.debug_log("Starting SMS monitoring...").await;
    detector.initialize_cursor().await;
    detector.on_manual_check_requested().await;
    relay.debug_log("SMS monitoring started successfully").await;
    let _ = ready.send(());

    let mut next_poll = config.next_poll_delay().map(|d| Instant::now() + d);

    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        let poll_at = next_poll;
        let poll = async move {
            match poll_at {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            _ = signal.notified() => {
                detector.on_change_notification().await;
            }
            command = command_rx.recv() => {
                let Some(command) = command else { break };
                handle_command(command, &detector, &relay).await;
            }
            _ = poll => {
                tracing::debug!("periodic sms check");
                detector.on_poll_tick().await;
                next_poll = config.next_poll_delay().map(|d| Instant::now() + d);
            }
        }
    }
}

async fn handle_command(command: ServiceCommand, detector: &ChangeDetector, relay: &DeliveryRelay) {
    tracing::debug!(?command, "service command");
    match command {
        ServiceCommand::CheckSms => {
            detector.on_manual_check_requested().await;
        }
        ServiceCommand::CheckAllRecentSms => {
            relay.debug_log("Check all recent SMS requested").await;
            detector.on_bulk_rescan_requested().await;
        }
        ServiceCommand::TestCommunication => {
            relay
                .debug_log("Service communication test - this message should appear in the consumer")
                .await;
        }
    }
}
