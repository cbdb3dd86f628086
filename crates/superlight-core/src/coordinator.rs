//! Scan orchestration across sessions.
//!
//! BLE adapters dislike overlapping scan requests, so scan control lives in
//! one place. The [`ScanCoordinator`] owns the transport event stream and a
//! registry of sessions: it starts scanning when the adapter powers on,
//! routes discovery events to the session targeting that address, stops the
//! scan once a connection is established, and resumes it exactly once when a
//! bulb drops off.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::session::{BulbSession, SessionState};
use crate::transport::{EventReceiver, SharedTransport, TransportEvent};

/// Routes adapter events to sessions and arbitrates scanning.
pub struct ScanCoordinator {
    transport: SharedTransport,
    sessions: RwLock<Vec<Arc<BulbSession>>>,
    /// Whether a scan we started is believed to be running. Guards against
    /// issuing duplicate start or stop requests to the adapter.
    scanning: AtomicBool,
}

impl ScanCoordinator {
    /// Create a coordinator for the given transport.
    pub fn new(transport: SharedTransport) -> Arc<Self> {
        Arc::new(Self {
            transport,
            sessions: RwLock::new(Vec::new()),
            scanning: AtomicBool::new(false),
        })
    }

    /// Register a session to receive discovery and disconnect events.
    pub async fn register(&self, session: Arc<BulbSession>) {
        debug!(address = session.address(), "Registering session");
        self.sessions.write().await.push(session);
    }

    /// Spawn the event loop onto the runtime.
    ///
    /// Subscribes before spawning so events emitted immediately after this
    /// call are not lost.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let events = self.transport.subscribe();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run(events).await })
    }

    /// Drive the event loop until the transport's event channel closes.
    ///
    /// An adapter that was powered on before the process started never emits
    /// a power transition, so the loop first queries the current state and
    /// begins scanning right away when the adapter is already up.
    pub async fn run(&self, mut events: EventReceiver) {
        match self.transport.is_powered().await {
            Ok(true) => {
                info!("Adapter already powered on, starting scan");
                self.resume_scan().await;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to query adapter state"),
        }

        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event receiver lagged, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("Transport event channel closed, coordinator stopping");
                    break;
                }
            }
        }
    }

    async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::AdapterStateChanged { powered: true } => {
                info!("Adapter powered on, starting scan");
                self.resume_scan().await;
            }
            TransportEvent::AdapterStateChanged { powered: false } => {
                info!("Adapter powered off, stopping scan");
                self.stop_scan().await;
            }
            TransportEvent::Discovered { address } => {
                self.handle_discovered(&address).await;
            }
            TransportEvent::Disconnected { address, error } => {
                self.handle_disconnected(&address, error).await;
            }
        }
    }

    async fn handle_discovered(&self, address: &str) {
        let session = {
            let sessions = self.sessions.read().await;
            let mut found = None;
            for session in sessions.iter() {
                if session.address() == address
                    && session.state().await == SessionState::Scanning
                {
                    found = Some(Arc::clone(session));
                    break;
                }
            }
            found
        };

        let Some(session) = session else {
            debug!(address, "Ignoring discovery for unclaimed peripheral");
            return;
        };

        info!(address, "Target peripheral discovered");
        // Connecting while a scan runs is unreliable on most stacks.
        self.stop_scan().await;
        if session.establish().await.is_err() {
            // establish() already logged and parked the session in
            // Disconnected; go back to looking for it.
            self.resume_scan().await;
        }
    }

    async fn handle_disconnected(&self, address: &str, error: Option<String>) {
        let mut matched = false;
        let sessions = self.sessions.read().await;
        for session in sessions.iter() {
            if session.address() == address {
                session.mark_disconnected(error.clone()).await;
                matched = true;
            }
        }
        drop(sessions);

        // A drop of some unrelated peripheral must not restart the scan
        // underneath sessions that are happily connected.
        if matched {
            self.resume_scan().await;
        } else {
            debug!(address, "Ignoring disconnect for unclaimed peripheral");
        }
    }

    /// Start scanning unless a scan is already running, and put every
    /// unconnected session back into `Scanning`.
    async fn resume_scan(&self) {
        for session in self.sessions.read().await.iter() {
            session.mark_scanning().await;
        }
        if !self.scanning.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.transport.start_scan().await {
                self.scanning.store(false, Ordering::SeqCst);
                warn!(error = %e, "Failed to start scan");
            }
        }
    }

    async fn stop_scan(&self) {
        if self.scanning.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.transport.stop_scan().await {
                warn!(error = %e, "Failed to stop scan");
            }
        }
    }
}
