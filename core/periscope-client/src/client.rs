//! The introspection client engine.
//!
//! Four interacting state machines share this module:
//! 1. **Heartbeat** — fixed 59 s liveness timer with idle tracking.
//! 2. **Update** — dynamic timer driven by the registered cadences.
//! 3. **Sync** — coalescing single-flight three-phase upload.
//! 4. **Backoff** — prime-spaced retries while the registrar is down.
//!
//! Services provide data through registered producers; the engine owns all
//! protocol mechanics. Timers live in spawned tasks built around
//! `tokio::select!` loops; a watch channel broadcasts shutdown.

use crate::backoff::Backoff;
use crate::config::Config;
use crate::error::{IntrospectionError, IntrospectionResult};
use crate::protocol::{
    ChecksumRequest, ChecksumResponse, ChecksumTable, ComponentUpload, CERTIFICATES_COMPONENT,
    CONNECTIVITY_COMPONENT, HEARTBEAT_COMPONENT, RECENT_LOGS_COMPONENT, SERVICE_INFO_COMPONENT,
};
use crate::registry::Registry;
use crate::standard::{CertificateMonitor, ConnectivityTracker, RecentLogs, ServiceInfo};
use crate::transport;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use periscope_types::{format_utc, now_utc_string, Component, EntityId, Interval};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

/// Fixed heartbeat interval for every service.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(59);

/// Ring capacity of the auto-registered log component.
const LOG_CAPACITY: usize = 100;

/// Peer name under which registrar calls are tracked.
const REGISTRAR_PEER: &str = "registrar";

/// The introspection client.
///
/// Cheap to clone; all clones share the same engine.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct SyncFlags {
    /// A sync loop is currently executing.
    in_flight: bool,
    /// At least one trigger arrived that the loop has not served yet.
    pending: bool,
}

struct Inner {
    config: Config,
    entity_id: EntityId,
    registry: Registry,
    http: reqwest::Client,

    logs: Arc<RecentLogs>,
    connectivity: Arc<ConnectivityTracker>,
    certificates: Arc<CertificateMonitor>,

    running: AtomicBool,
    runtime: Mutex<Option<Handle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    registrations_tx: watch::Sender<()>,

    /// Last real activity. Heartbeat and update-timer syncs never touch it.
    idle_since: Mutex<DateTime<Utc>>,
    heartbeat_reset: Notify,

    backoff: Mutex<Backoff>,
    sync_flags: Mutex<SyncFlags>,
    sync_active_tx: watch::Sender<bool>,
}

impl Client {
    /// Creates a client with the mTLS transport built from `config` and the
    /// standard components auto-registered.
    pub fn new(config: Config) -> IntrospectionResult<Self> {
        config.validate()?;
        let http = transport::build_http2_client(
            &config.cert_path,
            &config.key_path,
            &config.ca_path,
            &config.cert_dir,
        )?;
        Self::with_http_client(config, http)
    }

    /// Creates a client over a caller-supplied HTTP client.
    ///
    /// Useful for tests and for embedding behind a transport built
    /// elsewhere; everything except the TLS setup behaves identically to
    /// [`Client::new`].
    pub fn with_http_client(config: Config, http: reqwest::Client) -> IntrospectionResult<Self> {
        config.validate()?;

        let entity_id = EntityId::new(&config.service_name, &config.server);
        let (shutdown_tx, _) = watch::channel(false);
        let (registrations_tx, _) = watch::channel(());
        let (sync_active_tx, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            registry: Registry::new(entity_id.clone()),
            entity_id,
            http,
            logs: Arc::new(RecentLogs::new(LOG_CAPACITY)),
            connectivity: Arc::new(ConnectivityTracker::new()),
            certificates: Arc::new(CertificateMonitor::new(&config.cert_dir)),
            config,
            running: AtomicBool::new(false),
            runtime: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            registrations_tx,
            // The service just started; that counts as activity.
            idle_since: Mutex::new(Utc::now()),
            heartbeat_reset: Notify::new(),
            backoff: Mutex::new(Backoff::new()),
            sync_flags: Mutex::new(SyncFlags::default()),
            sync_active_tx,
        });

        inner.register_standard_components()?;

        // Error/Warn from service code is real activity and syncs now. The
        // weak reference breaks the logs -> engine -> logs cycle.
        let weak = Arc::downgrade(&inner);
        inner.logs.set_trigger_hook(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.note_activity();
                spawn_sync(&inner, "logs:error-or-warn");
            }
        }));

        info!(
            entity = %inner.entity_id,
            version = %inner.config.version,
            "introspection client initialized"
        );

        Ok(Self { inner })
    }

    /// The entity this client publishes as.
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.inner.entity_id
    }

    /// The log ring. Services log through this to have Error/Warn entries
    /// reach the registrar immediately.
    #[must_use]
    pub fn logs(&self) -> Arc<RecentLogs> {
        Arc::clone(&self.inner.logs)
    }

    /// The connectivity tracker for outbound call reporting.
    #[must_use]
    pub fn connectivity(&self) -> Arc<ConnectivityTracker> {
        Arc::clone(&self.inner.connectivity)
    }

    /// The certificate monitor.
    #[must_use]
    pub fn certificates(&self) -> Arc<CertificateMonitor> {
        Arc::clone(&self.inner.certificates)
    }

    /// Whether the background systems are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Starts the heartbeat and update systems.
    pub async fn start(&self) -> IntrospectionResult<()> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::SeqCst) {
            return Err(IntrospectionError::AlreadyRunning);
        }

        *inner.runtime.lock() = Some(Handle::current());
        inner.shutdown_tx.send_replace(false);

        let heartbeat = tokio::spawn(run_heartbeat(
            Arc::clone(inner),
            inner.shutdown_tx.subscribe(),
        ));
        let update = tokio::spawn(run_update(
            Arc::clone(inner),
            inner.shutdown_tx.subscribe(),
            inner.registrations_tx.subscribe(),
        ));
        inner.tasks.lock().extend([heartbeat, update]);

        inner.logs.info(
            "introspection client started",
            json!({ "heartbeat_interval_sec": HEARTBEAT_INTERVAL.as_secs() }),
        );
        Ok(())
    }

    /// Stops the background systems and waits for an in-flight sync to
    /// finish or abort its backoff sleep.
    pub async fn stop(&self) -> IntrospectionResult<()> {
        let inner = &self.inner;
        if !inner.running.swap(false, Ordering::SeqCst) {
            return Err(IntrospectionError::NotRunning);
        }

        inner.shutdown_tx.send_replace(true);

        let tasks: Vec<JoinHandle<()>> = inner.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        // Quiesce: the sync loop observes shutdown during its next backoff
        // sleep at the latest.
        let mut sync_active = inner.sync_active_tx.subscribe();
        while *sync_active.borrow() {
            if sync_active.changed().await.is_err() {
                break;
            }
        }

        *inner.runtime.lock() = None;

        inner.logs.info(
            "introspection client stopped",
            json!({ "entity_id": inner.entity_id.as_str() }),
        );
        Ok(())
    }

    /// Registers a custom component for the own entity.
    ///
    /// `cadence: None` means the component is published only on an explicit
    /// [`trigger_update`](Self::trigger_update).
    pub fn register<F>(
        &self,
        component_id: &str,
        provider: F,
        cadence: Option<Interval>,
    ) -> IntrospectionResult<()>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let own = self.inner.entity_id.clone();
        self.register_for_entity(&own, component_id, provider, cadence)
    }

    /// Registers a component for any entity (multi-entity support).
    pub fn register_for_entity<F>(
        &self,
        entity_id: &EntityId,
        component_id: &str,
        provider: F,
        cadence: Option<Interval>,
    ) -> IntrospectionResult<()>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.inner
            .registry
            .register_for_entity(entity_id, component_id, Arc::new(provider), cadence)?;
        // Wake the update timer so a new cadence takes effect immediately.
        self.inner.registrations_tx.send_replace(());
        Ok(())
    }

    /// Collects a component now and syncs it out of schedule.
    pub fn trigger_update(&self, component_id: &str) -> IntrospectionResult<()> {
        let own = self.inner.entity_id.clone();
        self.trigger_update_for_entity(&own, component_id)
    }

    /// Collects a component of any entity now and syncs it out of schedule.
    ///
    /// The producer runs synchronously before this returns; the sync itself
    /// is asynchronous. This is real activity: the idle timestamp advances
    /// and the next heartbeat is postponed by a full interval.
    pub fn trigger_update_for_entity(
        &self,
        entity_id: &EntityId,
        component_id: &str,
    ) -> IntrospectionResult<()> {
        self.inner.registry.collect(entity_id, component_id)?;
        self.inner.note_activity();
        spawn_sync(&self.inner, &format!("trigger:{component_id}"));
        Ok(())
    }
}

impl Inner {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn register_standard_components(&self) -> IntrospectionResult<()> {
        // service-info: static facts, published on trigger only.
        let info = ServiceInfo::detect(
            &self.config.service_name,
            &self.config.version,
            self.config.port,
        );
        self.registry
            .register(SERVICE_INFO_COMPONENT, Arc::new(move || info.data()), None)?;

        // recent-logs: slow cadence; Error/Warn additionally sync at once.
        let logs = Arc::clone(&self.logs);
        self.registry.register(
            RECENT_LOGS_COMPONENT,
            Arc::new(move || logs.data()),
            Some(Interval::Slow),
        )?;

        // inter-service-connectivity: slow cadence.
        let connectivity = Arc::clone(&self.connectivity);
        self.registry.register(
            CONNECTIVITY_COMPONENT,
            Arc::new(move || connectivity.data()),
            Some(Interval::Slow),
        )?;

        // certificates: rescan on every collect so renewals surface with
        // the next trigger. The scan runs inside the sync path, hence the
        // non-triggering warning.
        let certificates = Arc::clone(&self.certificates);
        let logs = Arc::clone(&self.logs);
        self.registry.register(
            CERTIFICATES_COMPONENT,
            Arc::new(move || {
                if let Err(err) = certificates.scan() {
                    logs.warn_no_trigger(
                        "certificate scan failed",
                        json!({ "error": err.to_string() }),
                    );
                }
                certificates.data()
            }),
            None,
        )?;

        Ok(())
    }

    /// Real activity: advance the idle timestamp and postpone the next
    /// heartbeat to a full interval from now.
    fn note_activity(&self) {
        *self.idle_since.lock() = Utc::now();
        self.heartbeat_reset.notify_waiters();
    }

    /// Serves pending sync requests until none remain. Only one loop runs
    /// at any instant; requests arriving meanwhile set the pending flag and
    /// are served by exactly one follow-up iteration.
    async fn sync_loop(&self, source: &str) {
        loop {
            {
                let mut flags = self.sync_flags.lock();
                if !flags.pending {
                    flags.in_flight = false;
                    self.sync_active_tx.send_replace(false);
                    return;
                }
                flags.pending = false;
            }

            if !self.sync_with_backoff(source).await {
                // Shutdown aborted the retries.
                let mut flags = self.sync_flags.lock();
                flags.in_flight = false;
                self.sync_active_tx.send_replace(false);
                return;
            }
        }
    }

    /// Runs one triggered sync to completion, retrying with backoff until
    /// it succeeds. The pending flag is deliberately not re-examined here:
    /// a triggered sync finishes before the loop considers the next one.
    /// Returns false when shutdown aborted the retries.
    async fn sync_with_backoff(&self, source: &str) -> bool {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            if *shutdown.borrow() {
                return false;
            }

            match self.three_phase_sync().await {
                Ok(()) => {
                    self.backoff.lock().reset();
                    return true;
                }
                Err(err) => {
                    let delay = self.backoff.lock().advance();
                    self.logs.error_no_trigger(
                        "sync failed, retrying with backoff",
                        json!({
                            "source": source,
                            "error": err.to_string(),
                            "backoff_sec": delay.as_secs(),
                        }),
                    );
                    tokio::select! {
                        () = sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
    }

    /// The three-phase sync: collect, checksum exchange, data upload.
    async fn three_phase_sync(&self) -> IntrospectionResult<()> {
        // Phase 1: refresh every registered component and record checksums.
        let mut checksums: ChecksumTable = HashMap::new();
        for (entity_id, component_ids) in self.registry.all_registered() {
            let table = checksums.entry(entity_id.clone()).or_default();
            for component_id in component_ids {
                match self.registry.collect(&entity_id, &component_id) {
                    Ok(component) => {
                        table.insert(component_id, component.checksum);
                    }
                    Err(err) => {
                        // Skip this component for the cycle; the sync goes on.
                        self.logs.warn_no_trigger(
                            "failed to collect component for checksum table",
                            json!({
                                "entity_id": entity_id.as_str(),
                                "component_id": component_id,
                                "error": err.to_string(),
                            }),
                        );
                    }
                }
            }
        }

        // The heartbeat is synthesised fresh per sync, never registered.
        let heartbeat = self.heartbeat_component();
        checksums
            .entry(self.entity_id.clone())
            .or_default()
            .insert(HEARTBEAT_COMPONENT.to_string(), heartbeat.checksum.clone());

        // Phase 2: checksum exchange.
        let needed = self
            .send_checksums(&ChecksumRequest {
                service: self.config.service_name.clone(),
                server: self.config.server.clone(),
                checksums,
            })
            .await?;

        // Phase 3: upload only what the registrar asked for.
        if needed.values().all(Vec::is_empty) {
            return Ok(());
        }

        let mut components: HashMap<EntityId, Vec<Component>> = HashMap::new();
        for (entity_id, component_ids) in needed {
            for component_id in component_ids {
                let component = if component_id == HEARTBEAT_COMPONENT
                    && entity_id == self.entity_id
                {
                    heartbeat.clone()
                } else {
                    match self.registry.collect(&entity_id, &component_id) {
                        Ok(component) => component,
                        Err(err) => {
                            self.logs.warn_no_trigger(
                                "failed to collect component for upload",
                                json!({
                                    "entity_id": entity_id.as_str(),
                                    "component_id": component_id,
                                    "error": err.to_string(),
                                }),
                            );
                            continue;
                        }
                    }
                };
                components
                    .entry(entity_id.clone())
                    .or_default()
                    .push(component);
            }
        }

        let upload = ComponentUpload {
            service: self.config.service_name.clone(),
            server: self.config.server.clone(),
            components,
        };
        self.send_components(&upload).await?;

        let now = Instant::now();
        for (entity_id, uploaded) in &upload.components {
            for component in uploaded {
                self.registry.mark_synced(entity_id, &component.id, now);
            }
        }
        Ok(())
    }

    /// Synthesises the heartbeat for the own entity. `idle_since` reflects
    /// the last real activity; heartbeat-driven syncs never advance it.
    fn heartbeat_component(&self) -> Component {
        let idle_since = *self.idle_since.lock();
        Component::new(
            HEARTBEAT_COMPONENT,
            json!({
                "heartbeat": now_utc_string(),
                "idle_since": format_utc(idle_since),
            }),
        )
    }

    /// Phase 2: POST the checksum table, returning the component ids the
    /// registrar needs.
    async fn send_checksums(
        &self,
        request: &ChecksumRequest,
    ) -> IntrospectionResult<HashMap<EntityId, Vec<String>>> {
        let url = format!("{}/sync/checksums", self.config.registrar_url);
        let started = Instant::now();
        let result = self.http.post(&url).json(request).send().await;
        let latency = started.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.track_registrar_failure(latency, &err.to_string());
                self.logs.error_no_trigger(
                    "registrar sync failed",
                    json!({
                        "phase": "checksums",
                        "error": err.to_string(),
                        "latency_ms": latency.as_millis() as u64,
                    }),
                );
                return Err(IntrospectionError::Transport(err.to_string()));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            self.track_registrar_failure(latency, &format!("HTTP {}: {body}", status.as_u16()));
            self.logs.error_no_trigger(
                "registrar sync failed",
                json!({
                    "phase": "checksums",
                    "status": status.as_u16(),
                    "error": body,
                    "latency_ms": latency.as_millis() as u64,
                }),
            );
            return Err(IntrospectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<ChecksumResponse>().await {
            Ok(decoded) => {
                self.track_registrar_success(latency);
                Ok(decoded.needed)
            }
            Err(err) => {
                // The HTTP exchange itself succeeded; only the decode failed.
                self.track_registrar_success(latency);
                self.logs.error_no_trigger(
                    "failed to decode registrar response",
                    json!({ "phase": "checksums", "error": err.to_string() }),
                );
                Err(IntrospectionError::Transport(format!(
                    "failed to decode response: {err}"
                )))
            }
        }
    }

    /// Phase 3: POST the requested component data.
    async fn send_components(&self, upload: &ComponentUpload) -> IntrospectionResult<()> {
        let url = format!("{}/sync/components", self.config.registrar_url);
        let started = Instant::now();
        let result = self.http.post(&url).json(upload).send().await;
        let latency = started.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.track_registrar_failure(latency, &err.to_string());
                self.logs.error_no_trigger(
                    "registrar sync failed",
                    json!({
                        "phase": "components",
                        "error": err.to_string(),
                        "latency_ms": latency.as_millis() as u64,
                    }),
                );
                return Err(IntrospectionError::Transport(err.to_string()));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            self.track_registrar_failure(latency, &format!("HTTP {}: {body}", status.as_u16()));
            self.logs.error_no_trigger(
                "registrar sync failed",
                json!({
                    "phase": "components",
                    "status": status.as_u16(),
                    "error": body,
                    "latency_ms": latency.as_millis() as u64,
                }),
            );
            return Err(IntrospectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        self.track_registrar_success(latency);
        Ok(())
    }

    fn track_registrar_success(&self, latency: Duration) {
        self.connectivity
            .track_success(REGISTRAR_PEER, &self.config.registrar_url, latency);
    }

    fn track_registrar_failure(&self, latency: Duration, error: &str) {
        self.connectivity
            .track_failure(REGISTRAR_PEER, &self.config.registrar_url, latency, error);
    }

    /// Collects every due component. Returns true when at least one was due.
    fn collect_due(&self) -> bool {
        let due = self.registry.due_components();
        if due.is_empty() {
            return false;
        }
        for (entity_id, component_ids) in &due {
            for component_id in component_ids {
                if let Err(err) = self.registry.collect(entity_id, component_id) {
                    self.logs.warn_no_trigger(
                        "failed to collect component on update timer",
                        json!({
                            "entity_id": entity_id.as_str(),
                            "component_id": component_id,
                            "error": err.to_string(),
                        }),
                    );
                }
            }
        }
        true
    }
}

/// Requests a sync. If one is executing, the request coalesces into a
/// single follow-up run; otherwise a sync loop is spawned.
fn spawn_sync(inner: &Arc<Inner>, source: &str) {
    if !inner.is_running() {
        debug!(source, "sync requested while not running");
        return;
    }
    let Some(handle) = inner.runtime.lock().clone() else {
        debug!(source, "sync requested before start");
        return;
    };

    {
        let mut flags = inner.sync_flags.lock();
        if flags.in_flight {
            flags.pending = true;
            return;
        }
        flags.in_flight = true;
        flags.pending = true;
        inner.sync_active_tx.send_replace(true);
    }

    let inner = Arc::clone(inner);
    let source = source.to_string();
    handle.spawn(async move {
        inner.sync_loop(&source).await;
    });
}

/// Heartbeat system: a resettable 59 s timer. Each loop iteration restarts
/// the sleep, so a reset notification postpones the next fire by a full
/// interval.
async fn run_heartbeat(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            () = sleep(HEARTBEAT_INTERVAL) => {
                if !inner.is_running() {
                    return;
                }
                // Heartbeat is just another sync trigger; it does NOT count
                // as activity, so idle_since stays put.
                spawn_sync(&inner, "heartbeat-timer");
            }
            () = inner.heartbeat_reset.notified() => {
                // Real activity happened; fall through and re-arm the timer.
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

/// Update system: a dynamic timer that fires at the earliest component
/// deadline. With no cadence-bearing registration it parks until one shows
/// up.
async fn run_update(
    inner: Arc<Inner>,
    mut shutdown: watch::Receiver<bool>,
    mut registrations: watch::Receiver<()>,
) {
    loop {
        let deadline = inner.registry.next_update_time();
        tokio::select! {
            () = wait_until(deadline) => {
                if !inner.is_running() {
                    return;
                }
                if inner.collect_due() {
                    // Scheduled refresh, not activity: idle_since unchanged.
                    spawn_sync(&inner, "update-timer");
                }
            }
            result = registrations.changed() => {
                if result.is_err() {
                    return;
                }
                // A new registration may carry an earlier deadline.
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
