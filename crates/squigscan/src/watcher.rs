//! PageWatcher — the page-scoped scan session.
//!
//! One tokio task owns the page, the captured responses and the
//! [`CurveStore`]. Everything else talks to it through a [`WatcherHandle`],
//! so scan passes never interleave. The task multiplexes three sources:
//!
//! - a periodic poll, active only while the phase is `Scanning`;
//! - a debounce deadline that coalesces bursts of page mutations;
//! - the event channel (mutations, captured responses, forced re-scans,
//!   queries, shutdown).

use crate::config::ScanConfig;
use crate::error::WatcherError;
use crate::extraction::{
    default_strategies, run_strategies, run_strategy, CapturedResponse, ExtractionStrategy,
    ScanContext, ScanReport,
};
use crate::messages::{AnalysisReport, InboundMessage, OutboundMessage, Reply};
use crate::page::PageSnapshot;
use crate::ranking::{self, FrequencyRange};
use crate::store::{CurveStore, StoreCounts};
use crate::target::TargetKind;
use crate::types::{Measurement, SourceTag};
use serde::Serialize;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Where the session is in its search for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanPhase {
    /// No data yet; periodic re-scans continue.
    Scanning { attempts: u32 },
    /// At least one measurement carries data. Polling stops.
    Found,
    /// The poll budget ran out without data. Polling stops.
    Exhausted,
}

/// Requests answered by the session task.
pub enum Query {
    Counts(oneshot::Sender<StoreCounts>),
    Analyze {
        target: TargetKind,
        range: FrequencyRange,
        reply: oneshot::Sender<AnalysisReport>,
    },
    Phase(oneshot::Sender<ScanPhase>),
    Snapshot(oneshot::Sender<Vec<Measurement>>),
}

/// Events delivered to the session task.
pub enum WatchEvent {
    /// The page changed. Carries the new state when the host captured it.
    Mutated(Option<PageSnapshot>),
    Response(CapturedResponse),
    ForceRescan,
    Query(Query),
    Shutdown,
}

/// Cheap, cloneable sender side of a running session.
#[derive(Clone)]
pub struct WatcherHandle {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl WatcherHandle {
    fn send(&self, event: WatchEvent) -> Result<(), WatcherError> {
        self.tx.send(event).map_err(|_| WatcherError::Closed)
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Query) -> Result<T, WatcherError> {
        let (reply, rx) = oneshot::channel();
        self.send(WatchEvent::Query(make(reply)))?;
        rx.await.map_err(|_| WatcherError::Closed)
    }

    /// Report a page mutation; the scan runs once the page goes quiet.
    pub fn page_mutated(&self, page: Option<PageSnapshot>) -> Result<(), WatcherError> {
        self.send(WatchEvent::Mutated(page))
    }

    pub fn capture(&self, response: CapturedResponse) -> Result<(), WatcherError> {
        self.send(WatchEvent::Response(response))
    }

    pub fn force_rescan(&self) -> Result<(), WatcherError> {
        self.send(WatchEvent::ForceRescan)
    }

    pub fn shutdown(&self) -> Result<(), WatcherError> {
        self.send(WatchEvent::Shutdown)
    }

    pub async fn counts(&self) -> Result<StoreCounts, WatcherError> {
        self.ask(Query::Counts).await
    }

    pub async fn analyze(
        &self,
        target: TargetKind,
        range: FrequencyRange,
    ) -> Result<AnalysisReport, WatcherError> {
        self.ask(|reply| Query::Analyze {
            target,
            range,
            reply,
        })
        .await
    }

    pub async fn phase(&self) -> Result<ScanPhase, WatcherError> {
        self.ask(Query::Phase).await
    }

    pub async fn snapshot(&self) -> Result<Vec<Measurement>, WatcherError> {
        self.ask(Query::Snapshot).await
    }

    /// Dispatch a protocol message. Events are acknowledged as soon as
    /// they are queued.
    pub async fn handle_message(&self, message: InboundMessage) -> Result<Reply, WatcherError> {
        match message {
            InboundMessage::GetMeasurementCount => self.counts().await.map(Reply::Counts),
            InboundMessage::OpenAnalysisModal { target, range } => self
                .analyze(target.unwrap_or_default(), range.unwrap_or_default())
                .await
                .map(Reply::Analysis),
            InboundMessage::PageUpdated { snapshot } => {
                self.page_mutated(snapshot).map(|_| Reply::ack())
            }
            InboundMessage::NetworkResponse(response) => {
                self.capture(response).map(|_| Reply::ack())
            }
            InboundMessage::ForceRescan => self.force_rescan().map(|_| Reply::ack()),
            InboundMessage::Shutdown => self.shutdown().map(|_| Reply::ack()),
        }
    }

    pub fn network_tap(&self) -> NetworkTap {
        NetworkTap {
            tx: self.tx.clone(),
        }
    }
}

/// Forwards copies of fetched responses to the session.
///
/// Forwarding never blocks and never fails the fetch; the caller always
/// gets its own response back unchanged.
#[derive(Clone)]
pub struct NetworkTap {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl NetworkTap {
    /// Forward a copy of `response` if its URL looks like measurement data.
    /// Returns whether it was forwarded.
    pub fn observe(&self, response: &CapturedResponse) -> bool {
        if !crate::extraction::is_measurement_url(&response.url) {
            return false;
        }
        self.tx
            .send(WatchEvent::Response(response.clone()))
            .is_ok()
    }

    /// Run `fetch`, forward a copy of a successful response, and return
    /// the result untouched.
    pub async fn wrap<F, Fut, E>(&self, fetch: F) -> Result<CapturedResponse, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CapturedResponse, E>>,
    {
        let result = fetch().await;
        if let Ok(response) = &result {
            self.observe(response);
        }
        result
    }
}

/// The session state owned by the watcher task.
pub struct PageWatcher {
    page: PageSnapshot,
    responses: Vec<CapturedResponse>,
    store: CurveStore,
    config: ScanConfig,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    phase: ScanPhase,
    last_counts: StoreCounts,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
}

impl PageWatcher {
    /// Start a session for `page` with the default strategies.
    pub fn spawn(
        page: PageSnapshot,
        config: ScanConfig,
    ) -> (
        WatcherHandle,
        mpsc::UnboundedReceiver<OutboundMessage>,
        JoinHandle<ScanPhase>,
    ) {
        Self::spawn_with(page, config, default_strategies())
    }

    pub fn spawn_with(
        page: PageSnapshot,
        config: ScanConfig,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
    ) -> (
        WatcherHandle,
        mpsc::UnboundedReceiver<OutboundMessage>,
        JoinHandle<ScanPhase>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let watcher = PageWatcher {
            page,
            responses: Vec::new(),
            store: CurveStore::new(config.match_policy),
            config,
            strategies,
            phase: ScanPhase::Scanning { attempts: 0 },
            last_counts: StoreCounts::default(),
            outbound,
        };
        let task = tokio::spawn(watcher.run(rx));
        (WatcherHandle { tx }, outbound_rx, task)
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<WatchEvent>) -> ScanPhase {
        let poll_interval = self.config.poll_interval();
        let quiet = self.config.mutation_quiet();
        let mut poll = time::interval_at(Instant::now() + poll_interval, poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut debounce: Option<Instant> = None;

        self.scan("initial");

        loop {
            let polling = matches!(self.phase, ScanPhase::Scanning { .. });
            let deadline = debounce;

            tokio::select! {
                _ = poll.tick(), if polling => self.poll_tick(),
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    debounce = None;
                    self.scan("mutation");
                }
                event = events.recv() => match event {
                    None | Some(WatchEvent::Shutdown) => break,
                    Some(WatchEvent::Mutated(page)) => {
                        if let Some(page) = page {
                            self.page = page;
                        }
                        debounce = Some(Instant::now() + quiet);
                    }
                    Some(WatchEvent::Response(response)) => self.ingest(response),
                    Some(WatchEvent::ForceRescan) => {
                        let cleared = self.store.clear_all();
                        info!(cleared, "forced re-scan");
                        self.phase = ScanPhase::Scanning { attempts: 0 };
                        poll.reset();
                        debounce = None;
                        self.scan("forced");
                    }
                    Some(WatchEvent::Query(query)) => self.answer(query),
                },
            }
        }

        debug!(phase = ?self.phase, "page watcher stopped");
        self.phase
    }

    fn poll_tick(&mut self) {
        let ScanPhase::Scanning { attempts } = self.phase else {
            return;
        };
        let attempts = attempts + 1;
        self.phase = ScanPhase::Scanning { attempts };
        self.scan("poll");

        if matches!(self.phase, ScanPhase::Scanning { .. })
            && attempts >= self.config.max_poll_attempts
        {
            info!(attempts, "no measurement data found, giving up polling");
            self.phase = ScanPhase::Exhausted;
        }
    }

    /// Run every strategy once against the current page state.
    fn scan(&mut self, reason: &'static str) {
        let report = {
            let ctx = ScanContext::new(&self.page, &self.responses, &self.config);
            run_strategies(&self.strategies, &ctx, &mut self.store)
        };
        debug!(reason, candidates = report.candidates, "scan pass");
        self.after_change();
    }

    /// Keep a response for later passes and parse it right away.
    fn ingest(&mut self, response: CapturedResponse) {
        debug!(url = %response.url, "captured network response");
        self.responses.push(response);

        // Only the new response is parsed; earlier ones were merged when
        // they arrived. Parse before trimming so a tiny buffer loses nothing.
        {
            let latest = &self.responses[self.responses.len() - 1..];
            let ctx = ScanContext::new(&self.page, latest, &self.config);
            let mut report = ScanReport::default();
            for strategy in self
                .strategies
                .iter()
                .filter(|s| s.source() == SourceTag::Network)
            {
                run_strategy(strategy.as_ref(), &ctx, &mut self.store, &mut report);
            }
        }

        let keep = self.config.max_captured_responses;
        if self.responses.len() > keep {
            let excess = self.responses.len() - keep;
            self.responses.drain(..excess);
        }
        self.after_change();
    }

    fn after_change(&mut self) {
        let counts = self.store.counts();
        if counts.with_data > 0 && self.phase != ScanPhase::Found {
            info!(total = counts.total, with_data = counts.with_data, "measurement data found");
            self.phase = ScanPhase::Found;
        }
        if counts == self.last_counts {
            return;
        }
        if counts.total != self.last_counts.total {
            let _ = self.outbound.send(OutboundMessage::badge(counts));
        }
        let _ = self.outbound.send(OutboundMessage::status(counts));
        self.last_counts = counts;
    }

    fn answer(&self, query: Query) {
        match query {
            Query::Counts(reply) => {
                let _ = reply.send(self.store.counts());
            }
            Query::Analyze {
                target,
                range,
                reply,
            } => {
                let results = ranking::analyze(
                    &self.store.snapshot(),
                    target,
                    range,
                    self.config.target_step_ratio,
                );
                let _ = reply.send(AnalysisReport {
                    target,
                    range,
                    found: self.store.len(),
                    results,
                });
            }
            Query::Phase(reply) => {
                let _ = reply.send(self.phase);
            }
            Query::Snapshot(reply) => {
                let _ = reply.send(self.store.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Candidate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Counts passes; reports a device with data once `data_after` passes ran.
    struct CountingScan {
        calls: Arc<AtomicUsize>,
        data_after: Option<usize>,
    }

    impl ExtractionStrategy for CountingScan {
        fn source(&self) -> SourceTag {
            SourceTag::Globals
        }

        fn extract(&self, _ctx: &ScanContext<'_>) -> Vec<Candidate> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.data_after {
                Some(n) if calls >= n => vec![Candidate {
                    raw_name: "Moondrop Aria".into(),
                    frequencies: vec![100.0, 1000.0],
                    amplitudes: vec![0.0, 1.0],
                }],
                _ => Vec::new(),
            }
        }
    }

    fn config() -> ScanConfig {
        ScanConfig {
            max_poll_attempts: 3,
            ..ScanConfig::default()
        }
    }

    fn spawn_counting(
        data_after: Option<usize>,
    ) -> (
        WatcherHandle,
        mpsc::UnboundedReceiver<OutboundMessage>,
        JoinHandle<ScanPhase>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![Box::new(CountingScan {
            calls: calls.clone(),
            data_after,
        })];
        let (handle, outbound, task) =
            PageWatcher::spawn_with(PageSnapshot::default(), config(), strategies);
        (handle, outbound, task, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_exhausted() {
        let (handle, _outbound, _task, calls) = spawn_counting(None);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.phase().await.unwrap(), ScanPhase::Exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_found() {
        let (handle, mut outbound, _task, calls) = spawn_counting(Some(2));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.phase().await.unwrap(), ScanPhase::Found);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(
            outbound.recv().await,
            Some(OutboundMessage::UpdateBadge { count: 1 })
        );
        assert_eq!(
            outbound.recv().await,
            Some(OutboundMessage::UpdateMeasurementCount {
                count: 1,
                with_data: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_burst_coalesced() {
        let (handle, _outbound, _task, calls) = spawn_counting(Some(1));
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        for _ in 0..5 {
            handle.page_mutated(None).unwrap();
            time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_rescan_restarts_polling() {
        let (handle, _outbound, _task, calls) = spawn_counting(None);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.phase().await.unwrap(), ScanPhase::Exhausted);

        handle.force_rescan().unwrap();
        assert_eq!(
            handle.phase().await.unwrap(),
            ScanPhase::Scanning { attempts: 0 }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_capture_and_queries() {
        let (handle, _outbound, _task) =
            PageWatcher::spawn(PageSnapshot::default(), ScanConfig::default());
        let tap = handle.network_tap();

        let csv = CapturedResponse::new(
            "https://x.squig.link/data/Sennheiser_HD650.csv",
            Some("text/csv"),
            "Frequency,SPL\n20,0\n1000,0\n10000,0\n",
        );
        let returned: Result<CapturedResponse, std::io::Error> =
            tap.wrap(|| async { Ok(csv.clone()) }).await;
        assert_eq!(returned.unwrap(), csv);
        assert!(!tap.observe(&CapturedResponse::new("/logo.png", None, "")));

        let counts = handle.counts().await.unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.with_data, 1);

        let report = handle
            .analyze(TargetKind::Flat, FrequencyRange::FULL)
            .await
            .unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, "Sennheiser HD650");
        assert_eq!(report.results[0].deviation_db, 0.0);

        // Captured responses survive a forced re-scan.
        handle.force_rescan().unwrap();
        assert_eq!(handle.counts().await.unwrap().with_data, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_parsed_with_single_slot_buffer() {
        let config = ScanConfig {
            max_captured_responses: 1,
            ..ScanConfig::default()
        };
        let (handle, _outbound, _task) = PageWatcher::spawn(PageSnapshot::default(), config);
        for name in ["Sennheiser_HD650", "Moondrop_Aria"] {
            handle
                .capture(CapturedResponse::new(
                    format!("https://x.squig.link/data/{name}.csv"),
                    Some("text/csv"),
                    "20,1\n30,2\n40,3\n",
                ))
                .unwrap();
        }
        assert_eq!(handle.counts().await.unwrap().with_data, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_ignored_without_network_strategy() {
        let (handle, mut outbound, _task) =
            PageWatcher::spawn_with(PageSnapshot::default(), ScanConfig::default(), Vec::new());
        handle
            .capture(CapturedResponse::new(
                "https://x.squig.link/data/Sennheiser_HD650.csv",
                Some("text/csv"),
                "20,1\n30,2\n40,3\n",
            ))
            .unwrap();
        assert_eq!(handle.counts().await.unwrap(), StoreCounts::default());
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_message_and_shutdown() {
        let (handle, _outbound, task) =
            PageWatcher::spawn(PageSnapshot::default(), ScanConfig::default());
        let reply = handle
            .handle_message(InboundMessage::GetMeasurementCount)
            .await
            .unwrap();
        assert_eq!(reply, Reply::Counts(StoreCounts::default()));

        let reply = handle
            .handle_message(InboundMessage::Shutdown)
            .await
            .unwrap();
        assert_eq!(reply, Reply::ack());
        assert!(matches!(task.await.unwrap(), ScanPhase::Scanning { .. }));
        assert_eq!(handle.counts().await, Err(WatcherError::Closed));
    }
}
