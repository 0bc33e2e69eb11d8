use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::client::PollError;
use super::task::PeriodicTask;
use crate::context::PollContext;
use crate::metrics::prometheus::{record_cycle, record_cycle_latency};
use crate::state::clock::ServerClock;

/// Common envelope of both poll responses.
pub trait PollResponse {
    fn succeeded(&self) -> bool;
    fn server_timestamp(&self) -> Option<&str>;
}

/// One page's fetch and reconcile steps. The poller owns scheduling,
/// backoff and clock sync around them.
#[async_trait]
pub trait PollCycle: Send + Sync + 'static {
    type Response: PollResponse + Send;

    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Self::Response, PollError>;

    fn apply(&mut self, response: Self::Response);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied,
    Failed,
    /// The poller was stopped while the request was in flight.
    Discarded,
}

impl CycleOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Discarded => "discarded",
        }
    }
}

struct Shared<C> {
    cycle: C,
    backoff: Backoff,
}

/// Drives a `PollCycle` on a self-rescheduling loop.
pub struct Poller<C: PollCycle> {
    name: &'static str,
    shared: Arc<Mutex<Shared<C>>>,
    clock: Arc<ServerClock>,
    /// Parent of every loop this poller spawns.
    shutdown: CancellationToken,
    task: Option<PeriodicTask>,
}

impl<C: PollCycle> Poller<C> {
    pub fn new(cycle: C, ctx: &PollContext) -> Self {
        Self {
            name: cycle.name(),
            shared: Arc::new(Mutex::new(Shared {
                cycle,
                backoff: Backoff::new(&ctx.settings),
            })),
            clock: ctx.clock.clone(),
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    /// Begin polling immediately. A no-op while already running.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!(poller = self.name, "already polling");
            return;
        }
        info!(poller = self.name, "starting polling");

        let shared = self.shared.clone();
        let clock = self.clock.clone();
        let token = self.shutdown.child_token();
        self.task = Some(PeriodicTask::spawn(self.name, token, move |token| {
            let shared = shared.clone();
            let clock = clock.clone();
            async move {
                let (outcome, delay) = run_cycle(&shared, &clock, Some(&token)).await;
                (outcome != CycleOutcome::Discarded).then_some(delay)
            }
        }));
    }

    /// Cancel the pending reschedule. A request already in flight still
    /// completes, but its result is dropped.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            info!(poller = self.name, "stopping polling");
            task.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(PeriodicTask::is_alive)
    }

    /// Run a single cycle outside the schedule.
    pub async fn poll_once(&self) -> CycleOutcome {
        run_cycle(&self.shared, &self.clock, None).await.0
    }

    pub async fn interval(&self) -> Duration {
        self.shared.lock().await.backoff.interval(Instant::now())
    }

    pub async fn failures(&self) -> u32 {
        self.shared.lock().await.backoff.failures(Instant::now())
    }

    /// Read access to the cycle, e.g. its view.
    pub async fn inspect<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.shared.lock().await.cycle)
    }
}

impl<C: PollCycle> Drop for Poller<C> {
    fn drop(&mut self) {
        self.stop();
        self.shutdown.cancel();
    }
}

async fn run_cycle<C: PollCycle>(
    shared: &Mutex<Shared<C>>,
    clock: &ServerClock,
    token: Option<&CancellationToken>,
) -> (CycleOutcome, Duration) {
    // Held for the whole cycle so runs of one poller never interleave.
    let mut shared = shared.lock().await;
    let name = shared.cycle.name();
    let started = Instant::now();

    let result = match shared.cycle.fetch().await {
        Ok(response) if !response.succeeded() => Err(PollError::Rejected),
        other => other,
    };

    let outcome = if token.is_some_and(CancellationToken::is_cancelled) {
        debug!(poller = name, "poller stopped mid-flight, discarding response");
        CycleOutcome::Discarded
    } else {
        match result {
            Ok(response) => {
                if let Some(timestamp) = response.server_timestamp() {
                    clock.sync(timestamp);
                }
                shared.cycle.apply(response);
                shared.backoff.record_success(Instant::now());
                CycleOutcome::Applied
            }
            Err(err) => {
                warn!(poller = name, error = %err, "poll failed");
                shared.backoff.record_failure(Instant::now());
                CycleOutcome::Failed
            }
        }
    };

    record_cycle(name, outcome.as_str());
    record_cycle_latency(name, started.elapsed());

    let delay = shared.backoff.interval(Instant::now());
    (outcome, delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollSettings;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Reply {
        ok: bool,
    }

    impl PollResponse for Reply {
        fn succeeded(&self) -> bool {
            self.ok
        }

        fn server_timestamp(&self) -> Option<&str> {
            Some("2000-01-01T00:00:00Z")
        }
    }

    /// Replies from a script; an empty script fails with a transport error.
    struct Scripted {
        script: std::sync::Mutex<VecDeque<Result<bool, ()>>>,
        latency: Duration,
        fetches: Arc<AtomicU32>,
        applied: u32,
    }

    impl Scripted {
        fn new(script: Vec<Result<bool, ()>>, latency: Duration) -> Self {
            Self {
                script: std::sync::Mutex::new(script.into()),
                latency,
                fetches: Arc::new(AtomicU32::new(0)),
                applied: 0,
            }
        }
    }

    #[async_trait]
    impl PollCycle for Scripted {
        type Response = Reply;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self) -> Result<Reply, PollError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(ok)) => Ok(Reply { ok }),
                _ => Err(PollError::Transport("connection refused".into())),
            }
        }

        fn apply(&mut self, _response: Reply) {
            self.applied += 1;
        }
    }

    fn ctx() -> PollContext {
        PollContext::new(Default::default(), PollSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn failures_widen_interval_until_grace_period_ends() {
        let poller = Poller::new(Scripted::new(vec![], Duration::ZERO), &ctx());

        for _ in 0..3 {
            assert_eq!(poller.poll_once().await, CycleOutcome::Failed);
        }
        assert_eq!(poller.interval().await, Duration::from_millis(5_000));
        assert_eq!(poller.failures().await, 3);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(poller.interval().await, Duration::from_millis(1_000));
        assert_eq!(poller.failures().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_false_counts_as_failure_and_syncs_nothing() {
        let context = ctx();
        let poller = Poller::new(Scripted::new(vec![Ok(false)], Duration::ZERO), &context);

        assert_eq!(poller.poll_once().await, CycleOutcome::Failed);
        assert_eq!(poller.failures().await, 1);
        assert_eq!(poller.inspect(|c| c.applied).await, 0);
        assert!(!context.clock.is_synced());
    }

    #[tokio::test(start_paused = true)]
    async fn success_applies_and_syncs_clock() {
        let context = ctx();
        let poller = Poller::new(Scripted::new(vec![Ok(true)], Duration::ZERO), &context);

        assert_eq!(poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(poller.inspect(|c| c.applied).await, 1);
        assert!(context.clock.is_synced());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_flight_discards_and_stops_rescheduling() {
        let cycle = Scripted::new(vec![Ok(true), Ok(true)], Duration::from_millis(300));
        let fetches = cycle.fetches.clone();
        let mut poller = Poller::new(cycle, &ctx());

        poller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        poller.stop();
        assert!(!poller.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(poller.inspect(|c| c.applied).await, 0);
        assert_eq!(poller.failures().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_are_spaced_by_latency_plus_interval() {
        let cycle = Scripted::new(vec![Ok(true); 10], Duration::from_millis(500));
        let fetches = cycle.fetches.clone();
        let mut poller = Poller::new(cycle, &ctx());

        poller.start();
        // Fetches begin at 0, 1500 and 3000ms.
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_runs_one_loop() {
        let cycle = Scripted::new(vec![Ok(true); 10], Duration::ZERO);
        let fetches = cycle.fetches.clone();
        let mut poller = Poller::new(cycle, &ctx());

        poller.start();
        poller.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_polls_again() {
        let cycle = Scripted::new(vec![Ok(true); 10], Duration::ZERO);
        let fetches = cycle.fetches.clone();
        let mut poller = Poller::new(cycle, &ctx());

        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        poller.start();
        assert!(poller.is_running());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(poller.inspect(|c| c.applied).await, 2);
        poller.stop();
    }
}
