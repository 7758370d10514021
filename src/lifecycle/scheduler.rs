//! In-process hourly trigger, for deployments without an external scheduler.

use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};
use log::{debug, error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Build, Orbit, Rocket,
};

use crate::{
    config::Config,
    lifecycle::engine::LifecycleEngine,
    mail::Mailer,
    scheduled_task::ScheduledTask,
    storage::DocumentStore,
    store::Store,
};

/// Seconds past the hour at which ticks run, so the civil hour has
/// unambiguously begun.
const TICK_OFFSET_SECONDS: i64 = 5;

type Slot = Arc<Mutex<Option<ScheduledTask<()>>>>;

/// Runs a tick shortly after the start of every hour.
pub struct TickScheduler {
    engine: Arc<LifecycleEngine>,
    next: Slot,
}

impl TickScheduler {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self {
            engine,
            next: Default::default(),
        }
    }

    /// Schedule the next tick. Does nothing if one is already scheduled.
    pub async fn start(&self) {
        let mut next = self.next.lock().await;
        if next.is_some() {
            return;
        }
        let run_at = next_run(Utc::now());
        info!("Scheduling lifecycle ticks, first at {run_at}");
        *next = Some(ScheduledTask::new(
            Self::tick(self.engine.clone(), self.next.clone()),
            run_at,
        ));
    }

    /// Cancel the pending tick.
    pub async fn stop(&self) {
        if let Some(task) = self.next.lock().await.take() {
            task.cancel().await;
            info!("Stopped lifecycle ticks");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.next.lock().await.is_some()
    }

    /// Run a tick, then schedule the following one.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn tick(engine: Arc<LifecycleEngine>, next: Slot) -> BoxFuture<'static, ()> {
        async move {
            match engine.process_tick(Utc::now()).await {
                Ok(report) => debug!("Scheduled tick finished: {report:?}"),
                // The next tick covers whatever this one could not reach.
                Err(e) => error!("Scheduled tick failed: {e}"),
            }
            let run_at = next_run(Utc::now());
            let follow_up = Self::tick(engine, next.clone());
            let mut next_locked = next.lock().await;
            // `stop` took the slot while this tick ran.
            if next_locked.is_none() {
                return;
            }
            *next_locked = Some(ScheduledTask::new(follow_up, run_at));
            debug!("Next lifecycle tick at {run_at}");
        }
        .boxed()
    }
}

/// The first tick instant strictly after `now`.
pub fn next_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let offset = Duration::seconds(TICK_OFFSET_SECONDS);
    let this_hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now) + offset;
    if this_hour > now {
        this_hour
    } else {
        this_hour + Duration::hours(1)
    }
}

/// A fairing that builds the [`LifecycleEngine`] during ignition and places it,
/// with a [`TickScheduler`] over it, into managed state. The scheduler is
/// started at liftoff if configured, and stopped at shutdown.
/// This fairing depends on the config, store, mailer and document store
/// being available in managed state, and so must be attached after the
/// fairings responsible for those.
pub struct LifecycleFairing;

#[rocket::async_trait]
impl Fairing for LifecycleFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election lifecycle",
            kind: Kind::Ignite | Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let engine = match (
            rocket.state::<Config>(),
            rocket.state::<Arc<dyn Store>>(),
            rocket.state::<Arc<dyn Mailer>>(),
            rocket.state::<Arc<dyn DocumentStore>>(),
        ) {
            (Some(config), Some(store), Some(mailer), Some(storage)) => LifecycleEngine::new(
                store.clone(),
                mailer.clone(),
                storage.clone(),
                config.clock(),
                config.dispatch_settings(),
            ),
            _ => {
                error!("Collaborators were not available when building the lifecycle engine");
                return Err(rocket);
            }
        };

        let engine = Arc::new(engine);
        let scheduler = TickScheduler::new(engine.clone());
        rocket = rocket.manage(engine).manage(scheduler);
        Ok(rocket)
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let enabled = rocket
            .state::<Config>()
            .map_or(false, Config::internal_scheduler);
        match rocket.state::<TickScheduler>() {
            Some(scheduler) if enabled => scheduler.start().await,
            _ => info!("Lifecycle ticks are driven by the external trigger"),
        }
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(scheduler) = rocket.state::<TickScheduler>() {
            scheduler.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        lifecycle::{
            clock::OrgClock,
            engine::DispatchSettings,
            testing::{FakeMailer, FakeStorage},
        },
        store::MemoryStore,
    };

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn next_run_is_just_after_the_hour() {
        assert_eq!(next_run(at(8, 30, 0)), at(9, 0, 5));
        assert_eq!(next_run(at(8, 0, 5)), at(9, 0, 5));
        assert_eq!(next_run(at(8, 0, 2)), at(8, 0, 5));
        assert_eq!(
            next_run(at(23, 59, 59)),
            Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 5).unwrap()
        );
    }

    #[rocket::async_test]
    async fn start_and_stop() {
        let engine = LifecycleEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FakeMailer::default()),
            Arc::new(FakeStorage::default()),
            OrgClock::new(chrono_tz::Asia::Manila),
            DispatchSettings {
                site_url: "https://eboto.example".to_string(),
                concurrency: 1,
            },
        );
        let scheduler = TickScheduler::new(Arc::new(engine));
        assert!(!scheduler.is_running().await);
        scheduler.start().await;
        scheduler.start().await;
        assert!(scheduler.is_running().await);
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }
}
