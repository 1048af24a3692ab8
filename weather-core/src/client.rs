use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::watch;

use crate::{
    error::LookupError,
    geolocation::Locator,
    model::{LocationQuery, RequestState, WeatherReport},
    provider::WeatherProvider,
};

/// How a lookup ended from the client's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// The lookup was still the latest one and its result is now the state.
    Applied(RequestState),
    /// A newer lookup started first; this one's result was dropped.
    Superseded { generation: u64 },
}

/// A lookup that already holds its generation and shows as `Loading`.
#[derive(Debug)]
#[must_use = "a started lookup only settles once finished"]
pub struct Lookup {
    client: WeatherClient,
    generation: u64,
    query: LocationQuery,
}

impl Lookup {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send the request and publish its result if still the latest.
    pub async fn finish(self) -> Settled {
        self.client.run(self.generation, self.query).await
    }
}

/// Owns the single observable [`RequestState`] and drives lookups into it.
///
/// Every lookup is tagged with a generation number. Only the lookup holding
/// the latest generation may write its result, so a slow answer can never
/// overwrite a newer one. Clones share the same state and counter.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    provider: Arc<dyn WeatherProvider>,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<RequestState>>,
}

impl WeatherClient {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        let (state, _) = watch::channel(RequestState::Idle);
        Self {
            provider,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RequestState {
        self.state.borrow().clone()
    }

    /// Generation of the most recently started lookup (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Look up `query` and publish the outcome unless a newer lookup started.
    ///
    /// Blank city names are rejected before anything changes.
    pub async fn resolve(&self, query: LocationQuery) -> Result<Settled, LookupError> {
        Ok(self.start(query)?.finish().await)
    }

    /// Issue a lookup now and return it unfinished.
    ///
    /// The generation is taken here, synchronously, so lookups rank in the
    /// order `start` was called no matter when they are polled.
    pub fn start(&self, query: LocationQuery) -> Result<Lookup, LookupError> {
        query.validate()?;
        let generation = self.begin(None).unwrap_or_default();
        Ok(Lookup {
            client: self.clone(),
            generation,
            query,
        })
    }

    /// Startup policy: geolocate within `wait`, otherwise fall back to
    /// `fallback_city`. Geolocation failures never reach the state.
    ///
    /// If a manual search starts while the locator is pending, no request is
    /// issued at all.
    pub async fn resolve_startup(
        &self,
        locator: &dyn Locator,
        fallback_city: &str,
        wait: Duration,
    ) -> Result<Settled, LookupError> {
        let seen = self.generation();

        let query = match tokio::time::timeout(wait, locator.locate()).await {
            Ok(Ok(coords)) => LocationQuery::by_coordinates(coords),
            Ok(Err(err)) => {
                log::warn!("geolocation failed ({err}), using {fallback_city}");
                LocationQuery::by_name(fallback_city)?
            }
            Err(_) => {
                log::warn!("geolocation timed out after {wait:?}, using {fallback_city}");
                LocationQuery::by_name(fallback_city)?
            }
        };

        match self.begin(Some(seen)) {
            Some(generation) => Ok(self.run(generation, query).await),
            None => {
                log::debug!("startup lookup dropped, a search started meanwhile");
                Ok(Settled::Superseded { generation: seen })
            }
        }
    }

    /// Bump the generation and enter `Loading` in one step.
    ///
    /// With `expected`, only does so if no other lookup started since.
    fn begin(&self, expected: Option<u64>) -> Option<u64> {
        let mut issued = None;
        self.state.send_if_modified(|state| {
            let current = self.generation.load(Ordering::SeqCst);
            if expected.is_some_and(|e| e != current) {
                return false;
            }
            self.generation.store(current + 1, Ordering::SeqCst);
            *state = RequestState::Loading;
            issued = Some(current + 1);
            true
        });
        issued
    }

    async fn run(&self, generation: u64, query: LocationQuery) -> Settled {
        log::debug!("lookup #{generation} started for {query}");
        let result = self.provider.current(&query).await;
        if let Err(err) = &result {
            log::warn!("lookup #{generation} failed ({}): {err}", err.kind());
        }
        self.settle(generation, result)
    }

    fn settle(&self, generation: u64, result: Result<WeatherReport, LookupError>) -> Settled {
        let next = RequestState::from(result);
        let mut outcome = Settled::Superseded { generation };

        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next.clone();
            outcome = Settled::Applied(next);
            true
        });

        if let Settled::Superseded { .. } = outcome {
            log::debug!("lookup #{generation} superseded, result discarded");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinates;
    use async_trait::async_trait;
    use std::{collections::HashMap, sync::Mutex};
    use tokio::sync::Notify;

    /// Answers from a script; queries listed in `gates` block until released.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        calls: Mutex<Vec<LocationQuery>>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        failures: Mutex<HashMap<String, LookupError>>,
    }

    impl ScriptedProvider {
        fn gate(&self, key: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates.lock().unwrap().insert(key.into(), gate.clone());
            gate
        }

        fn fail(&self, key: &str, err: LookupError) {
            self.failures.lock().unwrap().insert(key.into(), err);
        }

        fn calls(&self) -> Vec<LocationQuery> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn current(&self, query: &LocationQuery) -> Result<WeatherReport, LookupError> {
            let key = query.to_string();
            self.calls.lock().unwrap().push(query.clone());

            let gate = self.gates.lock().unwrap().get(&key).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            if let Some(err) = self.failures.lock().unwrap().get(&key) {
                return Err(err.clone());
            }
            Ok(report(&key))
        }
    }

    #[derive(Debug)]
    struct FixedLocator(Result<Coordinates, LookupError>);

    #[async_trait]
    impl Locator for FixedLocator {
        async fn locate(&self) -> Result<Coordinates, LookupError> {
            self.0.clone()
        }
    }

    /// Signals `entered`, blocks until released, then reports `coords`.
    #[derive(Debug)]
    struct GatedLocator {
        entered: Arc<Notify>,
        gate: Arc<Notify>,
        coords: Coordinates,
    }

    #[async_trait]
    impl Locator for GatedLocator {
        async fn locate(&self) -> Result<Coordinates, LookupError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(self.coords)
        }
    }

    #[derive(Debug)]
    struct HangingLocator;

    #[async_trait]
    impl Locator for HangingLocator {
        async fn locate(&self) -> Result<Coordinates, LookupError> {
            std::future::pending().await
        }
    }

    fn report(city: &str) -> WeatherReport {
        WeatherReport {
            city: city.to_string(),
            country: "IR".into(),
            temperature_c: 20.0,
            feels_like_c: 19.0,
            humidity_pct: 40,
            wind_speed_mps: 1.5,
            description: "few clouds".into(),
            icon: "02d".into(),
            observed_at: None,
        }
    }

    fn setup() -> (Arc<ScriptedProvider>, WeatherClient) {
        let provider = Arc::new(ScriptedProvider::default());
        let client = WeatherClient::new(provider.clone());
        (provider, client)
    }

    async fn wait_for_calls(provider: &ScriptedProvider, n: usize) {
        while provider.calls().len() < n {
            tokio::task::yield_now().await;
        }
    }

    fn name(city: &str) -> LocationQuery {
        LocationQuery::ByName(city.into())
    }

    #[tokio::test]
    async fn name_lookup_goes_through_loading_to_loaded() {
        let (provider, client) = setup();
        let gate = provider.gate("Tehran");
        let mut rx = client.subscribe();

        let task = tokio::spawn({
            let client = client.clone();
            async move { client.resolve(name("Tehran")).await }
        });

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), RequestState::Loading);

        gate.notify_one();
        let settled = task.await.unwrap().unwrap();

        assert_eq!(
            settled,
            Settled::Applied(RequestState::Loaded(report("Tehran")))
        );
        assert_eq!(client.state(), RequestState::Loaded(report("Tehran")));
        assert_eq!(client.generation(), 1);
    }

    #[tokio::test]
    async fn blank_search_changes_nothing() {
        let (provider, client) = setup();
        client.resolve(name("Tabriz")).await.unwrap();
        let before = client.state();

        for input in ["", "   ", "\t"] {
            let err = client.resolve(name(input)).await.unwrap_err();
            assert!(matches!(err, LookupError::Validation(_)));
        }

        assert_eq!(client.state(), before);
        assert_eq!(client.generation(), 1);
        assert_eq!(provider.calls(), vec![name("Tabriz")]);
    }

    #[tokio::test]
    async fn newer_lookup_wins_over_slower_older_one() {
        let (provider, client) = setup();
        let slow_gate = provider.gate("Slowville");

        let slow = tokio::spawn({
            let client = client.clone();
            async move { client.resolve(name("Slowville")).await }
        });
        wait_for_calls(&provider, 1).await;

        let fast = client.resolve(name("Fastburg")).await.unwrap();
        assert_eq!(
            fast,
            Settled::Applied(RequestState::Loaded(report("Fastburg")))
        );

        slow_gate.notify_one();
        let slow = slow.await.unwrap().unwrap();

        assert_eq!(slow, Settled::Superseded { generation: 1 });
        assert_eq!(client.state(), RequestState::Loaded(report("Fastburg")));
    }

    #[tokio::test]
    async fn start_order_decides_the_winner_not_poll_order() {
        let (provider, client) = setup();

        let first = client.start(name("Ahvaz")).unwrap();
        let second = client.start(name("Qom")).unwrap();
        assert_eq!((first.generation(), second.generation()), (1, 2));
        assert_eq!(client.state(), RequestState::Loading);
        assert!(provider.calls().is_empty());

        // Polled in reverse: the later start still wins.
        let second = second.finish().await;
        let first = first.finish().await;

        assert_eq!(
            second,
            Settled::Applied(RequestState::Loaded(report("Qom")))
        );
        assert_eq!(first, Settled::Superseded { generation: 1 });
        assert_eq!(client.state(), RequestState::Loaded(report("Qom")));
    }

    #[tokio::test]
    async fn start_rejects_blank_name_without_issuing() {
        let (_, client) = setup();

        assert!(client.start(name("  ")).is_err());
        assert_eq!(client.generation(), 0);
        assert_eq!(client.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn stale_error_does_not_replace_newer_report() {
        let (provider, client) = setup();
        let gate = provider.gate("Nowhere");
        provider.fail("Nowhere", LookupError::Provider("City not found".into()));

        let stale = tokio::spawn({
            let client = client.clone();
            async move { client.resolve(name("Nowhere")).await }
        });
        wait_for_calls(&provider, 1).await;

        client.resolve(name("Mashhad")).await.unwrap();
        gate.notify_one();
        stale.await.unwrap().unwrap();

        assert_eq!(client.state(), RequestState::Loaded(report("Mashhad")));
    }

    #[tokio::test]
    async fn error_hides_previous_report() {
        let (provider, client) = setup();
        provider.fail("Xyzzyxx123", LookupError::Provider("City not found".into()));

        client.resolve(name("Tehran")).await.unwrap();
        let settled = client.resolve(name("Xyzzyxx123")).await.unwrap();

        assert_eq!(
            settled,
            Settled::Applied(RequestState::Error("City not found".into()))
        );
        assert!(client.state().report().is_none());
    }

    #[tokio::test]
    async fn client_stays_usable_after_error() {
        let (provider, client) = setup();
        provider.fail("Nowhere", LookupError::Transport("offline".into()));

        client.resolve(name("Nowhere")).await.unwrap();
        assert_eq!(client.state(), RequestState::Error("offline".into()));

        client.resolve(name("Yazd")).await.unwrap();
        assert_eq!(client.state(), RequestState::Loaded(report("Yazd")));
    }

    #[tokio::test]
    async fn startup_uses_located_coordinates() {
        let (provider, client) = setup();
        let locator = FixedLocator(Ok(Coordinates {
            latitude: 35.7,
            longitude: 51.4,
        }));

        client
            .resolve_startup(&locator, "Tehran", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(
            provider.calls(),
            vec![LocationQuery::ByCoordinates { lat: 35.7, lon: 51.4 }]
        );
    }

    #[tokio::test]
    async fn startup_falls_back_when_location_denied() {
        let (provider, client) = setup();
        let locator = FixedLocator(Err(LookupError::Capability("denied".into())));

        let settled = client
            .resolve_startup(&locator, "Tehran", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(provider.calls(), vec![name("Tehran")]);
        assert_eq!(
            settled,
            Settled::Applied(RequestState::Loaded(report("Tehran")))
        );
    }

    #[tokio::test]
    async fn startup_falls_back_when_location_times_out() {
        let (provider, client) = setup();

        client
            .resolve_startup(&HangingLocator, "Tehran", Duration::from_millis(20))
            .await
            .unwrap();

        assert_eq!(provider.calls(), vec![name("Tehran")]);
    }

    #[tokio::test]
    async fn manual_search_cancels_pending_startup_lookup() {
        let (provider, client) = setup();
        let entered = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let locator = GatedLocator {
            entered: entered.clone(),
            gate: gate.clone(),
            coords: Coordinates {
                latitude: 35.7,
                longitude: 51.4,
            },
        };

        let startup = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .resolve_startup(&locator, "Tehran", Duration::from_secs(5))
                    .await
            }
        });
        entered.notified().await;

        client.resolve(name("Kerman")).await.unwrap();
        gate.notify_one();
        let startup = startup.await.unwrap().unwrap();

        assert_eq!(startup, Settled::Superseded { generation: 0 });
        assert_eq!(provider.calls(), vec![name("Kerman")]);
        assert_eq!(client.state(), RequestState::Loaded(report("Kerman")));
    }
}
