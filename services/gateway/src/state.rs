use crate::rate_limit::RateLimiter;
use dispatch::{Clock, Dispatcher, DriverRegistry, Notifier, OfferService, RideService, TracingNotifier};
use jsonwebtoken::DecodingKey;
use std::sync::Arc;
use store::{MemoryStore, Store};
use types::config::DispatchConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub dispatcher: Arc<Dispatcher>,
    pub rides: Arc<RideService>,
    pub offers: Arc<OfferService>,
    pub registry: Arc<DriverRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub decoding_key: Arc<DecodingKey>,
}

impl AppState {
    pub fn new(jwt_secret: &[u8], config: DispatchConfig) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let clock = Clock::start();

        let dispatcher = Dispatcher::new(store.clone(), notifier.clone(), config.clone(), clock);
        let rides = Arc::new(RideService::new(
            store.clone(),
            dispatcher.clone(),
            notifier.clone(),
            config.clone(),
            clock,
        ));
        let offers = Arc::new(OfferService::new(
            store.clone(),
            notifier,
            config,
            clock,
        ));
        let registry = Arc::new(DriverRegistry::new(store.clone(), clock));

        Self {
            store,
            dispatcher,
            rides,
            offers,
            registry,
            rate_limiter: Arc::new(RateLimiter::new()),
            decoding_key: Arc::new(DecodingKey::from_secret(jwt_secret)),
        }
    }
}
