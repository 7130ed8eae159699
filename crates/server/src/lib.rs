use auth::TokenService;
use db::{DBService, events::OutboxEvent};
use tokio::sync::broadcast;

pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    tokens: TokenService,
    events_tx: broadcast::Sender<OutboxEvent>,
}

impl AppState {
    pub fn new(db: DBService, tokens: TokenService) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            tokens,
            events_tx,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn events_tx(&self) -> &broadcast::Sender<OutboxEvent> {
        &self.events_tx
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OutboxEvent> {
        self.events_tx.subscribe()
    }
}
