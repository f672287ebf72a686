use crate::error::Error;
use crate::manager::Manager;
use crate::message::PushPortMessage;
use crate::pushport_subscriber::{PushPortSubscriber, PushPortSubscriberConfig};
use crate::store::Store;
use crate::subscriber::Subscriber;

use async_trait::async_trait;

use serde::Deserialize;

use tracing::{info, warn};

#[derive(Clone, Deserialize)]
pub struct PushPortConfig {
    subscriber: PushPortSubscriberConfig,
}

/// Drives the feed: receive an envelope, apply it in one transaction, then
/// acknowledge. A crash between commit and ack costs one harmless
/// reprocessing, never data.
pub struct PushPortManager<S: Store> {
    config: PushPortConfig,
    store: S,
}

impl<S: Store> PushPortManager<S> {
    pub fn new(config: PushPortConfig, store: S) -> PushPortManager<S> {
        PushPortManager { config, store }
    }
}

#[async_trait]
impl<S: Store> Manager for PushPortManager<S> {
    async fn run(&mut self) -> Result<(), Error> {
        let mut subscriber = PushPortSubscriber::new(self.config.subscriber.clone());
        subscriber.subscribe().await?;

        loop {
            let delivery = subscriber.receive().await?;
            match serde_json::from_slice::<PushPortMessage>(&delivery.body) {
                Ok(message) => {
                    self.store.apply_message(&message).await?;
                    if message.is_snapshot() {
                        info!(
                            "applied snapshot envelope: {} schedules, {} associations",
                            message.schedule_messages.len(),
                            message.association_messages.len()
                        );
                    }
                }
                Err(e) => {
                    // redelivery cannot fix a malformed body, so ack it anyway
                    warn!("discarding undecodable envelope: {}", e);
                }
            }
            subscriber.ack(&delivery).await?;
        }
    }
}
