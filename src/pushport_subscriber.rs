use crate::error::Error;
use crate::subscriber::{Delivery, Subscriber};

use async_trait::async_trait;

use serde::Deserialize;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use tokio_stomp::client;
use tokio_stomp::client::ClientTransport;
use tokio_stomp::{AckMode, FromServer, ToServer};

use futures::stream::{SplitSink, SplitStream};
use futures::SinkExt;
use futures::StreamExt;

use tracing::info;

use std::fmt;
use std::sync::Arc;

const PUSH_PORT_HOST: &str = "datafeeds.nationalrail.co.uk:61613";

type StompSink = SplitSink<ClientTransport, tokio_stomp::Message<ToServer>>;

pub struct PushPortSubscriber {
    config: PushPortSubscriberConfig,
    stream: Option<SplitStream<ClientTransport>>,
    sink: Option<Arc<Mutex<StompSink>>>,
    keepalive: Option<JoinHandle<Result<(), Error>>>,
}

#[derive(Clone, Deserialize)]
pub struct PushPortSubscriberConfig {
    username: String,
    password: String,
    queue: String,
}

impl PushPortSubscriber {
    pub fn new(config: PushPortSubscriberConfig) -> Self {
        Self {
            config,
            stream: None,
            sink: None,
            keepalive: None,
        }
    }
}

#[derive(Debug)]
pub struct PushPortError {
    what: String,
}

impl PushPortError {
    fn new(what: &str) -> PushPortError {
        PushPortError {
            what: what.to_string(),
        }
    }
}

impl fmt::Display for PushPortError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error on Push Port STOMP stream: {}", self.what)
    }
}

async fn keep_alive(sink: Arc<Mutex<StompSink>>) -> Result<(), Error> {
    // horrible hacky workaround for tokio_stomp's lack of heartbeat support.
    // I'm truly sorry.
    loop {
        tokio::time::sleep(Duration::from_secs(15)).await;
        sink.lock()
            .await
            .send(
                ToServer::Begin {
                    transaction: "foo".to_string(),
                }
                .into(),
            )
            .await?;
        tokio::time::sleep(Duration::from_secs(15)).await;
        sink.lock()
            .await
            .send(
                ToServer::Abort {
                    transaction: "foo".to_string(),
                }
                .into(),
            )
            .await?;
    }
}

#[async_trait]
impl Subscriber for PushPortSubscriber {
    async fn subscribe(&mut self) -> Result<(), Error> {
        info!("subscribing to Push Port data from National Rail");
        let (mut sink, stream) = client::connect(
            PUSH_PORT_HOST,
            "/".to_string(),
            Some(self.config.username.clone()),
            Some(self.config.password.clone()),
        )
        .await?
        .split();
        self.stream = Some(stream);

        // client-individual ack: a delivery stays on the queue until the
        // envelope's transaction has committed
        sink.send(
            ToServer::Subscribe {
                destination: self.config.queue.clone(),
                id: "1".to_string(),
                ack: Some(AckMode::ClientIndividual),
            }
            .into(),
        )
        .await?;

        // acks and the keepalive share the sink
        let sink = Arc::new(Mutex::new(sink));
        self.sink = Some(sink.clone());
        self.keepalive = Some(tokio::spawn(async move {
            return keep_alive(sink).await;
        }));

        Ok(())
    }

    async fn receive(&mut self) -> Result<Delivery, Error> {
        let msg = match &mut self.stream {
            Some(x) => x.next().await.transpose()?,
            None => {
                return Err(Error::PushPortError(PushPortError::new(
                    "Subscribe not yet called",
                )))
            }
        };
        let msg = match msg {
            Some(x) => x,
            None => {
                return Err(Error::PushPortError(PushPortError::new(
                    "Received empty message",
                )))
            }
        };

        match msg.content {
            FromServer::Message {
                message_id, body, ..
            } => Ok(Delivery {
                message_id,
                body: match body {
                    Some(x) => x,
                    None => return Err(Error::PushPortError(PushPortError::new("No body"))),
                },
            }),
            FromServer::Receipt { .. } => {
                Err(Error::PushPortError(PushPortError::new("Received Receipt")))
            }
            FromServer::Error { message, .. } => Err(Error::PushPortError(PushPortError {
                what: message.unwrap_or_else(|| "unknown server error".to_string()),
            })),
            _ => Err(Error::PushPortError(PushPortError::new(
                "Received unknown message",
            ))),
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), Error> {
        let sink = match &self.sink {
            Some(x) => x,
            None => {
                return Err(Error::PushPortError(PushPortError::new(
                    "Subscribe not yet called",
                )))
            }
        };
        sink.lock()
            .await
            .send(
                ToServer::Ack {
                    id: delivery.message_id.clone(),
                    transaction: None,
                }
                .into(),
            )
            .await?;
        Ok(())
    }
}
