use crate::error::Error;

use async_trait::async_trait;

/// One delivered message, held unacked until its envelope is committed.
#[derive(Debug)]
pub struct Delivery {
    pub message_id: String,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Subscriber {
    async fn subscribe(&mut self) -> Result<(), Error>;
    async fn receive(&mut self) -> Result<Delivery, Error>;
    async fn ack(&mut self, delivery: &Delivery) -> Result<(), Error>;
}
