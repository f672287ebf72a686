use crate::error::Error;

use async_trait::async_trait;

/// A long-running feed loop: subscribe, then apply envelopes until the
/// transport or the store fails.
#[async_trait]
pub trait Manager {
    async fn run(&mut self) -> Result<(), Error>;
}
