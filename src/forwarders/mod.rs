pub mod kinesis;
pub mod lambda;
pub mod sns;
pub mod sqs;

use async_trait::async_trait;
use aws_config::SdkConfig;
use thiserror::Error;

use crate::mapping::AmazonEntry;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("message is empty")]
    EmptyMessage,
    /// The sink (or the transport in front of it) rejected the payload.
    #[error("{0}")]
    Sink(String),
    /// The function ran but flagged an error in its response.
    #[error("{0}")]
    Function(String),
}

/// One sink the consumer can hand message bodies to.
#[async_trait]
pub trait Forwarder: Send {
    fn name(&self) -> &str;

    /// Hands one message body to the sink. On `Ok` the sink has accepted
    /// responsibility for the payload (for the stream batcher: it has been
    /// buffered).
    async fn push(&mut self, message: &str) -> Result<(), ForwardError>;

    /// Releases the forwarder. Stateless forwarders return immediately; the
    /// stream batcher flushes its buffer first.
    async fn stop(&mut self) -> Result<(), ForwardError>;
}

#[derive(Error, Debug)]
pub enum CreateError {
    #[error("Unknown forwarder type: {0}")]
    UnknownType(String),
}

/// Builds the forwarder for a mapping entry from its type tag.
pub fn create(entry: &AmazonEntry, aws: &SdkConfig) -> Result<Box<dyn Forwarder>, CreateError> {
    log::info!(
        "Creating forwarder {} of type {}",
        entry.name,
        entry.entry_type
    );
    match entry.entry_type.as_str() {
        sns::TYPE => Ok(Box::new(sns::SnsForwarder::from_config(entry, aws))),
        sqs::TYPE => Ok(Box::new(sqs::SqsForwarder::from_config(entry, aws))),
        lambda::TYPE => Ok(Box::new(lambda::LambdaForwarder::from_config(entry, aws))),
        kinesis::TYPE => Ok(Box::new(kinesis::KinesisForwarder::from_config(entry, aws))),
        other => Err(CreateError::UnknownType(other.to_string())),
    }
}
