use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::error::DisplayErrorContext;

use super::{ForwardError, Forwarder};
use crate::mapping::AmazonEntry;

pub const TYPE: &str = "SQS";

/// The slice of the SQS API the forwarder needs.
#[async_trait]
pub trait SqsApi: Send + Sync {
    /// Enqueues a message body, returning the sink-assigned message id.
    async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
    ) -> Result<Option<String>, ForwardError>;
}

#[async_trait]
impl SqsApi for aws_sdk_sqs::Client {
    async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
    ) -> Result<Option<String>, ForwardError> {
        let response = self
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| ForwardError::Sink(DisplayErrorContext(e).to_string()))?;
        Ok(response.message_id().map(str::to_string))
    }
}

/// One-shot enqueuer of message bodies onto an SQS queue.
pub struct SqsForwarder {
    name: String,
    queue_url: String,
    client: Box<dyn SqsApi>,
}

impl SqsForwarder {
    pub fn from_config(entry: &AmazonEntry, aws: &SdkConfig) -> Self {
        Self::new(entry, Box::new(aws_sdk_sqs::Client::new(aws)))
    }

    pub fn new(entry: &AmazonEntry, client: Box<dyn SqsApi>) -> Self {
        log::info!("Created forwarder {}", entry.name);
        Self {
            name: entry.name.clone(),
            queue_url: entry.target.clone(),
            client,
        }
    }
}

#[async_trait]
impl Forwarder for SqsForwarder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&mut self, message: &str) -> Result<(), ForwardError> {
        if message.is_empty() {
            return Err(ForwardError::EmptyMessage);
        }
        let message_id = self
            .client
            .send_message(&self.queue_url, message)
            .await
            .map_err(|e| {
                log::error!("[{}] Could not forward message. Error: {}", self.name, e);
                e
            })?;
        log::info!(
            "[{}] Forward succeeded; message_id={}",
            self.name,
            message_id.as_deref().unwrap_or("<none>")
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ForwardError> {
        Ok(())
    }
}
