use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::error::DisplayErrorContext;

use super::{ForwardError, Forwarder};
use crate::mapping::AmazonEntry;

pub const TYPE: &str = "SNS";

/// The slice of the SNS API the forwarder needs.
#[async_trait]
pub trait SnsApi: Send + Sync {
    /// Publishes a message, returning the sink-assigned message id.
    async fn publish(&self, target_arn: &str, message: &str)
        -> Result<Option<String>, ForwardError>;
}

#[async_trait]
impl SnsApi for aws_sdk_sns::Client {
    async fn publish(
        &self,
        target_arn: &str,
        message: &str,
    ) -> Result<Option<String>, ForwardError> {
        let response = self
            .publish()
            .target_arn(target_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| ForwardError::Sink(DisplayErrorContext(e).to_string()))?;
        Ok(response.message_id().map(str::to_string))
    }
}

/// One-shot publisher of message bodies to an SNS topic.
pub struct SnsForwarder {
    name: String,
    topic_arn: String,
    client: Box<dyn SnsApi>,
}

impl SnsForwarder {
    pub fn from_config(entry: &AmazonEntry, aws: &SdkConfig) -> Self {
        Self::new(entry, Box::new(aws_sdk_sns::Client::new(aws)))
    }

    pub fn new(entry: &AmazonEntry, client: Box<dyn SnsApi>) -> Self {
        log::info!("Created forwarder {}", entry.name);
        Self {
            name: entry.name.clone(),
            topic_arn: entry.target.clone(),
            client,
        }
    }
}

#[async_trait]
impl Forwarder for SnsForwarder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&mut self, message: &str) -> Result<(), ForwardError> {
        if message.is_empty() {
            return Err(ForwardError::EmptyMessage);
        }
        let message_id = self
            .client
            .publish(&self.topic_arn, message)
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
