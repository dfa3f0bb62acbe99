use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;

use super::{ForwardError, Forwarder};
use crate::mapping::AmazonEntry;

pub const TYPE: &str = "Lambda";

/// The slice of the Lambda API the forwarder needs.
#[async_trait]
pub trait LambdaApi: Send + Sync {
    /// Invokes the function synchronously, returning the function-error tag
    /// from the response, if any.
    async fn invoke(
        &self,
        function_name: &str,
        payload: &[u8],
    ) -> Result<Option<String>, ForwardError>;
}

#[async_trait]
impl LambdaApi for aws_sdk_lambda::Client {
    async fn invoke(
        &self,
        function_name: &str,
        payload: &[u8],
    ) -> Result<Option<String>, ForwardError> {
        let response = self
            .invoke()
            .function_name(function_name)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| ForwardError::Sink(DisplayErrorContext(e).to_string()))?;
        Ok(response.function_error().map(str::to_string))
    }
}

/// Synchronous invoker pushing message bodies as function payloads.
pub struct LambdaForwarder {
    name: String,
    function_name: String,
    client: Box<dyn LambdaApi>,
}

impl LambdaForwarder {
    pub fn from_config(entry: &AmazonEntry, aws: &SdkConfig) -> Self {
        Self::new(entry, Box::new(aws_sdk_lambda::Client::new(aws)))
    }

    pub fn new(entry: &AmazonEntry, client: Box<dyn LambdaApi>) -> Self {
        log::info!("Created forwarder {}", entry.name);
        Self {
            name: entry.name.clone(),
            function_name: entry.target.clone(),
            client,
        }
    }
}

#[async_trait]
impl Forwarder for LambdaForwarder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&mut self, message: &str) -> Result<(), ForwardError> {
        if message.is_empty() {
            return Err(ForwardError::EmptyMessage);
        }
        let function_error = self
            .client
            .invoke(&self.function_name, message.as_bytes())
            .await
            .map_err(|e| {
                log::error!("[{}] Could not forward message. Error: {}", self.name, e);
                e
            })?;
        // A response without a function error is a success regardless of the
        // returned payload.
        if let Some(function_error) = function_error {
            log::error!(
                "[{}] Function returned an error: {}",
                self.name,
                function_error
            );
            return Err(ForwardError::Function(function_error));
        }
        log::info!("[{}] Forward succeeded", self.name);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ForwardError> {
        Ok(())
    }
}
