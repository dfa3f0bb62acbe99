use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_kinesis::error::DisplayErrorContext;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;
use rand::Rng;

use super::{ForwardError, Forwarder};
use crate::mapping::AmazonEntry;

pub const TYPE: &str = "Kinesis";

// PutRecords accepts at most 500 records per request.
const MAX_BATCH_RECORDS: usize = 500;
const DEFAULT_MAX_BUFFER_TIME: Duration = Duration::from_millis(1000);

/// A record waiting for the next batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub data: Vec<u8>,
    pub partition_key: String,
}

/// The slice of the Kinesis API the forwarder needs.
#[async_trait]
pub trait KinesisApi: Send + Sync {
    /// Submits one batch, returning the per-record error codes in request
    /// order (`None` for records the stream accepted).
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[PendingRecord],
    ) -> Result<Vec<Option<String>>, ForwardError>;
}

#[async_trait]
impl KinesisApi for aws_sdk_kinesis::Client {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[PendingRecord],
    ) -> Result<Vec<Option<String>>, ForwardError> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.data.clone()))
                    .partition_key(&record.partition_key)
                    .build()
                    .map_err(|e| ForwardError::Sink(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let response = self
            .put_records()
            .stream_name(stream_name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| ForwardError::Sink(DisplayErrorContext(e).to_string()))?;
        Ok(response
            .records()
            .iter()
            .map(|record| record.error_code().map(str::to_string))
            .collect())
    }
}

/// Buffered publisher onto a Kinesis stream.
///
/// Records accumulate until the buffer holds a full batch or the configured
/// buffer time has passed; records the stream rejects individually are
/// requeued for the next batch.
pub struct KinesisForwarder {
    name: String,
    stream_name: String,
    client: Box<dyn KinesisApi>,
    buffer: Vec<PendingRecord>,
    last_flush: Instant,
    max_buffer_time: Duration,
}

impl KinesisForwarder {
    pub fn from_config(entry: &AmazonEntry, aws: &SdkConfig) -> Self {
        Self::new(entry, Box::new(aws_sdk_kinesis::Client::new(aws)))
    }

    pub fn new(entry: &AmazonEntry, client: Box<dyn KinesisApi>) -> Self {
        let max_buffer_time = entry
            .kinesis_parameters
            .as_ref()
            .and_then(|parameters| parameters.max_queue_buffer_time_millis)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_BUFFER_TIME);
        log::info!("Created forwarder {}", entry.name);
        Self {
            name: entry.name.clone(),
            stream_name: entry.target.clone(),
            client,
            buffer: Vec::new(),
            last_flush: Instant::now(),
            max_buffer_time,
        }
    }

    /// Submits everything buffered as one batch. Records the stream flags
    /// with an error code go back into the buffer in their original relative
    /// order; the last-flush instant advances whether or not the submission
    /// succeeded.
    async fn flush(&mut self) -> Result<(), ForwardError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        log::info!(
            "[{}] Writing out {} records to Kinesis",
            self.name,
            self.buffer.len()
        );
        let pending = std::mem::take(&mut self.buffer);
        let result = self.client.put_records(&self.stream_name, &pending).await;
        self.last_flush = Instant::now();
        match result {
            Ok(outcomes) => {
                let mut failed = 0;
                for (record, error_code) in pending.into_iter().zip(outcomes) {
                    if error_code.is_some() {
                        failed += 1;
                        self.buffer.push(record);
                    }
                }
                if failed > 0 {
                    log::error!("[{}] {} records failed; requeued", self.name, failed);
                }
                Ok(())
            }
            Err(e) => {
                log::error!("[{}] Could not forward batch. Error: {}", self.name, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Forwarder for KinesisForwarder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&mut self, message: &str) -> Result<(), ForwardError> {
        if message.is_empty() {
            return Err(ForwardError::EmptyMessage);
        }
        let partition_key = rand::thread_rng().gen_range(0u32..10_000).to_string();
        self.buffer.push(PendingRecord {
            data: message.as_bytes().to_vec(),
            partition_key,
        });
        if self.last_flush.elapsed() >= self.max_buffer_time
            || self.buffer.len() >= MAX_BATCH_RECORDS
        {
            self.flush().await?;
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ForwardError> {
        log::info!("[{}] Stopping forwarder", self.name);
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::mapping::KinesisParameters;

    struct MockKinesis {
        calls: Arc<Mutex<Vec<(String, Vec<PendingRecord>)>>>,
        responses: Mutex<VecDeque<Result<Vec<Option<String>>, ForwardError>>>,
    }

    #[async_trait]
    impl KinesisApi for MockKinesis {
        async fn put_records(
            &self,
            stream_name: &str,
            records: &[PendingRecord],
        ) -> Result<Vec<Option<String>>, ForwardError> {
            self.calls
                .lock()
                .unwrap()
                .push((stream_name.to_string(), records.to_vec()));
            match self.responses.lock().unwrap().pop_front() {
                Some(response) => response,
                None => Ok(vec![None; records.len()]),
            }
        }
    }

    fn entry(max_buffer_time_millis: u64) -> AmazonEntry {
        AmazonEntry {
            entry_type: TYPE.to_string(),
            name: "audit-stream".to_string(),
            target: "audit".to_string(),
            kinesis_parameters: Some(KinesisParameters {
                max_queue_buffer_time_millis: Some(max_buffer_time_millis),
            }),
        }
    }

    fn forwarder(
        max_buffer_time_millis: u64,
        calls: &Arc<Mutex<Vec<(String, Vec<PendingRecord>)>>>,
        responses: Vec<Result<Vec<Option<String>>, ForwardError>>,
    ) -> KinesisForwarder {
        KinesisForwarder::new(
            &entry(max_buffer_time_millis),
            Box::new(MockKinesis {
                calls: calls.clone(),
                responses: Mutex::new(responses.into()),
            }),
        )
    }

    // An hour; long enough that only the record count can trigger a flush.
    const NEVER_MILLIS: u64 = 3_600_000;

    #[tokio::test]
    async fn an_empty_message_is_rejected_without_buffering() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(NEVER_MILLIS, &calls, Vec::new());

        let err = forwarder.push("").await.unwrap_err();
        assert!(matches!(err, ForwardError::EmptyMessage));
        assert!(forwarder.buffer.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_buffer_until_a_full_batch() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(NEVER_MILLIS, &calls, Vec::new());

        for i in 0..MAX_BATCH_RECORDS {
            forwarder.push(&format!("r{i}")).await.unwrap();
            assert!(forwarder.buffer.len() <= MAX_BATCH_RECORDS);
        }

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (stream, records) = &calls[0];
        assert_eq!(stream, "audit");
        assert_eq!(records.len(), MAX_BATCH_RECORDS);
        assert_eq!(records[0].data, b"r0");
        assert_eq!(records[MAX_BATCH_RECORDS - 1].data, b"r499");
        assert!(forwarder.buffer.is_empty());
    }

    #[tokio::test]
    async fn elapsed_buffer_time_triggers_a_flush() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(0, &calls, Vec::new());

        forwarder.push("hello").await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(forwarder.buffer.is_empty());
    }

    #[tokio::test]
    async fn partition_keys_are_decimal_and_bounded() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(0, &calls, Vec::new());

        forwarder.push("hello").await.unwrap();

        let calls = calls.lock().unwrap();
        let key: u32 = calls[0].1[0].partition_key.parse().unwrap();
        assert!(key < 10_000);
    }

    #[tokio::test]
    async fn rejected_records_are_requeued_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(
            NEVER_MILLIS,
            &calls,
            vec![Ok(vec![
                None,
                Some("ProvisionedThroughputExceededException".to_string()),
                None,
            ])],
        );

        forwarder.push("r0").await.unwrap();
        forwarder.push("r1").await.unwrap();
        forwarder.push("r2").await.unwrap();
        let before = forwarder.last_flush;
        forwarder.flush().await.unwrap();

        assert_eq!(forwarder.buffer.len(), 1);
        assert_eq!(forwarder.buffer[0].data, b"r1");
        assert!(forwarder.last_flush > before);
    }

    #[tokio::test]
    async fn a_transport_error_surfaces_and_advances_the_flush_instant() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(
            NEVER_MILLIS,
            &calls,
            vec![Err(ForwardError::Sink("boom".to_string()))],
        );

        forwarder.push("r0").await.unwrap();
        let before = forwarder.last_flush;
        let err = forwarder.flush().await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert!(forwarder.buffer.is_empty());
        assert!(forwarder.last_flush > before);
    }

    #[tokio::test]
    async fn stop_flushes_whatever_is_buffered() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(NEVER_MILLIS, &calls, Vec::new());

        forwarder.push("r0").await.unwrap();
        assert!(calls.lock().unwrap().is_empty());

        forwarder.stop().await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(forwarder.buffer.is_empty());
    }

    #[tokio::test]
    async fn a_flush_with_nothing_buffered_makes_no_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut forwarder = forwarder(NEVER_MILLIS, &calls, Vec::new());

        forwarder.flush().await.unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }
}
