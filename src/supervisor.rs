use std::collections::HashMap;
use std::time::Duration;

use aws_config::SdkConfig;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;

use crate::forwarders;
use crate::mapping::Pair;
use crate::rabbitmq::RabbitConsumer;

// How long a worker gets to drain a liveness probe before it is counted as
// stopped.
const CHECK_GRACE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Supervisor is already running")]
    AlreadyRunning,
    #[error("Duplicate forwarder name: {0}")]
    DuplicateForwarder(String),
    #[error("Failed to create forwarder: {0}")]
    ForwarderCreation(String),
}

struct ConsumerChannels {
    check: mpsc::Sender<()>,
    stop: mpsc::Sender<()>,
}

/// Owns the consumer↔forwarder pairs and the workers running them.
///
/// The capacity-1 control channels double as the liveness probe: a worker
/// that has not drained the previous probe token is considered stopped.
pub struct Supervisor {
    pairs: Vec<Pair>,
    aws: SdkConfig,
    consumers: Mutex<HashMap<String, ConsumerChannels>>,
}

impl Supervisor {
    pub fn new(pairs: Vec<Pair>, aws: SdkConfig) -> Self {
        Self {
            pairs,
            aws,
            consumers: Mutex::new(HashMap::new()),
        }
    }

    /// Spawns one worker per pair. Calling this while workers are registered
    /// is a caller error; stop first.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut consumers = self.consumers.lock().await;
        if !consumers.is_empty() {
            return Err(SupervisorError::AlreadyRunning);
        }
        for pair in &self.pairs {
            let name = pair.destination.name.clone();
            if consumers.contains_key(&name) {
                return Err(SupervisorError::DuplicateForwarder(name));
            }
            let forwarder = forwarders::create(&pair.destination, &self.aws)
                .map_err(|e| SupervisorError::ForwarderCreation(e.to_string()))?;
            let consumer = RabbitConsumer::new(&pair.source);

            let (check_tx, check_rx) = mpsc::channel(1);
            let (stop_tx, stop_rx) = mpsc::channel(1);
            log::info!(
                "Started consumer {} with forwarder {}",
                consumer.name(),
                name
            );
            tokio::spawn(consumer.run(forwarder, check_rx, stop_rx));
            consumers.insert(
                name,
                ConsumerChannels {
                    check: check_tx,
                    stop: stop_tx,
                },
            );
        }
        Ok(())
    }

    /// Probes every worker and returns how many failed to respond.
    pub async fn check(&self) -> usize {
        let channels: Vec<(String, mpsc::Sender<()>)> = {
            let consumers = self.consumers.lock().await;
            consumers
                .iter()
                .map(|(name, channels)| (name.clone(), channels.check.clone()))
                .collect()
        };

        let mut stopped = 0;
        for (name, check) in channels {
            // A token still sitting in the channel means the worker never
            // drained the previous probe.
            if check.is_closed() || check.capacity() == 0 {
                log::warn!("Consumer {} did not drain its probe", name);
                stopped += 1;
                continue;
            }
            let _ = check.try_send(());
            sleep(CHECK_GRACE).await;
            if check.is_closed() || check.capacity() == 0 {
                log::warn!("Consumer {} did not drain its probe", name);
                stopped += 1;
            }
        }
        stopped
    }

    /// Stops every worker, then starts the configured pairs again.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        self.stop().await;
        self.start().await
    }

    /// Signals every worker to shut down without waiting for it to exit.
    /// Stopping an already stopped supervisor is a no-op.
    pub async fn stop(&self) {
        let mut consumers = self.consumers.lock().await;
        for (name, channels) in consumers.drain() {
            if channels.stop.try_send(()).is_err() {
                log::warn!("Could not signal stop to consumer {}", name);
            }
        }
    }
}
