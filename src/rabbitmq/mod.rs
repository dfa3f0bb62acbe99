pub mod connector;
pub mod consumer;

pub use consumer::RabbitConsumer;
