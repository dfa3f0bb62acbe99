//! Supervised RabbitMQ → AWS consume-and-forward bridge.

pub mod config;
pub mod forwarders;
pub mod handlers;
pub mod mapping;
pub mod models;
pub mod rabbitmq;
pub mod supervisor;
