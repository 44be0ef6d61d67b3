//! Batching InfluxDB line protocol writer.
//!
//! Build [`Point`]s, queue them on a [`Client`] with [`Client::prepare`] and
//! send them with [`Client::flush`], or send one at a time with
//! [`Client::write_single`]. Every write returns its own result.
//!
//! A failed flush does not put its points back in the buffer: the batch is
//! dropped and the error is returned.

pub mod client;
pub mod config;
pub mod error;
pub mod point;
pub mod timestamp;
pub mod transport;

pub use client::{encode_batch, Client, Flushed};
pub use config::{validate_env_variables, ClientConfig, Protocol};
pub use error::{Result, WriteError};
pub use point::{FieldValue, Point};
pub use timestamp::Precision;
pub use transport::{HttpTransport, Transport, WriteRequest, WriteResponse};
