//! # mqtt-core
//!
//! A lightweight MQTT 3.1.1 client session engine for byte-oriented,
//! event-driven transports (a cellular modem's TCP stack in the
//! originating use case, but the design is transport-agnostic). This
//! crate is the protocol core only: the wire codec, the incremental
//! streaming parser, the connection and subscription state machines, the
//! outstanding-request table, and the keep-alive scheduler. Opening,
//! closing, reading from, and writing to the actual link is left to a
//! small [`Transport`] trait the embedder implements.
//!
//! ## Design
//!
//! The engine is single-threaded and cooperative, not `async`: instead
//! of polling a `Future`, it is driven by explicit calls from the
//! embedder as transport events occur — [`Client::on_connect_active`],
//! [`Client::on_data_received`], [`Client::on_send_complete`],
//! [`Client::on_poll`], [`Client::on_closed`], and
//! [`Client::on_connect_error`]. All outgoing packets are staged into a
//! fixed-capacity ring buffer and sent one contiguous chunk at a time,
//! with only one transport `send` ever outstanding.
//!
//! There is no internal lock. The user's event callback is invoked
//! synchronously from inside the engine, and may call back into
//! `publish`/`subscribe`/`unsubscribe` re-entrantly — this is safe
//! because there is no lock to re-acquire. The callback still must not
//! block and must not retain slices from [`Event::PublishRecv`] past the
//! call.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mqtt_core::{Client, ClientConfig, ClientInfo, Event, QoS, Transport};
//!
//! struct MockTransport;
//! impl Transport for MockTransport {
//!     type Error = ();
//!     fn start(&mut self, _host: &str, _port: u16) -> Result<(), ()> { Ok(()) }
//!     fn send(&mut self, _data: &[u8]) -> Result<(), ()> { Ok(()) }
//!     fn close(&mut self) -> Result<(), ()> { Ok(()) }
//! }
//!
//! let mut client: Client<'_, _, _, (), 256, 256, 8> = Client::new(
//!     MockTransport,
//!     |event: Event<'_, ()>| {
//!         if let Event::Connect { status } = event {
//!             // react to the connection result
//!             let _ = status;
//!         }
//!     },
//!     ClientConfig::default(),
//! );
//!
//! let info = ClientInfo {
//!     client_id: "device-1",
//!     username: None,
//!     password: None,
//!     will: None,
//!     keep_alive_seconds: 60,
//! };
//! client.connect("broker.example.com", 1883, info).unwrap();
//! client.on_connect_active();
//! ```
//!
//! ## Optional Features
//!
//! - `std`: enable `std::error::Error` impls for [`Error`].
//! - `defmt`: forward internal trace/debug/warn logging and
//!   [`Error`]'s `Format` impl through the `defmt` crate, for embedded
//!   debugging.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

mod buffer;
mod client;
mod codec;
mod config;
mod error;
mod event;
mod log;
mod parser;
mod qos;
mod request;
mod transport;

pub use client::{Client, ConnState};
pub use config::{ClientConfig, ClientInfo, Will};
pub use error::Error;
pub use event::{ConnectStatus, Event, RequestResult};
pub use qos::QoS;
pub use transport::Transport;
