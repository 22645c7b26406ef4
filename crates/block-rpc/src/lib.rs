//! RPC transport: a fixed program/version header over TCP, one
//! request/response pair per connection, no reuse or pipelining.

pub mod client;
pub mod codec;
mod error;
pub mod server;
pub mod wire;

pub use client::RpcClient;
pub use error::RpcError;
pub use wire::{Envelope, Response, RpcMessage, PROGRAM, VERSION};
