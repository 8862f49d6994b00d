// src/transport/mod.rs

pub mod tcp;

pub use tcp::{DataSink, DisconnectSink, TcpTransport};
