//! Transports carrying the wire protocol.
//!
//! Framing is one JSON document per line; the transport is opaque to
//! callers and defines no public wire format. Two implementations:
//! [`StreamClient`]/[`StreamServer`] over the stdio pipes of a spawned
//! manager process, and [`ChannelClient`]/[`ChannelServer`] over in-memory
//! channels for thread-mode sharing and tests. The channel pair still
//! encodes every message, so value-only marshaling is enforced on both
//! transports.

use super::protocol::{Request, Response};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::sync::mpsc;

/// Worker side of a connection: one blocking call per request.
pub trait ClientTransport: Send {
	fn call(&mut self, request: &Request) -> Result<Response>;
}

/// Manager side of a connection.
pub trait ServerTransport: Send {
	/// Next incoming request; `None` once the peer has gone away.
	fn next_request(&mut self) -> Option<Result<Request>>;

	fn reply(&mut self, response: &Response) -> Result<()>;
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
	serde_json::to_string(value).map_err(|e| Error::Marshaling(e.to_string()))
}

fn decode<T: DeserializeOwned>(line: &str) -> Result<T> {
	serde_json::from_str(line.trim_end()).map_err(|e| Error::Marshaling(e.to_string()))
}

fn connection_lost(context: &str, e: std::io::Error) -> Error {
	Error::ManagerUnavailable(format!("{context}: {e}"))
}

/// Client over a byte-stream pair (the spawned manager's stdin/stdout).
pub struct StreamClient {
	reader: Box<dyn BufRead + Send>,
	writer: Box<dyn Write + Send>,
}

impl StreamClient {
	pub fn new(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
		Self { reader, writer }
	}
}

impl ClientTransport for StreamClient {
	fn call(&mut self, request: &Request) -> Result<Response> {
		let line = encode(request)?;
		self
			.writer
			.write_all(line.as_bytes())
			.and_then(|()| self.writer.write_all(b"\n"))
			.and_then(|()| self.writer.flush())
			.map_err(|e| connection_lost("send failed", e))?;

		let mut reply = String::new();
		let n = self
			.reader
			.read_line(&mut reply)
			.map_err(|e| connection_lost("receive failed", e))?;
		if n == 0 {
			return Err(Error::ManagerUnavailable("connection closed".to_string()));
		}
		decode(&reply)
	}
}

/// Server over a byte-stream pair (the manager process's own stdio).
pub struct StreamServer {
	reader: Box<dyn BufRead + Send>,
	writer: Box<dyn Write + Send>,
}

impl StreamServer {
	pub fn new(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
		Self { reader, writer }
	}
}

impl ServerTransport for StreamServer {
	fn next_request(&mut self) -> Option<Result<Request>> {
		let mut line = String::new();
		match self.reader.read_line(&mut line) {
			Ok(0) => None,
			Ok(_) => Some(decode(&line)),
			Err(e) => Some(Err(connection_lost("receive failed", e))),
		}
	}

	fn reply(&mut self, response: &Response) -> Result<()> {
		let line = encode(response)?;
		self
			.writer
			.write_all(line.as_bytes())
			.and_then(|()| self.writer.write_all(b"\n"))
			.and_then(|()| self.writer.flush())
			.map_err(|e| connection_lost("send failed", e))
	}
}

/// Client half of an in-memory connection.
pub struct ChannelClient {
	tx: mpsc::Sender<String>,
	rx: mpsc::Receiver<String>,
}

/// Server half of an in-memory connection.
pub struct ChannelServer {
	rx: mpsc::Receiver<String>,
	tx: mpsc::Sender<String>,
}

/// Creates a connected in-memory client/server pair.
pub fn channel_pair() -> (ChannelClient, ChannelServer) {
	let (request_tx, request_rx) = mpsc::channel();
	let (response_tx, response_rx) = mpsc::channel();
	(
		ChannelClient {
			tx: request_tx,
			rx: response_rx,
		},
		ChannelServer {
			rx: request_rx,
			tx: response_tx,
		},
	)
}

impl ClientTransport for ChannelClient {
	fn call(&mut self, request: &Request) -> Result<Response> {
		let line = encode(request)?;
		self
			.tx
			.send(line)
			.map_err(|_| Error::ManagerUnavailable("manager thread terminated".to_string()))?;
		let reply = self
			.rx
			.recv()
			.map_err(|_| Error::ManagerUnavailable("manager thread terminated".to_string()))?;
		decode(&reply)
	}
}

impl ServerTransport for ChannelServer {
	fn next_request(&mut self) -> Option<Result<Request>> {
		let line = self.rx.recv().ok()?;
		Some(decode(&line))
	}

	fn reply(&mut self, response: &Response) -> Result<()> {
		let line = encode(response)?;
		self
			.tx
			.send(line)
			.map_err(|_| Error::ManagerUnavailable("client gone".to_string()))
	}
}
