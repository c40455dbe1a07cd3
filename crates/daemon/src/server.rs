// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use courier_core::{Clock, IdGen};
use tokio::net::UnixStream;
use tracing::{debug, error, info};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use crate::service::Service;

/// What the caller should do after a connection was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    Continue,
    Shutdown,
}

/// Handle a single client connection
pub async fn handle_connection<K: Clock, I: IdGen>(
    service: &Service<K, I>,
    stream: UnixStream,
) -> Result<Served, ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(Served::Continue);
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);
    let served = match request {
        Request::Shutdown => Served::Shutdown,
        _ => Served::Continue,
    };

    let response = handle_request(service, request);

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(served)
}

/// Answer one request
pub fn handle_request<K: Clock, I: IdGen>(service: &Service<K, I>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: service.uptime().as_secs(),
            status: Box::new(service.status()),
        },

        Request::Enqueue { decision } => match service.enqueue(decision) {
            Ok(id) => {
                info!(decision_id = %id, "decision enqueued by producer");
                Response::Enqueued { id }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Skip { id, reason } => match service.skip(&id, &reason) {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Query { query } => service.query(query),

        Request::Shutdown => Response::ShuttingDown,
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
