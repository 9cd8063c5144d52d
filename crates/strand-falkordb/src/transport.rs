//! Command transport.
//!
//! `GraphTransport` sends one argument vector and returns the raw reply. The
//! production implementation wraps a redis `ConnectionManager`; tests plug in
//! a scripted transport.

use crate::error::{FalkorError, FalkorResult};
use crate::protocol::Reply;
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use strand_config::GraphStoreConfig;
use tracing::{debug, info};

/// Sends raw commands to the database.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// Execute one command (`args[0]` is the command name).
    async fn execute(&self, args: &[String]) -> FalkorResult<Reply>;

    /// Release the connection. Later `execute` calls fail with `Closed`.
    async fn close(&self) -> FalkorResult<()> {
        Ok(())
    }
}

/// `redis://` (or `rediss://` with TLS) URL for the configured server.
pub fn connection_url(config: &GraphStoreConfig) -> String {
    let scheme = if config.use_tls { "rediss" } else { "redis" };
    let credentials = match (config.user(), config.password()) {
        (Some(user), Some(password)) => format!(
            "{}:{}@",
            urlencoding::encode(user),
            urlencoding::encode(password)
        ),
        (Some(user), None) => format!("{}@", urlencoding::encode(user)),
        (None, Some(password)) => format!(":{}@", urlencoding::encode(password)),
        (None, None) => String::new(),
    };
    format!("{scheme}://{credentials}{}:{}", config.host, config.port)
}

/// Redis-protocol transport over a multiplexed, auto-reconnecting connection.
pub struct RedisTransport {
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisTransport {
    /// Connect, bounded by the configured connection timeout.
    pub async fn connect(config: &GraphStoreConfig) -> FalkorResult<Self> {
        let timeout = config.connection_timeout();
        info!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            "Connecting to FalkorDB"
        );

        let client = redis::Client::open(connection_url(config))
            .map_err(|e| FalkorError::Connection(e.to_string()))?;
        let manager = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| FalkorError::Timeout(timeout))??;

        Ok(Self {
            connection: Mutex::new(Some(manager)),
        })
    }
}

#[async_trait]
impl GraphTransport for RedisTransport {
    async fn execute(&self, args: &[String]) -> FalkorResult<Reply> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| FalkorError::Protocol("empty command".to_string()))?;
        // The manager is a cheap handle onto the shared connection
        let mut connection = self.connection.lock().clone().ok_or(FalkorError::Closed)?;

        let mut command = redis::cmd(name);
        for arg in rest {
            command.arg(arg);
        }
        let value: redis::Value = command.query_async(&mut connection).await?;
        Ok(reply_from_value(value))
    }

    async fn close(&self) -> FalkorResult<()> {
        if self.connection.lock().take().is_some() {
            debug!("Dropped FalkorDB connection");
        }
        Ok(())
    }
}

fn reply_from_value(value: redis::Value) -> Reply {
    match value {
        redis::Value::Nil => Reply::Nil,
        redis::Value::Int(i) => Reply::Int(i),
        redis::Value::Double(d) => Reply::Double(d),
        redis::Value::Boolean(b) => Reply::Bool(b),
        redis::Value::BulkString(bytes) => Reply::Text(String::from_utf8_lossy(&bytes).into_owned()),
        redis::Value::SimpleString(s) => Reply::Text(s),
        redis::Value::VerbatimString { text, .. } => Reply::Text(text),
        redis::Value::Okay => Reply::Text("OK".to_string()),
        redis::Value::Array(items) | redis::Value::Set(items) => {
            Reply::Array(items.into_iter().map(reply_from_value).collect())
        }
        redis::Value::Map(pairs) => Reply::Array(
            pairs
                .into_iter()
                .flat_map(|(k, v)| [reply_from_value(k), reply_from_value(v)])
                .collect(),
        ),
        redis::Value::ServerError(err) => Reply::Error(format!("{err:?}")),
        other => Reply::Text(format!("{other:?}")),
    }
}
