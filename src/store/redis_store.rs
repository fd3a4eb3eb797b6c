//! store::redis_store
//!
//! Redis implementation of [`ScriptStore`].
//!
//! # Design
//!
//! One multiplexed connection is opened at construction and cloned per
//! command; clones share the socket. Every command is wrapped in the
//! response timeout, so a hung server surfaces as `StoreError::Timeout`
//! rather than blocking the caller forever.
//!
//! `rediss://` URLs connect over TLS (rustls with the ring provider).
//!
//! Scripts are loaded with `SCRIPT LOAD` and run with `EVALSHA`. A
//! `NOSCRIPT` error is mapped to `StoreError::NoScript` so the script cache
//! can reload.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{ErrorKind, RedisError, Value};
use tokio::time::timeout;
use tracing::debug;

use super::traits::{Reply, ScriptHandle, ScriptStore, StoreError};

/// Store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    response_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

impl RedisStore {
    /// Connect to `url` (`redis://` or `rediss://`).
    ///
    /// # Errors
    ///
    /// - `UnsupportedUrl` if the URL cannot be parsed
    /// - `Connection` / `Timeout` if the server cannot be reached in time
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::UnsupportedUrl(format!("{}: {}", url, e)))?;

        let conn =
            with_timeout(connect_timeout, client.get_multiplexed_async_connection()).await?;
        debug!(url = %redact(url), "connected to redis");

        Ok(Self {
            conn,
            response_timeout,
        })
    }
}

/// Strip credentials from a URL before it is logged.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, RedisError>>,
) -> Result<T, StoreError> {
    match timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(
            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.kind() == ErrorKind::NoScriptError {
            StoreError::NoScript(e.to_string())
        } else if e.is_timeout()
            || e.is_io_error()
            || e.is_connection_dropped()
            || e.is_connection_refusal()
        {
            StoreError::Connection(e.to_string())
        } else if e.kind() == ErrorKind::ResponseError || e.kind() == ErrorKind::ExtensionError {
            StoreError::Script(e.to_string())
        } else {
            StoreError::Protocol(e.to_string())
        }
    }
}

fn to_reply(value: Value) -> Reply {
    match value {
        Value::Nil => Reply::Nil,
        Value::Int(i) => Reply::Int(i),
        other => Reply::Other(format!("{:?}", other)),
    }
}

#[async_trait]
impl ScriptStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn load_script(&self, source: &str) -> Result<ScriptHandle, StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SCRIPT");
        cmd.arg("LOAD").arg(source);

        let sha: String = with_timeout(self.response_timeout, cmd.query_async(&mut conn)).await?;
        Ok(ScriptHandle::new(sha))
    }

    async fn eval(
        &self,
        handle: &ScriptHandle,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply, StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("EVALSHA");
        cmd.arg(handle.as_str()).arg(keys.len());
        for value in keys.iter().chain(args) {
            cmd.arg(value.as_str());
        }

        let value: Value = with_timeout(self.response_timeout, cmd.query_async(&mut conn)).await?;
        Ok(to_reply(value))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(channel).arg(payload);

        with_timeout(self.response_timeout, cmd.query_async(&mut conn)).await
    }
}
