//! Connection helper.

use crate::config::DatabaseConfig;
use crate::error::{MuxError, MuxResult};
use tokio_postgres::NoTls;

/// Open a single connection for `config` and drive it on the tokio runtime.
///
/// Uses `NoTls`. Callers that need TLS or pooling build their own client and hand it to
/// [`crate::Storage::new`].
///
/// # Example
///
/// ```ignore
/// let config = pgmux::DatabaseConfig::from_file("config.ini")?;
/// let client = pgmux::connect(&config).await?;
/// ```
pub async fn connect(config: &DatabaseConfig) -> MuxResult<tokio_postgres::Client> {
    let (client, connection) = config
        .pg_config()
        .connect(NoTls)
        .await
        .map_err(|e| MuxError::Connection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            #[cfg(feature = "tracing")]
            tracing::error!(target: "pgmux.sql", error = %e, "connection error");
            #[cfg(not(feature = "tracing"))]
            eprintln!("pgmux connection error: {e}");
        }
    });

    #[cfg(feature = "tracing")]
    tracing::debug!(
        target: "pgmux.sql",
        host = %config.host,
        db = %config.db,
        "connected"
    );
    Ok(client)
}
