//! Source database access for table-export.

use crate::batch::{ExportBatch, ExportRecord};
use crate::config::{DatabaseConfig, SslMode};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tracing::{debug, info, instrument};

#[cfg(feature = "tls-native")]
use native_tls::TlsConnector;
#[cfg(feature = "tls-native")]
use postgres_native_tls::MakeTlsConnector;

/// Where exported rows come from.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Test connectivity.
    async fn ping(&self) -> Result<()>;

    /// Fetch rows whose `timestamp_column` is strictly greater than `since`,
    /// ascending by that column.
    async fn fetch_since(
        &self,
        table: &str,
        timestamp_column: &str,
        since: NaiveDateTime,
    ) -> Result<ExportBatch>;

    /// Count the rows [`RowSource::fetch_since`] would return.
    async fn count_since(
        &self,
        table: &str,
        timestamp_column: &str,
        since: NaiveDateTime,
    ) -> Result<i64>;
}

/// PostgreSQL source.
pub struct PostgresSource {
    client: Client,
    connection: JoinHandle<()>,
    config: DatabaseConfig,
}

impl PostgresSource {
    /// Connect to PostgreSQL.
    #[instrument(skip(config), fields(db = %config.describe()))]
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL...");

        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.database)
            .connect_timeout(config.connect_timeout())
            .application_name("table-export")
            .ssl_mode(match config.ssl_mode {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require => tokio_postgres::config::SslMode::Require,
            });
        if !config.password.is_empty() {
            pg.password(&config.password);
        }

        #[cfg(feature = "tls-native")]
        let (client, connection) = {
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(config.accept_invalid_certs)
                .build()
                .map_err(|e| Error::postgres_setup(format!("TLS setup failed: {}", e)))?;
            pg.connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| Error::postgres_connection("Failed to connect", e))?
        };

        #[cfg(not(feature = "tls-native"))]
        let (client, connection) = {
            if config.ssl_mode == SslMode::Require {
                return Err(Error::postgres_setup(
                    "ssl_mode=require needs the tls-native feature",
                ));
            }
            pg.connect(tokio_postgres::NoTls)
                .await
                .map_err(|e| Error::postgres_connection("Failed to connect", e))?
        };

        // Spawn connection handler
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        info!("Connected to PostgreSQL");
        Ok(Self {
            client,
            connection,
            config,
        })
    }

    /// Close the connection and wait for the connection task to finish.
    pub async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            tracing::warn!("PostgreSQL connection task ended abnormally: {}", e);
        }
        info!("Database connection to {} closed", self.config.describe());
    }

    /// Column names of `table`, in table order.
    async fn describe(&self, table: &str) -> Result<Vec<String>> {
        let probe = format!("SELECT * FROM {} LIMIT 0", quote_table(table));
        let statement = self
            .client
            .prepare(&probe)
            .await
            .map_err(|e| Error::postgres_query(table, "Describe failed", e))?;

        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }
}

#[async_trait]
impl RowSource for PostgresSource {
    async fn ping(&self) -> Result<()> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| Error::postgres_query("", "Ping failed", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn fetch_since(
        &self,
        table: &str,
        timestamp_column: &str,
        since: NaiveDateTime,
    ) -> Result<ExportBatch> {
        let columns = self.describe(table).await?;
        if !columns.iter().any(|c| c == timestamp_column) {
            return Err(Error::schema(
                table,
                format!("missing timestamp column '{}'", timestamp_column),
            ));
        }

        let query = select_since(table, timestamp_column, &columns);
        debug!("Executing query: {}", query);

        let rows = self
            .client
            .query(&query, &[&since])
            .await
            .map_err(|e| Error::postgres_query(table, "Fetch failed", e))?;

        let width = columns.len();
        let mut batch = ExportBatch::new(table, columns);
        for row in &rows {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value: Option<String> = row
                    .try_get(i)
                    .map_err(|e| Error::postgres_query(table, "Decode failed", e))?;
                values.push(value);
            }
            let updated_at: Option<NaiveDateTime> = row
                .try_get(width)
                .map_err(|e| Error::postgres_query(table, "Decode failed", e))?;
            let updated_at = updated_at.ok_or_else(|| {
                Error::schema(table, format!("NULL in timestamp column '{}'", timestamp_column))
            })?;
            batch.push(ExportRecord::new(values, updated_at))?;
        }

        debug!("Fetched {} rows from {}", batch.len(), table);
        Ok(batch)
    }

    async fn count_since(
        &self,
        table: &str,
        timestamp_column: &str,
        since: NaiveDateTime,
    ) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE {} > $1::timestamp",
            quote_table(table),
            quote_ident(timestamp_column)
        );

        let row = self
            .client
            .query_one(&query, &[&since])
            .await
            .map_err(|e| Error::postgres_query(table, "Count failed", e))?;

        Ok(row.get(0))
    }
}

/// Build the incremental query. Every column is cast to text so any column
/// type serialises the way PostgreSQL prints it; the timestamp column is
/// selected once more, last, as the high-water mark. The lower bound is `$1`.
fn select_since(table: &str, timestamp_column: &str, columns: &[String]) -> String {
    let ts = quote_ident(timestamp_column);
    let select_list = columns
        .iter()
        .map(|c| format!("{}::text", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "SELECT {}, {}::timestamp FROM {} WHERE {} > $1::timestamp ORDER BY {} ASC",
        select_list,
        ts,
        quote_table(table),
        ts,
        ts
    )
}

/// Quote a single identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name.
fn quote_table(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}
