// MySQL condition store
use crate::application::condition_store::{ConditionStore, StoreError, StoreSnapshot};
use crate::domain::condition::ConditionReading;
use crate::domain::isu::Isu;
use crate::infrastructure::config::MysqlSettings;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{Executor, MySql, Transaction};

const SELECT_ISU: &str =
    "SELECT `id`, `jia_isu_uuid`, `name`, `character`, `jia_user_id` FROM `isu`";
const SELECT_CONDITION: &str =
    "SELECT `jia_isu_uuid`, `timestamp`, `is_sitting`, `condition`, `message` FROM `isu_condition`";

#[derive(sqlx::FromRow)]
struct IsuRow {
    id: i64,
    jia_isu_uuid: String,
    name: String,
    character: Option<String>,
    jia_user_id: String,
}

impl From<IsuRow> for Isu {
    fn from(row: IsuRow) -> Self {
        Isu {
            id: row.id,
            jia_isu_uuid: row.jia_isu_uuid,
            name: row.name,
            character: row.character.unwrap_or_default(),
            jia_user_id: row.jia_user_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConditionRow {
    jia_isu_uuid: String,
    timestamp: DateTime<Utc>,
    is_sitting: bool,
    condition: String,
    message: String,
}

impl From<ConditionRow> for ConditionReading {
    fn from(row: ConditionRow) -> Self {
        ConditionReading {
            jia_isu_uuid: row.jia_isu_uuid,
            timestamp: row.timestamp,
            is_sitting: row.is_sitting,
            condition: row.condition,
            message: row.message,
        }
    }
}

fn query_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(settings: &MysqlSettings) -> anyhow::Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database);

        // Timestamps are stored and read as UTC.
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET time_zone = '+00:00'").await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to MySQL at {}:{}/{}",
                    settings.host, settings.port, settings.database
                )
            })?;

        Ok(Self { pool })
    }
}

/// One transaction; InnoDB repeatable read gives every query the same view.
struct MySqlSnapshot {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl StoreSnapshot for MySqlSnapshot {
    async fn list_isus(&mut self, jia_user_id: &str) -> Result<Vec<Isu>, StoreError> {
        let rows: Vec<IsuRow> =
            sqlx::query_as(&format!("{} WHERE `jia_user_id` = ? ORDER BY `id` DESC", SELECT_ISU))
                .bind(jia_user_id)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(query_error)?;
        Ok(rows.into_iter().map(Isu::from).collect())
    }

    async fn all_isus(&mut self) -> Result<Vec<Isu>, StoreError> {
        sqlx::query_as::<_, IsuRow>(&format!("{} ORDER BY `id` ASC", SELECT_ISU))
            .fetch(&mut *self.tx)
            .map_ok(Isu::from)
            .try_collect::<Vec<_>>()
            .await
            .map_err(query_error)
    }

    async fn find_isu(
        &mut self,
        jia_user_id: &str,
        jia_isu_uuid: &str,
    ) -> Result<Option<Isu>, StoreError> {
        let row: Option<IsuRow> = sqlx::query_as(&format!(
            "{} WHERE `jia_user_id` = ? AND `jia_isu_uuid` = ?",
            SELECT_ISU
        ))
        .bind(jia_user_id)
        .bind(jia_isu_uuid)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_error)?;
        Ok(row.map(Isu::from))
    }

    async fn latest_reading(
        &mut self,
        jia_isu_uuid: &str,
    ) -> Result<Option<ConditionReading>, StoreError> {
        let row: Option<ConditionRow> = sqlx::query_as(&format!(
            "{} WHERE `jia_isu_uuid` = ? ORDER BY `timestamp` DESC LIMIT 1",
            SELECT_CONDITION
        ))
        .bind(jia_isu_uuid)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_error)?;
        Ok(row.map(ConditionReading::from))
    }

    async fn readings(
        &mut self,
        jia_isu_uuid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConditionReading>, StoreError> {
        let sql = format!(
            "{} WHERE `jia_isu_uuid` = ? AND `timestamp` >= ? AND `timestamp` < ? ORDER BY `timestamp` ASC",
            SELECT_CONDITION
        );
        sqlx::query_as::<_, ConditionRow>(&sql)
            .bind(jia_isu_uuid)
            .bind(from)
            .bind(to)
            .fetch(&mut *self.tx)
            .map_ok(ConditionReading::from)
            .try_collect::<Vec<_>>()
            .await
            .map_err(query_error)
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(query_error)
    }
}

#[async_trait]
impl ConditionStore for MySqlStore {
    async fn snapshot(&self) -> Result<Box<dyn StoreSnapshot>, StoreError> {
        let tx = self.pool.begin().await.map_err(query_error)?;
        Ok(Box::new(MySqlSnapshot { tx }))
    }

    async fn isu_exists(&self, jia_isu_uuid: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM `isu` WHERE `jia_isu_uuid` = ?")
            .bind(jia_isu_uuid)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(count > 0)
    }

    async fn append_readings(&self, readings: &[ConditionReading]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;
        let mut written = 0;

        // At most one reading per (jia_isu_uuid, timestamp); later duplicates,
        // within this batch or against stored rows, write nothing.
        for reading in readings {
            let result = sqlx::query(
                "INSERT INTO `isu_condition` \
                 (`jia_isu_uuid`, `timestamp`, `is_sitting`, `condition`, `message`) \
                 SELECT ?, ?, ?, ?, ? FROM DUAL \
                 WHERE NOT EXISTS (SELECT 1 FROM `isu_condition` \
                 WHERE `jia_isu_uuid` = ? AND `timestamp` = ?)",
            )
            .bind(&reading.jia_isu_uuid)
            .bind(reading.timestamp)
            .bind(reading.is_sitting)
            .bind(&reading.condition)
            .bind(&reading.message)
            .bind(&reading.jia_isu_uuid)
            .bind(reading.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(query_error)?;
        Ok(written)
    }
}
