use deadpool::managed::{self, Pool, RecycleError, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

/// Hands out libsql connections with foreign keys enforced
pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        // Returns the new value as a row
        conn.query("PRAGMA busy_timeout = 5000", ()).await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        let row = conn.query("SELECT 1", ()).await?.next().await?;
        match row {
            Some(_) => Ok(()),
            None => Err(RecycleError::Message("connection returned no rows".into())),
        }
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

pub fn create_pool(database: Database, size: usize) -> anyhow::Result<LibsqlPool> {
    Ok(Pool::builder(LibsqlManager::new(database)).max_size(size.max(1)).build()?)
}
