use std::convert::TryInto;

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};
use tracing::{debug, instrument};

use runeward_game::accounts::{Account, AccountId, AccountOpError, AccountService};
use runeward_srp::{Salt, SessionKey, Verifier};

/// Accounts over the auth database.
#[derive(Debug, Clone)]
pub struct MySqlAccountService {
    pool: MySqlPool,
}

impl MySqlAccountService {
    pub fn new(pool: MySqlPool) -> Self {
        debug!("starting account service");
        Self { pool }
    }
}

fn persist_err(e: sqlx::Error) -> AccountOpError {
    AccountOpError::PersistError(e.to_string())
}

fn column_bytes<const LEN: usize>(
    row: &sqlx::mysql::MySqlRow,
    column: &str,
) -> Result<[u8; LEN], AccountOpError> {
    let bytes: Vec<u8> = row.try_get(column).map_err(persist_err)?;
    bytes
        .try_into()
        .map_err(|_| AccountOpError::PersistError(format!("malformed {column} column")))
}

#[async_trait]
impl AccountService for MySqlAccountService {
    #[instrument(skip(self))]
    async fn account_by_name(&self, username: &str) -> Result<Option<Account>, AccountOpError> {
        let row = sqlx::query(
            "SELECT id, username, salt, verifier, session_key FROM account WHERE username = ?",
        )
        .bind(username.to_uppercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(persist_err)?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let session_key: Option<Vec<u8>> = row.try_get("session_key").map_err(persist_err)?;
        Ok(Some(Account {
            id: AccountId(row.try_get("id").map_err(persist_err)?),
            username: row.try_get("username").map_err(persist_err)?,
            salt: Salt(column_bytes(&row, "salt")?),
            verifier: Verifier(column_bytes(&row, "verifier")?),
            session_key: session_key.and_then(|k| k.try_into().ok()),
        }))
    }

    #[instrument(skip(self, salt, verifier))]
    async fn create_account(
        &self,
        username: &str,
        salt: Salt,
        verifier: Verifier,
    ) -> Result<AccountId, AccountOpError> {
        if username.len() > 16 {
            return Err(AccountOpError::UsernameTooLong);
        }
        let username = username.to_uppercase();

        if self.account_by_name(&username).await?.is_some() {
            return Err(AccountOpError::AlreadyExists(username));
        }

        let done = sqlx::query("INSERT INTO account (username, salt, verifier) VALUES (?, ?, ?)")
            .bind(&username)
            .bind(&salt.0[..])
            .bind(&verifier.0[..])
            .execute(&self.pool)
            .await
            .map_err(persist_err)?;

        debug!("created account {username}");
        Ok(AccountId(done.last_insert_id() as u32))
    }

    async fn set_session_key(
        &self,
        username: &str,
        key: &SessionKey,
    ) -> Result<(), AccountOpError> {
        sqlx::query("UPDATE account SET session_key = ? WHERE username = ?")
            .bind(&key[..])
            .bind(username.to_uppercase())
            .execute(&self.pool)
            .await
            .map_err(persist_err)?;
        Ok(())
    }

    async fn session_key(&self, username: &str) -> Result<Option<SessionKey>, AccountOpError> {
        let row = sqlx::query("SELECT session_key FROM account WHERE username = ?")
            .bind(username.to_uppercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(persist_err)?;

        Ok(row
            .and_then(|row| row.try_get::<Option<Vec<u8>>, _>("session_key").ok())
            .flatten()
            .and_then(|k| k.try_into().ok()))
    }
}
