use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_redis::{Argon2PasswordHasher, JwtHs256Codec, TokenKind};
use crate::logger::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tokio::sync::RwLock;

fn store_err(e: redis::RedisError) -> DataServiceError {
    DataServiceError::Store(e.to_string())
}

/// Session gateway for a Redis-hosted backend. Accounts are hashes with an
/// argon2 PHC string; refresh token ids are single-use keys expiring with
/// the refresh token. The current session is held in memory.
pub struct RedisSessionGateway {
    conn: ConnectionManager,
    prefix: String,
    codec: JwtHs256Codec,
    hasher: Argon2PasswordHasher,
    current: RwLock<Option<Session>>,
}

impl RedisSessionGateway {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, codec: JwtHs256Codec) -> Self {
        RedisSessionGateway {
            conn,
            prefix: prefix.into(),
            codec,
            hasher: Argon2PasswordHasher,
            current: RwLock::new(None),
        }
    }

    fn account_key(&self, email: &str) -> String {
        format!("{}:account:{}", self.prefix, email)
    }

    fn refresh_key(&self, jti: &str) -> String {
        format!("{}:refresh:{}", self.prefix, jti)
    }

    #[inline]
    fn new_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserId, DataServiceError> {
        let user_id = UserId(uuid::Uuid::new_v4().to_string());
        let password_hash = self.hasher.hash_password(password)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(
                self.account_key(email),
                &[
                    ("user_id", user_id.to_string()),
                    ("password_hash", password_hash),
                ],
            )
            .await
            .map_err(store_err)?;
        Ok(user_id)
    }

    async fn issue(&self, user_id: &UserId) -> Result<Session, DataServiceError> {
        let jti = Self::new_jti();
        let session = self.codec.issue_session(user_id, &jti)?;
        let ttl_secs = self.codec.refresh_ttl().as_secs().max(1);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.refresh_key(&jti), user_id, ttl_secs)
            .await
            .map_err(store_err)?;
        Ok(session)
    }
}

#[async_trait::async_trait]
impl SessionGateway for RedisSessionGateway {
    async fn get_session(&self) -> Result<Option<Session>, DataServiceError> {
        Ok(self.current.read().await.clone())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, DataServiceError> {
        let refresh_token = match self.current.read().await.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => return Ok(None),
        };

        let verified = match self.codec.verify(&refresh_token.0, TokenKind::Refresh) {
            Ok(verified) => verified,
            Err(e) => {
                *self.current.write().await = None;
                return Err(e);
            }
        };

        // Rotation: the old jti is consumed whatever happens next
        let mut conn = self.conn.clone();
        let owner: Option<String> = redis::cmd("GETDEL")
            .arg(self.refresh_key(&verified.jti))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        if owner.as_deref() != Some(verified.user_id.as_str()) {
            warn!(user_id = %verified.user_id, "refresh token already used or revoked");
            *self.current.write().await = None;
            return Err(DataServiceError::TokenInvalid);
        }

        let session = self.issue(&verified.user_id).await?;
        *self.current.write().await = Some(session.clone());
        Ok(Some(session))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, DataServiceError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.account_key(&credentials.email))
            .await
            .map_err(store_err)?;

        let (user_id, password_hash) = match (fields.get("user_id"), fields.get("password_hash")) {
            (Some(user_id), Some(hash)) => (user_id, hash),
            _ => return Err(DataServiceError::InvalidCredentials),
        };
        if !self
            .hasher
            .verify_password(&credentials.password, password_hash)?
        {
            return Err(DataServiceError::InvalidCredentials);
        }

        let user_id = user_id
            .parse::<UserId>()
            .map_err(DataServiceError::InternalError)?;
        let session = self.issue(&user_id).await?;
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), DataServiceError> {
        let previous = self.current.write().await.take();
        if let Some(session) = previous {
            if let Ok(verified) = self.codec.verify(&session.refresh_token.0, TokenKind::Refresh) {
                let mut conn = self.conn.clone();
                let _: i64 = conn
                    .del(self.refresh_key(&verified.jti))
                    .await
                    .map_err(store_err)?;
            }
        }
        Ok(())
    }
}
