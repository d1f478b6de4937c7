use crate::domain_model::*;
use crate::domain_port::DataServiceError;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // refresh tokens: key of the rotation record
    typ: TokenKind,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: UserId,
    pub jti: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.cfg.refresh_ttl
    }

    pub fn issue(
        &self,
        user_id: &UserId,
        jti: &str,
        typ: TokenKind,
    ) -> Result<(String, DateTime<Utc>), DataServiceError> {
        let ttl = match typ {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        };
        let iat_dt = Utc::now();
        let exp_dt = iat_dt
            + chrono::Duration::from_std(ttl)
                .map_err(|e| DataServiceError::InternalError(e.to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: jti.to_string(),
            typ,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.cfg.signing_key),
        )
        .map_err(|e| DataServiceError::InternalError(e.to_string()))?;
        Ok((token, exp_dt))
    }

    pub fn verify(&self, token: &str, typ: TokenKind) -> Result<VerifiedToken, DataServiceError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.cfg.signing_key), &v)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => DataServiceError::Unauthorized,
                _ => DataServiceError::TokenInvalid,
            })?;
        if data.claims.typ != typ {
            return Err(DataServiceError::TokenInvalid);
        }
        let user_id = data
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| DataServiceError::TokenInvalid)?;
        Ok(VerifiedToken {
            user_id,
            jti: data.claims.jti,
        })
    }

    /// Access + refresh pair sharing one jti.
    pub fn issue_session(&self, user_id: &UserId, jti: &str) -> Result<Session, DataServiceError> {
        let (access, access_exp) = self.issue(user_id, jti, TokenKind::Access)?;
        let (refresh, _) = self.issue(user_id, jti, TokenKind::Refresh)?;
        Ok(Session {
            access_token: AccessToken(access),
            refresh_token: RefreshToken(refresh),
            expires_at: access_exp,
            user_id: user_id.clone(),
        })
    }
}
