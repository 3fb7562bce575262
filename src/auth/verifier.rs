use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::claims::{AuthenticatedUser, Claims};
use super::errors::AuthError;

const BEARER_PREFIX: &str = "Bearer ";

/// Verifies HS256 bearer tokens against the shared service secret.
///
/// Tokens signed with any other algorithm are rejected, including other HMAC
/// variants and `none`.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub const ALGORITHM: Algorithm = Algorithm::HS256;

    pub fn new(secret: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!secret.is_empty(), "token signing secret must not be empty");

        let mut validation = Validation::new(Self::ALGORITHM);
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Verify the raw value of an `Authorization` header.
    pub fn verify_header(&self, header: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        let header = header.ok_or(AuthError::CredentialMissing)?;
        if header.is_empty() {
            return Err(AuthError::CredentialMissing);
        }

        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::CredentialMalformed)?;

        self.verify_token(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::CredentialInvalid(e.to_string()))?;

        if data.claims.user_id.is_empty() {
            return Err(AuthError::CredentialInvalid("empty subject".to_string()));
        }

        Ok(data.claims.into())
    }
}
