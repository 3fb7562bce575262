// ============================================================================
// Credential Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header required")]
    CredentialMissing,

    #[error("Bearer token required")]
    CredentialMalformed,

    #[error("Invalid token: {0}")]
    CredentialInvalid(String),
}
