// ============================================================================
// Identity Verifier
// ============================================================================
//
// Turns an `Authorization: Bearer <token>` header into an AuthenticatedUser.
// Pure with respect to (credential, shared secret); no I/O.
//
// ============================================================================

mod claims;
mod errors;
mod extractor;
mod verifier;

pub use claims::AuthenticatedUser;
pub use errors::AuthError;
pub use verifier::TokenVerifier;

#[cfg(test)]
pub(crate) use verifier::test_tokens;
