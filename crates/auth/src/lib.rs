//! `moviestream-auth` — token issuance/verification, session lifecycle and
//! role checks.
//!
//! This crate is decoupled from HTTP. Storage is reached only through the
//! [`CredentialStore`] contract.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod registration;
pub mod roles;
pub mod session;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use authorize::{AuthnError, AuthzError, authenticate, require_role};
pub use claims::{TokenClaims, TokenError, TokenKind, VerifiedClaims, validate_claims};
pub use principal::Principal;
pub use registration::{Registrar, Registration, RegistrationError};
pub use roles::Role;
pub use session::{
    Credentials, LoginOutcome, RefreshOutcome, RefreshPolicy, SessionConfig, SessionError,
    SessionManager,
};
pub use store::{CredentialStore, Identity, RevocationRecord, StoreError, normalize_username};
pub use token::{IssuedToken, TokenConfig, TokenIssuer, TokenVerifier};
