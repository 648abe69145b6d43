//! Authorization endpoint logic.
//!
//! - [`scope`] - Scope matching
//! - [`code`] - Access request recording and authorization code issuance

pub mod code;
pub mod scope;

pub use code::{AuthCodeIssuer, AuthorizationResponse, AuthorizationService, MAX_INSERT_ATTEMPTS};
pub use scope::{match_scopes, parse_scope_param};
