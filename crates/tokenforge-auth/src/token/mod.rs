//! Token issuance.
//!
//! - [`graph`] - Builds and persists token graphs
//! - [`response`] - The token endpoint response
//! - [`jwt`] - JWT signing for identity tokens and nonce containers

pub mod graph;
pub mod jwt;
pub mod response;

pub use graph::{TokenGraph, TokenGraphBuilder, TokenGraphRequest, TokenSettings};
pub use jwt::{Jwk, Jwks, JwtError, JwtService, SigningAlgorithm, SigningKeyPair};
pub use response::{TokenClaims, TokenResponse, TokenType};
