pub mod identity;
pub mod metrics;

pub use identity::{
    identity_middleware, AuthenticatedUser, Caller, IdentityClaims, TokenVerifier,
};
pub use metrics::metrics_middleware;
