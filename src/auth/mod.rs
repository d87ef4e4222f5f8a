//! Bearer-token authentication for every inbound request.
//!
//! The interceptor runs ahead of all routes. Public paths pass through
//! untouched; anything else needs a valid access token, and the resulting
//! [`Principal`] is handed to handlers through the request extensions.

mod errors;
mod identity;
mod interceptor;
mod paths;

pub use errors::{AUTHENTICATION_EXCEPTION, AuthRejection, ErrorBody, RejectionKind};
pub use identity::{Identity, Principal};
pub use interceptor::{AUTH_USERNAME_HEADER, InterceptorState, authenticate, bearer_token};
pub use paths::{DEFAULT_PUBLIC_PATHS, PublicPaths};
