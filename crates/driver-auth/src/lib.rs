//! Authentication and session core of the driver SDK.
//!
//! This crate provides:
//! - SMS-code and magic-link sign-in against the driver backend
//! - Session management with single-flight token refresh
//! - Bearer token claims reading and identity resolution
//! - Typed classification of backend failures
//! - Explicit FSM-based session state management

pub mod classifier;
mod claims;
mod error;
mod magic_link;
mod protocol;
mod request;
mod session;
mod session_fsm;
mod transport;

pub use claims::{extract_claims, resolve_identity, IdentityResolution, TokenClaims};
pub use error::{AuthError, AuthErrorKind, AuthResult};
pub use magic_link::parse_magic_link_token;
pub use request::{endpoints, ClientContext, Location, RequestBuilder};
pub use session::{
    SessionManager, SessionStateCallback, DEFAULT_TOKEN_LIFETIME_MS, DEFAULT_TOKEN_TYPE,
};
pub use session_fsm::session_machine;
pub use session_fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionState, SessionStateChanged,
};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport, TransportError};

pub use sdk_config_and_utils::{DeviceInfo, Locale};
pub use token_store::{Credential, FileTokenStore, Identity, MemoryTokenStore, TokenStore};
