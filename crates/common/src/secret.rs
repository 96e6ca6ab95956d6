//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] so every crate in the workspace reaches for the
//! same wrapper. ICE passwords handed out by the media engine travel as
//! `SecretString`: structs deriving `Debug` that hold one print
//! `[REDACTED]` instead of the credential.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct IceCredentials {
//!     ufrag: String,
//!     pwd: SecretString,
//! }
//!
//! let creds = IceCredentials {
//!     ufrag: "a1b2".to_string(),
//!     pwd: SecretString::from("s3cr3t-ice-password"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.pwd.expose_secret(), "s3cr3t-ice-password");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
