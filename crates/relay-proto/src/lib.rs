//! # relay-proto
//!
//! Wire vocabulary for the relayd directed-messaging relay.
//!
//! Every payload on the wire is a flat JSON object carried on its own
//! newline-terminated line. Inbound payloads are kept as loosely typed
//! [`Record`]s because the server has to distinguish "field missing" from
//! "field present but not a string". Outbound payloads are produced by the
//! server only, so they are strongly typed as [`Outbound`].
//!
//! ## Quick Start
//!
//! ```rust
//! use relay_proto::{Outbound, simplified, str_field, Record};
//!
//! let record: Record = serde_json::from_str(r#"{"type":"login","username":"  alice  "}"#).unwrap();
//! assert_eq!(str_field(&record, "username").map(simplified).as_deref(), Some("alice"));
//!
//! let reply = Outbound::login_ok();
//! assert_eq!(serde_json::to_string(&reply).unwrap(), r#"{"type":"login","success":true}"#);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

#[cfg(feature = "tokio")]
pub mod codec;
pub mod error;
pub mod outbound;
pub mod record;
pub mod text;

#[cfg(feature = "tokio")]
pub use self::codec::{Decoded, JsonLineCodec, DEFAULT_MAX_LINE_LENGTH};
pub use self::error::CodecError;
pub use self::outbound::{ChatMessage, Outbound};
pub use self::record::{is_type, str_field, Record};
pub use self::text::{casefold, names_eq, simplified};
