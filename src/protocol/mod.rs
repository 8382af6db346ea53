//! Control channel protocol
//!
//! One exchange per bidirectional QUIC stream:
//!
//! ```text
//! Requester                                 Assigner
//!   |------ open bidi stream --------------->|
//!   |------ media URL bytes, FIN ----------->|
//!   |                                        |  assign pub<N>
//!   |<----- "pub<N>" bytes, FIN -------------|
//! ```
//!
//! There is no deduplication: the same URL sent twice gets two names.

pub mod constants;
pub mod message;

pub use message::{PublishAssignment, PublishRequest};
