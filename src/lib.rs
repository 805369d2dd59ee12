//! Change monitor for upstream RSS/Atom feeds and OpenAPI documents.
//!
//! Each run fetches the configured targets, reduces every document to a
//! canonical snapshot ([`normalize`]), compares it with the stored one
//! ([`storage`]) and republishes detected changes as RSS ([`publish`]).

pub mod config;
pub mod diff;
pub mod feed;
pub mod normalize;
pub mod publish;
pub mod run;
pub mod storage;
pub mod util;
