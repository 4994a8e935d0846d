//! Core types and traits for the Stubby URL shortener.
//!
//! This crate provides the domain types shared by the storage backends,
//! the shortener service and the HTTP gateway: short codes, caller
//! identity, stored records, the storage port and the workflow trait.

pub mod error;
pub mod identity;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{CoreError, ShortenerError, StorageError};
pub use identity::{OwnerId, RequestContext};
pub use repository::{ReadRepository, Repository, Stats, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{BatchEntry, BatchItem, OwnedUrl, ShortenStatus, Shortened, Shortener};
