//! Metadata: dynamically typed values in an immutable layered store.
//!
//! # Example
//!
//! ```ignore
//! use folio::meta::{MetadataStack, MetaValue};
//!
//! let settings = MetadataStack::from_items([("Host", "example.com"), ("PageSize", "10")]);
//! let page = settings.push([("Title", "Home")]);
//!
//! assert_eq!(page.get_as::<usize>("pagesize"), Some(10));
//! assert!(!settings.contains_key("Title"));
//! ```

pub mod keys;
mod stack;
mod value;

pub use stack::MetadataStack;
pub use value::{FromMeta, MetaValue};
