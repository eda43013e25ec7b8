//! JSON handling that never reserializes the document.
//!
//! [`walker`] rewrites selected string values in place; [`key`] reads the
//! embedded public key(s) and locates array elements.

pub mod key;
pub mod walker;

pub use key::{
    extract_public_key, extract_public_key_array, split_array_objects, DocumentKind,
    PUBLIC_KEY_FIELD,
};
pub use walker::{walk, Scanner, Span};
