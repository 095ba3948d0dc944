//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → trie.rs (domain child, then path segments)
//!     → Return: matched backend or explicit no-match
//!
//! Trie Construction (on every registry mutation):
//!     services list
//!     → insert each backend under its domain + path segments
//!     → freeze as the new generation, swapped under the write lock
//! ```
//!
//! # Design Decisions
//! - Each generation is immutable after construction; mutations rebuild
//! - O(1) HashMap hops per segment, no regex on the lookup path
//! - Longest matching prefix wins; explicit None rather than a default route

pub mod trie;

pub use trie::RoutingTrie;
