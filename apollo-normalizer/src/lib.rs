//! Normalizes GraphQL responses into flat, deduplicated records.
//!
//! A response is walked against the [`SelectionShape`] of its operation. Every
//! object with an identity becomes one [`Chunk::Record`], later sightings of the
//! same object only add the fields that were not written yet through
//! [`Chunk::Extend`], and links between objects are expressed with run-scoped
//! [`Handle`]s. Chunks are produced children first, so a consumer can apply
//! them one by one and every handle it reads is already known.
//!
//! ```
//! use apollo_normalizer::Normalizer;
//! use apollo_normalizer::SelectionShape;
//!
//! let shape = SelectionShape::from_json(
//!     r#"{ "selections": [{ "kind": "LinkedField", "name": "me", "selections": [{ "kind": "Scalar", "name": "name" }] }] }"#,
//! )?;
//! let normalizer = Normalizer::builder().shape(shape).build()?;
//! let response = serde_json_bytes::json!({ "me": { "__typename": "User", "id": "1", "name": "Alice" } });
//! let chunks = normalizer.normalize(&response)?;
//! assert_eq!(chunks.len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(feature = "failfast", allow(unreachable_code))]
#![warn(unreachable_pub)]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

pub mod chunk;
pub mod configuration;
mod emitter;
pub mod error;
mod executable;
pub mod json_ext;
mod normalizer;
mod registry;
pub mod shape;
mod stream;
pub mod type_condition;

pub use chunk::Chunk;
pub use chunk::FieldValue;
pub use chunk::Fields;
pub use chunk::Handle;
pub use configuration::Configuration;
pub use emitter::ChunkSink;
pub use emitter::JsonLinesSink;
pub use error::NormalizeError;
pub use executable::main;
pub use normalizer::normalize;
pub use normalizer::Normalizer;
pub use shape::SelectionShape;
pub use stream::collect;
pub use stream::ChunkStream;
