//! protog-compiler
//!
//! This crate implements:
//!  1) A schema loader that runs the protox compiler on a `.proto` file and
//!     resolves one message from the linked descriptor set,
//!  2) A thin, id-addressed descriptor pool over those descriptors,
//!  3) The state-machine graph builder (`Graph`) with its categorized node
//!     index, plus a verifier (key hash collisions, structural invariants),
//!  4) Code generation (`emit_header` / `emit_source` → `String`): a C++
//!     streaming JSON parser specialized to one message type,
//!  5) Error types (`Error`).

pub mod descriptor;
pub mod error;
pub mod gen_cpp;
pub mod graph;
pub mod hash;
pub mod verifier;

pub use descriptor::load_message;
pub use error::Error;
pub use gen_cpp::emit_header;
pub use gen_cpp::emit_source;
pub use graph::Graph;
pub use verifier::verify_graph;
