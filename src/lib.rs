//! A typed JMAP client which sends several method calls in one request, lets later calls consume
//! the results of earlier ones through result references, and decodes every response into a
//! typed result or a method-level error.

pub mod batch;
pub mod client;
pub mod jmap;
pub mod reference;
pub mod transport;

pub use batch::{Invocation, Outcome, Projection};
pub use client::Client;
