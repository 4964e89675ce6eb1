//! CLI command implementations.

pub(crate) mod send;
pub(crate) mod serve;

pub(crate) use send::SendArgs;
pub(crate) use serve::ServeArgs;
