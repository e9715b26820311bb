//! Subcommand implementations

pub(crate) mod id;
pub(crate) mod inspect;
pub(crate) mod replay;
