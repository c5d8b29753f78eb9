pub mod conformance;
pub mod dimension;
pub mod domain;
pub mod error;
pub mod protocol;
