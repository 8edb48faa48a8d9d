pub mod compare;
pub mod config;
pub mod corpus;
pub mod fingerprint;
pub mod matcher;
pub mod normalize;
