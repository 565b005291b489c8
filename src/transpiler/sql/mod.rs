//! One [`SqlGenerator`](super::SqlGenerator) per backend.

pub mod ansi;
pub mod db2;
pub mod h2;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlserver;
