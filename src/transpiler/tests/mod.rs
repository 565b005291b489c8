//! Transpiler test modules.
//!
//! - `core`: neutral rendering and parenthesization
//! - `dialects`: per-backend quoting, paging, placeholders and support flags
//! - `roundtrip`: render then re-parse under the same backend's grammar

mod dialects;
