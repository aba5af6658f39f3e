//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements one step. The external converter and the
//! built-in renderer are independent backends; the orchestrator in
//! [`crate::convert`] decides which one runs.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ external ──(Converted)──────────────────────────────▶ PDF
//!               │
//!               └─(Unavailable | Failed)──▶ blocks ──▶ markup ──▶ layout ──▶ render ──▶ PDF
//! ```
//!
//! 1. [`input`]    — read UTF-8 source, derive `<dir>/<stem>.pdf`, stage uploads
//! 2. [`external`] — pandoc subprocess behind the [`external::ExternalConverter`] trait
//! 3. [`blocks`]   — three-rule line classification (Title / Heading2 / Normal)
//! 4. [`markup`]   — literal text or validated inline paragraph markup
//! 5. [`layout`]   — word wrap and pagination on a fixed page size
//! 6. [`render`]   — draw with printpdf; runs in `spawn_blocking`

pub mod blocks;
pub mod external;
pub mod input;
pub mod layout;
pub mod markup;
pub mod render;
