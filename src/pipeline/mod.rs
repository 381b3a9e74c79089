//! Pipeline stages for question extraction.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! is independently testable and the rendering or backend implementation can
//! be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ extract ──▶ fence
//! (pdfium)   (base64)   (backend +  (json blocks
//!                        response    from the log)
//!                        log)
//! ```
//!
//! 1. [`render`]  — rasterise pages to `page_<n>.jpg`; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`]  — wrap each page JPEG as a base64 request payload
//! 3. [`extract`] — drive the backend fallback chain page by page and keep
//!    the append-only response log; the only stage with network I/O
//! 4. [`fence`]   — scan free-form model text for ```json blocks and parse
//!    each independently

pub mod encode;
pub mod extract;
pub mod fence;
pub mod render;
