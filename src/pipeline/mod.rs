//! Pipeline stages for text-to-Markdown conversion.
//!
//! Each submodule implements exactly one step and is testable on its own;
//! only [`transform`] talks to the outside world.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ split ──▶ transform ──▶ normalize ──▶ (split ──▶ transform)
//! (file/URL) (spans)   (budget)  (model, ×N)   (local)        refinement, if large
//! ```
//!
//! 1. [`input`]    : read a path, URL or stdin into a `String`
//! 2. [`extract`]  : swap code blocks, headers and list items for numbered
//!    placeholders and put them back
//! 3. [`split`]    : partition text into budget-bounded sections along
//!    paragraph boundaries
//! 4. [`transform`]: one section through the model with cache, timeout,
//!    retry and cancellation ([`cache`] holds the section cache)
//! 5. [`normalize`]: deterministic cleanup of model output

pub mod cache;
pub mod extract;
pub mod input;
pub mod normalize;
pub mod split;
pub mod transform;
