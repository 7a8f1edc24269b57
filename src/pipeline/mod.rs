//! Pipeline stages for Markdown image externalization.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and only one of them touches the network.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ dedup ──▶ fanout(upload × N) ──▶ rewrite
//! (regex)    (plan)     (join all, fail fast)   (substitute)
//! ```
//!
//! 1. [`extract`] — find `![alt](data:image/<subtype>;base64,<payload>)`
//! 2. [`dedup`]   — one task per distinct payload, with a generated filename
//! 3. [`upload`]  — one create-object request; the only suspension point
//! 4. [`fanout`]  — run all uploads concurrently, await every one, then
//!    either build the resolution map or report the first failure
//! 5. [`rewrite`] — replace each embedding with its public address
//!
//! [`encode`] is used by the single-file attach flow, not by the document
//! pipeline.

pub mod dedup;
pub mod encode;
pub mod extract;
pub mod fanout;
pub mod rewrite;
pub mod upload;
