//! Rewriting: substitute each embedding with a link to its uploaded object.
//!
//! `![alt](data:image/png;base64,…)` becomes `![alt](<address>)`. Text
//! between embeddings is copied through untouched, byte for byte.
//!
//! An embedding whose payload is missing from the map is left exactly as it
//! was and logged. [`crate::externalize::externalize`] only calls this with a
//! complete map, so that path is reached only through direct callers.

use crate::pipeline::extract::extract_images;
use crate::pipeline::fanout::ResolutionMap;
use tracing::warn;

/// Replace every embedding in `text` using `resolved`.
pub fn rewrite(text: &str, resolved: &ResolutionMap<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut unresolved = 0usize;

    for image in extract_images(text) {
        out.push_str(&text[last..image.start]);
        match resolved.get(image.payload) {
            Some(url) => {
                out.push_str("![");
                out.push_str(image.alt);
                out.push_str("](");
                out.push_str(url);
                out.push(')');
            }
            None => {
                unresolved += 1;
                out.push_str(image.original);
            }
        }
        last = image.span().end;
    }
    out.push_str(&text[last..]);

    if unresolved > 0 {
        warn!(
            "{} embedded images had no uploaded address and were left inline",
            unresolved
        );
    }
    out
}
