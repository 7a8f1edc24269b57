//! Extraction: find inline base64 image embeddings in Markdown.
//!
//! An embedding is the exact image-link form
//! `![alt](data:image/<subtype>;base64,<payload>)`. Links to remote images,
//! non-base64 data URIs and truncated syntax are plain text here and are
//! never reported.
//!
//! The payload runs to the first `)`, newlines included. An embedding whose
//! closing parenthesis is missing therefore swallows the text after it up to
//! the next `)` elsewhere in the document, and that text is uploaded as part
//! of the payload.
//!
//! [`extract_images`] returns a lazy iterator borrowing the input. Calling it
//! again on the same text yields the same matches; nothing about the scan
//! position is visible outside the iterator.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// `![alt](data:image/<subtype>;base64,<payload>)`
///
/// Groups: 1 = alt, 2 = subtype, 3 = payload.
pub(crate) static RE_EMBEDDED_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:image/([a-zA-Z]+);base64,([^)]+)\)").unwrap()
});

/// One inline image found in the document, borrowing from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage<'a> {
    /// Alt text between the brackets; may be empty.
    pub alt: &'a str,
    /// MIME subtype, e.g. `png` or `jpeg`.
    pub subtype: &'a str,
    /// Raw base64 text, up to the closing parenthesis.
    pub payload: &'a str,
    /// The whole `![..](data:..)` substring.
    pub original: &'a str,
    /// Byte offset of `original` within the document.
    pub start: usize,
}

impl EmbeddedImage<'_> {
    /// Byte range of the embedding within the document.
    pub fn span(&self) -> Range<usize> {
        self.start..self.start + self.original.len()
    }
}

/// Iterator over the embeddings of one document, left to right.
#[derive(Debug, Clone)]
pub struct EmbeddedImages<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for EmbeddedImages<'a> {
    type Item = EmbeddedImage<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos > self.text.len() {
            return None;
        }
        let caps = RE_EMBEDDED_IMAGE.captures_at(self.text, self.pos)?;
        let whole = caps.get(0)?;
        self.pos = whole.end();
        Some(EmbeddedImage {
            alt: caps.get(1).map_or("", |m| m.as_str()),
            subtype: caps.get(2).map_or("", |m| m.as_str()),
            payload: caps.get(3).map_or("", |m| m.as_str()),
            original: whole.as_str(),
            start: whole.start(),
        })
    }
}

impl std::iter::FusedIterator for EmbeddedImages<'_> {}

/// Scan `text` for inline base64 images.
pub fn extract_images(text: &str) -> EmbeddedImages<'_> {
    EmbeddedImages { text, pos: 0 }
}

/// `true` when `text` carries at least one embedding.
pub fn has_embedded_images(text: &str) -> bool {
    RE_EMBEDDED_IMAGE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_embedding() {
        let text = "intro ![x](data:image/png;base64,AAAA) outro";
        let found: Vec<_> = extract_images(text).collect();
        assert_eq!(found.len(), 1);
        let img = found[0];
        assert_eq!(img.alt, "x");
        assert_eq!(img.subtype, "png");
        assert_eq!(img.payload, "AAAA");
        assert_eq!(img.original, "![x](data:image/png;base64,AAAA)");
        assert_eq!(&text[img.span()], img.original);
    }

    #[test]
    fn preserves_order_and_empty_alt() {
        let text = "![](data:image/jpeg;base64,Zm9v)\n\n![b](data:image/gif;base64,YmFy)";
        let found: Vec<_> = extract_images(text).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].alt, "");
        assert_eq!(found[0].subtype, "jpeg");
        assert_eq!(found[1].alt, "b");
        assert_eq!(found[1].payload, "YmFy");
        assert!(found[0].start < found[1].start);
    }

    #[test]
    fn ignores_non_matching_images() {
        let text = "![remote](https://example.org/a.png) \
                    ![svg](data:image/svg+xml;base64,PHN2Zz4=) \
                    ![plain](data:image/png,rawbytes) \
                    ![open](data:image/png;base64,AAAA";
        assert_eq!(extract_images(text).count(), 0);
        assert!(!has_embedded_images(text));
    }

    #[test]
    fn no_embeddings() {
        assert_eq!(extract_images("").count(), 0);
        assert_eq!(extract_images("# Title\n\nJust text.").count(), 0);
    }

    #[test]
    fn restartable() {
        let text = "![a](data:image/png;base64,AA) ![b](data:image/png;base64,BB)";
        let first: Vec<_> = extract_images(text).collect();
        let second: Vec<_> = extract_images(text).collect();
        assert_eq!(first, second);

        let mut iter = extract_images(text);
        iter.next();
        let fork = iter.clone();
        assert_eq!(iter.next(), fork.clone().next());
    }

    #[test]
    fn unterminated_payload_runs_to_next_paren() {
        let text = "![a](data:image/png;base64,AAAA\nmore text (aside) tail";
        let found: Vec<_> = extract_images(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload, "AAAA\nmore text (aside");
        assert_eq!(&text[found[0].span().end..], " tail");
        assert!(has_embedded_images(text));
    }

    #[test]
    fn adjacent_embeddings() {
        let text = "![a](data:image/png;base64,AA)![b](data:image/png;base64,BB)";
        let found: Vec<_> = extract_images(text).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].start, found[0].span().end);
    }
}
