//! Deduplication: one upload task per distinct payload.
//!
//! Two embeddings are the same image when their base64 payload strings are
//! byte-for-byte equal. Alt text, position and subtype play no part in the
//! key; the first occurrence decides the subtype used for the filename.
//!
//! Tasks come out in order of first appearance, which is also the order used
//! to pick "the first failure" once the uploads have been joined.

use crate::config::ExternalizeConfig;
use crate::pipeline::extract::EmbeddedImage;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// URL-safe alphabet used for generated identifiers.
const ID_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// One pending upload: a distinct payload and the object it will become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask<'a> {
    /// Base64 content, borrowed from the document.
    pub payload: &'a str,
    /// Generated identifier, the filename's base name.
    pub id: String,
    /// `<id>.<extension>`
    pub filename: String,
    /// How many embeddings in the document share this payload.
    pub occurrences: usize,
}

/// The distinct uploads needed for one document.
#[derive(Debug, Clone, Default)]
pub struct UploadPlan<'a> {
    /// Distinct payloads, in order of first appearance.
    pub tasks: Vec<UploadTask<'a>>,
    /// Total embeddings seen, duplicates included.
    pub embeddings: usize,
}

impl UploadPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Collapse `images` into one task per distinct payload.
pub fn plan_uploads<'a, I>(images: I, config: &ExternalizeConfig) -> UploadPlan<'a>
where
    I: IntoIterator<Item = EmbeddedImage<'a>>,
{
    let mut plan = UploadPlan::default();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut ids: HashSet<String> = HashSet::new();
    let id_length = config.effective_id_length();

    for image in images {
        plan.embeddings += 1;
        if let Some(&i) = index.get(image.payload) {
            plan.tasks[i].occurrences += 1;
            continue;
        }

        let id = loop {
            let candidate = generate_id(id_length);
            if ids.insert(candidate.clone()) {
                break candidate;
            }
        };
        let filename = format!("{id}.{}", extension_for(image.subtype, &config.default_subtype));

        index.insert(image.payload, plan.tasks.len());
        plan.tasks.push(UploadTask {
            payload: image.payload,
            id,
            filename,
            occurrences: 1,
        });
    }

    debug!(
        "Planned {} uploads for {} embeddings",
        plan.tasks.len(),
        plan.embeddings
    );
    plan
}

/// Generate a short random identifier of `len` URL-safe characters.
pub fn generate_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Filename extension for a detected subtype, falling back to `default`.
pub fn extension_for(subtype: &str, default: &str) -> String {
    let subtype = subtype.trim();
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_alphanumeric()) {
        default.to_ascii_lowercase()
    } else {
        subtype.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::extract_images;

    #[test]
    fn same_payload_collapses_regardless_of_alt() {
        let text = "![one](data:image/png;base64,AAAA) ![two](data:image/png;base64,AAAA) \
                    ![](data:image/png;base64,AAAA)";
        let plan = plan_uploads(extract_images(text), &ExternalizeConfig::default());
        assert_eq!(plan.embeddings, 3);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].payload, "AAAA");
        assert_eq!(plan.tasks[0].occurrences, 3);
    }

    #[test]
    fn distinct_payloads_keep_first_appearance_order() {
        let text = "![a](data:image/png;base64,AAAA) ![b](data:image/jpeg;base64,BBBB) \
                    ![a2](data:image/png;base64,AAAA)";
        let plan = plan_uploads(extract_images(text), &ExternalizeConfig::default());
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].payload, "AAAA");
        assert_eq!(plan.tasks[0].occurrences, 2);
        assert_eq!(plan.tasks[1].payload, "BBBB");
        assert!(plan.tasks[1].filename.ends_with(".jpeg"));
        assert_ne!(plan.tasks[0].id, plan.tasks[1].id);
    }

    #[test]
    fn first_occurrence_decides_subtype() {
        let text = "![a](data:image/gif;base64,AAAA) ![b](data:image/png;base64,AAAA)";
        let plan = plan_uploads(extract_images(text), &ExternalizeConfig::default());
        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.tasks[0].filename.ends_with(".gif"));
    }

    #[test]
    fn empty_document_plans_nothing() {
        let plan = plan_uploads(extract_images("no images"), &ExternalizeConfig::default());
        assert!(plan.is_empty());
        assert_eq!(plan.embeddings, 0);
    }

    #[test]
    fn generated_ids_use_configured_length_and_alphabet() {
        let id = generate_id(10);
        assert_eq!(id.len(), 10);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(generate_id(16), generate_id(16));
    }

    #[test]
    fn filename_is_id_plus_extension() {
        let text = "![a](data:image/PNG;base64,AAAA)";
        let plan = plan_uploads(extract_images(text), &ExternalizeConfig::default());
        let task = &plan.tasks[0];
        assert_eq!(task.filename, format!("{}.png", task.id));
    }

    #[test]
    fn out_of_range_id_length_still_terminates() {
        // Bypasses the builder; a zero-length id could never be unique twice.
        let config = ExternalizeConfig {
            id_length: 0,
            ..Default::default()
        };
        let text: String = (0..100)
            .map(|i| format!("![](data:image/png;base64,P{i})"))
            .collect();
        let plan = plan_uploads(extract_images(&text), &config);
        assert_eq!(plan.tasks.len(), 100);
        assert!(plan.tasks.iter().all(|t| t.id.len() == 6));
        let distinct: HashSet<&str> = plan.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(distinct.len(), 100);
    }

    #[test]
    fn extension_falls_back_to_default() {
        assert_eq!(extension_for("jpeg", "png"), "jpeg");
        assert_eq!(extension_for("", "png"), "png");
        assert_eq!(extension_for("svg+xml", "png"), "png");
    }
}
