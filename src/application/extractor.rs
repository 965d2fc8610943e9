//! Content extraction from nested item structures.
//!
//! Walks a [`ContentPart`] tree in document order and collects readable text
//! and attachment metadata.

use crate::domain::{Attachment, ContentPart, ExtractedContent};

use super::normalizer::normalize_text;

/// Deepest nesting level visited. Real payloads stay far below this.
pub const MAX_PART_DEPTH: usize = 64;

/// Marker line opening a preserved markup block.
pub const MARKUP_START: &str = "[HTML CONTENT START]";
/// Marker line closing a preserved markup block.
pub const MARKUP_END: &str = "[HTML CONTENT END]";

/// Options for content extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Keep markup-bearing parts verbatim between marker lines.
    pub preserve_markup: bool,
}

/// Extracts plain text and attachments from an item's content tree.
///
/// Plain-text parts are normalized and joined with a blank line. Markup parts
/// are either preserved between [`MARKUP_START`]/[`MARKUP_END`] or, when not
/// preserving, normalized and used only if the item has no plain-text part.
#[must_use]
pub fn extract_content(root: &ContentPart, options: ExtractOptions) -> ExtractedContent {
    let mut plain: Vec<String> = Vec::new();
    let mut markup: Vec<String> = Vec::new();
    let mut attachments = Vec::new();
    let mut saw_plain_part = false;

    // Explicit stack; children are pushed in reverse to keep document order.
    let mut stack: Vec<(&ContentPart, usize)> = vec![(root, 0)];

    while let Some((part, depth)) = stack.pop() {
        if depth > MAX_PART_DEPTH {
            tracing::warn!(depth, "Content nesting too deep, skipping subtree");
            continue;
        }

        if let Some(name) = part.filename.as_deref().filter(|n| !n.trim().is_empty()) {
            attachments.push(Attachment {
                name: name.to_string(),
                mime_type: if part.mime_type.is_empty() {
                    "application/octet-stream".to_string()
                } else {
                    part.media_kind()
                },
                size: part.size,
            });
        } else if let Some(body) = part.body.as_deref() {
            match part.media_kind().as_str() {
                "text/plain" => {
                    saw_plain_part = true;
                    let text = normalize_text(body);
                    if !text.is_empty() {
                        plain.push(text);
                    }
                }
                "text/html" if options.preserve_markup => {
                    let raw = body.trim();
                    if !raw.is_empty() {
                        plain.push(format!("{MARKUP_START}\n{raw}\n{MARKUP_END}"));
                    }
                }
                "text/html" => {
                    let text = normalize_text(body);
                    if !text.is_empty() {
                        markup.push(text);
                    }
                }
                other => {
                    tracing::trace!(mime = other, "Ignoring non-text part body");
                }
            }
        }

        for child in part.parts.iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    if !saw_plain_part {
        plain.append(&mut markup);
    }

    ExtractedContent {
        plain_text: plain.join("\n\n"),
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_level_nesting() {
        let tree = ContentPart::multipart(
            "mixed",
            vec![ContentPart {
                mime_type: "text/plain".into(),
                body: Some("Quarterly numbers attached.".into()),
                parts: vec![ContentPart::attachment(
                    "q3-report.pdf",
                    "application/pdf",
                    2048,
                )],
                ..ContentPart::default()
            }],
        );

        let out = extract_content(&tree, ExtractOptions::default());
        assert_eq!(out.plain_text, "Quarterly numbers attached.");
        assert_eq!(
            out.attachments,
            vec![Attachment {
                name: "q3-report.pdf".into(),
                mime_type: "application/pdf".into(),
                size: 2048,
            }]
        );
    }

    #[test]
    fn test_alternative_prefers_plain_text() {
        let tree = ContentPart::multipart(
            "alternative",
            vec![
                ContentPart::text("Hi there"),
                ContentPart::html("<p>Hi <b>there</b></p>"),
            ],
        );

        let out = extract_content(&tree, ExtractOptions::default());
        assert_eq!(out.plain_text, "Hi there");
    }

    #[test]
    fn test_html_only_is_normalized() {
        let tree = ContentPart::multipart(
            "related",
            vec![ContentPart::html("<div>Hello&nbsp;<i>world</i></div>")],
        );

        let out = extract_content(&tree, ExtractOptions::default());
        assert_eq!(out.plain_text, "Hello world");
        assert!(!out.plain_text.contains('<'));
    }

    #[test]
    fn test_preserve_markup_wraps_html() {
        let tree = ContentPart::multipart(
            "alternative",
            vec![ContentPart::text("Hi"), ContentPart::html("<p>Hi</p>")],
        );

        let out = extract_content(
            &tree,
            ExtractOptions {
                preserve_markup: true,
            },
        );
        assert_eq!(
            out.plain_text,
            "Hi\n\n[HTML CONTENT START]\n<p>Hi</p>\n[HTML CONTENT END]"
        );
    }

    #[test]
    fn test_text_parts_concatenate_in_order_and_attachments_keep_order() {
        let tree = ContentPart::multipart(
            "mixed",
            vec![
                ContentPart::text("first"),
                ContentPart::attachment("a.png", "image/png", 10),
                ContentPart::multipart(
                    "mixed",
                    vec![
                        ContentPart::text("second"),
                        ContentPart::attachment("b.txt", "", 0),
                    ],
                ),
                ContentPart::text("third"),
            ],
        );

        let out = extract_content(&tree, ExtractOptions::default());
        assert_eq!(out.plain_text, "first\n\nsecond\n\nthird");
        let names: Vec<_> = out.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.txt"]);
        assert_eq!(out.attachments[1].mime_type, "application/octet-stream");
    }

    #[test]
    fn test_attachment_body_is_not_text() {
        let mut file = ContentPart::attachment("notes.txt", "text/plain", 5);
        file.body = Some("hello".into());
        let out = extract_content(&file, ExtractOptions::default());
        assert!(out.plain_text.is_empty());
        assert_eq!(out.attachments.len(), 1);
    }

    #[test]
    fn test_depth_bound_terminates() {
        let mut node = ContentPart::text("too deep");
        for _ in 0..(MAX_PART_DEPTH + 5) {
            node = ContentPart::multipart("mixed", vec![node]);
        }
        let tree = ContentPart::multipart("mixed", vec![ContentPart::text("shallow"), node]);

        let out = extract_content(&tree, ExtractOptions::default());
        assert_eq!(out.plain_text, "shallow");
    }
}
