//! Context builder: assemble the ordered prompt for one question.
//!
//! Layout of a [`PromptPayload`]:
//!
//! ```text
//! Instructions            fixed instruction block (configuration text)
//! PageCount               "The PDF has N page(s). Review EVERY page …"
//! Question                "Question: {question}"
//! PageImage  (page 1)     "== Page 1 (Image) ==" + image reference
//! PageText   (page 1)     "== Page 1 (Extracted Text) ==\n{text}"
//! …                       one image/text pair per page, in page order
//! ```
//!
//! Pairs come from [`RasterizedPage`], which carries image and text together,
//! so a page can never contribute one without the other.

use crate::pipeline::render::RasterizedPage;
use crate::prompts;
use std::path::PathBuf;

/// One element of the prompt, in send order.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Instructions(String),
    PageCount(String),
    Question(String),
    /// A page image, sent right after its label.
    PageImage {
        page: usize,
        label: String,
        path: PathBuf,
    },
    /// A page's extracted text, label included.
    PageText { page: usize, text: String },
}

impl Segment {
    /// Text content of the segment, if any. For images, the label.
    pub fn text(&self) -> &str {
        match self {
            Segment::Instructions(t) | Segment::PageCount(t) | Segment::Question(t) => t,
            Segment::PageImage { label, .. } => label,
            Segment::PageText { text, .. } => text,
        }
    }

    /// Page number for page segments.
    pub fn page(&self) -> Option<usize> {
        match self {
            Segment::PageImage { page, .. } | Segment::PageText { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// The full multimodal prompt for one question. Consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    segments: Vec<Segment>,
    page_count: usize,
}

impl PromptPayload {
    /// Build the payload from rasterised pages, in the order given.
    pub fn build(pages: &[RasterizedPage], question: &str, instructions: &str) -> Self {
        let mut segments = Vec::with_capacity(3 + pages.len() * 2);
        segments.push(Segment::Instructions(instructions.to_string()));
        segments.push(Segment::PageCount(prompts::page_count_declaration(
            pages.len(),
        )));
        segments.push(Segment::Question(prompts::question_line(question)));

        for page in pages {
            segments.push(Segment::PageImage {
                page: page.number,
                label: prompts::image_label(page.number),
                path: page.image_path.clone(),
            });
            segments.push(Segment::PageText {
                page: page.number,
                text: prompts::page_text_block(page.number, &page.text),
            });
        }

        Self {
            segments,
            page_count: pages.len(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn image_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::PageImage { .. }))
            .count()
    }

    /// Render the payload as plain text, with image references shown as
    /// `[image: <file name>]`. Used for dry runs and logging.
    pub fn flatten(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::PageImage { label, path, .. } => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    format!("{label}\n[image: {name}]")
                }
                other => other.text().to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The reduced prompt accepted by text-only providers: no page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    instructions: String,
    question: String,
}

impl TextQuery {
    pub fn new(instructions: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            question: question.into(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// The question, verbatim.
    pub fn question(&self) -> &str {
        &self.question
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: usize, text: &str) -> RasterizedPage {
        RasterizedPage {
            number,
            image_path: PathBuf::from(format!("/scratch/page_{number}.png")),
            width: 1224,
            height: 1584,
            text: text.to_string(),
            text_truncated: false,
        }
    }

    #[test]
    fn payload_has_expected_shape() {
        let pages = vec![page(1, "BOM"), page(2, ""), page(3, "TITLE BLOCK")];
        let payload = PromptPayload::build(&pages, "List the weldments", "Be precise.");

        let segs = payload.segments();
        assert_eq!(segs.len(), 3 + 2 * 3);
        assert_eq!(
            segs.iter()
                .filter(|s| matches!(s, Segment::Instructions(_)))
                .count(),
            1
        );
        assert_eq!(
            segs.iter()
                .filter(|s| matches!(s, Segment::Question(_)))
                .count(),
            1
        );
        assert_eq!(segs.iter().filter(|s| s.page().is_some()).count(), 6);
        assert_eq!(payload.image_count(), 3);
        assert_eq!(payload.page_count(), 3);
    }

    #[test]
    fn header_segments_come_first_in_order() {
        let payload = PromptPayload::build(&[page(1, "x")], "What scale?", "RULES");
        let segs = payload.segments();
        assert_eq!(segs[0], Segment::Instructions("RULES".into()));
        assert_eq!(
            segs[1],
            Segment::PageCount(
                "The PDF has 1 page(s). Review EVERY page before answering.".into()
            )
        );
        assert_eq!(segs[2], Segment::Question("Question: What scale?".into()));
    }

    #[test]
    fn pages_alternate_image_then_text_in_page_order() {
        let pages = vec![page(1, "a"), page(2, "b")];
        let payload = PromptPayload::build(&pages, "q", "i");
        let page_segs: Vec<&Segment> = payload.segments()[3..].iter().collect();

        assert!(matches!(page_segs[0], Segment::PageImage { page: 1, .. }));
        assert_eq!(
            page_segs[1],
            &Segment::PageText {
                page: 1,
                text: "== Page 1 (Extracted Text) ==\na".into()
            }
        );
        assert!(matches!(page_segs[2], Segment::PageImage { page: 2, .. }));
        assert!(matches!(page_segs[3], Segment::PageText { page: 2, .. }));

        if let Segment::PageImage { label, path, .. } = page_segs[2] {
            assert_eq!(label, "== Page 2 (Image) ==");
            assert!(path.ends_with("page_2.png"));
        }
    }

    #[test]
    fn empty_page_text_still_gets_a_labelled_block() {
        let payload = PromptPayload::build(&[page(1, "")], "q", "i");
        assert_eq!(
            payload.segments()[4].text(),
            "== Page 1 (Extracted Text) ==\n"
        );
    }

    #[test]
    fn flatten_shows_image_references() {
        let payload = PromptPayload::build(&[page(1, "QTY 3")], "How many?", "RULES");
        let flat = payload.flatten();
        assert!(flat.starts_with("RULES"));
        assert!(flat.contains("== Page 1 (Image) ==\n[image: page_1.png]"));
        assert!(flat.contains("Question: How many?"));
        assert_eq!(flat.matches("Question:").count(), 1);
    }

    #[test]
    fn text_query_keeps_question_verbatim() {
        let q = TextQuery::new("You are an expert.", "  What is A36?  ");
        assert_eq!(q.question(), "  What is A36?  ");
        assert_eq!(q.instructions(), "You are an expert.");
    }
}
