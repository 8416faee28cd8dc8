//! Prompt text for engineering-drawing question answering.
//!
//! The instruction block carries the domain heuristics (how a Bill of
//! Materials marks purchased items, how weldment detail numbers are formed,
//! where the title block keeps the scale, …). It is plain configuration
//! text: edit the constant, or override it at runtime through
//! [`crate::config::AssistantConfig::instructions`], without touching the
//! pipeline.
//!
//! The label helpers below fix the exact wording of the per-page segments so
//! the context builder and its tests agree on one format.

/// Default instruction block for the multimodal path.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are an expert in Engineering Drawing. You will be given a technical drawing PDF (converted to images) along with a user's question. Use both the text and visual content from the PDF to provide a detailed, accurate, and concise answer.

Consider ALL pages of the document before answering. Fully examine every page, both the extracted text and the images, before you answer.
Cite page numbers for every factual claim (e.g., 'Page 2: ...').
If the Bill of Materials (BOM) appears on one page and the title block on another, aggregate both.
If information conflicts, prefer the most specific/latest revision and say so.
If an item isn't found on ANY page, answer 'Not found in the provided pages'.
Answer only what is asked, specifically; do not add unrelated details.

Reading conventions for these drawings:
- Tool description: generally, the information for TOOL DESCRIPTION is in the Title Block/Name Plate.
- Burnout plates: the plates mentioned as BURNOUT or BO, PLATE in the description of the Bill of Materials; quantity is generally mentioned as QTY in the Bill of Materials.
- Purchased items: generally, the items marked as "X" in the purchase "PUR" section of the Bill of Materials.
- Weldments: generally, the items marked as "Weldment" in the "DESCRIPTION/ Part Name" section of the Bill of Materials.
- Purchased items supplied by RENTAPEN: generally, the items marked as "X" in the "PUR" section with the supplier name in the "Material" section of the Bill of Materials.
- Purchased altered items: generally, the purchased items that have been altered, mentioned as ALTER or ALTERED in the description or as a special note in the Bill of Materials.
- Sheetmetal items: generally, the items marked as "SHEETMETAL" or "LASER/BEND" (not only LASER) in the "DESCRIPTION/ Part Name" section of the Bill of Materials. If it says only LASER it is not a sheetmetal item.
- Weldments with their individual parts: generally, if the description is "weldment" with some detail number (e.g. 2), the corresponding parts of the weldment have detail numbers 2A, 2B, 2C… for all the parts used in that specific weldment.
- Surface treatment or hardness: generally, these are parts with some value in the "HARD" section of the Bill of Materials.
- Material A36: generally, the items that have A36 in the "MATERIAL" section of the Bill of Materials. If it is not in the Bill of Materials, it is not there.
- Drawn date: generally mentioned in the "DATE" portion of the TITLE BLOCK/NAME PLATE.
- Scale: generally mentioned in the "SCALE" portion of the TITLE BLOCK/NAME PLATE."#;

/// System instruction for the text-only provider.
///
/// This path never sees the page images or extracted text.
pub const TEXT_ONLY_INSTRUCTIONS: &str = "You are an expert in Engineering Drawing.";

/// Informational marker shown when a completion carries no text.
pub const NO_TEXT_OUTPUT: &str =
    "No text output from the model. Please try rephrasing your question.";

/// Declares how many pages the model must review.
pub fn page_count_declaration(page_count: usize) -> String {
    format!("The PDF has {page_count} page(s). Review EVERY page before answering.")
}

/// The user's question, verbatim, behind a fixed prefix.
pub fn question_line(question: &str) -> String {
    format!("Question: {question}")
}

/// Label placed immediately before a page image.
pub fn image_label(page_num: usize) -> String {
    format!("== Page {page_num} (Image) ==")
}

/// A page's extracted text under its label.
pub fn page_text_block(page_num: usize, text: &str) -> String {
    format!("== Page {page_num} (Extracted Text) ==\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instructions_keep_domain_rules() {
        for needle in ["PUR", "RENTAPEN", "2A, 2B, 2C", "HARD", "A36", "SCALE", "DATE"] {
            assert!(
                DEFAULT_INSTRUCTIONS.contains(needle),
                "instruction block lost rule mentioning {needle}"
            );
        }
    }

    #[test]
    fn labels_are_one_based_and_stable() {
        assert_eq!(image_label(1), "== Page 1 (Image) ==");
        assert_eq!(
            page_text_block(2, "QTY 3"),
            "== Page 2 (Extracted Text) ==\nQTY 3"
        );
        assert_eq!(question_line("What scale?"), "Question: What scale?");
        assert!(page_count_declaration(4).contains("4 page(s)"));
    }
}
