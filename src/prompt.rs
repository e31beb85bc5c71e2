//! Prompt compilation for story pages and covers.
//!
//! Output depends only on the inputs, so the same page and style always
//! produce the same text. Panels are numbered `{row}-{panel}` from their
//! position in the script.

use tracing::debug;

use crate::references::ReferenceImage;
use crate::script::PageScript;
use crate::style::{ComicStyle, Language};

/// Instruction text plus the images that go with it, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledRequest {
    /// Sent first, as a text part
    pub instruction: String,
    /// Sent after the text, in resolver order
    pub attachments: Vec<ReferenceImage>,
}

impl CompiledRequest {
    /// Pairs an instruction with its attachments.
    pub fn new(instruction: String, attachments: Vec<ReferenceImage>) -> Self {
        Self {
            instruction,
            attachments,
        }
    }
}

/// Lists every panel as `Panel {row}-{panel}: {text}`, one per line.
///
/// Panels without text are left out but keep their position, so numbering
/// never shifts.
pub fn panel_lines(page: &PageScript) -> Vec<String> {
    page.rows
        .iter()
        .enumerate()
        .flat_map(|(row_idx, row)| {
            row.panels
                .iter()
                .enumerate()
                .filter(|(_, panel)| !panel.text.trim().is_empty())
                .map(move |(panel_idx, panel)| {
                    format!("Panel {}-{}: {}", row_idx + 1, panel_idx + 1, panel.text)
                })
        })
        .collect()
}

fn requirement_list(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format!("- {line}\n"))
        .collect()
}

/// Instruction for one story page.
pub fn compile_page_prompt(page: &PageScript, style: ComicStyle) -> String {
    let label = style.label();
    let requirements = [
        "The content of each panel should avoid being overly complex.".to_string(),
        "Maintain consistency in characters and scenes.".to_string(),
        "Preserve the layout and proportions of the comic.".to_string(),
        "The image should be colorful and vibrant.".to_string(),
        "Do not show panel index in the content.".to_string(),
        "Include speech bubbles with short, clear dialogue to help tell the story.".to_string(),
        "Keep dialogue concise to avoid cluttering the image.".to_string(),
        "Ensure text is legible and spelled correctly.".to_string(),
        "Display the title only once, typically at the top center of the comic page.".to_string(),
        "Do not duplicate the title in multiple locations.".to_string(),
        "Maintain consistent and uniform margins around the entire comic page.".to_string(),
        "Ensure equal spacing on all sides (top, bottom, left, right) for a professional appearance."
            .to_string(),
        format!(
            "The comic title should use a {label}-style font that matches the overall comic aesthetic."
        ),
        "Use fonts that properly support Chinese, Japanese and other non-Latin characters to prevent text corruption."
            .to_string(),
        "Ensure all non-Latin text is correctly encoded and displayed without mojibake or garbled characters."
            .to_string(),
        "Text should be clear, sharp, and properly rendered in both speech bubbles and titles."
            .to_string(),
    ];

    let prompt = format!(
        "Using the {label} style ({description}), convert the storyline in each panel of the reference image into corresponding comic content.\n\n\
         # Content:\n\n## Title\n{title}\n\n## Panels\n{panels}\n\n# Requirements:\n{requirements}",
        description = style.description(),
        title = page.title,
        panels = panel_lines(page).join("\n"),
        requirements = requirement_list(&requirements),
    );
    debug!("Page prompt: {}", prompt);
    prompt
}

/// Instruction for a cover. Only the style and language steer it.
pub fn compile_cover_prompt(style: ComicStyle, language: Language) -> String {
    let label = style.label();
    let requirements = [
        "The image must be a vertical comic book cover composition.".to_string(),
        format!("The art style must strictly follow the {label} style."),
        "Make it eye-catching and dramatic.".to_string(),
        "High resolution, detailed, and professional quality.".to_string(),
        "No other text except the title.".to_string(),
        format!("Write the title in {}.", language.name()),
        "Clear and sharp text for the title, do not repeat all the titles in reference images."
            .to_string(),
        "Vibrant colors and \"Cover Art\" aesthetic.".to_string(),
        "Only present one row one panel in the cover.".to_string(),
    ];

    let prompt = format!(
        "Create a high-quality comic book cover in the {label} style ({description}).\n\n# Requirements:\n{requirements}",
        description = style.description(),
        requirements = requirement_list(&requirements),
    );
    debug!("Cover prompt: {}", prompt);
    prompt
}
