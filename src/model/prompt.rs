use crate::config::Prompt;

/// User turn for the text call: prompt, preamble, then the document text.
pub fn text_message(prompt: &Prompt, text: &str) -> String {
    format!(
        "{}\n\n{}\n{}",
        prompt.extraction_prompt, prompt.text_preamble, text
    )
}

/// Text part that accompanies the page image.
pub fn image_message(prompt: &Prompt) -> String {
    format!("{}\n\n{}", prompt.image_preamble, prompt.extraction_prompt)
}
