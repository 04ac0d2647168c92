//! System prompt templates and conversation assembly.

use genview_protocol::{GenerateRequest, GenerationMode, Message, BASE_TOOLKIT};

/// Output rules shared by both modes.
fn output_rules() -> String {
    format!(
        "Rules:\n\
         - Respond with code only. Do not wrap it in markdown fences and do not add any explanation.\n\
         - The first line must be an import statement.\n\
         - The last line must be the closing brace of the default-exported component.\n\
         - Use only {}. Style exclusively with Tailwind utility classes.\n\
         - Put everything in a single file that default-exports the root component.",
        BASE_TOOLKIT.describe()
    )
}

/// System instructions for the given mode.
pub fn system_prompt(mode: GenerationMode) -> String {
    match mode {
        GenerationMode::Initial => format!(
            "You are an expert {} engineer. Build the complete, working component the user describes.\n\n{}",
            BASE_TOOLKIT.framework,
            output_rules()
        ),
        GenerationMode::Fix => format!(
            "You are an expert {} engineer. You receive existing component code and a requested change or error report. \
             Return the full updated file, not a diff.\n\n{}\n\
             - Do not introduce any dependency beyond {}. If the code imports anything else, remove it and reimplement the functionality.",
            BASE_TOOLKIT.framework,
            output_rules(),
            BASE_TOOLKIT.describe()
        ),
    }
}

/// User content for the request: the prompt alone, or code plus request in fix mode.
pub fn user_content(request: &GenerateRequest) -> String {
    match &request.current_code {
        Some(code) => format!(
            "Current code:\n{}\n\nRequested change:\n{}",
            code, request.prompt
        ),
        None => request.prompt.clone(),
    }
}

/// The two-message conversation sent to the model.
///
/// The client transcript is not replayed; the current code already carries
/// the state a fix needs.
pub fn build_conversation(request: &GenerateRequest) -> Vec<Message> {
    vec![
        Message::system(system_prompt(request.mode())),
        Message::user(user_content(request)),
    ]
}
