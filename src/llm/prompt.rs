//! Prompt composition.

/// Label in front of the user's utterance.
const USER_MESSAGE_LABEL: &str = "User's message:";

/// Assemble the full prompt for one turn.
///
/// Order is fixed: instructions, profile summary (omitted when blank), then
/// the labeled utterance. Sections are separated by a blank line.
pub fn compose(instructions: &str, profile_summary: &str, utterance: &str) -> String {
    let mut sections: Vec<&str> = Vec::with_capacity(3);

    let instructions = instructions.trim_end();
    if !instructions.is_empty() {
        sections.push(instructions);
    }

    let profile_summary = profile_summary.trim_end();
    if !profile_summary.is_empty() {
        sections.push(profile_summary);
    }

    let user_section = format!("{USER_MESSAGE_LABEL} {utterance}");
    let mut prompt = sections.join("\n\n");
    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(&user_section);
    prompt
}
