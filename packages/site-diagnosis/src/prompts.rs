//! LLM prompts for site diagnosis.

/// Keys the diagnosis prompt asks the model to return.
pub const DIAGNOSIS_FIELDS: [&str; 4] = ["name", "contacts", "industries", "investment_stages"];

/// Instruction prompt wrapped around a site's text.
pub const DIAGNOSIS_PROMPT: &str = r#"This is the text part of a website. Tell me the following after parsing it:
1. name: the name of the firm,
2. contacts: contact details (emails, phone numbers, addresses, contact pages),
3. industries: the industries they invest in,
4. investment_stages: the investment rounds they participate in or lead.

Provide your answer as a single JSON object with exactly the keys "name", "contacts", "industries" and "investment_stages", each with a string value. Use "unknown" when the text does not say.

{site_text}"#;

/// Fill the diagnosis prompt with a site's (possibly truncated) text.
pub fn format_diagnosis_prompt(site_text: &str) -> String {
    format_with_instructions(DIAGNOSIS_PROMPT, site_text)
}

/// Fill any template containing `{site_text}`; templates without the
/// placeholder get the text appended on a new line.
pub fn format_with_instructions(template: &str, site_text: &str) -> String {
    if template.contains("{site_text}") {
        template.replace("{site_text}", site_text)
    } else {
        format!("{}\n{}", template, site_text)
    }
}
