use crate::error::{GenerationError, Result};
use url::Url;

pub const MIN_PROMPT_CHARS: usize = 5;

pub fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().chars().count() < MIN_PROMPT_CHARS {
        return Err(GenerationError::ValidationError(format!(
            "Prompt must be at least {} characters long",
            MIN_PROMPT_CHARS
        )));
    }
    Ok(())
}

/// Coarse same-origin check: the URL needs a scheme and a host, and must
/// contain the configured endpoint somewhere in its text. A URL that merely
/// embeds the endpoint in its path or query also passes.
pub fn is_trusted_image_url(candidate: &str, endpoint: &str) -> bool {
    let parsed = match Url::parse(candidate) {
        Ok(url) => url,
        Err(_) => return false,
    };

    !parsed.scheme().is_empty()
        && parsed.host_str().map_or(false, |h| !h.is_empty())
        && candidate.contains(endpoint)
}
