//! Lead classification: the persona rule set, request construction,
//! response parsing, and the OpenRouter client.

pub mod openrouter;
pub mod prompt;
pub mod response;

pub use openrouter::{OpenRouterClient, OpenRouterSettings};
pub use prompt::{CATEGORY_RULES, build_request, describe_record};
pub use response::parse_category;
