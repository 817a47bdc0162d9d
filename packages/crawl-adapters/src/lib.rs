//! Concrete `ListAdapter` implementations: StructuredA (paginated
//! JSON), StructuredB (single JSON document) and AIParsed (LLM-driven
//! extraction from rendered HTML).

mod ai_parsed;
mod boilerplate;
mod json_mapping;
mod structured_a;
mod structured_b;

pub use ai_parsed::AiParsedAdapter;
pub use structured_a::StructuredAAdapter;
pub use structured_b::StructuredBAdapter;
