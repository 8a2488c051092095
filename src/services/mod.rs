pub mod gemini;
pub mod gemini_types;
pub mod generator;
