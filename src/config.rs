use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub max_output_tokens: Option<u32>,
}

impl Config {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let model = non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base = non_empty("GEMINI_API_BASE")
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let max_output_tokens = match non_empty("GEMINI_MAX_OUTPUT_TOKENS") {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                ConfigError::InvalidVar {
                    var: "GEMINI_MAX_OUTPUT_TOKENS",
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            api_key,
            model,
            api_base,
            max_output_tokens,
        })
    }

    /// Key with everything but the last four characters hidden, for logs.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("******{tail}")
    }
}
