pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// `None` is tolerated at startup; every call then fails with a config error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Language the optimize step must answer in, if any.
    pub output_language: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve every field through `lookup`, first non-empty name wins.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|&name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let base_url = first(&["OPENAI_BASE_URL", "VITE_OPENAI_BASE_URL"])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            api_key: first(&["OPENAI_API_KEY", "VITE_OPENAI_API_KEY"]),
            base_url,
            model: first(&["MODEL", "VITE_MODEL"]).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            output_language: first(&["OUTPUT_LANGUAGE"]),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
