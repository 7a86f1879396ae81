use std::fmt;

const HUGGINGFACE_PROMPT: &str = "You are RedCherry Interiors' AI assistant. Your role is to help customers with their interior and exterior design needs.

IMPORTANT RESPONSE FORMAT:
- Always provide responses in bullet points
- Maximum 5 bullet points per response
- Each bullet point should be 1-2 sentences maximum
- Keep responses concise and to the point
- Use clear, professional language

CONTACT INFORMATION:
- Phone: 7022830804 or 8792749814
- Email: redcherryinteriorsbangalore@gmail.com
- Address: 1st cross Subanna Garden, Bannerghatta Main Rd, opp. St. Hopkins college, Bengaluru - 27

Your responses should:
- Be professional and friendly
- Focus on interior design services
- Help with scheduling consultations
- Answer pricing questions briefly
- Guide users through the design process

When asked about contact information, always provide the complete details in a structured format.

If you don't know something, suggest scheduling a consultation with the team.

Remember: You represent RedCherry Interiors, a professional interior and exterior design company.";

// Leading indentation and the trailing space after "needs." are part of the prompt.
const OPENAI_PROMPT: &str = concat!(
    "You are RedCherry Interiors' AI assistant. Your role is to help customers with their interior and exterior design needs. \n",
    "  You should:\n",
    "  - Be professional and friendly\n",
    "  - Provide helpful information about interior design services\n",
    "  - Help with scheduling consultations\n",
    "  - Answer questions about pricing and services\n",
    "  - Guide users through the design process\n",
    "  - Maintain a helpful and informative tone\n",
    "  - If you don't know something, suggest scheduling a consultation with the team\n",
    "  \n",
    "  Remember: You represent RedCherry Interiors, a professional interior and exterior design company.",
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    HuggingFace,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "huggingface",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Some(Provider::HuggingFace),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::HuggingFace, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "Hugging Face Inference",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "deepseek-ai/DeepSeek-V3-0324",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    /// Upstream inference provider the request is routed through.
    pub fn default_hint(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "novita",
            Provider::OpenAI => "openai",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "https://router.huggingface.co/v1/chat/completions",
            Provider::OpenAI => "https://api.openai.com/v1/chat/completions",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "HUGGINGFACE_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Provider::HuggingFace => HUGGINGFACE_PROMPT,
            Provider::OpenAI => OPENAI_PROMPT,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Everything a session needs to talk to one provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub hint: String,
    pub system_prompt: String,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn for_provider(provider: Provider, api_key: Option<String>) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            hint: provider.default_hint().to_string(),
            system_prompt: provider.system_prompt().to_string(),
            api_key,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("hint", &self.hint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}
