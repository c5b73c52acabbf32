use async_trait::async_trait;

/// Labeled choice offered to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOption {
    pub label: String,
    pub value: bool,
}

impl PromptOption {
    pub fn new(label: impl Into<String>, value: bool) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Human-in-the-loop gate consulted before destructive writes. Returns the
/// value of the chosen option.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, message: &str, options: &[PromptOption]) -> bool;
}

#[async_trait]
impl<F> ConfirmationPrompt for F
where
    F: Fn(&str, &[PromptOption]) -> bool + Send + Sync,
{
    async fn confirm(&self, message: &str, options: &[PromptOption]) -> bool {
        self(message, options)
    }
}
