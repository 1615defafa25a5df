/// One-off system prompts the client sends on its own behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPrompt {
    GenerateConversationTitle,
}

impl SystemPrompt {
    pub fn render(&self, first_prompt: &str) -> String {
        match self {
            SystemPrompt::GenerateConversationTitle => title_prompt(first_prompt),
        }
    }
}

fn title_prompt(first_prompt: &str) -> String {
    format!(
        "Given the initial message of this conversation: \"{first_prompt}\", \
         please generate a concise (2-5 words max), and contextually relevant title. \
         The title should summarize the main topic or theme of the conversation. \
         Please provide the title directly, without preceding it with any label. \
         Avoid using single or double quotes in the title."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prompt_embeds_first_message() {
        let text = SystemPrompt::GenerateConversationTitle.render("how do lifetimes work");
        assert!(text.contains("\"how do lifetimes work\""));
        assert!(text.contains("2-5 words"));
        assert!(text.contains("without preceding it with any label"));
    }
}
