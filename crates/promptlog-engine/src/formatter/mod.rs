use promptlog_common::protocol::{ExtractionResult, Message, PromptSource, ScrapedPrompt};

/// Longest prompt preview shown per line in summaries.
const PREVIEW_CHARS: usize = 120;

pub fn format_result(result: &ExtractionResult) -> String {
    let mut output = format!(
        "Extracted {} prompts.\nPlatform: {}\nConversation: {}\nTitle: {}\nURL: {}",
        result.prompts.len(),
        result.platform,
        result.conversation_id,
        result.title,
        result.url
    );

    let counts = [
        (PromptSource::Dom, "dom"),
        (PromptSource::Keylog, "keylog"),
        (PromptSource::Network, "network"),
    ]
    .into_iter()
    .filter_map(|(source, label)| {
        let n = result.prompts.iter().filter(|p| p.source == source).count();
        (n > 0).then(|| format!("{} {}", n, label))
    })
    .collect::<Vec<_>>();
    if !counts.is_empty() {
        output.push_str(&format!("\nSources: {}", counts.join(", ")));
    }

    if !result.prompts.is_empty() {
        output.push('\n');
        for prompt in &result.prompts {
            output.push_str(&format!("\n{}", format_prompt(prompt)));
        }
    }
    output
}

/// `[index] (source) content`, continuation lines indented under the content.
pub fn format_prompt(prompt: &ScrapedPrompt) -> String {
    let source = match prompt.source {
        PromptSource::Dom => "dom",
        PromptSource::Keylog => "keylog",
        PromptSource::Network => "network",
    };
    let prefix = format!("[{}] ({}) ", prompt.index, source);
    let indent = " ".repeat(prefix.chars().count());
    let body = prompt.content.replace('\n', &format!("\n{}", indent));
    format!("{}{}", prefix, body)
}

/// One line per prompt, truncated. Used for history listings.
pub fn format_summary(prompts: &[ScrapedPrompt]) -> String {
    if prompts.is_empty() {
        return "No prompts stored.".to_string();
    }
    prompts
        .iter()
        .map(|p| {
            let flat = p.content.replace('\n', " ");
            let preview: String = flat.chars().take(PREVIEW_CHARS).collect();
            let ellipsis = if flat.chars().count() > PREVIEW_CHARS { "..." } else { "" };
            match p.timestamp {
                Some(ts) => format!("{:>4}  {}  {}{}", p.index, ts, preview, ellipsis),
                None => format!("{:>4}  -  {}{}", p.index, preview, ellipsis),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_message(message: &Message) -> String {
    match message {
        Message::ExtractionResult { result, .. }
        | Message::ExtractionFromPageResult { result, .. } => format_result(result),
        Message::ExtractionError { error } => format!("Error: {}", error),
        Message::ConversationLogs { prompts } => format_summary(prompts),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptlog_common::protocol::Platform;

    #[test]
    fn multiline_prompts_are_indented() {
        let prompt = ScrapedPrompt::from_dom("first line\nsecond line", 3);
        assert_eq!(format_prompt(&prompt), "[3] (dom) first line\n          second line");
    }

    #[test]
    fn result_lists_source_counts() {
        let result = ExtractionResult {
            platform: Platform::Claude,
            url: "https://claude.ai/chat/abc".into(),
            title: "Chat".into(),
            prompts: vec![
                ScrapedPrompt::from_dom("hello there", 0),
                ScrapedPrompt {
                    index: 1,
                    ..ScrapedPrompt::from_keylog("follow up question", 5)
                },
            ],
            extracted_at: 10,
            conversation_id: "abc".into(),
        };
        let text = format_result(&result);
        assert!(text.starts_with("Extracted 2 prompts."));
        assert!(text.contains("Sources: 1 dom, 1 keylog"));
        assert!(text.contains("[1] (keylog) follow up question"));
    }
}
