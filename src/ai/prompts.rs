use std::sync::OnceLock;

use regex::Regex;

pub const SYSTEM_PROMPT: &str = r#"You are a problem mining agent. You read posts from online communities and extract structured problem descriptions from them.

For each post:
1. Decide whether it describes a genuine problem, pain point, complaint or unmet need
2. Extract the core problem statement
3. Identify who is affected
4. Suggest a few relevant tags

Return ONLY valid JSON in exactly this shape:
{
  "isProblem": boolean,
  "title": "Concise problem-focused title (max 120 chars)",
  "description": "Clear problem description with key context (2-4 sentences)",
  "tags": ["tag1", "tag2", "tag3"],
  "reasoning": "Brief explanation of why this is or isn't a problem"
}

Guidelines:
- Describe the problem, not a solution
- Be specific about who has the problem
- Tags are single words or short phrases, lowercase, hyphenated
- isProblem=false for pure trivia questions, announcements, jokes and off-topic posts
- isProblem=true for pain points, complaints, feature requests and unmet needs"#;

pub fn hackernews_prompt(
    title: &str,
    text: &str,
    comment_count: i64,
    score: i64,
    max_chars: usize,
) -> String {
    format!(
        r#"Source: Hacker News (Ask HN)
Title: {title}
Score: {score} points
Comments: {comment_count}

Content:
{content}

Extract the problem if one exists. Treat the engagement (score, comments) as a signal of importance."#,
        content = truncate_chars(text, max_chars),
    )
}

pub struct StackExchangePromptInput<'a> {
    pub site: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub score: i64,
    pub views: i64,
    pub answers: i64,
    pub tags: &'a [String],
}

pub fn stackexchange_prompt(input: &StackExchangePromptInput<'_>, max_chars: usize) -> String {
    format!(
        r#"Analyze this StackExchange question from {site} and decide whether it describes a real-world problem worth documenting.

Question Title: {title}

Question Body:
{body}

Engagement:
- Score (upvotes): {score}
- Views: {views}
- Answers: {answers}
- Tags: {tags}

If it is a genuine problem people face in real life (not just a theoretical or purely technical curiosity), give:
- a clear, concise, problem-focused title
- a plain-language description with code and jargon removed
- tags describing the problem domain (not necessarily the site's own tags)"#,
        site = input.site,
        title = input.title,
        body = truncate_chars(input.body, max_chars),
        score = input.score,
        views = input.views,
        answers = input.answers,
        tags = input.tags.join(", "),
    )
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Converts upstream HTML bodies to plain text for prompting.
pub fn html_to_text(html: &str) -> String {
    static BLANK_RUNS: OnceLock<Option<Regex>> = OnceLock::new();

    let text = html2text::from_read(html.as_bytes(), 120).unwrap_or_else(|e| {
        tracing::debug!("Failed to convert HTML to text: {}", e);
        html.to_string()
    });

    let text = match BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").ok()) {
        Some(re) => re.replace_all(&text, "\n\n").into_owned(),
        None => text,
    };
    text.trim().to_string()
}
