mod client;
mod normalizer;
mod prompts;

pub use client::{ChatClient, LanguageModel};
pub use normalizer::{
    parse_verdict, HackerNewsNormalizer, Normalizer, ProblemJudge, RetryPolicy,
    StackExchangeNormalizer, Verdict, MAX_TITLE_CHARS,
};
pub use prompts::{html_to_text, truncate_chars, SYSTEM_PROMPT};
