//! Remote LLM access: the chat-completion client and the two prompts built on it

mod client;
mod prompts;

pub use client::{
    ChatBackend, Completion, HttpChatClient, SamplingParams, API_ERROR_MARKER,
    REQUEST_FAILED_MARKER,
};
pub use prompts::{
    answer_prompt, answer_question, fill_missing_fields, fill_prompt, ANSWER_PARAMS,
    FILL_PARAMS, FORM_END, FORM_START,
};
