pub mod base;
pub mod client;

pub use base::{
    DialogueGenerator, DialogueTurn, GenerationEvent, GenerationRequest, GenerationStream,
    LLMError, Role,
};
pub use client::HttpDialogueGenerator;
