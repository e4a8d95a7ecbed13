//! These models represent the objects passed around by the chat gateway
//!
//! There are a few related formats we need to interact with:
//! - chat messages posted by the web client, see [`message::ChatMessage`]
//! - openai messages/tools, sent from the gateway to the LLM
//! - area rows read from the database and summarized for the LLM
//!
//! We always immediately convert incoming messages into [`message::Message`] so the
//! rest of the crate only deals with one representation.
pub mod area;
pub mod message;
pub mod role;
pub mod tool;
