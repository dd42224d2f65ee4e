//! These models represent the objects passed between the chat front end,
//! the completion engine and the render loop
//!
//! There are three related formats we need to interact with:
//! - front-end attachments, sent from the interface alongside a message
//! - normalized multimodal content, sent to and received from the engine
//! - displayable elements, sent back to the interface while a reply streams
//!
//! We always convert at the edges: attachments become content in the adapter,
//! content becomes elements in the renderer.
pub mod attachment;
pub mod content;
pub mod element;
pub mod event;
pub mod message;
