//! Chat channels.
//!
//! Replies leave through the [`ReplySender`] trait so the dispatcher can be driven by fakes in
//! tests; [`VkClient`] is the production implementation.

mod outbound;
mod vk;

pub use outbound::{ReplyPayload, ReplySender};
pub use vk::{VkClient, VkError, VK_API_VERSION};
