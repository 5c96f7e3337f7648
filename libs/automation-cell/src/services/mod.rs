pub mod inbound;
pub mod quick_reply;

pub use inbound::InboundProcessor;
pub use quick_reply::QuickReplyService;
