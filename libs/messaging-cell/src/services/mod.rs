pub mod conversation;
pub mod credentials;
pub mod routing;
pub mod session;
pub mod template;

pub use conversation::ConversationService;
pub use credentials::CredentialStore;
pub use routing::{select_provider, MessagingRouter, OutboundGateway};
pub use session::{
    SessionGateway, SessionTransport, TransportCommand, TransportEvent, TransportLink,
    WebSocketTransport,
};
pub use template::TemplateGatewayClient;
