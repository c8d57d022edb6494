pub mod content_extractor;
pub mod digest_dispatcher;
pub mod digest_service;
pub mod email_service;
pub mod inbound_service;
pub mod llm_client;
pub mod magic_link_service;
pub mod markdown;
pub mod post_service;
pub mod user_service;

pub use content_extractor::{ContentExtractor, ExtractedPost, InboundEmail};
pub use digest_dispatcher::{DigestDispatcher, DispatchResult, DispatchStatus, DispatchSummary};
pub use digest_service::{DigestError, DigestPage, DigestService};
pub use email_service::{create_email_service, EmailError, EmailService, MockEmailService};
pub use inbound_service::{InboundError, InboundService};
pub use llm_client::{create_llm_client, AnthropicClient, DisabledLlmClient, LlmClient, LlmError};
pub use magic_link_service::{MagicLinkError, MagicLinkService};
pub use markdown::{render_digest_email, render_markdown};
pub use post_service::{DateFilter, ListPostsQuery, PostPage, PostService, PostServiceError};
pub use user_service::{SignupRequest, UpdateSettingsRequest, UserService, UserServiceError};
