pub mod database;
pub mod identity;
pub mod memory;
pub mod metrics;
pub mod providers;
pub mod store;

pub use database::MongoChatStore;
pub use identity::{AuthTokens, CognitoIdentityProvider, IdentityError, IdentityProvider};
pub use memory::InMemoryChatStore;
pub use providers::{AnswerGenerator, GeneratedAnswer, GeneratorError, KnowledgeBaseRef};
pub use store::{ChatStore, SessionInsert, StoreError};
