//! Connection profile model and credential resolution
//!
//! - [`models`]: credentials, profiles and the save-password intent
//! - [`identity`]: the key scheme shared by the profile list and the secret store
//! - [`resolver`]: [`ensure_required_properties_set`] and its helpers
//! - [`ProfileStore`] and [`Prompter`]: the collaborators a resolution calls into

mod error;
pub mod identity;
pub mod models;
mod profile_store;
pub mod prompt;
pub mod resolver;

pub use error::{ResolveError, StoreError};
pub use identity::CredentialId;
pub use models::{AuthenticationType, ConnectionCredentials, ConnectionProfile, SavePassword};
pub use profile_store::ProfileStore;
pub use prompt::{AnswerValue, Answers, PromptError, Prompter, Question, QuestionKind};
pub use resolver::{
    build_questions, ensure_required_properties_set, missing_fields, FieldKind, ResolveRequest,
};
