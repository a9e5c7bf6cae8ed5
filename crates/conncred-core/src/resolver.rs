//! Credential resolution
//!
//! Turns a partially filled profile into connection-ready credentials,
//! prompting once for whatever is missing and keeping the saved password in
//! step with the profile's save-password intent.
//!
//! Callers must serialize resolutions of the same profile identity: nothing
//! here guards the secret store against concurrent updates.

use std::collections::BTreeSet;
use std::fmt;

use conncred_secrets::ExposeSecret;

use crate::error::ResolveError;
use crate::models::{ConnectionProfile, SavePassword};
use crate::profile_store::ProfileStore;
use crate::prompt::{Answers, Prompter, Question, QuestionKind};

/// A credential field the user may be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    Server,
    User,
    Password,
    SavePassword,
}

impl FieldKind {
    /// Answer key used in [`Answers`]
    pub fn question_name(&self) -> &'static str {
        match self {
            FieldKind::Server => "server",
            FieldKind::User => "user",
            FieldKind::Password => "password",
            FieldKind::SavePassword => "save_password",
        }
    }

    /// Whether resolution fails if the field stays unanswered
    pub fn is_required(&self) -> bool {
        !matches!(self, FieldKind::SavePassword)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.question_name())
    }
}

/// Flags describing where the credentials being resolved came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Input is a saved profile (persistable) rather than an ad-hoc connection
    pub is_profile: bool,
    /// An empty password is a failure rather than an accepted value
    pub is_password_required: bool,
    /// The on-disk profile had no plaintext password before this attempt
    pub was_password_empty_in_config_file: bool,
}

impl ResolveRequest {
    /// Request for a saved profile as loaded from the profile list
    pub fn for_profile(profile: &ConnectionProfile) -> Self {
        Self {
            is_profile: true,
            is_password_required: profile.is_password_based(),
            was_password_empty_in_config_file: !profile.has_password(),
        }
    }

    /// Request for an ad-hoc connection that is never persisted
    pub fn ad_hoc(profile: &ConnectionProfile) -> Self {
        Self {
            is_profile: false,
            is_password_required: profile.is_password_based(),
            was_password_empty_in_config_file: !profile.has_password(),
        }
    }

    pub fn password_required(mut self, required: bool) -> Self {
        self.is_password_required = required;
        self
    }
}

/// Fields that must be asked for before `profile` can be used
pub fn missing_fields(profile: &ConnectionProfile, request: &ResolveRequest) -> BTreeSet<FieldKind> {
    let credentials = &profile.credentials;
    let mut missing = BTreeSet::new();

    if credentials.server.trim().is_empty() {
        missing.insert(FieldKind::Server);
    }

    if credentials.authentication_type.requires_user() && credentials.user.trim().is_empty() {
        missing.insert(FieldKind::User);
    }

    if request.is_password_required
        && credentials.is_password_based()
        && credentials.password.is_empty()
    {
        missing.insert(FieldKind::Password);

        if request.is_profile
            && profile.save_password.is_unspecified()
            && request.was_password_empty_in_config_file
        {
            missing.insert(FieldKind::SavePassword);
        }
    }

    missing
}

/// Questions for `fields`, in a fixed order
pub fn build_questions(fields: &BTreeSet<FieldKind>) -> Vec<Question> {
    fields
        .iter()
        .map(|field| match field {
            FieldKind::Server => Question::new(
                QuestionKind::Input,
                field.question_name(),
                "Server name or address",
            )
            .required(),
            FieldKind::User => {
                Question::new(QuestionKind::Input, field.question_name(), "User name").required()
            }
            FieldKind::Password => {
                Question::new(QuestionKind::Password, field.question_name(), "Password").required()
            }
            FieldKind::SavePassword => Question::new(
                QuestionKind::Confirm,
                field.question_name(),
                "Save password in the OS keychain?",
            )
            .with_default("yes"),
        })
        .collect()
}

/// Fill in everything required to connect with `credentials`.
///
/// The prompter is called at most once, and only for missing fields. For
/// saved profiles the password side-channel is then brought in line with
/// `save_password`:
///
/// - `Persist` with a password that differs from the stored secret saves the
///   profile. If that password came from the plaintext profile list, the old
///   entry is removed first and the profile re-saved without it.
/// - `DoNotPersist` purges a previously saved secret by removing the profile.
///   A secret store that can't be reached only skips the purge.
/// - `Unspecified`, an empty password or an unchanged one touch nothing.
///
/// After a save the returned profile has an empty password; the secret store
/// holds the value. The input is never modified, so a caller that hits a
/// store failure still has its password and can retry.
#[tracing::instrument(
    skip_all,
    fields(
        profile = %credentials.display_name(),
        is_profile = request.is_profile,
        password_required = request.is_password_required,
    )
)]
pub async fn ensure_required_properties_set<P, S>(
    credentials: &ConnectionProfile,
    request: ResolveRequest,
    prompter: &P,
    store: &S,
) -> Result<ConnectionProfile, ResolveError>
where
    P: Prompter + ?Sized,
    S: ProfileStore + ?Sized,
{
    let mut working = credentials.clone();
    working.empty_password_input = false;

    let reused_secret = reuse_saved_password(&mut working, &request, store).await;

    let missing = missing_fields(&working, &request);
    if !missing.is_empty() {
        tracing::debug!(fields = ?missing, "prompting for missing connection properties");
        let questions = build_questions(&missing);
        let answers = prompter.prompt(&questions).await?;
        apply_answers(&mut working, &missing, &answers);

        if let Some(field) = missing
            .iter()
            .find(|field| field.is_required() && is_unset(&working, **field))
        {
            tracing::debug!(field = %field, "required field still missing after prompt");
            return Err(ResolveError::MissingRequiredField(*field));
        }
    }

    if !request.is_profile {
        return Ok(working);
    }

    sync_saved_password(working, &request, reused_secret, store).await
}

/// Fill an empty password from the secret store. Returns whether it did.
async fn reuse_saved_password<S>(
    profile: &mut ConnectionProfile,
    request: &ResolveRequest,
    store: &S,
) -> bool
where
    S: ProfileStore + ?Sized,
{
    let eligible = request.is_profile
        && request.was_password_empty_in_config_file
        && profile.is_password_based()
        && !profile.has_password()
        && profile.save_password != SavePassword::DoNotPersist;

    if !eligible {
        return false;
    }

    match store.saved_password(profile).await {
        Ok(Some(secret)) => {
            profile.credentials.password = secret.expose_secret().to_string();
            tracing::debug!("using saved password");
            true
        }
        Ok(None) => false,
        Err(e) => {
            // The password gets prompted for instead
            tracing::warn!(error = %e, "could not read saved password");
            false
        }
    }
}

fn apply_answers(profile: &mut ConnectionProfile, fields: &BTreeSet<FieldKind>, answers: &Answers) {
    for field in fields {
        let name = field.question_name();
        match field {
            FieldKind::Server => {
                if let Some(server) = answers.text(name) {
                    profile.credentials.server = server.trim().to_string();
                }
            }
            FieldKind::User => {
                if let Some(user) = answers.text(name) {
                    profile.credentials.user = user.trim().to_string();
                }
            }
            FieldKind::Password => {
                if let Some(password) = answers.text(name) {
                    profile.credentials.password = password.to_string();
                    profile.empty_password_input = password.is_empty();
                }
            }
            FieldKind::SavePassword => {
                if let Some(save) = answers.bool(name) {
                    profile.save_password = save.into();
                }
            }
        }
    }
}

fn is_unset(profile: &ConnectionProfile, field: FieldKind) -> bool {
    let credentials = &profile.credentials;
    match field {
        FieldKind::Server => credentials.server.trim().is_empty(),
        FieldKind::User => credentials.user.trim().is_empty(),
        FieldKind::Password => credentials.password.is_empty(),
        FieldKind::SavePassword => profile.save_password.is_unspecified(),
    }
}

async fn sync_saved_password<S>(
    profile: ConnectionProfile,
    request: &ResolveRequest,
    reused_secret: bool,
    store: &S,
) -> Result<ConnectionProfile, ResolveError>
where
    S: ProfileStore + ?Sized,
{
    match profile.save_password {
        SavePassword::Persist => {
            if !profile.has_password() || reused_secret {
                return Ok(profile);
            }

            let prior = store.saved_password(&profile).await?;
            if prior.is_some_and(|secret| secret.expose_secret() == profile.credentials.password) {
                tracing::debug!("saved password unchanged");
                return Ok(profile);
            }

            if !request.was_password_empty_in_config_file {
                tracing::debug!("moving plaintext password to the secret store");
                store.remove_profile(&profile).await?;
            }

            let mut saved = store.save_profile(&profile).await?;
            saved.credentials.password.clear();
            saved.empty_password_input = profile.empty_password_input;
            tracing::info!("password saved to secret store");
            Ok(saved)
        }
        SavePassword::DoNotPersist => {
            match store.saved_password(&profile).await {
                Ok(Some(_)) => {
                    let removed = store.remove_profile(&profile).await?;
                    tracing::info!(removed, "purged saved password");
                }
                Ok(None) => {}
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(error = %e, "could not check for a saved password to purge");
                }
                Err(e) => return Err(e.into()),
            }
            Ok(profile)
        }
        SavePassword::Unspecified => Ok(profile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthenticationType, ConnectionCredentials};

    fn profile(auth: AuthenticationType) -> ConnectionProfile {
        ConnectionProfile::new(ConnectionCredentials {
            server: "namedServer".to_string(),
            database: "bcd".to_string(),
            authentication_type: auth,
            user: "cde".to_string(),
            ..ConnectionCredentials::default()
        })
        .with_name("defaultProfile")
    }

    fn request(required: bool, was_empty: bool) -> ResolveRequest {
        ResolveRequest {
            is_profile: true,
            is_password_required: required,
            was_password_empty_in_config_file: was_empty,
        }
    }

    #[test]
    fn test_nothing_missing_for_complete_profile() {
        let p = profile(AuthenticationType::SqlLogin).with_password("pw");
        assert!(missing_fields(&p, &request(true, false)).is_empty());
    }

    #[test]
    fn test_server_and_user_missing() {
        let mut p = profile(AuthenticationType::SqlLogin).with_password("pw");
        p.credentials.server.clear();
        p.credentials.user = "  ".to_string();

        let missing = missing_fields(&p, &request(true, false));
        assert_eq!(
            missing.into_iter().collect::<Vec<_>>(),
            vec![FieldKind::Server, FieldKind::User]
        );
    }

    #[test]
    fn test_integrated_needs_no_user_or_password() {
        let mut p = profile(AuthenticationType::Integrated);
        p.credentials.user.clear();
        assert!(missing_fields(&p, &request(true, true)).is_empty());
    }

    #[test]
    fn test_password_only_when_required() {
        let p = profile(AuthenticationType::SqlLogin);
        assert!(missing_fields(&p, &request(false, true)).is_empty());

        let missing = missing_fields(&p, &request(true, true));
        assert!(missing.contains(&FieldKind::Password));
    }

    #[test]
    fn test_save_password_asked_only_when_unspecified() {
        let p = profile(AuthenticationType::SqlLogin);
        let missing = missing_fields(&p, &request(true, true));
        assert!(missing.contains(&FieldKind::SavePassword));

        let decided = p.clone().with_save_password(false);
        let missing = missing_fields(&decided, &request(true, true));
        assert!(!missing.contains(&FieldKind::SavePassword));

        let ad_hoc = ResolveRequest {
            is_profile: false,
            ..request(true, true)
        };
        assert!(!missing_fields(&p, &ad_hoc).contains(&FieldKind::SavePassword));
    }

    #[test]
    fn test_build_questions_order_and_kinds() {
        let fields: BTreeSet<_> = [FieldKind::SavePassword, FieldKind::Password, FieldKind::Server]
            .into_iter()
            .collect();
        let questions = build_questions(&fields);

        let names: Vec<_> = questions.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["server", "password", "save_password"]);
        assert_eq!(questions[1].kind, QuestionKind::Password);
        assert!(questions[1].required);
        assert_eq!(questions[2].kind, QuestionKind::Confirm);
        assert!(!questions[2].required);
    }

    #[test]
    fn test_apply_answers_marks_empty_password_input() {
        let mut p = profile(AuthenticationType::SqlLogin);
        let fields: BTreeSet<_> = [FieldKind::Password, FieldKind::SavePassword]
            .into_iter()
            .collect();
        let answers = Answers::new()
            .with_text("password", "")
            .with_bool("save_password", true);

        apply_answers(&mut p, &fields, &answers);
        assert!(p.empty_password_input);
        assert_eq!(p.save_password, SavePassword::Persist);
        assert!(is_unset(&p, FieldKind::Password));
    }

    #[test]
    fn test_request_for_profile() {
        let p = profile(AuthenticationType::SqlLogin).with_password("pw");
        let req = ResolveRequest::for_profile(&p);
        assert!(req.is_profile);
        assert!(req.is_password_required);
        assert!(!req.was_password_empty_in_config_file);

        let req = ResolveRequest::ad_hoc(&profile(AuthenticationType::Integrated));
        assert!(!req.is_profile);
        assert!(!req.is_password_required);
        assert!(req.was_password_empty_in_config_file);
    }
}
