//! Rich error output for credential resolution failures

use conncred_core::{FieldKind, ResolveError};

/// A required field was left empty
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
#[error("No value given for {field}")]
#[diagnostic(code(conncred::resolve::missing_required_field), severity(error))]
struct MissingFieldDiagnostic {
    field: FieldKind,
    #[help]
    help: String,
}

/// The user backed out of the prompt
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
#[error("Cancelled")]
#[diagnostic(code(conncred::resolve::prompt_cancelled), severity(warning))]
struct CancelledDiagnostic;

/// The keychain (or other secret backend) could not be reached
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
#[error("Secret store unavailable: {message}")]
#[diagnostic(
    code(conncred::resolve::secret_store_unavailable),
    severity(error),
    url("https://github.com/remikalbe/conncred#keychain")
)]
struct SecretStoreDiagnostic {
    message: String,
    #[help]
    help: String,
}

/// Anything else that went wrong while resolving
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
#[error("{message}")]
#[diagnostic(code(conncred::resolve::error), severity(error))]
struct GenericResolveDiagnostic {
    message: String,
    #[help]
    help: String,
}

fn analyze_resolve_error(error: &ResolveError) -> Box<dyn miette::Diagnostic + Send + Sync> {
    match error {
        ResolveError::MissingRequiredField(field) => Box::new(MissingFieldDiagnostic {
            field: *field,
            help: missing_field_help(*field).to_string(),
        }),
        ResolveError::PromptCancelled => Box::new(CancelledDiagnostic),
        ResolveError::SecretStoreUnavailable(message) => Box::new(SecretStoreDiagnostic {
            message: message.clone(),
            help: "Unlock your keychain and retry, or run with --no-keychain to skip saved passwords."
                .to_string(),
        }),
        ResolveError::StoreWriteFailure(e) => Box::new(GenericResolveDiagnostic {
            message: format!("Could not update the saved profile: {}", e),
            help: "Check that the profile file is writable and the keychain accepts new entries."
                .to_string(),
        }),
        ResolveError::Prompt(message) => Box::new(GenericResolveDiagnostic {
            message: format!("Could not read from the terminal: {}", message),
            help: "Run conncred from an interactive terminal, or pass every value as an option."
                .to_string(),
        }),
    }
}

fn missing_field_help(field: FieldKind) -> &'static str {
    match field {
        FieldKind::Server => "Pass --server or answer the server question.",
        FieldKind::User => "Pass --user or answer the user name question.",
        FieldKind::Password => {
            "Enter a password, or pass --allow-empty-password if the login has none."
        }
        FieldKind::SavePassword => "Answer whether the password should be saved.",
    }
}

/// Print a resolution failure to stderr
pub fn display_resolve_error(error: &ResolveError) {
    tracing::debug!(kind = error.kind(), "credential resolution failed");

    let diagnostic = analyze_resolve_error(error);
    eprintln!("{}", render(diagnostic.as_ref()));
}

fn render(diagnostic: &dyn miette::Diagnostic) -> String {
    let mut lines = vec![String::new()];

    let marker = match diagnostic.severity() {
        Some(miette::Severity::Warning) => "!",
        _ => "×",
    };
    lines.push(format!("  {} {}", marker, diagnostic));

    if let Some(code) = diagnostic.code() {
        lines.push(format!("    code: {}", code));
    }
    if let Some(help) = diagnostic.help() {
        lines.push(String::new());
        lines.push(format!("  help: {}", help));
    }
    if let Some(url) = diagnostic.url() {
        lines.push(format!("  docs: {}", url));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conncred_core::StoreError;

    #[test]
    fn test_diagnostic_codes_follow_error_kind() {
        let errors = [
            ResolveError::MissingRequiredField(FieldKind::Password),
            ResolveError::PromptCancelled,
            ResolveError::SecretStoreUnavailable("locked".into()),
            ResolveError::StoreWriteFailure(StoreError::SecretNotPersisted("prod".into())),
        ];

        for error in &errors {
            let diagnostic = analyze_resolve_error(error);
            let code = diagnostic.code().map(|c| c.to_string()).unwrap_or_default();
            assert!(code.starts_with("conncred::resolve::"), "{}", code);
        }
    }

    #[test]
    fn test_missing_password_suggests_flag() {
        let diagnostic =
            analyze_resolve_error(&ResolveError::MissingRequiredField(FieldKind::Password));
        let help = diagnostic.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("--allow-empty-password"));
        assert_eq!(diagnostic.to_string(), "No value given for password");
    }

    #[test]
    fn test_render_includes_help_and_docs() {
        let diagnostic =
            analyze_resolve_error(&ResolveError::SecretStoreUnavailable("locked".into()));
        let text = render(diagnostic.as_ref());
        assert!(text.contains("× Secret store unavailable: locked"));
        assert!(text.contains("--no-keychain"));
        assert!(text.contains("docs: https://github.com/remikalbe/conncred#keychain"));

        let text = render(analyze_resolve_error(&ResolveError::PromptCancelled).as_ref());
        assert!(text.contains("! Cancelled"));
    }
}
