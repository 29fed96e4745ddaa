use fluent::{FluentArgs, FluentBundle, FluentResource};
use fluent_langneg::{NegotiationStrategy, negotiate_languages};
use std::error::Error;
use unic_langid::LanguageIdentifier;

use crate::error::NavigationError;
use crate::path_fields::{Hint, Verdict};

// Use embedded locales
include!(concat!(env!("OUT_DIR"), "/locales.rs"));

const DEFAULT_LOCALE: &str = "en";

pub struct Localization {
    bundle: FluentBundle<FluentResource>,
    current_locale: String,
}

/// Locales compiled into the binary.
pub fn available_locales() -> Vec<&'static str> {
    EMBEDDED_LOCALES.iter().map(|(locale, _)| *locale).collect()
}

impl Localization {
    /// Loads the embedded locale that best matches `locale`, falling back to
    /// English when nothing matches.
    pub fn new(locale: &str) -> Result<Self, Box<dyn Error>> {
        let default: LanguageIdentifier = DEFAULT_LOCALE.parse()?;
        let available: Vec<LanguageIdentifier> = EMBEDDED_LOCALES
            .iter()
            .filter_map(|(id, _)| id.parse().ok())
            .collect();
        let requested: Vec<LanguageIdentifier> = locale.parse().into_iter().collect();

        let negotiated = negotiate_languages(
            &requested,
            &available,
            Some(&default),
            NegotiationStrategy::Filtering,
        )
        .first()
        .map(|id| (*id).clone());
        let langid = negotiated.unwrap_or(default);

        let resolved = langid.to_string();
        let resource_content = EMBEDDED_LOCALES
            .iter()
            .find(|(id, _)| *id == resolved)
            .or_else(|| EMBEDDED_LOCALES.iter().find(|(id, _)| *id == DEFAULT_LOCALE))
            .map(|(_, content)| *content)
            .ok_or("Locale not found")?;

        let resource = FluentResource::try_new(resource_content.to_string())
            .map_err(|e| format!("Failed to load resource: {:?}", e))?;

        let mut bundle = FluentBundle::new(vec![langid]);
        // Plain terminal output, no bidi isolation marks around arguments
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|e| format!("Failed to add resource: {:?}", e))?;

        log::debug!("Localization: requested {}, using {}", locale, resolved);
        Ok(Self {
            bundle,
            current_locale: resolved,
        })
    }

    pub fn get(&self, key: &str) -> String {
        self.get_with_args(key, None)
    }

    pub fn get_with_args(&self, key: &str, args: Option<&FluentArgs>) -> String {
        if let Some(message) = self.bundle.get_message(key)
            && let Some(pattern) = message.value()
        {
            let mut errors = vec![];
            let value = self.bundle.format_pattern(pattern, args, &mut errors);
            if !errors.is_empty() {
                log::debug!("Formatting {} reported {:?}", key, errors);
            }
            return value.to_string();
        }
        key.to_string()
    }

    /// Text shown next to the path fields for `verdict`.
    pub fn hint_text(&self, verdict: &Verdict) -> String {
        match (&verdict.hint, &verdict.invalid) {
            (Hint::Invalid, Some(invalid)) => {
                let mut args = FluentArgs::new();
                args.set("reason", invalid.reason.clone());
                self.get_with_args(Hint::Invalid.message_id(), Some(&args))
            }
            (hint, _) => self.get(hint.message_id()),
        }
    }

    pub fn confirm_text(&self, enabled: bool) -> String {
        self.get(if enabled {
            "confirm-enabled"
        } else {
            "confirm-disabled"
        })
    }

    pub fn error_text(&self, error: &NavigationError) -> String {
        let mut args = FluentArgs::new();
        args.set("path", error.path().display().to_string());
        self.get_with_args(error.message_id(), Some(&args))
    }

    pub fn current_locale(&self) -> &str {
        &self.current_locale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidPath;
    use crate::path_fields::Classification;
    use std::path::PathBuf;

    const EXPECTED_KEYS: [&str; 19] = [
        "hint-same-as-original",
        "hint-target-file",
        "hint-target-directory",
        "hint-parent-file",
        "hint-parent-missing",
        "hint-clear",
        "hint-empty",
        "hint-invalid",
        "confirm-enabled",
        "confirm-disabled",
        "error-not-found",
        "error-not-a-directory",
        "error-access-denied",
        "listing-header",
        "listing-loading",
        "listing-watching",
        "listing-directory-removed",
        "listing-selected",
        "config-reloaded",
    ];

    fn verdict(hint: Hint, invalid: Option<InvalidPath>) -> Verdict {
        Verdict {
            classification: Classification::Clear,
            hint,
            confirm_enabled: invalid.is_none(),
            invalid,
        }
    }

    #[test]
    fn test_localization_creation_valid_locale() {
        let localization = Localization::new("en").unwrap();
        assert_eq!(localization.current_locale(), "en");
        assert_eq!(localization.get("hint-clear"), "Ready.");
    }

    #[rstest::rstest]
    #[case("invalid_locale", "en")]
    #[case("fr", "en")]
    #[case("de-AT", "de")]
    fn test_locale_negotiation(#[case] requested: &str, #[case] expected: &str) {
        let localization = Localization::new(requested).unwrap();
        assert_eq!(localization.current_locale(), expected);
    }

    #[test]
    fn test_localization_get_nonexistent_key() {
        let localization = Localization::new("en").unwrap();
        assert_eq!(localization.get("nonexistent_key"), "nonexistent_key");
    }

    #[rstest::rstest]
    #[case("en")]
    #[case("de")]
    fn test_localization_keys_consistency(#[case] locale: &str) {
        let localization = Localization::new(locale).unwrap();
        assert_eq!(localization.current_locale(), locale);

        for key in EXPECTED_KEYS {
            let message = localization.get(key);
            assert!(!message.is_empty(), "Key {} should have a message", key);
            assert_ne!(message, key, "Key {} should be translated in {}", key, locale);
        }
    }

    #[test]
    fn test_available_locales() {
        let locales = available_locales();
        assert!(locales.contains(&"en"));
        assert!(locales.contains(&"de"));
    }

    #[test]
    fn test_hint_text() {
        let localization = Localization::new("en").unwrap();
        assert_eq!(
            localization.hint_text(&verdict(Hint::Empty, None)),
            localization.get("hint-empty")
        );

        let invalid = verdict(Hint::Invalid, Some(InvalidPath::new("contains a line break")));
        assert_eq!(
            localization.hint_text(&invalid),
            "Invalid path: contains a line break"
        );
    }

    #[test]
    fn test_confirm_text() {
        let localization = Localization::new("en").unwrap();
        assert_eq!(localization.confirm_text(true), "Confirm: enabled");
        assert_eq!(localization.confirm_text(false), "Confirm: disabled");
    }

    #[test]
    fn test_error_text_includes_path() {
        let localization = Localization::new("en").unwrap();
        let error = NavigationError::NotADirectory(PathBuf::from("/etc/hosts"));
        assert_eq!(localization.error_text(&error), "Not a directory: /etc/hosts");
    }

    #[test]
    fn test_args_are_substituted() {
        let localization = Localization::new("en").unwrap();
        let mut args = FluentArgs::new();
        args.set("path", "/tmp");
        args.set("count", 3);
        assert_eq!(
            localization.get_with_args("listing-header", Some(&args)),
            "/tmp (3 entries)"
        );
    }
}
