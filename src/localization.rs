use std::collections::HashMap;

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use lazy_static::lazy_static;
use tracing::warn;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Bundled resources, one per supported language
const RESOURCES: &[(&str, &str)] = &[("en", include_str!("../locales/en/main.ftl"))];

lazy_static! {
    static ref LOCALIZATION_MANAGER: LocalizationManager = LocalizationManager::new();
}

/// Localization manager for the expense tracker
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Build bundles for every bundled language. Resource errors are logged;
    /// the messages that did parse stay usable.
    pub fn new() -> Self {
        let mut bundles = HashMap::new();
        for (lang, source) in RESOURCES {
            match Self::create_bundle(lang, source) {
                Some(bundle) => {
                    bundles.insert((*lang).to_string(), bundle);
                }
                None => warn!(language = lang, "Skipping unusable locale"),
            }
        }
        Self { bundles }
    }

    fn create_bundle(lang: &str, source: &str) -> Option<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = lang.parse().ok()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        bundle.set_use_isolating(false);

        let resource = match FluentResource::try_new(source.to_string()) {
            Ok(resource) => resource,
            Err((resource, errors)) => {
                warn!(language = lang, errors = ?errors, "Locale resource has syntax errors");
                resource
            }
        };
        if let Err(errors) = bundle.add_resource(resource) {
            warn!(language = lang, errors = ?errors, "Duplicate messages in locale resource");
        }
        Some(bundle)
    }

    fn bundle_for(&self, lang: &str) -> Option<&FluentBundle<FluentResource>> {
        let primary = lang.split(['-', '_']).next().unwrap_or(lang);
        self.bundles
            .get(primary)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
    }

    /// Get a localized message, falling back to English and then to the key itself
    pub fn get_message(&self, lang: &str, key: &str, args: Option<&FluentArgs>) -> String {
        let Some(bundle) = self.bundle_for(lang) else {
            return key.to_string();
        };
        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            warn!(key, language = lang, "Missing translation");
            return key.to_string();
        };

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(key, errors = ?errors, "Errors while formatting message");
        }
        value.into_owned()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, lang: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(*value));
        }
        self.get_message(lang, key, Some(&fluent_args))
    }
}

impl Default for LocalizationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    &LOCALIZATION_MANAGER
}

/// Localized message in the user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    get_localization_manager().get_message(language_code.unwrap_or(DEFAULT_LANGUAGE), key, None)
}

/// Localized message in the user's language with string arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    get_localization_manager().get_message_with_args(
        language_code.unwrap_or(DEFAULT_LANGUAGE),
        key,
        args,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message() {
        assert_eq!(t_lang("generic-error", Some("en")), "Something went wrong :(");
        assert_eq!(t_lang("generic-error", None), "Something went wrong :(");
    }

    #[test]
    fn test_message_with_args() {
        let text = t_args_lang(
            "undo-confirm",
            &[("amount", "SGD 12.34"), ("description", "lunch")],
            Some("en"),
        );
        assert_eq!(text, "Do you want to delete your transaction of SGD 12.34 lunch ?");
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(t_lang("button-cancel", Some("fr-CA")), "Cancel");
    }

    #[test]
    fn test_missing_key_returns_key() {
        assert_eq!(t_lang("no-such-message", None), "no-such-message");
    }
}
