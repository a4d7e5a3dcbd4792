//! Language and voice catalog.
//!
//! Callers name languages and voices by display name ("English",
//! "Female Voice 1"). The catalog maps those to the codes each service
//! expects: a speech locale (`en-US`), a Translator code (`en`), and a
//! neural voice name (`en-US-JennyNeural`).

use std::borrow::Cow;

use serde::Serialize;

use crate::config::LanguageConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub label: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Language {
    pub name: String,
    pub locale: String,
    pub translator_code: String,
    pub voices: Vec<Voice>,
}

impl Language {
    fn new(name: &str, locale: &str, translator_code: &str, voices: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            translator_code: translator_code.into(),
            voices: voices
                .iter()
                .map(|(label, name)| Voice {
                    label: (*label).into(),
                    name: (*name).into(),
                })
                .collect(),
        }
    }

    fn from_config(config: &LanguageConfig) -> Self {
        let translator_code = config
            .translator_code
            .clone()
            .unwrap_or_else(|| language_subtag(&config.locale).to_string());
        Self {
            name: config.name.trim().to_string(),
            locale: config.locale.trim().to_string(),
            translator_code,
            voices: config
                .voices
                .iter()
                .map(|v| Voice {
                    label: v.label.clone(),
                    name: v.name.clone(),
                })
                .collect(),
        }
    }

    /// Resolve a voice for this language.
    ///
    /// Accepts a catalog label ("Female Voice 1"), a catalog voice name, or
    /// any service voice name carrying this language's locale prefix
    /// ("fr-FR-HenriNeural").
    pub fn resolve_voice(&self, query: &str) -> Option<String> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if let Some(voice) = self
            .voices
            .iter()
            .find(|v| v.label.eq_ignore_ascii_case(query) || v.name.eq_ignore_ascii_case(query))
        {
            return Some(voice.name.clone());
        }

        let prefix = format!("{}-", self.locale);
        let has_locale_prefix = query.len() > prefix.len()
            && query.is_char_boundary(prefix.len())
            && query[..prefix.len()].eq_ignore_ascii_case(&prefix);
        has_locale_prefix.then(|| query.to_string())
    }
}

/// "en-US" -> "en"
fn language_subtag(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

/// `ll-RR` or `ll-Script-RR`: a 2-3 letter language subtag followed by
/// 2-4 character alphanumeric subtags.
fn is_locale_shaped(query: &str) -> bool {
    let mut parts = query.split('-');
    let language_ok = parts
        .next()
        .is_some_and(|l| (2..=3).contains(&l.len()) && l.chars().all(|c| c.is_ascii_alphabetic()));
    let rest: Vec<&str> = parts.collect();
    language_ok
        && !rest.is_empty()
        && rest
            .iter()
            .all(|p| (2..=4).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Lookup table from display names and codes to [`Language`] entries.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    languages: Vec<Language>,
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageCatalog {
    pub fn new(languages: Vec<Language>) -> Self {
        Self { languages }
    }

    /// Built-in languages with two female and two male voices where available.
    pub fn builtin() -> Self {
        Self::new(vec![
            Language::new(
                "English",
                "en-US",
                "en",
                &[
                    ("Female Voice 1", "en-US-JennyNeural"),
                    ("Female Voice 2", "en-US-AriaNeural"),
                    ("Male Voice 1", "en-US-GuyNeural"),
                    ("Male Voice 2", "en-US-DavisNeural"),
                ],
            ),
            Language::new(
                "French",
                "fr-FR",
                "fr",
                &[
                    ("Female Voice 1", "fr-FR-DeniseNeural"),
                    ("Female Voice 2", "fr-FR-EloiseNeural"),
                    ("Male Voice 1", "fr-FR-HenriNeural"),
                    ("Male Voice 2", "fr-FR-AlainNeural"),
                ],
            ),
            Language::new(
                "German",
                "de-DE",
                "de",
                &[
                    ("Female Voice 1", "de-DE-KatjaNeural"),
                    ("Female Voice 2", "de-DE-AmalaNeural"),
                    ("Male Voice 1", "de-DE-ConradNeural"),
                    ("Male Voice 2", "de-DE-KillianNeural"),
                ],
            ),
            Language::new(
                "Spanish",
                "es-ES",
                "es",
                &[
                    ("Female Voice 1", "es-ES-ElviraNeural"),
                    ("Female Voice 2", "es-ES-AbrilNeural"),
                    ("Male Voice 1", "es-ES-AlvaroNeural"),
                    ("Male Voice 2", "es-ES-ArnauNeural"),
                ],
            ),
            Language::new(
                "Italian",
                "it-IT",
                "it",
                &[
                    ("Female Voice 1", "it-IT-ElsaNeural"),
                    ("Female Voice 2", "it-IT-IsabellaNeural"),
                    ("Male Voice 1", "it-IT-DiegoNeural"),
                    ("Male Voice 2", "it-IT-BenignoNeural"),
                ],
            ),
            Language::new(
                "Portuguese",
                "pt-BR",
                "pt",
                &[
                    ("Female Voice 1", "pt-BR-FranciscaNeural"),
                    ("Male Voice 1", "pt-BR-AntonioNeural"),
                ],
            ),
            Language::new(
                "Japanese",
                "ja-JP",
                "ja",
                &[
                    ("Female Voice 1", "ja-JP-NanamiNeural"),
                    ("Male Voice 1", "ja-JP-KeitaNeural"),
                ],
            ),
            Language::new(
                "Chinese",
                "zh-CN",
                "zh-Hans",
                &[
                    ("Female Voice 1", "zh-CN-XiaoxiaoNeural"),
                    ("Male Voice 1", "zh-CN-YunxiNeural"),
                ],
            ),
            Language::new(
                "Hindi",
                "hi-IN",
                "hi",
                &[
                    ("Female Voice 1", "hi-IN-SwaraNeural"),
                    ("Male Voice 1", "hi-IN-MadhurNeural"),
                ],
            ),
        ])
    }

    /// Built-in catalog with config entries applied: an entry whose name
    /// matches an existing language replaces it, anything else is appended.
    pub fn with_overrides(overrides: &[LanguageConfig]) -> Self {
        let mut catalog = Self::builtin();
        for entry in overrides {
            let language = Language::from_config(entry);
            match catalog
                .languages
                .iter_mut()
                .find(|l| l.name.eq_ignore_ascii_case(&language.name))
            {
                Some(existing) => *existing = language,
                None => catalog.languages.push(language),
            }
        }
        catalog
    }

    /// Resolve a language by display name or locale, case-insensitively.
    ///
    /// A locale-shaped query missing from the catalog ("es-MX") resolves to
    /// an ad-hoc entry: the locale passes through, the Translator code is its
    /// language subtag, and only raw voice names with that locale prefix are
    /// accepted.
    pub fn resolve(&self, query: &str) -> Option<Cow<'_, Language>> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let known = self
            .languages
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(query))
            .or_else(|| {
                self.languages
                    .iter()
                    .find(|l| l.locale.eq_ignore_ascii_case(query))
            });
        match known {
            Some(language) => Some(Cow::Borrowed(language)),
            None if is_locale_shaped(query) => Some(Cow::Owned(Language {
                name: query.to_string(),
                locale: query.to_string(),
                translator_code: language_subtag(query).to_ascii_lowercase(),
                voices: Vec::new(),
            })),
            None => None,
        }
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceConfig;

    #[test]
    fn test_resolve_by_name_and_locale() {
        let catalog = LanguageCatalog::builtin();
        assert_eq!(catalog.resolve("English").unwrap().locale, "en-US");
        assert_eq!(catalog.resolve("french").unwrap().translator_code, "fr");
        assert_eq!(catalog.resolve("de-de").unwrap().name, "German");
        assert_eq!(catalog.resolve("Chinese").unwrap().translator_code, "zh-Hans");
        assert!(catalog.resolve("Klingon").is_none());
        assert!(catalog.resolve("  ").is_none());
    }

    #[test]
    fn test_resolve_voice_label() {
        let catalog = LanguageCatalog::builtin();
        let french = catalog.resolve("French").unwrap();
        assert_eq!(
            french.resolve_voice("Female Voice 1").as_deref(),
            Some("fr-FR-DeniseNeural")
        );
        assert_eq!(
            french.resolve_voice("male voice 1").as_deref(),
            Some("fr-FR-HenriNeural")
        );
        assert!(french.resolve_voice("Robot Voice 9").is_none());
    }

    #[test]
    fn test_resolve_raw_voice_name_requires_matching_locale() {
        let catalog = LanguageCatalog::builtin();
        let french = catalog.resolve("French").unwrap();
        assert_eq!(
            french.resolve_voice("fr-FR-VivienneMultilingualNeural").as_deref(),
            Some("fr-FR-VivienneMultilingualNeural")
        );
        assert!(french.resolve_voice("en-US-JennyNeural").is_none());
        assert!(french.resolve_voice("fr-FR-").is_none());
    }

    #[test]
    fn test_unlisted_locale_passes_through() {
        let catalog = LanguageCatalog::builtin();
        let mexican = catalog.resolve(" es-MX ").unwrap();
        assert!(matches!(mexican, Cow::Owned(_)));
        assert_eq!(mexican.locale, "es-MX");
        assert_eq!(mexican.translator_code, "es");
        assert!(mexican.voices.is_empty());
        assert_eq!(
            mexican.resolve_voice("es-MX-DaliaNeural").as_deref(),
            Some("es-MX-DaliaNeural")
        );
        assert!(mexican.resolve_voice("Female Voice 1").is_none());
        assert!(mexican.resolve_voice("es-ES-ElviraNeural").is_none());

        assert_eq!(catalog.resolve("zh-Hant-TW").unwrap().translator_code, "zh");
        assert!(matches!(catalog.resolve("fr-FR").unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_non_locale_queries_stay_unresolved() {
        let catalog = LanguageCatalog::builtin();
        for query in ["fr", "Klingon-Empire", "e-US", "english-US", "en-", "en-US-", "en_US"] {
            assert!(catalog.resolve(query).is_none(), "{query}");
        }
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let catalog = LanguageCatalog::with_overrides(&[
            LanguageConfig {
                name: "English".into(),
                locale: "en-GB".into(),
                translator_code: None,
                voices: vec![VoiceConfig {
                    label: "Female Voice 1".into(),
                    name: "en-GB-SoniaNeural".into(),
                }],
            },
            LanguageConfig {
                name: "Korean".into(),
                locale: "ko-KR".into(),
                translator_code: None,
                voices: vec![],
            },
        ]);

        let english = catalog.resolve("English").unwrap();
        assert_eq!(english.locale, "en-GB");
        assert_eq!(english.translator_code, "en");
        assert_eq!(
            english.resolve_voice("Female Voice 1").as_deref(),
            Some("en-GB-SoniaNeural")
        );

        let korean = catalog.resolve("Korean").unwrap();
        assert_eq!(korean.translator_code, "ko");
        assert_eq!(catalog.len(), LanguageCatalog::builtin().len() + 1);
    }
}
