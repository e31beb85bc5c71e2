//! Style and language catalogs.
//!
//! Both are closed sets. Unknown keys fall back to a default instead of
//! failing, since they only steer the wording of a prompt.

use std::fmt;

/// Art style a page or cover is drawn in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComicStyle {
    /// `doraemon`, the fallback
    #[default]
    Doraemon,
    /// `american`
    American,
    /// `watercolor`
    Watercolor,
    /// `disney`
    Disney,
    /// `ghibli`
    Ghibli,
    /// `pixar`
    Pixar,
    /// `shonen`
    Shonen,
}

impl ComicStyle {
    /// Every style, in catalog order.
    pub const ALL: [ComicStyle; 7] = [
        ComicStyle::Doraemon,
        ComicStyle::American,
        ComicStyle::Watercolor,
        ComicStyle::Disney,
        ComicStyle::Ghibli,
        ComicStyle::Pixar,
        ComicStyle::Shonen,
    ];

    /// Looks up `key` (case-insensitive), falling back to [`ComicStyle::Doraemon`].
    pub fn from_key(key: &str) -> Self {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|style| style.key() == key)
            .unwrap_or_default()
    }

    /// The wire key.
    pub fn key(self) -> &'static str {
        match self {
            ComicStyle::Doraemon => "doraemon",
            ComicStyle::American => "american",
            ComicStyle::Watercolor => "watercolor",
            ComicStyle::Disney => "disney",
            ComicStyle::Ghibli => "ghibli",
            ComicStyle::Pixar => "pixar",
            ComicStyle::Shonen => "shonen",
        }
    }

    /// Short human name, used where the prompt names the style inline.
    pub fn label(self) -> &'static str {
        match self {
            ComicStyle::Doraemon => "Doraemon",
            ComicStyle::American => "American comic",
            ComicStyle::Watercolor => "watercolor",
            ComicStyle::Disney => "Disney animation",
            ComicStyle::Ghibli => "Studio Ghibli",
            ComicStyle::Pixar => "Pixar animation",
            ComicStyle::Shonen => "shonen manga",
        }
    }

    /// Descriptive fragment injected into prompts.
    pub fn description(self) -> &'static str {
        match self {
            ComicStyle::Doraemon => {
                "Doraemon style: rounded, cute character designs, clean and bright line work, a warm and humorous atmosphere"
            }
            ComicStyle::American => {
                "American comic style: exaggerated muscular line work, heroic tone, strong contrast between light and shadow"
            }
            ComicStyle::Watercolor => {
                "Watercolor style: soft color transitions, artistic brush strokes, a dreamy atmosphere"
            }
            ComicStyle::Disney => {
                "Disney animation style: classic Disney character design, fluid motion, rich expressions, warm and bright colors, a magical and dreamlike atmosphere"
            }
            ComicStyle::Ghibli => {
                "Hayao Miyazaki / Studio Ghibli style: finely drawn natural scenery, soft warm tones, imaginative fantasy elements, delicate and lively expressions, poetic and soothing"
            }
            ComicStyle::Pixar => {
                "Pixar animation style: 3D rendered look, rounded and cute character design, rich lighting, detailed materials, sincere and moving emotion"
            }
            ComicStyle::Shonen => {
                "Japanese shonen manga style: dynamic lines and speed lines, exaggerated expressions and action, a fiery and passionate mood, strong visual impact, fast-paced paneling"
            }
        }
    }
}

impl fmt::Display for ComicStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Language text in the output should be written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    /// `zh`
    Chinese,
    /// `en`
    English,
    /// `ja`
    Japanese,
}

impl Language {
    /// Every language, in catalog order.
    pub const ALL: [Language; 3] = [Language::Chinese, Language::English, Language::Japanese];

    /// Looks up `key`, falling back to `default` for unknown keys.
    pub fn from_key_or(key: &str, default: Language) -> Self {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|language| language.key() == key)
            .unwrap_or(default)
    }

    /// The wire key.
    pub fn key(self) -> &'static str {
        match self {
            Language::Chinese => "zh",
            Language::English => "en",
            Language::Japanese => "ja",
        }
    }

    /// English name of the language.
    pub fn name(self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::English => "English",
            Language::Japanese => "Japanese",
        }
    }

    /// Instruction given to the storyboard model, in the target language.
    pub fn instruction(self) -> &'static str {
        match self {
            Language::Chinese => "请用中文生成所有内容（包括标题和分镜描述）。",
            Language::English => {
                "Please generate all content in English (including titles and panel descriptions)."
            }
            Language::Japanese => {
                "すべてのコンテンツ（タイトルとパネルの説明を含む）を日本語で生成してください。"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_round_trip_through_keys() {
        for style in ComicStyle::ALL {
            assert_eq!(ComicStyle::from_key(style.key()), style);
        }
        assert_eq!(ComicStyle::from_key(" Ghibli "), ComicStyle::Ghibli);
    }

    #[test]
    fn unknown_style_falls_back_to_doraemon() {
        assert_eq!(ComicStyle::from_key("cubism"), ComicStyle::Doraemon);
        assert_eq!(ComicStyle::from_key(""), ComicStyle::Doraemon);
    }

    #[test]
    fn language_fallback_depends_on_context() {
        assert_eq!(Language::from_key_or("ja", Language::English), Language::Japanese);
        assert_eq!(Language::from_key_or("fr", Language::Chinese), Language::Chinese);
        assert_eq!(Language::from_key_or("fr", Language::English), Language::English);
    }
}
