//! BibTeX normalization.
//!
//! Providers hand out BibTeX with non-standard entry types (`@JournalArticle`,
//! `@['JournalArticle', 'Review']`, `@None`). [`clean_up_bibtex`] maps those to
//! the standard kinds so `biblatex` can parse the entry for
//! [`crate::utils::format_bibtex`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static LIST_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\s*\[([^\]]*)\]").expect("list header regex is valid"));
#[allow(clippy::expect_used)]
static PLAIN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\s*([A-Za-z]+)\s*[{(]").expect("plain header regex is valid"));
#[allow(clippy::expect_used)]
static BRACED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s,{])([a-z]+)\s*=\s*\{([^}]*)\}").expect("braced field regex is valid")
});

/// Canonical bibliography entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Article,
    Book,
    InBook,
    InProceedings,
    Misc,
    PhdThesis,
    Patent,
    TechReport,
}

impl EntryKind {
    pub const ALL: [EntryKind; 8] = [
        EntryKind::Article,
        EntryKind::Book,
        EntryKind::InBook,
        EntryKind::InProceedings,
        EntryKind::Misc,
        EntryKind::PhdThesis,
        EntryKind::Patent,
        EntryKind::TechReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Article => "article",
            EntryKind::Book => "book",
            EntryKind::InBook => "inbook",
            EntryKind::InProceedings => "inproceedings",
            EntryKind::Misc => "misc",
            EntryKind::PhdThesis => "phdthesis",
            EntryKind::Patent => "patent",
            EntryKind::TechReport => "techreport",
        }
    }

    /// Map one provider record-type token, if it is known.
    pub fn from_token(token: &str) -> Option<Self> {
        let kind = match token {
            "None" | "Article" | "JournalArticle" | "Review" | "Journal" | "Preprint" | "Plain" => {
                EntryKind::Article
            }
            "Book" => EntryKind::Book,
            "BookSection" => EntryKind::InBook,
            "ConferencePaper" | "Conference" => EntryKind::InProceedings,
            "Dataset" | "WebPage" => EntryKind::Misc,
            "Dissertation" | "Thesis" => EntryKind::PhdThesis,
            "Patent" => EntryKind::Patent,
            "Report" => EntryKind::TechReport,
            other => {
                return Self::ALL
                    .into_iter()
                    .find(|kind| kind.as_str().eq_ignore_ascii_case(other))
            }
        };
        Some(kind)
    }

    /// First token that maps wins; nothing known means `article`.
    pub fn from_tokens<'a, I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens
            .into_iter()
            .find_map(Self::from_token)
            .unwrap_or(EntryKind::Article)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rewrite the entry header so its type is a canonical kind.
pub fn clean_up_bibtex(bibtex: &str) -> String {
    if bibtex.contains("@None") {
        return bibtex.replace("@None", "@article");
    }

    if let Some(caps) = LIST_HEADER.captures(bibtex) {
        let tokens = caps[1]
            .split(',')
            .map(|t| t.trim().trim_matches(|c| c == '\'' || c == '"').trim());
        let kind = EntryKind::from_tokens(tokens);
        return bibtex.replacen(&caps[0], &format!("@{}", kind), 1);
    }

    if let Some(m) = PLAIN_HEADER.captures(bibtex).and_then(|caps| caps.get(1)) {
        let kind = EntryKind::from_tokens([m.as_str()]);
        return format!("{}{}{}", &bibtex[..m.start()], kind, &bibtex[m.end()..]);
    }

    bibtex.to_string()
}

/// Citation key: the text between the first `{` and the following `,`.
pub fn extract_key(bibtex: &str) -> Option<&str> {
    let after_brace = bibtex.split_once('{')?.1;
    let key = after_brace.split(',').next()?.trim();
    (!key.is_empty()).then_some(key)
}

/// Replace the provider's key with `<author><year><title>` built from the
/// entry's own fields, keeping the underscore-stripped key when a fragment
/// is missing.
pub fn regenerate_key(bibtex: &str) -> String {
    let Some(key) = extract_key(bibtex) else {
        return bibtex.to_string();
    };
    let fallback = key.replace('_', "");

    let new_key = match (
        key_fragment(bibtex, "author"),
        key_fragment(bibtex, "year"),
        key_fragment(bibtex, "title"),
    ) {
        (Some(author), Some(year), Some(title)) => format!("{}{}{}", author, year, title),
        _ => fallback,
    };

    bibtex.replacen(&format!("{{{},", key), &format!("{{{},", new_key), 1)
}

fn key_fragment(bibtex: &str, field: &str) -> Option<String> {
    let value = BRACED_FIELD
        .captures_iter(bibtex)
        .find(|caps| caps[1].eq_ignore_ascii_case(field))
        .map(|caps| caps[2].to_string())?;

    let first = value.split(" and ").next()?.split_whitespace().next()?;
    let fragment: String = first.chars().filter(|c| c.is_alphanumeric()).collect();
    (!fragment.is_empty()).then_some(fragment)
}
