//! Plain-text citation rendering in the unsrt bibliography style.

use biblatex::{Bibliography, Chunk, Entry, EntryType, Person, Spanned};
use tracing::debug;

use super::bibtex::{clean_up_bibtex, EntryKind};
use crate::sources::SourceError;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A field an entry kind cannot be rendered without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing required field '{0}'")]
pub struct MissingField(pub &'static str);

/// Render `bibtex` as a citation string.
///
/// Text that does not parse yields `"Ref <key>"`. An entry missing one of
/// its kind's required fields falls back to its bare title, and an entry
/// without a title is a [`SourceError::CitationConversion`].
pub fn format_bibtex(bibtex: &str, key: &str, clean: bool) -> Result<String, SourceError> {
    let source = if clean {
        clean_up_bibtex(bibtex)
    } else {
        bibtex.to_string()
    };

    let bibliography = match Bibliography::parse(&source) {
        Ok(bibliography) => bibliography,
        Err(e) => {
            debug!("Failed to parse bibtex for {}: {}", key, e);
            return Ok(format!("Ref {}", key));
        }
    };
    let Some(entry) = bibliography.get(key).or_else(|| bibliography.iter().next()) else {
        return Ok(format!("Ref {}", key));
    };

    match format_entry(entry) {
        Ok(citation) if !citation.is_empty() => Ok(citation),
        result => {
            if let Err(missing) = result {
                debug!("Falling back to title for {}: {}", key, missing);
            }
            field(entry, "title").ok_or_else(|| {
                SourceError::CitationConversion(format!(
                    "Failed to process{} bibtex {} due to missing a 'title' field.",
                    if clean { " and clean up" } else { "" },
                    bibtex
                ))
            })
        }
    }
}

fn entry_kind(entry: &Entry) -> EntryKind {
    match entry.entry_type {
        EntryType::Article => EntryKind::Article,
        EntryType::Book => EntryKind::Book,
        EntryType::InBook => EntryKind::InBook,
        EntryType::InProceedings => EntryKind::InProceedings,
        EntryType::PhdThesis => EntryKind::PhdThesis,
        EntryType::Patent => EntryKind::Patent,
        EntryType::TechReport => EntryKind::TechReport,
        _ => EntryKind::Misc,
    }
}

/// Render one entry. Unknown entry types render like `misc`.
pub fn format_entry(entry: &Entry) -> Result<String, MissingField> {
    let kind = entry_kind(entry);
    let mut out = Sentences::default();

    match kind {
        EntryKind::Article => {
            out.push([Some(required_authors(entry)?)]);
            out.push([Some(required(entry, "title")?)]);
            out.push([
                Some(required(entry, "journal")?),
                volume_and_pages(entry),
                Some(date(entry)?),
            ]);
        }
        EntryKind::Book | EntryKind::InBook => {
            out.push([Some(authors_or_editors(entry)?)]);
            let mut title = required(entry, "title")?;
            if kind == EntryKind::InBook {
                if let Some(chapter) = field(entry, "chapter") {
                    title = format!("{}, chapter {}", title, chapter);
                } else if let Some(pages) = field(entry, "pages") {
                    title = format!("{}, pages {}", title, dashify(&pages));
                }
            }
            out.push([Some(title)]);
            out.push([volume_and_series(entry)]);
            out.push([
                Some(required(entry, "publisher")?),
                field(entry, "address"),
                field(entry, "edition").map(|e| format!("{} edition", e)),
                Some(date(entry)?),
            ]);
        }
        EntryKind::InProceedings => {
            out.push([Some(required_authors(entry)?)]);
            out.push([Some(required(entry, "title")?)]);
            out.push([
                editors(entry).map(|e| format!("{}, editors", format_names(&e))),
                Some(format!("In {}", required(entry, "booktitle")?)),
                volume_and_series(entry),
                field(entry, "pages").map(|p| format!("pages {}", dashify(&p))),
                field(entry, "address"),
                field(entry, "organization"),
                field(entry, "publisher"),
                Some(date(entry)?),
            ]);
        }
        EntryKind::PhdThesis => {
            out.push([Some(required_authors(entry)?)]);
            out.push([Some(required(entry, "title")?)]);
            out.push([
                Some("PhD thesis".to_string()),
                Some(required(entry, "school")?),
                field(entry, "address"),
                Some(date(entry)?),
            ]);
        }
        EntryKind::TechReport => {
            out.push([Some(required_authors(entry)?)]);
            out.push([Some(required(entry, "title")?)]);
            let report = field(entry, "type").unwrap_or_else(|| "Technical Report".to_string());
            let report = match field(entry, "number") {
                Some(number) => format!("{} {}", report, number),
                None => report,
            };
            out.push([
                Some(report),
                Some(required(entry, "institution")?),
                field(entry, "address"),
                Some(date(entry)?),
            ]);
        }
        EntryKind::Patent => {
            out.push([Some(required_authors(entry)?)]);
            out.push([Some(required(entry, "title")?)]);
            out.push([field(entry, "number"), Some(date(entry)?)]);
        }
        EntryKind::Misc => {
            out.push([authors(entry).map(|a| format_names(&a))]);
            out.push([field(entry, "title")]);
            out.push([field(entry, "howpublished"), optional_date(entry)]);
            out.push([field(entry, "note")]);
        }
    }

    Ok(out.finish())
}

/// Field text with whitespace collapsed; empty counts as missing.
fn field(entry: &Entry, name: &str) -> Option<String> {
    entry
        .get(name)
        .map(chunks_to_string)
        .map(|value| value.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|value| !value.is_empty())
}

fn chunks_to_string(chunks: &[Spanned<Chunk>]) -> String {
    chunks
        .iter()
        .map(|chunk| match &chunk.v {
            Chunk::Normal(s) | Chunk::Verbatim(s) | Chunk::Math(s) => s.as_str(),
        })
        .collect()
}

fn required(entry: &Entry, name: &'static str) -> Result<String, MissingField> {
    field(entry, name).ok_or(MissingField(name))
}

fn authors(entry: &Entry) -> Option<Vec<Person>> {
    entry.author().ok().filter(|people| !people.is_empty())
}

fn editors(entry: &Entry) -> Option<Vec<Person>> {
    entry
        .editors()
        .ok()
        .map(|groups| {
            groups
                .into_iter()
                .flat_map(|(people, _)| people)
                .collect::<Vec<_>>()
        })
        .filter(|people| !people.is_empty())
}

fn required_authors(entry: &Entry) -> Result<String, MissingField> {
    authors(entry)
        .map(|people| format_names(&people))
        .ok_or(MissingField("author"))
}

fn authors_or_editors(entry: &Entry) -> Result<String, MissingField> {
    if let Some(people) = authors(entry) {
        return Ok(format_names(&people));
    }
    let people = editors(entry).ok_or(MissingField("author"))?;
    let suffix = if people.len() > 1 { "editors" } else { "editor" };
    Ok(format!("{}, {}", format_names(&people), suffix))
}

fn date(entry: &Entry) -> Result<String, MissingField> {
    let year = required(entry, "year")?;
    Ok(match field(entry, "month") {
        Some(month) => format!("{} {}", month_name(&month), year),
        None => year,
    })
}

/// `2`, `feb` and `February` all render as `February`.
fn month_name(month: &str) -> String {
    if let Some(name) = month
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| MONTHS.get(i))
    {
        return name.to_string();
    }
    MONTHS
        .iter()
        .find(|name| {
            month.len() >= 3
                && month.len() <= name.len()
                && name[..month.len()].eq_ignore_ascii_case(month)
        })
        .map(|name| name.to_string())
        .unwrap_or_else(|| month.to_string())
}

fn optional_date(entry: &Entry) -> Option<String> {
    date(entry).ok()
}

fn volume_and_pages(entry: &Entry) -> Option<String> {
    let pages = field(entry, "pages").map(|p| dashify(&p));
    match field(entry, "volume") {
        Some(volume) => {
            let mut text = volume;
            if let Some(number) = field(entry, "number") {
                text.push_str(&format!("({})", number));
            }
            if let Some(pages) = pages {
                text.push_str(&format!(":{}", pages));
            }
            Some(text)
        }
        None => pages.map(|p| format!("pages {}", p)),
    }
}

fn volume_and_series(entry: &Entry) -> Option<String> {
    match (field(entry, "volume"), field(entry, "series")) {
        (Some(volume), Some(series)) => Some(format!("volume {} of {}", volume, series)),
        (Some(volume), None) => Some(format!("volume {}", volume)),
        (None, Some(series)) => Some(series),
        (None, None) => None,
    }
}

fn dashify(pages: &str) -> String {
    pages.replace("--", "\u{2013}").replace('-', "\u{2013}")
}

/// "Given Prefix Family Suffix"; `others` becomes "et al.".
fn format_person(person: &Person) -> String {
    if person.given_name.is_empty() && person.name.eq_ignore_ascii_case("others") {
        return "et al.".to_string();
    }
    [
        person.given_name.as_str(),
        person.prefix.as_str(),
        person.name.as_str(),
        person.suffix.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

fn format_names(people: &[Person]) -> String {
    let mut names: Vec<String> = people.iter().map(format_person).collect();
    let et_al = names.last().is_some_and(|n| n == "et al.");
    if et_al {
        names.pop();
    }

    let joined = match names.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    };
    match (et_al, joined.is_empty()) {
        (true, true) => "et al.".to_string(),
        (true, false) => format!("{} et al.", joined),
        (false, _) => joined,
    }
}

#[derive(Default)]
struct Sentences(Vec<String>);

impl Sentences {
    fn push<I>(&mut self, parts: I)
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let sentence = parts
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if !sentence.is_empty() {
            self.0.push(sentence);
        }
    }

    fn finish(self) -> String {
        self.0
            .into_iter()
            .map(|mut sentence| {
                if !sentence.ends_with(['.', '?', '!']) {
                    sentence.push('.');
                }
                sentence
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S2_BIBTEX: &str = "@['JournalArticle']{Vaswani2017AttentionIA,\n author = {Ashish Vaswani and Noam M. Shazeer and Niki Parmar},\n journal = {ArXiv},\n title = {Attention is All you Need},\n volume = {abs/1706.03762},\n year = {2017}\n}\n";

    #[test]
    fn test_article() {
        let citation = format_bibtex(S2_BIBTEX, "Vaswani2017AttentionIA", true).unwrap();
        assert_eq!(
            citation,
            "Ashish Vaswani, Noam M. Shazeer, and Niki Parmar. Attention is All you Need. ArXiv, abs/1706.03762, 2017."
        );
    }

    #[test]
    fn test_article_with_pages_and_number() {
        let bibtex = "@article{Doe_2020, title={Aromaticity of benzene}, volume={12}, number={3}, pages={10--20}, journal={J. Chem.}, author={Doe, Jane and Roe, Richard}, year={2020}, month=feb}";
        let citation = format_bibtex(bibtex, "Doe_2020", false).unwrap();
        assert_eq!(
            citation,
            "Jane Doe and Richard Roe. Aromaticity of benzene. J. Chem., 12(3):10\u{2013}20, February 2020."
        );
    }

    #[test]
    fn test_inproceedings_and_thesis() {
        let bibtex = "@inproceedings{k, author={Ada Lovelace}, title={Engines}, booktitle={Proc. Analytical Society}, pages={1-5}, year={1843}}";
        assert_eq!(
            format_bibtex(bibtex, "k", false).unwrap(),
            "Ada Lovelace. Engines. In Proc. Analytical Society, pages 1\u{2013}5, 1843."
        );

        let bibtex = "@phdthesis{t, author={Grace Hopper}, title={New Types of Irreducibility Criteria}, school={Yale University}, year={1934}}";
        assert_eq!(
            format_bibtex(bibtex, "t", false).unwrap(),
            "Grace Hopper. New Types of Irreducibility Criteria. PhD thesis, Yale University, 1934."
        );
    }

    #[test]
    fn test_book_with_editors() {
        let bibtex = "@book{b, editor={Smith, Ann and Jones, Bob}, title={Handbook}, publisher={Press}, year={2001}}";
        assert_eq!(
            format_bibtex(bibtex, "b", false).unwrap(),
            "Ann Smith and Bob Jones, editors. Handbook. Press, 2001."
        );
    }

    #[test]
    fn test_missing_required_field_falls_back_to_title() {
        let bibtex = "@['JournalArticle']{k,\n title = {Only a Title},\n year = {2020}\n}";
        assert_eq!(format_bibtex(bibtex, "k", true).unwrap(), "Only a Title");
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let bibtex = "@article{k, journal={J}, year={2020}}";
        let err = format_bibtex(bibtex, "k", true).unwrap_err();
        assert!(matches!(err, SourceError::CitationConversion(_)));
    }

    #[test]
    fn test_unparseable_text_yields_ref() {
        assert_eq!(format_bibtex("not bibtex", "key1", true).unwrap(), "Ref key1");
        assert_eq!(
            format_bibtex("@article{k, title={open", "k", false).unwrap(),
            "Ref k"
        );
    }

    #[test]
    fn test_misc_and_others() {
        let bibtex = "@['Dataset']{d, author={Ann Lee and others}, title={Data}, howpublished={Zenodo}, year={2022}}";
        assert_eq!(
            format_bibtex(bibtex, "d", true).unwrap(),
            "Ann Lee et al. Data. Zenodo, 2022."
        );
    }

    #[test]
    fn test_string_macros_and_quoted_values() {
        let bibtex = r#"@string{zen = "Zenodo"}
@misc{key1,
  author = {Müller, Hans},
  title = "A {Nested} Title",
  howpublished = zen,
  year = 2021,
}"#;
        assert_eq!(
            format_bibtex(bibtex, "key1", false).unwrap(),
            "Hans Müller. A Nested Title. Zenodo, 2021."
        );
    }

    #[test]
    fn test_month_names() {
        assert_eq!(month_name("2"), "February");
        assert_eq!(month_name("feb"), "February");
        assert_eq!(month_name("February"), "February");
        assert_eq!(month_name("Spring"), "Spring");
    }

    #[test]
    fn test_sentence_ending_punctuation_is_not_doubled() {
        let bibtex = "@misc{q, title={Is it aromatic?}}";
        assert_eq!(format_bibtex(bibtex, "q", false).unwrap(), "Is it aromatic?");
    }
}
