//! Human-readable listings of a [`Snapshot`].
//!
//! Items are opaque researchmap records, so every field is looked up leniently:
//! Japanese text is preferred over English, and a missing, `null`, empty or
//! `false` field counts as absent.

use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

use crate::export::Snapshot;

/// Publications shown in the "selected" list when none is marked major.
pub const SELECTED_FALLBACK: usize = 6;
/// Publications shown in the "recent" list.
pub const RECENT_LIMIT: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Markdown,
    Html,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    pub authors: String,
    pub title: String,
    pub journal: String,
    pub volume: String,
    pub number: String,
    pub year: String,
    pub pages: String,
    pub doi: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grant {
    pub title: String,
    /// Funder, programme, category, institution, period, role; empty parts dropped.
    pub meta: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Award {
    pub name: String,
    pub title: String,
    pub meta: Vec<String>,
}

/// The listing sections, each sorted newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub selected: Vec<Publication>,
    pub recent: Vec<Publication>,
    pub grants: Vec<Grant>,
    pub awards: Vec<Award>,
}

impl Listing {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let papers = newest_first(&snapshot.published_papers, "publication_date");

        let major: Vec<&Value> = papers
            .iter()
            .copied()
            .filter(|it| it.get("major_achievement") == Some(&Value::Bool(true)))
            .collect();
        let selected = if major.is_empty() {
            papers.iter().take(SELECTED_FALLBACK).copied().collect()
        } else {
            major
        };

        Self {
            selected: selected.into_iter().map(publication).collect(),
            recent: papers.iter().take(RECENT_LIMIT).map(|it| publication(it)).collect(),
            grants: newest_first(&snapshot.research_projects, "from_date")
                .into_iter()
                .map(grant)
                .collect(),
            awards: newest_first(&snapshot.awards, "award_date")
                .into_iter()
                .map(award)
                .collect(),
        }
    }

    pub fn render(&self, format: Format) -> String {
        match format {
            Format::Markdown => self.to_markdown(),
            Format::Html => self.to_html(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        section_markdown(&mut out, "Selected publications", &self.selected, |p| {
            publication_line(p, Markup::Markdown)
        });
        section_markdown(&mut out, "Recent publications", &self.recent, |p| {
            publication_line(p, Markup::Markdown)
        });
        section_markdown(&mut out, "Research projects", &self.grants, |g| {
            let mut line = format!("**{}**", g.title);
            if !g.meta.is_empty() {
                line.push_str(&format!("  \n  {}", g.meta.join(" / ")));
            }
            line
        });
        section_markdown(&mut out, "Awards", &self.awards, |a| {
            award_line(a, Markup::Markdown)
        });

        out
    }

    /// HTML fragment with one `<ul>` per section, ids matching the profile page.
    pub fn to_html(&self) -> String {
        let mut out = String::new();

        section_html(&mut out, "publist-selected", &self.selected, |p| {
            publication_line(p, Markup::Html)
        });
        section_html(&mut out, "publist-all", &self.recent, |p| {
            publication_line(p, Markup::Html)
        });
        section_html(&mut out, "grants-list", &self.grants, |g| {
            let mut html = String::new();
            if !g.title.is_empty() {
                html.push_str(&format!("<strong>{}</strong>", escape_html(&g.title)));
            }
            if !g.meta.is_empty() {
                html.push_str(&format!(
                    "<br><span class=\"muted\">{}</span>",
                    escape_html(&g.meta.join(" / "))
                ));
            }
            html
        });
        section_html(&mut out, "awards-list", &self.awards, |a| {
            award_line(a, Markup::Html)
        });

        out
    }
}

#[derive(Clone, Copy)]
enum Markup {
    Markdown,
    Html,
}

fn section_markdown<T>(out: &mut String, heading: &str, entries: &[T], line: impl Fn(&T) -> String) {
    out.push_str(&format!("## {} ({})\n\n", heading, entries.len()));
    for entry in entries {
        out.push_str(&format!("- {}\n", line(entry)));
    }
    out.push('\n');
}

fn section_html<T>(out: &mut String, id: &str, entries: &[T], line: impl Fn(&T) -> String) {
    out.push_str(&format!("<ul id=\"{}\">\n", id));
    for entry in entries {
        out.push_str(&format!("  <li>{}</li>\n", line(entry)));
    }
    out.push_str("</ul>\n");
}

fn publication_line(p: &Publication, markup: Markup) -> String {
    let esc = |s: &str| -> String {
        match markup {
            Markup::Markdown => s.to_string(),
            Markup::Html => escape_html(s).into_owned(),
        }
    };

    let mut line = String::new();
    if !p.authors.is_empty() {
        line.push_str(&format!("{}, ", esc(&p.authors)));
    }
    if !p.title.is_empty() {
        line.push_str(&format!("“{}”", esc(&p.title)));
    }
    if !p.journal.is_empty() {
        match markup {
            Markup::Markdown => line.push_str(&format!(", *{}*", p.journal)),
            Markup::Html => line.push_str(&format!(", <em>{}</em>", esc(&p.journal))),
        }
    }
    if !p.volume.is_empty() {
        line.push_str(&format!(", {}", esc(&p.volume)));
        if !p.number.is_empty() {
            line.push_str(&format!("({})", esc(&p.number)));
        }
    }
    if !p.year.is_empty() {
        line.push_str(&format!(", {}", esc(&p.year)));
    }
    if !p.pages.is_empty() {
        line.push_str(&format!(", pp.{}", esc(&p.pages)));
    }
    if !p.doi.is_empty() {
        let url = format!("https://doi.org/{}", p.doi);
        match markup {
            Markup::Markdown => line.push_str(&format!(", [doi:{}]({})", p.doi, url)),
            Markup::Html => line.push_str(&format!(
                ", <a href=\"{}\" target=\"_blank\" rel=\"noopener\">doi:{}</a>",
                escape_html(&url),
                esc(&p.doi)
            )),
        }
    }
    line
}

fn award_line(a: &Award, markup: Markup) -> String {
    let mut line = String::new();
    match markup {
        Markup::Markdown => {
            if !a.name.is_empty() {
                line.push_str(&format!("**{}**", a.name));
            }
            if !a.title.is_empty() {
                line.push_str(&format!(" – {}", a.title));
            }
            if !a.meta.is_empty() {
                line.push_str(&format!("  \n  {}", a.meta.join(" / ")));
            }
        }
        Markup::Html => {
            if !a.name.is_empty() {
                line.push_str(&format!("<strong>{}</strong>", escape_html(&a.name)));
            }
            if !a.title.is_empty() {
                line.push_str(&format!(" – {}", escape_html(&a.title)));
            }
            if !a.meta.is_empty() {
                line.push_str(&format!(
                    "<br><span class=\"muted\">{}</span>",
                    escape_html(&a.meta.join(" / "))
                ));
            }
        }
    }
    line
}

fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Sorts by the string field `key`, descending; items without it go last.
fn newest_first<'a>(items: &'a [Value], key: &str) -> Vec<&'a Value> {
    let mut sorted: Vec<&Value> = items.iter().collect();
    sorted.sort_by(|a, b| -> Ordering {
        let da = a.get(key).and_then(Value::as_str).unwrap_or("");
        let db = b.get(key).and_then(Value::as_str).unwrap_or("");
        db.cmp(da)
    });
    sorted
}

fn publication(item: &Value) -> Publication {
    let date = scalar_text(field(item, &["publication_date"]));
    Publication {
        authors: format_authors(field(item, &["authors", "author"])),
        title: pick_text(field(item, &["paper_title", "title"])),
        journal: pick_text(field(item, &["publication_name", "journal"])),
        volume: scalar_text(field(item, &["volume"])),
        number: scalar_text(field(item, &["number", "issue"])),
        year: date.chars().take(4).collect(),
        pages: pages(item),
        doi: doi(item),
    }
}

fn grant(item: &Value) -> Grant {
    let from = scalar_text(field(item, &["from_date"]));
    let to = scalar_text(field(item, &["to_date"]));
    let role = Some(pick_text(field(item, &["research_project_owner_role"])))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| pick_text(field(item, &["research_project_roles"])));

    let mut meta: Vec<String> = [
        "offer_organization",
        "system_name",
        "category",
        "institution_name",
    ]
    .into_iter()
    .map(|k| pick_text(field(item, &[k])))
    .filter(|s| !s.is_empty())
    .collect();
    if !from.is_empty() || !to.is_empty() {
        meta.push(format!("{} – {}", from, to));
    }
    if !role.is_empty() {
        meta.push(role);
    }

    Grant {
        title: pick_text(field(item, &["research_project_title", "title"])),
        meta,
    }
}

fn award(item: &Value) -> Award {
    let meta = [
        pick_text(field(item, &["association", "organization"])),
        scalar_text(field(item, &["award_date"])),
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect();

    Award {
        name: pick_text(field(item, &["award_name", "name"])),
        title: pick_text(field(item, &["award_title", "title"])),
        meta,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First present value among `keys`.
fn field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| item.get(*k)).find(|v| truthy(v))
}

fn scalar_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

/// A plain string, else the non-blank `ja`, else the non-blank `en`.
fn pick_text(v: Option<&Value>) -> String {
    let Some(v) = v else {
        return String::new();
    };
    if let Some(s) = v.as_str() {
        return s.to_string();
    }
    ["ja", "en"]
        .iter()
        .filter_map(|lang| v.get(*lang).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .unwrap_or("")
        .to_string()
}

fn format_authors(v: Option<&Value>) -> String {
    let Some(v) = v else {
        return String::new();
    };
    let list = match v {
        Value::Array(list) => list,
        _ => match ["ja", "en"].iter().find_map(|lang| v.get(*lang).and_then(Value::as_array)) {
            Some(list) => list,
            None => return String::new(),
        },
    };

    list.iter()
        .map(author_name)
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn author_name(a: &Value) -> String {
    match a {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let name = scalar_text(field(a, &["name"]));
            if !name.is_empty() {
                return name;
            }
            let parts: Vec<String> = ["family_name", "given_name"]
                .into_iter()
                .map(|k| scalar_text(field(a, &[k])))
                .filter(|s| !s.is_empty())
                .collect();
            if !parts.is_empty() {
                return parts.join(" ");
            }
            map.values()
                .map(|v| scalar_text(Some(v)))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        }
        _ => String::new(),
    }
}

fn pages(item: &Value) -> String {
    if let Some(range) = field(item, &["page_range"]) {
        return scalar_text(Some(range));
    }
    let sp = scalar_text(field(item, &["starting_page"]));
    let ep = scalar_text(field(item, &["ending_page"]));
    match (sp.is_empty(), ep.is_empty()) {
        (false, false) => format!("{}–{}", sp, ep),
        (false, true) => sp,
        (true, false) => ep,
        (true, true) => scalar_text(field(item, &["pages"])),
    }
}

fn doi(item: &Value) -> String {
    if let Some(Value::String(doi)) = field(item, &["doi"]) {
        return doi.clone();
    }
    item.get("identifiers")
        .and_then(|ids| ids.get("doi"))
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .map(|first| scalar_text(Some(first)))
        .unwrap_or_default()
}
