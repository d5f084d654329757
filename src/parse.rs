use scraper::{ElementRef, Html, Selector};

use crate::labels::{
    AWARDED_TO, BUYER_FIELDS, DETAIL_FIELDS, MANY_SUPPLIERS, ONE_SUPPLIER, OPTIONAL_FIELDS,
    PUBLISHED_FALLBACK, REFERENCE, SHOW_SUPPLIER, SUPPLIERS_END, SUPPLIER_FIELDS, TENDER_TOKEN,
};
use crate::record::{Record, Value};
use crate::{Error, Result};

const TITLE_SELECTOR: &str = ".govuk-heading-l.break-word";
const COMMISSIONER_SELECTOR: &str = r#"div[class="standard-col"]"#;
const METADATA_SELECTOR: &str = r#"div[class="search-no-top-margin"]"#;
const CONTENT_SELECTOR: &str = r#"div[class="content-block"]"#;

/// Turns the markup of one awarded-contract notice into a flat `Record`.
///
/// Pure: the same markup always gives the same record. Fields whose label doesn't appear
/// on the page come out as `Value::Missing`. The only hard failures are a page without any
/// content blocks (usually a page that hasn't finished loading) and a supplier count that
/// isn't a number.
pub fn extract(markup: &str) -> Result<Record> {
    let doc = Html::parse_document(markup);

    let content_selector = create_selector(CONTENT_SELECTOR)?;
    let blocks: Vec<ElementRef> = doc.select(&content_selector).collect();
    if blocks.is_empty() {
        return Err(Error::ParseMissingSelector(CONTENT_SELECTOR.into()));
    }
    let text = normalize_text(
        &blocks
            .iter()
            .map(|block| block.text().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n"),
    );

    let title = select_text(&doc, TITLE_SELECTOR)?
        .into_iter()
        .map(|t| normalize_text(&t).replace('\n', " "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let commissioner = select_text(&doc, COMMISSIONER_SELECTOR)?
        .into_iter()
        .next()
        .map(|t| normalize_text(&t));
    let metadata = normalize_text(&select_text(&doc, METADATA_SELECTOR)?.join("\n"));

    let mut record = Record::new();
    record.insert("commissioner", commissioner.as_deref());
    record.insert("reference_no", reference_no(&text));
    record.insert("title", (!title.is_empty()).then_some(title.as_str()));

    for field in DETAIL_FIELDS {
        record.insert(field.field, field.slice(&text));
    }
    if record.get("published_date").is_some_and(Value::is_missing) {
        record.insert("published_date", published_from_metadata(&metadata));
    }

    record.insert("suppliers_n", suppliers_count(&text)?);
    for field in BUYER_FIELDS {
        record.insert(field.field, field.slice(&text));
    }

    let suppliers = Suppliers::scan(&text);
    record.insert("supplier_name", suppliers.names);
    for (field, values) in SUPPLIER_FIELDS.iter().zip(suppliers.details) {
        record.insert(field.field, values);
    }

    for field in OPTIONAL_FIELDS {
        record.insert(field.field, field.slice(&text));
    }

    Ok(record)
}

/// Drops blank lines and trims the rest, keeping one line break between them.
pub(crate) fn normalize_text(raw: &str) -> String {
    raw.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn select_text(doc: &Html, selector: &str) -> Result<Vec<String>> {
    let selector = create_selector(selector)?;
    Ok(doc
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect())
}

/// Reference numbers come either as the portal's own `tender_...` identifier, sometimes
/// behind a prefix, or as the buyer's free-form reference on the first line.
fn reference_no(text: &str) -> Option<&str> {
    let segment = REFERENCE.slice(text)?;
    let value = match segment.to_ascii_lowercase().find(TENDER_TOKEN) {
        Some(i) => &segment[i..],
        None => segment,
    };
    value.lines().next().map(str::trim).filter(|v| !v.is_empty())
}

fn published_from_metadata(metadata: &str) -> Option<&str> {
    PUBLISHED_FALLBACK
        .iter()
        .find_map(|field| field.slice(metadata).filter(|v| !v.is_empty()))
}

fn awarded_to(text: &str) -> Option<usize> {
    AWARDED_TO
        .iter()
        .find_map(|phrase| text.find(phrase).map(|i| i + phrase.len()))
}

fn suppliers_count(text: &str) -> Result<Value> {
    let Some(start) = awarded_to(text) else {
        return Ok(Value::Missing);
    };
    let line = text[start..].trim_start().lines().next().unwrap_or("").trim();
    line.split_whitespace()
        .next()
        .and_then(|n| n.parse::<u32>().ok())
        .map(Value::Int)
        .ok_or_else(|| Error::FieldParse {
            field: "suppliers_n",
            value: line.to_string(),
        })
}

/// Awarded suppliers, aligned by index. `details` follows the order of `SUPPLIER_FIELDS`.
struct Suppliers {
    names: Vec<String>,
    details: Vec<Vec<String>>,
}

impl Suppliers {
    fn scan(text: &str) -> Self {
        let lines: Vec<&str> = supplier_block(text)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let markers: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(SHOW_SUPPLIER))
            .map(|(i, _)| i)
            .collect();

        let mut suppliers = Suppliers {
            names: Vec::with_capacity(markers.len()),
            details: vec![Vec::with_capacity(markers.len()); SUPPLIER_FIELDS.len()],
        };

        for (n, &at) in markers.iter().enumerate() {
            let name = at.checked_sub(1).map_or("", |i| lines[i]);
            // The bundle runs until the line naming the next supplier.
            let bundle_end = markers
                .get(n + 1)
                .map_or(lines.len(), |&next| (next - 1).max(at + 1));
            let bundle = lines[at + 1..bundle_end].join("\n");

            suppliers.names.push(name.to_string());
            for (field, values) in SUPPLIER_FIELDS.iter().zip(suppliers.details.iter_mut()) {
                values.push(field.slice(&bundle).unwrap_or_default().to_string());
            }
        }
        suppliers
    }
}

/// Text between "... awarded to N supplier(s)." and the buyer section.
fn supplier_block(text: &str) -> &str {
    let from = awarded_to(text).unwrap_or(0);
    let rest = &text[from..];
    let opener = if rest.contains(ONE_SUPPLIER) {
        ONE_SUPPLIER
    } else {
        MANY_SUPPLIERS
    };
    let Some(i) = rest.find(opener) else {
        return "";
    };
    let block = &rest[i + opener.len()..];
    match block.find(SUPPLIERS_END) {
        Some(end) => &block[..end],
        None => block,
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
