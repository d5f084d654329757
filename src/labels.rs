//! Where each field lives in the normalized notice text.
//!
//! Every label the extractor relies on is in this file, so a wording change on the
//! portal is a one-place edit.

/// Where a field's value stops.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Bound {
    /// First occurrence of the label after the value starts.
    Next(&'static str),
    /// Last occurrence of the label anywhere in the text. Ignored if it lies before the value.
    Last(&'static str),
    /// First occurrence of the label on the value's own line.
    OnLine(&'static str),
    /// End of the first non-blank line after the label.
    LineEnd,
    End,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldLabel {
    pub field: &'static str,
    /// The label is searched for only after this text, when set.
    pub anchor: Option<&'static str>,
    pub label: &'static str,
    /// Tried in order, the first one found wins.
    pub ends: &'static [Bound],
}

impl FieldLabel {
    const fn new(field: &'static str, label: &'static str, ends: &'static [Bound]) -> Self {
        FieldLabel {
            field,
            anchor: None,
            label,
            ends,
        }
    }

    const fn after(self, anchor: &'static str) -> Self {
        FieldLabel {
            anchor: Some(anchor),
            ..self
        }
    }

    /// The trimmed text between the label and its end bound, or `None` if either is absent.
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        let from = match self.anchor {
            Some(anchor) => text.find(anchor)? + anchor.len(),
            None => 0,
        };
        let start = from + text[from..].find(self.label)? + self.label.len();
        let end = self.ends.iter().find_map(|bound| bound.locate(text, start))?;
        Some(text[start..end].trim())
    }
}

impl Bound {
    fn locate(&self, text: &str, start: usize) -> Option<usize> {
        match *self {
            Bound::Next(label) => text[start..].find(label).map(|i| start + i),
            Bound::Last(label) => text.rfind(label).filter(|&i| i >= start),
            Bound::OnLine(label) => {
                let line_end = Bound::LineEnd.locate(text, start)?;
                text[start..line_end].find(label).map(|i| start + i)
            }
            Bound::LineEnd => {
                let rest = &text[start..];
                let line_start = start + (rest.len() - rest.trim_start().len());
                Some(
                    text[line_start..]
                        .find('\n')
                        .map_or(text.len(), |i| line_start + i),
                )
            }
            Bound::End => Some(text.len()),
        }
    }
}

pub(crate) const REFERENCE: FieldLabel = FieldLabel::new(
    "reference_no",
    "Procurement reference",
    &[Bound::Next("Published date"), Bound::LineEnd],
);
/// Marks the portal's own tender identifiers, e.g. `tender_286484/1116405`.
pub(crate) const TENDER_TOKEN: &str = "tender";

/// Contract summary, dates and values, in output order.
pub(crate) const DETAIL_FIELDS: &[FieldLabel] = &[
    FieldLabel::new("description", "Description", &[Bound::Last("More")]),
    FieldLabel::new("contract_SIC", "Industry", &[Bound::Last("Location")]),
    FieldLabel::new(
        "contract_location",
        "Location of contract",
        &[Bound::Next("Value")],
    ),
    FieldLabel::new(
        "published_date",
        "Published date",
        &[Bound::Next("Closing date"), Bound::LineEnd],
    ),
    FieldLabel::new("closing_date", "Closing date", &[Bound::Last("Closing time")]),
    FieldLabel::new(
        "awarded_date",
        "Awarded date",
        &[Bound::Last("Contract start date")],
    ),
    FieldLabel::new(
        "contract_start_date",
        "Contract start date\n",
        &[Bound::Next("Contract end date")],
    ),
    FieldLabel::new(
        "contract_end_date",
        "Contract end date",
        &[Bound::Last("Contract type")],
    ),
    FieldLabel::new(
        "contract_type",
        "Contract type",
        &[Bound::Last("Procedure type"), Bound::LineEnd],
    ),
    FieldLabel::new(
        "suitable_for_SMEs",
        "SMEs?",
        &[Bound::Last("Contract is suitable for VCSEs")],
    ),
    FieldLabel::new("suitable_for_VCSEs", "VCSEs?", &[Bound::Last("Description")]),
    FieldLabel::new(
        "advertised_value",
        "Value of contract",
        &[Bound::Last("Procurement reference")],
    ),
    FieldLabel::new(
        "awarded_value",
        "Total value of contract",
        &[Bound::Last("This contract")],
    ),
];

/// Read from the publication metadata panel when the notice body has no published date,
/// e.g. "Published 1 March 2023, last edited 21 April 2023". First match wins.
pub(crate) const PUBLISHED_FALLBACK: &[FieldLabel] = &[
    FieldLabel::new("published_date", "Published date:", PUBLISHED_ENDS),
    FieldLabel::new("published_date", "Published date", PUBLISHED_ENDS),
    FieldLabel::new("published_date", "Published:", PUBLISHED_ENDS),
    FieldLabel::new("published_date", "Published", PUBLISHED_ENDS),
];
const PUBLISHED_ENDS: &[Bound] = &[Bound::OnLine(","), Bound::LineEnd];

/// Phrases introducing the supplier count, e.g. "This contract was awarded to 2 suppliers."
pub(crate) const AWARDED_TO: &[&str] = &["was awarded to", "is awarded to"];

/// The buyer's contact block.
pub(crate) const BUYER_FIELDS: &[FieldLabel] = &[
    FieldLabel::new("commissioner_name", "Contact name", &[Bound::Last("Address")]),
    FieldLabel::new("commissioner_address", "Address", &[Bound::Next("Email")])
        .after("Contact name"),
];

/// Present on some notices only; missing otherwise.
pub(crate) const OPTIONAL_FIELDS: &[FieldLabel] = &[
    FieldLabel::new("commissioner_website", "Website", &[Bound::LineEnd]),
    FieldLabel::new("procedure_type", "Procedure type", &[Bound::LineEnd]),
];

/// Opens the supplier block on a single-supplier award.
pub(crate) const ONE_SUPPLIER: &str = "supplier.";
pub(crate) const MANY_SUPPLIERS: &str = "suppliers.";
pub(crate) const SUPPLIERS_END: &str = "About the buyer";
pub(crate) const SHOW_SUPPLIER: &str = "Show supplier information";

/// Pieces of one supplier's detail bundle.
pub(crate) const SUPPLIER_FIELDS: &[FieldLabel] = &[
    FieldLabel::new("supplier_address", "Address", &[Bound::Next("Reference")]),
    FieldLabel::new(
        "supplier_reference",
        "Reference",
        &[Bound::Next("Supplier is SME?"), Bound::Next("is SME?")],
    ),
    FieldLabel::new(
        "supplier_is_SME",
        "is SME?",
        &[Bound::Next("Supplier is VCSE?"), Bound::Next("is VCSE?")],
    ),
    FieldLabel::new("supplier_is_VCSE", "is VCSE?", &[Bound::End]),
];

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Contract type\nService contract\nProcedure type\nOpen procedure\nWhat is this?";

    #[test]
    fn next_bound_stops_at_following_label() {
        let field = FieldLabel::new("x", "Contract type", &[Bound::Next("Procedure type")]);
        assert_eq!(field.slice(TEXT), Some("Service contract"));
    }

    #[test]
    fn last_bound_before_start_falls_through() {
        let field = FieldLabel::new(
            "x",
            "Procedure type",
            &[Bound::Last("Contract type"), Bound::LineEnd],
        );
        assert_eq!(field.slice(TEXT), Some("Open procedure"));
    }

    #[test]
    fn missing_label_is_none_not_garbage() {
        let field = FieldLabel::new("x", "Website", &[Bound::LineEnd]);
        assert_eq!(field.slice(TEXT), None);

        let no_end = FieldLabel::new("x", "Contract type", &[Bound::Next("Closing date")]);
        assert_eq!(no_end.slice(TEXT), None);
    }

    #[test]
    fn on_line_bound_stays_on_the_value_line() {
        let field = FieldLabel::new("x", "Contract type", &[Bound::OnLine(" contract")]);
        assert_eq!(field.slice(TEXT), Some("Service"));

        let field = FieldLabel::new("x", "Procedure type", &[Bound::OnLine("?"), Bound::LineEnd]);
        assert_eq!(field.slice(TEXT), Some("Open procedure"));
    }

    #[test]
    fn anchor_skips_earlier_occurrences() {
        let text = "Address\nSupplier street\nContact name\nJo Bloggs\nAddress\nTown Hall\nEmail\nx@y.gov.uk";
        let field = BUYER_FIELDS[1];
        assert_eq!(field.slice(text), Some("Town Hall"));
    }
}
