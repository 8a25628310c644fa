use std::path::Path;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::currency::{currency_symbol, format_money, DEFAULT_CURRENCY_CODE};
use crate::error::ContextError;
use crate::logo::DataUri;

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

/// The number of days between the issue date and the due date of a new invoice.
pub const DEFAULT_PAYMENT_DAYS: i64 = 30;

/// One billable row of an invoice. The amount is derived and never stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub rate: f64,
}

impl LineItem {
    pub fn new<S: Into<String>>(description: S, quantity: f64, rate: f64) -> Self {
        LineItem {
            description: description.into(),
            quantity,
            rate,
        }
    }

    /// The unrounded amount of the row.
    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }
}

/// Everything printed on an invoice. It can be assembled by an `InvoiceForm` or read
/// from a JSON file, whose keys are the camel-cased field names (`from` and `to` are
/// accepted for the two parties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    #[serde(default, alias = "from")]
    pub sender: String,
    #[serde(default, alias = "to")]
    pub recipient: String,
    /// The logo, already encoded so that it can be embedded without reading any file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<DataUri>,
    /// Printed top to bottom in this order.
    #[serde(default = "default_line_items")]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default = "default_currency_code")]
    pub currency: String,
    #[serde(default = "default_invoice_number")]
    pub invoice_number: String,
    #[serde(default = "today", with = "calendar_date")]
    pub date: Date,
    #[serde(default = "default_due_date", with = "calendar_date")]
    pub due_date: Date,
    #[serde(default)]
    pub po_number: Option<String>,
}

impl Default for InvoiceRecord {
    fn default() -> Self {
        InvoiceRecord {
            sender: String::new(),
            recipient: String::new(),
            logo: None,
            items: default_line_items(),
            notes: None,
            terms: None,
            currency: default_currency_code(),
            invoice_number: default_invoice_number(),
            date: today(),
            due_date: default_due_date(),
            po_number: None,
        }
    }
}

impl InvoiceRecord {
    /// Reads and parses an invoice record from a JSON file.
    pub fn from_path(invoice_path: &Path) -> Result<InvoiceRecord, ContextError> {
        let invoice_content = std::fs::read_to_string(invoice_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the invoice {:?}", invoice_path),
                &error,
            )
        })?;
        let invoice_record: InvoiceRecord =
            serde_json::from_str(&invoice_content).map_err(|error| {
                ContextError::with_error(
                    format!("Unable to parse the invoice {:?}", invoice_path),
                    &error,
                )
            })?;

        Ok(invoice_record)
    }

    /// The sum of every row amount, accumulated without any intermediate rounding.
    pub fn total(&self) -> f64 {
        self.items.iter().map(LineItem::amount).sum()
    }

    /// The symbol of the record currency, or the dollar sign for unknown codes.
    pub fn currency_symbol(&self) -> &'static str {
        currency_symbol(&self.currency)
    }

    /// The total as it is printed on the document.
    pub fn formatted_total(&self) -> String {
        format_money(self.currency_symbol(), self.total())
    }

    /// The name under which the generated document is saved.
    pub fn file_name(&self) -> String {
        format!("invoice-{}.pdf", sanitize_file_stem(&self.invoice_number))
    }

    pub fn notes(&self) -> Option<&str> {
        non_empty(&self.notes)
    }

    pub fn terms(&self) -> Option<&str> {
        non_empty(&self.terms)
    }

    pub fn po_number(&self) -> Option<&str> {
        non_empty(&self.po_number)
    }
}

/// Optional text fields left empty count as absent. Whitespace is content.
fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|text| !text.is_empty())
}

/// Replaces the characters that cannot appear in a file name, keeping the name deterministic.
fn sanitize_file_stem(input: &str) -> String {
    let sanitized: String = input
        .trim()
        .chars()
        .map(|character| {
            if character.is_alphanumeric() || matches!(character, '-' | '_' | '.' | ' ') {
                character
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "untitled".into()
    } else {
        sanitized
    }
}

fn default_line_items() -> Vec<LineItem> {
    vec![LineItem::default()]
}

fn default_currency_code() -> String {
    DEFAULT_CURRENCY_CODE.into()
}

fn default_invoice_number() -> String {
    "1".into()
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn default_due_date() -> Date {
    let date = today();
    date.checked_add(Duration::days(DEFAULT_PAYMENT_DAYS))
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use rand::Rng as _;
    use time::macros::date;

    use super::*;

    #[test]
    fn total_is_the_unrounded_sum_of_the_amounts() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let items: Vec<LineItem> = (0..rng.gen_range(1..20))
                .map(|_| {
                    LineItem::new(
                        "",
                        rng.gen_range(0.0..1000.0),
                        rng.gen_range(0.0..10000.0),
                    )
                })
                .collect();
            let expected: f64 = items.iter().map(|item| item.quantity * item.rate).sum();
            let record = InvoiceRecord {
                items,
                ..InvoiceRecord::default()
            };

            assert_eq!(record.total(), expected);
        }
    }

    #[test]
    fn euro_total_is_formatted_with_its_symbol() {
        let record = InvoiceRecord {
            currency: "EUR".into(),
            items: vec![LineItem::new("A", 2.0, 10.0), LineItem::new("B", 1.0, 5.0)],
            ..InvoiceRecord::default()
        };

        assert_eq!(record.formatted_total(), "€25.00");
    }

    #[test]
    fn rounding_only_happens_when_formatting() {
        let record = InvoiceRecord {
            items: vec![LineItem::new("", 1.0, 0.004); 3],
            ..InvoiceRecord::default()
        };

        assert_eq!(record.formatted_total(), "$0.01");
    }

    #[test]
    fn default_record_is_due_thirty_days_after_its_date() {
        let record = InvoiceRecord::default();

        assert_eq!(record.items.len(), 1);
        assert_eq!(record.currency, "USD");
        assert_eq!(record.invoice_number, "1");
        assert_eq!(record.due_date - record.date, Duration::days(30));
    }

    #[test]
    fn record_is_parsed_from_json_with_aliases_and_defaults() {
        let record: InvoiceRecord = serde_json::from_str(
            r#"{
                "from": "Acme Ltd\n1 Main Street",
                "to": "Globex",
                "items": [{ "description": "Design", "quantity": 3, "rate": 120.5 }],
                "currency": "GBP",
                "invoiceNumber": "2024-007",
                "date": "2024-03-01",
                "dueDate": "2024-02-15",
                "poNumber": ""
            }"#,
        )
        .unwrap();

        assert_eq!(record.sender, "Acme Ltd\n1 Main Street");
        assert_eq!(record.recipient, "Globex");
        assert_eq!(record.date, date!(2024 - 03 - 01));
        assert_eq!(record.due_date, date!(2024 - 02 - 15));
        assert_eq!(record.po_number(), None);
        assert_eq!(record.notes(), None);
        assert_eq!(record.total(), 361.5);
    }

    #[test]
    fn only_empty_optional_fields_are_absent() {
        let record = InvoiceRecord {
            notes: Some(" ".into()),
            terms: Some(String::new()),
            po_number: Some("\t".into()),
            ..InvoiceRecord::default()
        };

        assert_eq!(record.notes(), Some(" "));
        assert_eq!(record.terms(), None);
        assert_eq!(record.po_number(), Some("\t"));
    }

    #[test]
    fn file_name_is_derived_from_the_invoice_number() {
        let mut record = InvoiceRecord {
            invoice_number: "42".into(),
            ..InvoiceRecord::default()
        };
        assert_eq!(record.file_name(), "invoice-42.pdf");

        record.invoice_number = "2024/07".into();
        assert_eq!(record.file_name(), "invoice-2024_07.pdf");
    }
}
