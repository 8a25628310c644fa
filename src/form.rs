use std::collections::HashMap;
use std::path::{Path, PathBuf};

use time::Date;

use crate::configuration::TemplateConfiguration;
use crate::currency::find_currency;
use crate::error::ContextError;
use crate::invoice::{InvoiceRecord, LineItem};
use crate::logo::LogoFile;
use crate::render::save_invoice;

pub const SUCCESS_MESSAGE: &str = "Invoice generated successfully!";

/// The outcome of a submission, as reported to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Failure(String),
}

impl Notification {
    pub fn success() -> Self {
        Notification::Success(SUCCESS_MESSAGE.to_string())
    }

    pub fn failure(error: &ContextError) -> Self {
        Notification::Failure(format!("Failed to generate invoice: {}", error))
    }

    pub fn message(&self) -> &str {
        match self {
            Notification::Success(message) | Notification::Failure(message) => message,
        }
    }
}

/// Where the outcome of every submission ends up.
pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

/// Reports the notifications through the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifications;

impl NotificationSink for LogNotifications {
    fn notify(&mut self, notification: Notification) {
        match notification {
            Notification::Success(message) => log::info!("{}", message),
            Notification::Failure(message) => log::error!("{}", message),
        }
    }
}

/// Collects the notifications, in the order they were sent.
impl NotificationSink for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// A reference to a logo file that can be displayed while the form is being edited.
/// It stops resolving as soon as it is revoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewId(u64);

impl std::fmt::Display for PreviewId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "preview:{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_preview_id: u64,
    live_previews: HashMap<PreviewId, PathBuf>,
}

impl PreviewRegistry {
    pub fn create(&mut self, logo_path: &Path) -> PreviewId {
        let preview_id = PreviewId(self.next_preview_id);
        self.next_preview_id += 1;
        self.live_previews.insert(preview_id, logo_path.to_path_buf());

        preview_id
    }

    /// Releases the preview, returning whether it was still live.
    pub fn revoke(&mut self, preview_id: PreviewId) -> bool {
        self.live_previews.remove(&preview_id).is_some()
    }

    pub fn is_live(&self, preview_id: PreviewId) -> bool {
        self.live_previews.contains_key(&preview_id)
    }

    pub fn resolve(&self, preview_id: PreviewId) -> Option<&Path> {
        self.live_previews.get(&preview_id).map(PathBuf::as_path)
    }

    pub fn live_count(&self) -> usize {
        self.live_previews.len()
    }
}

/// The logo currently attached to the form, encoded only when the form is submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogoAttachment {
    pub file: LogoFile,
    pub preview_id: PreviewId,
}

/// The field of a line item an edit refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemField {
    Description,
    Quantity,
    Rate,
}

/// Resets the loading flag when dropped, whatever way the submission ends.
struct LoadingGuard<'a>(&'a mut bool);

impl<'a> LoadingGuard<'a> {
    fn engage(is_loading: &'a mut bool) -> Self {
        *is_loading = true;
        LoadingGuard(is_loading)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// The state of the invoice being edited.
///
/// It owns the record, the attached logo and its preview. The line items never drop
/// below one, and the record is left as it is whatever the outcome of a submission.
#[derive(Debug, Default)]
pub struct InvoiceForm {
    record: InvoiceRecord,
    logo: Option<LogoAttachment>,
    previews: PreviewRegistry,
    is_loading: bool,
}

impl InvoiceForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the form from an existing record, for example one read from a JSON file.
    /// A logo already encoded in the record is kept until another one is attached.
    pub fn from_record(mut record: InvoiceRecord) -> Self {
        if record.items.is_empty() {
            record.items.push(LineItem::default());
        }
        for item in record.items.iter_mut() {
            item.quantity = sanitize_number(item.quantity);
            item.rate = sanitize_number(item.rate);
        }

        InvoiceForm {
            record,
            ..Self::default()
        }
    }

    pub fn record(&self) -> &InvoiceRecord {
        &self.record
    }

    pub fn items(&self) -> &[LineItem] {
        &self.record.items
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn set_sender<S: Into<String>>(&mut self, sender: S) {
        self.record.sender = sender.into();
    }

    pub fn set_recipient<S: Into<String>>(&mut self, recipient: S) {
        self.record.recipient = recipient.into();
    }

    pub fn set_notes<S: Into<String>>(&mut self, notes: S) {
        self.record.notes = Some(notes.into());
    }

    pub fn set_terms<S: Into<String>>(&mut self, terms: S) {
        self.record.terms = Some(terms.into());
    }

    pub fn set_invoice_number<S: Into<String>>(&mut self, invoice_number: S) {
        self.record.invoice_number = invoice_number.into();
    }

    pub fn set_po_number<S: Into<String>>(&mut self, po_number: S) {
        self.record.po_number = Some(po_number.into());
    }

    pub fn set_date(&mut self, date: Date) {
        self.record.date = date;
    }

    /// The due date is not checked against the issue date.
    pub fn set_due_date(&mut self, due_date: Date) {
        self.record.due_date = due_date;
    }

    /// Selects one of the currencies of the table, returning whether the code is one of them.
    pub fn set_currency(&mut self, currency_code: &str) -> bool {
        match find_currency(currency_code) {
            Some(currency) => {
                self.record.currency = currency.code.to_string();
                true
            }
            None => {
                log::warn!("Ignored the unknown currency {:?}", currency_code);
                false
            }
        }
    }

    /// Appends an empty line item.
    pub fn add_item(&mut self) {
        self.record.items.push(LineItem::default());
    }

    /// Removes the line item at the index, unless it is the only one left.
    /// Returns whether an item was removed.
    pub fn remove_item(&mut self, item_index: usize) -> bool {
        if self.record.items.len() <= 1 || item_index >= self.record.items.len() {
            return false;
        }
        self.record.items.remove(item_index);

        true
    }

    /// Replaces one field of a line item with the user input. Quantities and rates that
    /// are not numbers, or are negative, become `0`. Returns whether the item exists.
    pub fn update_item(&mut self, item_index: usize, item_field: ItemField, value: &str) -> bool {
        let Some(item) = self.record.items.get_mut(item_index) else {
            log::warn!("There is no line item at index {}", item_index);
            return false;
        };
        match item_field {
            ItemField::Description => item.description = value.to_string(),
            ItemField::Quantity => item.quantity = parse_number(value),
            ItemField::Rate => item.rate = parse_number(value),
        }

        true
    }

    pub fn total(&self) -> f64 {
        self.record.total()
    }

    pub fn formatted_total(&self) -> String {
        self.record.formatted_total()
    }

    pub fn logo(&self) -> Option<&LogoAttachment> {
        self.logo.as_ref()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Passes the file through the intake filter and attaches it, replacing and revoking
    /// the preview of the previous logo. Rejected files leave the form untouched.
    pub fn attach_logo(&mut self, logo_path: &Path) -> Option<PreviewId> {
        let logo_file = LogoFile::accept(logo_path)?;
        self.remove_logo();
        let preview_id = self.previews.create(logo_file.path());
        log::debug!("Attached the logo {:?} as {}", logo_file.path(), preview_id);
        self.logo = Some(LogoAttachment {
            file: logo_file,
            preview_id,
        });

        Some(preview_id)
    }

    /// Detaches the logo, whether it was attached to the form or came encoded in the record.
    pub fn remove_logo(&mut self) {
        if let Some(logo_attachment) = self.logo.take() {
            self.previews.revoke(logo_attachment.preview_id);
        }
        self.record.logo = None;
    }

    /// Generates the invoice and saves it into the output directory.
    ///
    /// The attached logo is encoded first, then the document is rendered and saved; any
    /// failure along the way aborts the whole submission. The outcome is reported to the
    /// sink exactly once and the saved path is returned on success. The form is borrowed
    /// mutably for the whole submission, so no other one can start in the meantime.
    pub fn submit(
        &mut self,
        configuration: &TemplateConfiguration,
        output_directory: &Path,
        notifications: &mut dyn NotificationSink,
    ) -> Option<PathBuf> {
        let _loading_guard = LoadingGuard::engage(&mut self.is_loading);

        match generate(&self.record, self.logo.as_ref(), configuration, output_directory) {
            Ok(pdf_path) => {
                notifications.notify(Notification::success());
                Some(pdf_path)
            }
            Err(error) => {
                notifications.notify(Notification::failure(&error));
                None
            }
        }
    }
}

fn generate(
    record: &InvoiceRecord,
    logo_attachment: Option<&LogoAttachment>,
    configuration: &TemplateConfiguration,
    output_directory: &Path,
) -> Result<PathBuf, ContextError> {
    let Some(logo_attachment) = logo_attachment else {
        return save_invoice(record, configuration, output_directory);
    };

    let mut record = record.clone();
    record.logo = Some(logo_attachment.file.encode()?);
    save_invoice(&record, configuration, output_directory)
}

fn parse_number(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(number) => sanitize_number(number),
        Err(_) => {
            if !value.trim().is_empty() {
                log::warn!("Replaced the input {:?}, which is not a number, with 0", value);
            }
            0.0
        }
    }
}

/// Quantities and rates are finite and never negative, negative zero included.
fn sanitize_number(number: f64) -> f64 {
    if number == 0.0 {
        0.0
    } else if number.is_finite() && number > 0.0 {
        number
    } else {
        log::warn!("Replaced the number {} with 0", number);
        0.0
    }
}
