//! Invoicr generates invoice PDFs from an invoice record, which is either assembled through
//! the `InvoiceForm` state or read from a JSON file adhering to the `InvoiceRecord` format.
//!
//! The invoice is laid out on a fixed template: title, logo, metadata, the two parties, the
//! line-item table, the totals and the notes. Only the table grows with its content, and
//! everything printed below it is positioned from the point where it ends. The layout is
//! then painted into a `PdfDocument`, which offers a high-level interface for direct PDF
//! manipulation on top of `lopdf`.

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// Every fallible function returns a `Result` with a `ContextError`, which explains what
/// was being done when the failure happened and, if the failure comes from another library,
/// the message of the propagated error.
pub mod error;

/// The table of the supported currencies and the formatting of money values.
pub mod currency;

/// The `InvoiceRecord` and `LineItem` types, with their defaults and the total of the invoice.
pub mod invoice;

/// The module where the state of the invoice being edited is kept.
///
/// # Introduction
///
/// The entry point of this module is the `InvoiceForm` struct. It owns the invoice record
/// and offers explicit setters for every field, the operations on the line items (which
/// never drop below one) and the attachment of a logo, which goes through the intake
/// filter and is given a preview reference that is revoked once the logo is replaced.
///
/// Submitting the form encodes the logo, renders the invoice and saves it, reporting the
/// outcome to a `NotificationSink`. This is the only place generation failures are
/// handled: they never reset the form, so that the submission can simply be retried.
pub mod form;

/// The intake filter for logo files and their encoding into self-contained data URIs.
pub mod logo;

pub mod configuration;

/// The fonts the invoice can be written in.
///
/// By default the standard Helvetica faces are used, which every PDF reader provides and
/// which therefore need not be embedded. Their text is encoded in `WinAnsiEncoding`, so the
/// symbols of the currency table are available except for the rupee sign, which is replaced.
/// TrueType fonts can be configured instead, in which case they are embedded in full.
pub mod fonts;

/// The fixed-template layout of the invoice into a list of draw operations.
pub mod layout;

/// The module where the `PdfDocument` interface for working with PDF documents is presented.
///
/// # Disclaimer
///
/// This work was partially adapted from the one of [fschutt](https://github.com/fschutt) for the crate [printpdf](https://github.com/fschutt/printpdf).
/// The reason why `printpdf` is not used as such is that it generates parameters such as the
/// PDF identifier and the instance ID randomly, while invoices rendered from the same record
/// are expected to be identical.
///
/// # Introduction
///
/// The main component of this module is the struct `PdfDocument`. Pages, fonts and images
/// are registered first, then text, rectangles and images are drawn onto the pages, and
/// finally `write_all` and `save_to_bytes` produce the document.
pub mod pdf;

/// Rendering of an invoice record into a PDF document and saving it to a file.
pub mod render;
