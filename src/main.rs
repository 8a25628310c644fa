#![warn(clippy::unwrap_used)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use invoicr::{
    configuration::TemplateConfiguration,
    currency::CURRENCIES,
    error::ContextError,
    form::{InvoiceForm, LogNotifications},
    invoice::InvoiceRecord,
};

#[derive(Parser)]
#[command(version, long_about = None)]
struct CliArguments {
    #[arg(
        long = "verbose",
        global = true,
        help = "Log everything, regardless of the RUST_LOG environment variable"
    )]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the PDF of an invoice record
    Generate {
        #[arg(long = "invoice", help = "Path to the invoice record in the JSON format")]
        invoice_path: PathBuf,
        #[arg(
            long = "logo",
            help = "Path to a PNG or JPEG logo, replacing the one of the record"
        )]
        logo_path: Option<PathBuf>,
        #[arg(
            long = "configuration",
            help = "Path to the template configuration in the JSON format"
        )]
        configuration_path: Option<PathBuf>,
        #[arg(
            long = "output-directory",
            default_value = ".",
            help = "Directory the invoice is saved into"
        )]
        output_directory: PathBuf,
    },
    /// Print a new invoice record, to be filled in and generated
    Template,
    /// List the supported currencies
    Currencies,
}

fn main() -> ExitCode {
    match fallible_main() {
        Ok(exit_code) => exit_code,
        Err(error) => {
            log::error!("{}", error);
            ExitCode::FAILURE
        }
    }
}

fn fallible_main() -> Result<ExitCode, ContextError> {
    let CliArguments { verbose, command } = CliArguments::parse();

    let mut logger_builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        logger_builder.filter_level(log::LevelFilter::Trace);
    }
    logger_builder.init();

    match command {
        Command::Generate {
            invoice_path,
            logo_path,
            configuration_path,
            output_directory,
        } => {
            let configuration = match configuration_path {
                Some(configuration_path) => TemplateConfiguration::from_path(&configuration_path)?,
                None => TemplateConfiguration::default(),
            };
            let mut invoice_form = InvoiceForm::from_record(InvoiceRecord::from_path(&invoice_path)?);
            log::info!(
                "Loaded the invoice {:?} with {} line item(s) for a total of {}",
                invoice_form.record().invoice_number,
                invoice_form.items().len(),
                invoice_form.formatted_total()
            );
            if let Some(logo_path) = logo_path {
                // Rejected logos are reported by the intake filter and the invoice goes without
                invoice_form.attach_logo(&logo_path);
            }

            let pdf_path = invoice_form.submit(
                &configuration,
                &output_directory,
                &mut LogNotifications,
            );
            match pdf_path {
                Some(_) => Ok(ExitCode::SUCCESS),
                None => Ok(ExitCode::FAILURE),
            }
        }
        Command::Template => {
            let invoice_record = serde_json::to_string_pretty(&InvoiceRecord::default())
                .map_err(|error| {
                    ContextError::with_error("Unable to serialize the invoice template", &error)
                })?;
            println!("{}", invoice_record);

            Ok(ExitCode::SUCCESS)
        }
        Command::Currencies => {
            for currency in CURRENCIES.iter() {
                println!(
                    "{}\t{}\t{}",
                    currency.code, currency.symbol, currency.display_name
                );
            }

            Ok(ExitCode::SUCCESS)
        }
    }
}
