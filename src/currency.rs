use serde::Serialize;

/// The symbol used for every currency code that is not part of the table.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";

/// The currency selected when nothing else is specified.
pub const DEFAULT_CURRENCY_CODE: &str = "USD";

/// A currency the invoices can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    /// The ISO 4217 code, which is the key of the table.
    pub code: &'static str,
    /// The symbol prefixed to every money value.
    pub symbol: &'static str,
    /// The human readable name of the currency.
    pub display_name: &'static str,
}

/// The supported currencies, in the order they are offered to the user.
pub const CURRENCIES: [Currency; 10] = [
    Currency {
        code: "USD",
        symbol: "$",
        display_name: "US Dollar",
    },
    Currency {
        code: "EUR",
        symbol: "€",
        display_name: "Euro",
    },
    Currency {
        code: "GBP",
        symbol: "£",
        display_name: "British Pound",
    },
    Currency {
        code: "JPY",
        symbol: "¥",
        display_name: "Japanese Yen",
    },
    Currency {
        code: "CAD",
        symbol: "C$",
        display_name: "Canadian Dollar",
    },
    Currency {
        code: "AUD",
        symbol: "A$",
        display_name: "Australian Dollar",
    },
    Currency {
        code: "INR",
        symbol: "₹",
        display_name: "Indian Rupee",
    },
    Currency {
        code: "CNY",
        symbol: "¥",
        display_name: "Chinese Yuan",
    },
    Currency {
        code: "BRL",
        symbol: "R$",
        display_name: "Brazilian Real",
    },
    Currency {
        code: "ZAR",
        symbol: "R",
        display_name: "South African Rand",
    },
];

/// Looks up the currency associated to the given code, if it is part of the table.
pub fn find_currency(currency_code: &str) -> Option<&'static Currency> {
    CURRENCIES
        .iter()
        .find(|currency| currency.code == currency_code)
}

/// Retrieves the symbol of the given currency code. Codes which are not in the table
/// degrade to the dollar sign instead of failing.
pub fn currency_symbol(currency_code: &str) -> &'static str {
    find_currency(currency_code)
        .map(|currency| currency.symbol)
        .unwrap_or(DEFAULT_CURRENCY_SYMBOL)
}

/// Formats a money value as the symbol followed by the amount with exactly two decimals.
/// Rounding happens here and only here.
pub fn format_money(currency_symbol: &str, amount: f64) -> String {
    let formatted_amount = format!("{amount:.2}");
    match formatted_amount.strip_prefix('-') {
        // Amounts rounding to zero carry no sign
        Some(unsigned_amount) if unsigned_amount == "0.00" => {
            format!("{currency_symbol}{unsigned_amount}")
        }
        _ => format!("{currency_symbol}{formatted_amount}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_code_resolves_to_its_own_symbol() {
        for currency in CURRENCIES.iter() {
            assert_eq!(currency_symbol(currency.code), currency.symbol);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_the_dollar_sign() {
        assert_eq!(currency_symbol("XYZ"), "$");
        assert_eq!(currency_symbol(""), "$");
        assert_eq!(currency_symbol("eur"), "$");
    }

    #[test]
    fn money_is_formatted_with_two_decimals() {
        assert_eq!(format_money("€", 25.0), "€25.00");
        assert_eq!(format_money("C$", 0.5), "C$0.50");
        assert_eq!(format_money("$", 1234.567), "$1234.57");
    }

    #[test]
    fn zero_amounts_are_printed_without_a_sign() {
        assert_eq!(format_money("$", -0.0), "$0.00");
        assert_eq!(format_money("£", -0.001), "£0.00");
        assert_eq!(format_money("$", -1.5), "$-1.50");
    }

    #[test]
    fn table_codes_are_unique() {
        for (index, currency) in CURRENCIES.iter().enumerate() {
            assert!(CURRENCIES[index + 1..]
                .iter()
                .all(|other| other.code != currency.code));
        }
    }
}
