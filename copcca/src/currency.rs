//! Supported currencies, display formatting and conversion through USD.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Units of this currency per US dollar
    pub rate: f64,
}

const fn currency(code: &'static str, symbol: &'static str, name: &'static str, rate: f64) -> Currency {
    Currency {
        code,
        symbol,
        name,
        rate,
    }
}

pub static CURRENCIES: [Currency; 15] = [
    currency("USD", "$", "US Dollar", 1.0),
    currency("GBP", "£", "British Pound", 0.79),
    currency("EUR", "€", "Euro", 0.92),
    currency("NGN", "₦", "Nigerian Naira", 1450.0),
    currency("ZAR", "R", "South African Rand", 18.5),
    currency("KES", "KSh", "Kenyan Shilling", 160.0),
    currency("GHS", "GH₵", "Ghanaian Cedi", 12.0),
    currency("EGP", "E£", "Egyptian Pound", 30.9),
    currency("TZS", "TSh", "Tanzanian Shilling", 2500.0),
    currency("UGX", "USh", "Ugandan Shilling", 3700.0),
    currency("MAD", "DH", "Moroccan Dirham", 10.0),
    currency("ETB", "Br", "Ethiopian Birr", 56.0),
    currency("XOF", "CFA", "West African CFA Franc", 605.0),
    currency("XAF", "FCFA", "Central African CFA Franc", 605.0),
    currency("RWF", "FRw", "Rwandan Franc", 1250.0),
];

/// Look up a currency by ISO code (case-insensitive).
pub fn find(code: &str) -> Option<&'static Currency> {
    CURRENCIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Like [`find`], falling back to USD for unknown codes.
pub fn find_or_usd(code: &str) -> &'static Currency {
    find(code).unwrap_or(&CURRENCIES[0])
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `symbol` followed by the amount rounded to a whole number with comma grouping,
/// e.g. `TSh1,234,568`. Negative amounts render as `$-5`.
pub fn format_currency(amount: f64, currency: &Currency) -> String {
    let rounded = if amount.is_finite() { amount.round() } else { 0.0 };
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let sign = if negative { "-" } else { "" };
    format!("{}{}{}", currency.symbol, sign, group_thousands(&digits))
}

/// Convert between two currencies via their USD rates. Unknown codes are treated as USD.
pub fn convert_amount(amount: f64, from: &str, to: &str) -> f64 {
    let from = find_or_usd(from);
    let to = find_or_usd(to);
    amount / from.rate * to.rate
}
