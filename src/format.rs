//! Fixed-point rendering of raw token amounts.
//!
//! Everything stays in `U256` integer space so that 18-decimal balances of any
//! size keep full precision; only the final display is rounded.

use ethers::types::U256;
use rust_decimal::Decimal;

use crate::types::{BalanceResult, RawBalance};

const DISPLAY_DIGITS: u32 = 2;

fn pow10(exp: u32) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(exp))
}

/// `num / den` rounded half-to-even.
fn div_round_half_even(num: U256, den: U256) -> U256 {
    let (q, r) = num.div_mod(den);
    let upper = den - r;
    if r > upper || (r == upper && q.bit(0)) {
        q + U256::one()
    } else {
        q
    }
}

/// Scale `amount * 10^-scale` to whole hundredths, banker's rounding.
///
/// Returns `None` only when the result does not fit in 256 bits.
fn to_hundredths(amount: U256, scale: u32) -> Option<U256> {
    if scale <= DISPLAY_DIGITS {
        return amount.checked_mul(pow10(DISPLAY_DIGITS - scale)?);
    }
    match pow10(scale - DISPLAY_DIGITS) {
        Some(den) => Some(div_round_half_even(amount, den)),
        // 10^78 > 2 * U256::MAX, so the quotient rounds to zero
        None => Some(U256::zero()),
    }
}

fn render_hundredths(hundredths: U256) -> String {
    let (int_part, frac) = hundredths.div_mod(U256::from(100u8));
    format!("{}.{:02}", int_part, frac.low_u64())
}

/// `raw / 10^decimals` with exactly two fractional digits.
pub fn format_balance(raw: U256, decimals: u8) -> String {
    let decimals = u32::from(decimals);
    if decimals <= DISPLAY_DIGITS {
        // exact; split first so huge balances cannot overflow the * 100
        let (int_part, rem) = raw.div_mod(U256::exp10(decimals as usize));
        let frac = rem.low_u64() * 10u64.pow(DISPLAY_DIGITS - decimals);
        return format!("{}.{:02}", int_part, frac);
    }
    render_hundredths(to_hundredths(raw, decimals).unwrap_or_default())
}

/// Full-precision `raw / 10^decimals`, trailing zeros trimmed but always at
/// least one fractional digit (`"123450.0"`, `"0.000000000000000001"`).
pub fn format_exact(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return format!("{}.0", digits);
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        format!("{}.0", int_part)
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Value of `raw / 10^decimals` tokens at `price`, two fractional digits.
///
/// `None` when there is no usable price (missing or negative) or the product
/// overflows; a missing estimate never fails the balance itself.
pub fn fiat_estimate(raw: U256, decimals: u8, price: Option<Decimal>) -> Option<String> {
    let price = price?;
    if price.is_sign_negative() {
        return None;
    }
    let mantissa = u128::try_from(price.mantissa()).ok()?;
    let product = raw.checked_mul(U256::from(mantissa))?;
    let hundredths = to_hundredths(product, u32::from(decimals) + price.scale())?;
    Some(render_hundredths(hundredths))
}

/// Build the per-request [`BalanceResult`].
pub fn balance_result(raw: RawBalance, price: Option<Decimal>) -> BalanceResult {
    BalanceResult {
        raw_amount: raw.amount,
        decimals: raw.decimals,
        formatted: format_balance(raw.amount, raw.decimals),
        exact: format_exact(raw.amount, raw.decimals),
        fiat_estimate: fiat_estimate(raw.amount, raw.decimals, price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn u(s: &str) -> U256 {
        U256::from_dec_str(s).unwrap()
    }

    #[test]
    fn test_formats_eighteen_decimals() {
        assert_eq!(format_balance(u("123450000000000000000000"), 18), "123450.00");
        assert_eq!(format_balance(U256::zero(), 18), "0.00");
        assert_eq!(format_balance(u("1"), 18), "0.00");
        // 1.2345e20 base units
        assert_eq!(format_balance(u("123450000000000000000"), 18), "123.45");
    }

    #[test]
    fn test_rounds_half_to_even() {
        // 0.125 -> 0.12, 0.135 -> 0.14, 0.1251 -> 0.13
        assert_eq!(format_balance(u("125"), 3), "0.12");
        assert_eq!(format_balance(u("135"), 3), "0.14");
        assert_eq!(format_balance(u("1251"), 4), "0.13");
        assert_eq!(format_balance(u("999995"), 6), "1.00");
        assert_eq!(format_balance(u("1234994999999999999"), 18), "1.23");
    }

    #[test]
    fn test_small_decimal_counts_are_exact() {
        assert_eq!(format_balance(u("5"), 0), "5.00");
        assert_eq!(format_balance(u("15"), 1), "1.50");
        assert_eq!(format_balance(u("1507"), 2), "15.07");
        assert_eq!(
            format_balance(U256::MAX, 0),
            format!("{}.00", U256::MAX)
        );
    }

    #[test]
    fn test_absurd_decimals_do_not_panic() {
        assert_eq!(format_balance(U256::MAX, 255), "0.00");
        assert_eq!(format_balance(U256::MAX, 80), "0.00");
        assert_eq!(format_exact(u("1"), 80).len(), 82);
    }

    #[test]
    fn test_exact_keeps_full_precision() {
        assert_eq!(format_exact(u("123450000000000000000000"), 18), "123450.0");
        assert_eq!(format_exact(u("1"), 18), "0.000000000000000001");
        assert_eq!(format_exact(u("1234500"), 6), "1.2345");
        assert_eq!(format_exact(u("42"), 0), "42.0");
    }

    #[test]
    fn test_fiat_estimate() {
        let raw = u("123450000000000000000000");
        let price = Decimal::from_str("0.5").unwrap();
        assert_eq!(fiat_estimate(raw, 18, Some(price)).as_deref(), Some("61725.00"));

        let price = Decimal::from_str("0.000123").unwrap();
        // 123450 * 0.000123 = 15.18435
        assert_eq!(fiat_estimate(raw, 18, Some(price)).as_deref(), Some("15.18"));
    }

    #[test]
    fn test_fiat_estimate_without_price() {
        let raw = u("123450000000000000000000");
        assert_eq!(fiat_estimate(raw, 18, None), None);
        assert_eq!(fiat_estimate(raw, 18, Some(Decimal::from(-1))), None);
        assert_eq!(fiat_estimate(U256::MAX, 18, Some(Decimal::from(1000))), None);
    }

    #[test]
    fn test_balance_result() {
        let result = balance_result(
            RawBalance {
                amount: u("2500000"),
                decimals: 6,
            },
            Some(Decimal::from(2)),
        );
        assert_eq!(result.formatted, "2.50");
        assert_eq!(result.exact, "2.5");
        assert_eq!(result.fiat_estimate.as_deref(), Some("5.00"));
    }
}
