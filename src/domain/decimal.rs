use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Largest number of significant digits accepted when parsing
const MAX_DIGITS: u32 = 20;
/// Largest number of fractional digits accepted when parsing
const MAX_SCALE: u32 = 18;

/// Exact base-10 number as used for OSM coordinates.
///
/// Values are stored as `mantissa * 10^-scale`, so `4.1234560` keeps its
/// trailing zero in `scale` while still comparing equal to `4.123456`.
/// With at most 20 significant digits and 18 fractional digits every
/// rescaling needed by comparison fits in an `i128`.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

/// Reason a text value is not a plain decimal number
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalParseError {
    #[error("empty value")]
    Empty,
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("no digits")]
    NoDigits,
    #[error("more than {} significant digits", MAX_DIGITS)]
    TooManyDigits,
    #[error("more than {} decimal places", MAX_SCALE)]
    TooManyDecimals,
}

impl Decimal {
    pub const fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Round to `places` decimal places, ties away from zero.
    ///
    /// When the value already has `places` or fewer decimals it is only
    /// rescaled, so rounding twice gives the same result as rounding once.
    pub fn round_dp(&self, places: u32) -> Self {
        match self.scale.cmp(&places) {
            Ordering::Equal => *self,
            Ordering::Less => Self {
                mantissa: self.mantissa * pow10(places - self.scale),
                scale: places,
            },
            Ordering::Greater => {
                let divisor = pow10(self.scale - places);
                let quotient = self.mantissa / divisor;
                let remainder = (self.mantissa % divisor).abs();
                let mantissa = if remainder * 2 >= divisor {
                    quotient + self.mantissa.signum()
                } else {
                    quotient
                };
                Self {
                    mantissa,
                    scale: places,
                }
            }
        }
    }

    /// Format with exactly `places` decimals, rounding if needed
    pub fn to_fixed(&self, places: u32) -> String {
        self.round_dp(places).to_string()
    }

    /// Mantissas of `self` and `other` brought to a common scale
    fn aligned(&self, other: &Self) -> (i128, i128) {
        let scale = self.scale.max(other.scale);
        (
            self.mantissa * pow10(scale - self.scale),
            other.mantissa * pow10(scale - other.scale),
        )
    }
}

fn pow10(exp: u32) -> i128 {
    10i128.pow(exp)
}

impl FromStr for Decimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalParseError::Empty);
        }

        let (negative, body) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let mut mantissa: i128 = 0;
        let mut digits = 0u32;
        let mut significant = 0u32;
        let mut scale = 0u32;
        let mut seen_point = false;

        for c in body.chars() {
            match c {
                '.' if !seen_point => seen_point = true,
                '0'..='9' => {
                    let d = i128::from(c as u8 - b'0');
                    digits += 1;
                    if seen_point {
                        scale += 1;
                        if scale > MAX_SCALE {
                            return Err(DecimalParseError::TooManyDecimals);
                        }
                    }
                    if mantissa != 0 || d != 0 {
                        significant += 1;
                        if significant > MAX_DIGITS {
                            return Err(DecimalParseError::TooManyDigits);
                        }
                    }
                    mantissa = mantissa * 10 + d;
                }
                other => return Err(DecimalParseError::InvalidCharacter(other)),
            }
        }

        if digits == 0 {
            return Err(DecimalParseError::NoDigits);
        }

        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let abs = self.mantissa.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{sign}{abs}");
        }
        let divisor = 10u128.pow(self.scale);
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = self.scale as usize
        )
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.aligned(other);
        a.cmp(&b)
    }
}
