//! Tracking numbers for the ship transition

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Carrier {
    Ghn,
    Ghtk,
    ViettelPost,
    JtExpress,
    Other,
}

impl Carrier {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ghn => "GHN",
            Self::Ghtk => "GHTK",
            Self::ViettelPost => "Viettel Post",
            Self::JtExpress => "J&T Express",
            Self::Other => "Other",
        }
    }

    fn detect(code: &str) -> Option<Self> {
        let upper = |s: &str| s.bytes().all(|b| b.is_ascii_uppercase());
        if digits_after(code, "GHN", 9, 9) { return Some(Self::Ghn); }
        if digits_after(code, "S", 8, 12) { return Some(Self::Ghtk); }
        if let Some(body) = code.strip_suffix("VN") {
            if let (11, Some(head), Some(tail)) = (body.len(), body.get(..2), body.get(2..)) {
                if upper(head) && all_digits(tail) { return Some(Self::ViettelPost); }
            }
        }
        if digits_after(code, "JT", 10, 13) { return Some(Self::JtExpress); }
        None
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

fn all_digits(s: &str) -> bool { !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) }

fn digits_after(code: &str, prefix: &str, min: usize, max: usize) -> bool {
    code.strip_prefix(prefix)
        .map(|rest| (min..=max).contains(&rest.len()) && all_digits(rest))
        .unwrap_or(false)
}

/// Normalised (trimmed, upper-cased) tracking number with its detected carrier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingNumber {
    code: String,
    carrier: Carrier,
}

impl TrackingNumber {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TrackingError> {
        let code = value.as_ref().trim().to_uppercase();
        if code.is_empty() { return Err(TrackingError::Empty); }
        if let Some(carrier) = Carrier::detect(&code) {
            return Ok(Self { code, carrier });
        }
        if code.chars().count() >= 6 {
            return Ok(Self { code, carrier: Carrier::Other });
        }
        Err(TrackingError::TooShort)
    }

    pub fn as_str(&self) -> &str { &self.code }
    pub fn carrier(&self) -> Carrier { self.carrier }

    /// Set when the number was accepted only by the generic length rule.
    pub fn warning(&self) -> Option<&'static str> {
        (self.carrier == Carrier::Other).then_some("non-standard tracking number format, please double-check")
    }

    pub fn tracking_url(&self) -> Option<String> {
        let c = &self.code;
        match self.carrier {
            Carrier::Ghn => Some(format!("https://donhang.ghn.vn/?order_code={c}")),
            Carrier::Ghtk => Some(format!("https://khachhang.giaohangtietkiem.vn/web/guest/progress?billcode={c}")),
            Carrier::ViettelPost => Some(format!("https://viettelpost.com.vn/thong-tin-don-hang?peopleTracking={c}")),
            Carrier::JtExpress => Some(format!("https://www.jtexpress.vn/tracklist?billcode={c}")),
            Carrier::Other => None,
        }
    }

    pub fn format_hint() -> &'static str {
        "GHN: GHN123456789\nGHTK: S12345678\nViettel Post: AA123456789VN\nJ&T Express: JT1234567890"
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.code) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum TrackingError { Empty, TooShort }
impl std::error::Error for TrackingError {}
impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "tracking number must not be empty"),
            Self::TooShort => write!(f, "invalid tracking number: at least 6 characters required"),
        }
    }
}
