use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight — the only time-of-day type.
pub type Mins = i32;

pub const MINUTES_PER_DAY: Mins = 24 * 60;

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Serde adapter: `Mins` on the wire as a fractional-hour number (9.5 = 09:30).
/// Whole-minute values convert exactly in both directions; inputs that do not
/// land on a whole minute are rejected.
pub mod hours {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{MINUTES_PER_DAY, Mins};

    pub fn serialize<S: Serializer>(mins: &Mins, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(f64::from(*mins) / 60.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Mins, D::Error> {
        let hours = f64::deserialize(deserializer)?;
        let mins = hours * 60.0;
        if !mins.is_finite() || mins.fract() != 0.0 {
            return Err(D::Error::custom("time must be a whole number of minutes"));
        }
        if !(0.0..=f64::from(MINUTES_PER_DAY)).contains(&mins) {
            return Err(D::Error::custom("time out of range"));
        }
        Ok(mins as Mins)
    }
}

/// Half-open interval `[start, end)` over minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "startTime", with = "hours")]
    pub start: Mins,
    #[serde(rename = "endTime", with = "hours")]
    pub end: Mins,
}

impl Span {
    pub fn new(start: Mins, end: Mins) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Mins {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Mins) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// The bookable day: slot step and operating window. Injected everywhere the
/// grid matters so the step is never a literal in scheduling math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    pub step: Mins,
    pub open: Mins,
    pub close: Mins,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            step: 30,
            open: 8 * 60,
            close: 21 * 60,
        }
    }
}

impl SlotGrid {
    /// Build a grid from fractional-hour bounds and a step in minutes.
    pub fn from_hours(open: f64, close: f64, step: Mins) -> Result<Self, String> {
        let to_mins = |h: f64| -> Result<Mins, String> {
            let m = h * 60.0;
            if !m.is_finite() || m.fract() != 0.0 || !(0.0..=f64::from(MINUTES_PER_DAY)).contains(&m)
            {
                return Err(format!("hour value {h} is not a whole minute within the day"));
            }
            Ok(m as Mins)
        };
        let grid = Self {
            step,
            open: to_mins(open)?,
            close: to_mins(close)?,
        };
        grid.check()?;
        Ok(grid)
    }

    fn check(&self) -> Result<(), String> {
        if self.step <= 0 {
            return Err("slot step must be positive".into());
        }
        if self.open >= self.close {
            return Err("opening hour must be before closing hour".into());
        }
        if (self.close - self.open) % self.step != 0 {
            return Err("operating window must be a whole number of slots".into());
        }
        Ok(())
    }

    pub fn is_aligned(&self, t: Mins) -> bool {
        t % self.step == 0
    }

    /// `open <= start < end <= close`.
    pub fn is_within_window(&self, span: &Span) -> bool {
        self.open <= span.start && span.start < span.end && span.end <= self.close
    }

    /// Full candidate-interval validation: ordering, step alignment, window.
    pub fn validate(&self, span: &Span) -> Result<(), &'static str> {
        if span.start >= span.end {
            return Err("start time must be before end time");
        }
        if !self.is_aligned(span.start) || !self.is_aligned(span.end) {
            return Err("times must be aligned to the slot step");
        }
        if !self.is_within_window(span) {
            return Err("interval is outside operating hours");
        }
        Ok(())
    }

    /// The day's step-sized slots, in order.
    pub fn slots(&self) -> impl Iterator<Item = Span> + '_ {
        (self.open..self.close)
            .step_by(self.step as usize)
            .map(|s| Span::new(s, s + self.step))
    }
}

/// Static reference data; immutable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
}

/// A persisted reservation. Field names are the wire and disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub date: String,
    #[serde(flatten)]
    pub span: Span,
    #[serde(rename = "ownerPin")]
    pub owner_pin: String,
    #[serde(rename = "ownerName")]
    pub owner_name: String,
    #[serde(rename = "ownerContact")]
    pub owner_contact: String,
    pub topic: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// A resolved portal user. Admin status lives in configuration, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub pin: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub contact: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// Plain `YYYY-MM-DD` with sane month/day ranges. No time-zone math anywhere.
pub fn is_valid_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits = |r: std::ops::Range<usize>| s[r].bytes().all(|b| b.is_ascii_digit());
    if !digits(0..4) || !digits(5..7) || !digits(8..10) {
        return false;
    }
    let month: u32 = s[5..7].parse().unwrap_or(0);
    let day: u32 = s[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Contact handle in `@username` shape: 3–64 word characters after the `@`.
pub fn is_valid_contact(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('@') else {
        return false;
    };
    (3..=64).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let s = Span::new(540, 600);
        assert_eq!(s.duration(), 60);
        assert!(s.contains_instant(540));
        assert!(s.contains_instant(599));
        assert!(!s.contains_instant(600)); // half-open
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(540, 600);
        let b = Span::new(570, 630);
        let c = Span::new(600, 660);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(480, 720);
        let inner = Span::new(510, 600);
        let partial = Span::new(450, 510);
        assert!(outer.contains_span(&inner));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&partial));
    }

    #[test]
    fn hours_roundtrip_half_hour() {
        let span = Span::new(570, 630); // 09:30–10:30
        let json = serde_json::to_string(&span).unwrap();
        assert_eq!(json, r#"{"startTime":9.5,"endTime":10.5}"#);
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(back, span);
    }

    #[test]
    fn hours_accepts_integer_numbers() {
        let span: Span = serde_json::from_str(r#"{"startTime":9,"endTime":10}"#).unwrap();
        assert_eq!(span, Span::new(540, 600));
    }

    #[test]
    fn hours_rejects_sub_minute_values() {
        let result = serde_json::from_str::<Span>(r#"{"startTime":9.1234,"endTime":10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn hours_rejects_out_of_day_values() {
        assert!(serde_json::from_str::<Span>(r#"{"startTime":-1,"endTime":10}"#).is_err());
        assert!(serde_json::from_str::<Span>(r#"{"startTime":9,"endTime":25}"#).is_err());
    }

    #[test]
    fn grid_validate() {
        let grid = SlotGrid::default();
        assert!(grid.validate(&Span::new(540, 600)).is_ok());
        assert!(grid.validate(&Span::new(600, 540)).is_err()); // reversed
        assert!(grid.validate(&Span::new(545, 600)).is_err()); // misaligned
        assert!(grid.validate(&Span::new(420, 540)).is_err()); // before open
        assert!(grid.validate(&Span::new(1230, 1290)).is_err()); // past close
        assert!(grid.validate(&Span::new(1230, 1260)).is_ok()); // last slot
    }

    #[test]
    fn grid_slots_cover_window_exactly() {
        let grid = SlotGrid::default();
        let slots: Vec<Span> = grid.slots().collect();
        assert_eq!(slots.len(), 26); // 08:00–21:00 in half-hour steps
        assert_eq!(slots[0], Span::new(480, 510));
        assert_eq!(slots[25], Span::new(1230, 1260));
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn grid_from_hours() {
        let grid = SlotGrid::from_hours(8.0, 21.0, 30).unwrap();
        assert_eq!(grid, SlotGrid::default());
        assert!(SlotGrid::from_hours(9.0, 8.0, 30).is_err());
        assert!(SlotGrid::from_hours(8.0, 21.25, 30).is_err()); // ragged window
        assert!(SlotGrid::from_hours(8.0, 21.0, 0).is_err());
    }

    #[test]
    fn booking_wire_field_names() {
        let booking = Booking {
            id: Ulid::new(),
            room_id: "aquarium".into(),
            date: "2026-03-02".into(),
            span: Span::new(540, 660),
            owner_pin: "0420".into(),
            owner_name: "Lena P".into(),
            owner_contact: "@lena_p".into(),
            topic: "1:1".into(),
            created_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&booking).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "id",
            "roomId",
            "date",
            "startTime",
            "endTime",
            "ownerPin",
            "ownerName",
            "ownerContact",
            "topic",
            "createdAt",
        ] {
            assert!(obj.contains_key(key), "missing field {key}");
        }
        assert_eq!(value["startTime"], serde_json::json!(9.0));
        assert_eq!(value["endTime"], serde_json::json!(11.0));

        let back: Booking = serde_json::from_value(value).unwrap();
        assert_eq!(back, booking);
    }

    #[test]
    fn date_validation() {
        assert!(is_valid_date("2026-01-31"));
        assert!(is_valid_date("1999-12-01"));
        assert!(!is_valid_date("2026-13-01"));
        assert!(!is_valid_date("2026-00-10"));
        assert!(!is_valid_date("2026-01-32"));
        assert!(!is_valid_date("2026-1-05"));
        assert!(!is_valid_date("20260105"));
        assert!(!is_valid_date("2026-01-05T10:00"));
    }

    #[test]
    fn contact_validation() {
        assert!(is_valid_contact("@lena_p"));
        assert!(is_valid_contact("@abc"));
        assert!(!is_valid_contact("@ab"));
        assert!(!is_valid_contact("lena"));
        assert!(!is_valid_contact("@with space"));
        assert!(!is_valid_contact(&format!("@{}", "x".repeat(65))));
    }
}
