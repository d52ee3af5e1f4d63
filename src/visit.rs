use std::fmt;

use chrono::NaiveDate;
use geo::Point;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of the record file: date, purpose, address, lat, lng.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub address: String,
    pub when: NaiveDate,
    pub purpose: String,
    /// x is longitude, y is latitude. `(0, 0)` means not yet resolved.
    pub point: Point,
}

/// Outcome of parsing a single row. Parsing never fails outright, a bad row
/// is either dropped or has its bad fields zeroed.
#[derive(Debug, PartialEq)]
pub enum Parsed {
    Clean(Visit),
    Defaulted {
        visit: Visit,
        fields: Vec<&'static str>,
    },
    Dropped {
        len: usize,
    },
}

impl Parsed {
    pub fn visit(self) -> Option<Visit> {
        match self {
            Self::Clean(visit) => Some(visit),
            Self::Defaulted { visit, .. } => Some(visit),
            Self::Dropped { .. } => None,
        }
    }
}

/// Stand-in for dates that failed to parse, sorts before any real date.
pub fn unknown_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl Visit {
    pub fn new(when: NaiveDate, purpose: &str, address: &str, lat: f64, lng: f64) -> Self {
        Visit {
            address: address.to_string(),
            when,
            purpose: purpose.to_string(),
            point: Point::new(lng, lat),
        }
    }

    pub fn parse<S: AsRef<str>>(fields: &[S]) -> Parsed {
        if fields.len() != 5 {
            return Parsed::Dropped { len: fields.len() };
        }

        let field = |i: usize| fields[i].as_ref().trim();
        let mut defaulted = Vec::new();

        let when = match NaiveDate::parse_from_str(field(0), DATE_FORMAT) {
            Ok(x) => x,
            Err(_) => {
                defaulted.push("date");
                unknown_date()
            }
        };

        // blank coordinates are how a row asks to be geocoded, only
        // complain about ones that are actually garbled
        let mut coord = |i: usize, name: &'static str| -> f64 {
            let raw = field(i);
            match raw.parse::<f64>() {
                Ok(x) if x.is_finite() => x,
                _ => {
                    if !raw.is_empty() {
                        defaulted.push(name);
                    }
                    0.0
                }
            }
        };
        let lat = coord(3, "lat");
        let lng = coord(4, "lng");

        let visit = Visit::new(when, field(1), field(2), lat, lng);
        if defaulted.is_empty() {
            Parsed::Clean(visit)
        } else {
            Parsed::Defaulted {
                visit,
                fields: defaulted,
            }
        }
    }

    pub fn lat(&self) -> f64 {
        self.point.y()
    }

    pub fn lng(&self) -> f64 {
        self.point.x()
    }

    pub fn is_unresolved(&self) -> bool {
        self.lat() == 0.0 && self.lng() == 0.0
    }

    pub fn to_record(&self) -> [String; 5] {
        [
            self.when.format(DATE_FORMAT).to_string(),
            self.purpose.clone(),
            self.address.clone(),
            format!("{:.4}", self.lat()),
            format!("{:.4}", self.lng()),
        ]
    }
}

impl fmt::Display for Visit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.when.format(DATE_FORMAT), self.address)
    }
}
