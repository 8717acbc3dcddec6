//! Partial date normalisation.
//!
//! The pedigree editor records dates as partially known values: `{year, month?, day?}` or, when
//! only the decade is known, `{decade: "1980s"}`. Converted records need a concrete calendar
//! date, so missing components default to 1 and a decade resolves to its first year.

use chrono::NaiveDate;
use pedigree::{DateField, PartialDate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("malformed date: {0}")]
    Malformed(String),
}

/// Resolves a [`PartialDate`] to a naive calendar date.
///
/// The year form takes precedence when both forms are present. For the decade form only the
/// first four characters are read (`"1980s"` gives 1980-01-01).
///
/// # Errors
///
/// Returns [`DateError::Malformed`] if neither `year` nor `decade` is present, a component is
/// not an integer, or the components do not form a real date.
pub fn normalize(date: &PartialDate) -> Result<NaiveDate, DateError> {
    let (year, month, day) = match (&date.year, &date.decade) {
        (Some(year), _) => (
            component("year", year)?,
            optional_component("month", date.month.as_ref())?,
            optional_component("day", date.day.as_ref())?,
        ),
        (None, Some(decade)) => (decade_year(decade)?, 1, 1),
        (None, None) => {
            return Err(DateError::Malformed(
                "neither year nor decade is present".into(),
            ))
        }
    };

    let year = i32::try_from(year)
        .map_err(|_| DateError::Malformed(format!("year {year} is out of range")))?;
    let month = u32::try_from(month)
        .map_err(|_| DateError::Malformed(format!("month {month} is out of range")))?;
    let day =
        u32::try_from(day).map_err(|_| DateError::Malformed(format!("day {day} is out of range")))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        DateError::Malformed(format!("{year}-{month}-{day} is not a calendar date"))
    })
}

fn component(name: &str, field: &DateField) -> Result<i64, DateError> {
    field
        .as_integer()
        .ok_or_else(|| DateError::Malformed(format!("{name} {field:?} is not an integer")))
}

fn optional_component(name: &str, field: Option<&DateField>) -> Result<i64, DateError> {
    field.map_or(Ok(1), |f| component(name, f))
}

fn decade_year(decade: &str) -> Result<i64, DateError> {
    let prefix: String = decade.chars().take(4).collect();
    if prefix.chars().count() < 4 {
        return Err(DateError::Malformed(format!(
            "decade {decade:?} is shorter than four characters"
        )));
    }
    prefix
        .parse()
        .map_err(|_| DateError::Malformed(format!("decade {decade:?} does not start with a year")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str) -> Option<DateField> {
        Some(DateField::Text(s.to_string()))
    }

    #[test]
    fn year_only_defaults_month_and_day() {
        let date = PartialDate {
            year: text("1980"),
            ..Default::default()
        };
        assert_eq!(normalize(&date).unwrap(), ymd(1980, 1, 1));
    }

    #[test]
    fn full_date_with_mixed_field_types() {
        let date = PartialDate {
            year: Some(DateField::Number(1975)),
            month: text("6"),
            day: Some(DateField::Number(21)),
            decade: None,
        };
        assert_eq!(normalize(&date).unwrap(), ymd(1975, 6, 21));
    }

    #[test]
    fn decade_uses_first_four_characters() {
        let date = PartialDate {
            decade: Some("1980s".into()),
            ..Default::default()
        };
        assert_eq!(normalize(&date).unwrap(), ymd(1980, 1, 1));
    }

    #[test]
    fn year_wins_over_decade() {
        let date = PartialDate {
            year: text("1984"),
            month: text("3"),
            decade: Some("1950s".into()),
            ..Default::default()
        };
        assert_eq!(normalize(&date).unwrap(), ymd(1984, 3, 1));
    }

    #[test]
    fn missing_year_and_decade_is_malformed() {
        let date = PartialDate {
            month: text("3"),
            day: text("4"),
            ..Default::default()
        };
        assert!(matches!(normalize(&date), Err(DateError::Malformed(_))));
        assert!(matches!(
            normalize(&PartialDate::default()),
            Err(DateError::Malformed(_))
        ));
    }

    #[test]
    fn non_numeric_components_are_malformed() {
        let date = PartialDate {
            year: text("19x0"),
            ..Default::default()
        };
        assert!(normalize(&date).is_err());

        let date = PartialDate {
            year: text("1980"),
            month: text("March"),
            ..Default::default()
        };
        assert!(normalize(&date).is_err());

        let date = PartialDate {
            decade: Some("the eighties".into()),
            ..Default::default()
        };
        assert!(normalize(&date).is_err());
    }

    #[test]
    fn impossible_calendar_dates_are_malformed() {
        let date = PartialDate {
            year: text("1981"),
            month: text("2"),
            day: text("30"),
            decade: None,
        };
        assert!(normalize(&date).is_err());
    }
}
