//! Derived profile attributes used by the scorers.

use chrono::{Datelike, NaiveDate};
use database::{Client, Gender};

/// Ages outside this range are treated as bad data.
const PLAUSIBLE_AGE: std::ops::RangeInclusive<i32> = 1..=120;

/// Resolve a client's age on `today`.
///
/// A recorded age wins. Otherwise the age is derived from the birth
/// year-month. Returns `None` when neither gives a plausible value.
pub fn effective_age(client: &Client, today: NaiveDate) -> Option<i32> {
    if client.age > 0 {
        return Some(client.age);
    }

    let (year, month) = parse_year_month(client.birth_year_month.as_deref()?)?;
    let mut age = today.year() - year;
    if (today.month() as i32) < month {
        age -= 1;
    }

    PLAUSIBLE_AGE.contains(&age).then_some(age)
}

fn parse_year_month(value: &str) -> Option<(i32, i32)> {
    let (year, month) = value.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: i32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// A pair split into its man and woman, if the genders differ.
pub(crate) fn by_gender<'a>(a: &'a Client, b: &'a Client) -> Option<(&'a Client, &'a Client)> {
    match (a.gender, b.gender) {
        (Gender::Male, Gender::Female) => Some((a, b)),
        (Gender::Female, Gender::Male) => Some((b, a)),
        _ => None,
    }
}

/// Clients may only be paired with the opposite gender.
pub fn is_opposite_gender(a: &Client, b: &Client) -> bool {
    by_gender(a, b).is_some()
}

/// Today's date in UTC.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}


#[cfg(test)]
mod tests {
    use super::fixtures::client;
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_recorded_age_wins() {
        let mut c = client(1, Gender::Male, 33, 3);
        c.birth_year_month = Some("1990-01".to_string());
        assert_eq!(effective_age(&c, date(2026, 10, 19)), Some(33));
    }

    #[test]
    fn test_age_from_birth_year_month() {
        let mut c = client(1, Gender::Female, 0, 3);
        c.birth_year_month = Some("1996-10".to_string());
        assert_eq!(effective_age(&c, date(2026, 10, 19)), Some(30));

        c.birth_year_month = Some("1996-11".to_string());
        assert_eq!(effective_age(&c, date(2026, 10, 19)), Some(29));
    }

    #[test]
    fn test_unknown_age() {
        let mut c = client(1, Gender::Female, 0, 3);
        assert_eq!(effective_age(&c, date(2026, 10, 19)), None);

        c.birth_year_month = Some("garbage".to_string());
        assert_eq!(effective_age(&c, date(2026, 10, 19)), None);

        c.birth_year_month = Some("2030-01".to_string());
        assert_eq!(effective_age(&c, date(2026, 10, 19)), None);
    }

    #[test]
    fn test_by_gender() {
        let man = client(1, Gender::Male, 30, 3);
        let woman = client(2, Gender::Female, 28, 3);

        let (m, w) = by_gender(&woman, &man).unwrap();
        assert_eq!((m.id, w.id), (1, 2));
        assert!(is_opposite_gender(&man, &woman));
        assert!(!is_opposite_gender(&man, &man));
    }
}
