//! Query-string parsing for list endpoints: paging, sorting and the
//! pagination metadata returned alongside each page.

use std::collections::HashMap;

use serde::Serialize;

use crate::validator::{permitted_value, Validator};

pub type QueryParams = HashMap<String, String>;

pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// The column to order by, or `None` when `sort` is not safelisted.
    ///
    /// The returned name always comes from the static safelist, never from
    /// client input, so it is safe to splice into SQL.
    pub fn sort_column(&self) -> Option<&'static str> {
        self.sort_safelist
            .iter()
            .find(|s| **s == self.sort)
            .map(|s| s.trim_start_matches('-'))
    }

    pub fn sort_descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn sort_direction(&self) -> &'static str {
        if self.sort_descending() {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

pub fn validate_filters(v: &mut Validator, f: &Filters) {
    v.check(f.page > 0, "page", "must be greater than zero");
    v.check(f.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
    v.check(f.page_size > 0, "pageSize", "must be greater than zero");
    v.check(
        f.page_size <= MAX_PAGE_SIZE,
        "pageSize",
        "must be a maximum of 100",
    );
    v.check(
        permitted_value(&f.sort.as_str(), f.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// An empty result set yields the zero value rather than a 1/1 page.
pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records == 0 {
        return Metadata::default();
    }
    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}

pub fn read_string(qs: &QueryParams, key: &str, default: &str) -> String {
    match qs.get(key) {
        Some(s) if !s.is_empty() => s.clone(),
        _ => default.to_string(),
    }
}

pub fn read_csv(qs: &QueryParams, key: &str, default: Vec<String>) -> Vec<String> {
    match qs.get(key) {
        Some(csv) if !csv.is_empty() => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => default,
    }
}

/// Parses an integer parameter. A malformed value is recorded on `v` and
/// the default is still returned.
pub fn read_int(qs: &QueryParams, key: &str, default: i64, v: &mut Validator) -> i64 {
    match qs.get(key) {
        Some(s) if !s.is_empty() => match s.parse::<i64>() {
            Ok(i) => i,
            Err(_) => {
                v.add_error(key, "must be an integer value");
                default
            }
        },
        _ => default,
    }
}

pub fn read_optional_int(qs: &QueryParams, key: &str, v: &mut Validator) -> Option<i64> {
    match qs.get(key) {
        Some(s) if !s.is_empty() => match s.parse::<i64>() {
            Ok(i) => Some(i),
            Err(_) => {
                v.add_error(key, "must be an integer value");
                None
            }
        },
        _ => None,
    }
}

/// Reads `page`, `pageSize` and `sort` with the shared defaults.
pub fn read_filters(
    qs: &QueryParams,
    default_sort: &str,
    sort_safelist: &'static [&'static str],
    v: &mut Validator,
) -> Filters {
    Filters {
        page: read_int(qs, "page", 1, v),
        page_size: read_int(qs, "pageSize", 10, v),
        sort: read_string(qs, "sort", default_sort),
        sort_safelist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELIST: &[&str] = &["name", "created_at", "-name", "-created_at"];

    fn qs(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_absent_or_empty() {
        let mut v = Validator::new();
        let f = read_filters(&qs(&[("page", "")]), "created_at", SAFELIST, &mut v);
        assert!(v.valid());
        assert_eq!(f.page, 1);
        assert_eq!(f.page_size, 10);
        assert_eq!(f.sort, "created_at");
    }

    #[test]
    fn non_integer_page_records_error_and_keeps_default() {
        let mut v = Validator::new();
        let f = read_filters(&qs(&[("page", "two"), ("pageSize", "5")]), "name", SAFELIST, &mut v);
        assert_eq!(v.error("page"), Some("must be an integer value"));
        assert_eq!(f.page, 1);
        assert_eq!(f.page_size, 5);
    }

    #[test]
    fn csv_splits_and_drops_blanks() {
        let q = qs(&[("skills", "go, rust,,python")]);
        assert_eq!(read_csv(&q, "skills", vec![]), vec!["go", "rust", "python"]);
        assert!(read_csv(&q, "missing", vec![]).is_empty());
    }

    #[test]
    fn sort_column_and_direction() {
        let mut f = Filters {
            page: 1,
            page_size: 10,
            sort: "-created_at".into(),
            sort_safelist: SAFELIST,
        };
        assert_eq!(f.sort_column(), Some("created_at"));
        assert_eq!(f.sort_direction(), "DESC");

        f.sort = "name".into();
        assert_eq!(f.sort_column(), Some("name"));
        assert_eq!(f.sort_direction(), "ASC");

        f.sort = "name; DROP TABLE posts".into();
        assert_eq!(f.sort_column(), None);
    }

    #[test]
    fn validate_filters_bounds() {
        let mut v = Validator::new();
        let f = Filters {
            page: 0,
            page_size: 101,
            sort: "author_id".into(),
            sort_safelist: SAFELIST,
        };
        validate_filters(&mut v, &f);
        assert_eq!(v.error("page"), Some("must be greater than zero"));
        assert_eq!(v.error("pageSize"), Some("must be a maximum of 100"));
        assert_eq!(v.error("sort"), Some("invalid sort value"));
    }

    #[test]
    fn offset_and_limit() {
        let f = Filters {
            page: 3,
            page_size: 20,
            sort: "name".into(),
            sort_safelist: SAFELIST,
        };
        assert_eq!(f.offset(), 40);
        assert_eq!(f.limit(), 20);
    }

    #[test]
    fn metadata_zero_value_for_empty_results() {
        assert_eq!(calculate_metadata(0, 3, 10), Metadata::default());
    }

    #[test]
    fn metadata_last_page_is_ceiling() {
        let m = calculate_metadata(5, 2, 2);
        assert_eq!(
            m,
            Metadata {
                current_page: 2,
                page_size: 2,
                first_page: 1,
                last_page: 3,
                total_records: 5,
            }
        );
        assert_eq!(calculate_metadata(10, 1, 10).last_page, 1);
        assert_eq!(calculate_metadata(11, 1, 10).last_page, 2);
    }
}
