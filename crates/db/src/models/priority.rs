use serde::{Deserialize, Serialize};
use sqlx::Type;
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

/// Priority shared by queue assignments, watches and templates.
///
/// Declaration order matches the Postgres enum so `ORDER BY priority` ranks
/// low < medium < high < urgent.
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    TS,
    EnumString,
    Display,
    EnumIter,
    Default,
)]
#[sqlx(type_name = "work_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_priority_ordering_and_parse() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Medium);
        assert_eq!(Priority::from_str("urgent").unwrap(), Priority::Urgent);
        assert!(Priority::from_str("critical").is_err());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_priority_iterates_in_rank_order() {
        let all: Vec<Priority> = Priority::iter().collect();
        assert_eq!(
            all,
            vec![Priority::Low, Priority::Medium, Priority::High, Priority::Urgent]
        );
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }
}
