//! Query-string access that keeps repeated keys (`?priority=high&priority=urgent`).

use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    /// First non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`; comma separated values are split too.
    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .flat_map(|(_, v)| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Parse the value for `key`, returning `Err(raw)` when it does not parse.
    pub fn parse_as<T: FromStr>(&self, key: &str) -> Result<Option<T>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_and_comma_values() {
        let q = QueryParams::parse(Some("priority=high&priority=urgent,low&aging=7%2B"));
        assert_eq!(q.get_all("priority"), vec!["high", "urgent", "low"]);
        assert_eq!(q.get_all("aging"), vec!["7+"]);
        assert!(q.get_all("type").is_empty());
    }

    #[test]
    fn test_parse_as() {
        let q = QueryParams::parse(Some("page=2&page_size=abc"));
        assert_eq!(q.parse_as::<i64>("page"), Ok(Some(2)));
        assert_eq!(q.parse_as::<i64>("page_size"), Err("abc".to_string()));
        assert_eq!(q.parse_as::<i64>("missing"), Ok(None));
    }
}
