use crate::error::{Result, ScoutError};

/// Upper bound offered by the control surface for a single run.
pub const MAX_RECORDS_LIMIT: usize = 4000;

/// Parameters of one extraction run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    /// Postal code of the searched area
    area_code: String,
    /// Stop collecting once this many records are stored
    max_records: usize,
}

impl ScrapeRequest {
    pub fn new(area_code: impl Into<String>, max_records: usize) -> Result<Self> {
        let area_code = area_code.into().trim().to_string();
        if area_code.is_empty() {
            return Err(ScoutError::InvalidRequest("area code must not be empty".into()));
        }
        if max_records == 0 {
            return Err(ScoutError::InvalidRequest("max records must be at least 1".into()));
        }

        Ok(Self {
            area_code,
            max_records,
        })
    }

    pub fn area_code(&self) -> &str {
        &self.area_code
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Search results URL for the requested area, in the site's routing scheme.
    pub fn search_url(&self, base_url: &str) -> String {
        format!("{}/homes/{}_rb/", base_url.trim_end_matches('/'), self.area_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_search_url() {
        let request = ScrapeRequest::new("90210", 10).unwrap();
        assert_eq!(
            request.search_url("https://www.zillow.com"),
            "https://www.zillow.com/homes/90210_rb/"
        );
        assert_eq!(
            request.search_url("https://www.zillow.com/"),
            "https://www.zillow.com/homes/90210_rb/"
        );
    }

    #[test]
    fn trims_area_code() {
        let request = ScrapeRequest::new("  10001 ", 5).unwrap();
        assert_eq!(request.area_code(), "10001");
        assert_eq!(request.max_records(), 5);
    }

    #[test]
    fn rejects_empty_area_and_zero_limit() {
        assert!(matches!(
            ScrapeRequest::new("   ", 5),
            Err(ScoutError::InvalidRequest(_))
        ));
        assert!(matches!(
            ScrapeRequest::new("10001", 0),
            Err(ScoutError::InvalidRequest(_))
        ));
    }
}
