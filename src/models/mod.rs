use serde::{Deserialize, Serialize};

/// One listing card that yielded all three fields.
///
/// Field names double as the spreadsheet column headers, in this order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingRecord {
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Link")]
    pub link: String,
}

impl ListingRecord {
    pub const COLUMNS: [&'static str; 3] = ["Price", "Address", "Link"];

    pub fn new(
        price: impl Into<String>,
        address: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            price: price.into(),
            address: address.into(),
            link: link.into(),
        }
    }

    /// Cell values in column order.
    pub fn cells(&self) -> [&str; 3] {
        [self.price.as_str(), self.address.as_str(), self.link.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_column_names() {
        let record = ListingRecord::new("$450,000", "123 Main St", "https://example.com/a");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["Price"], "$450,000");
        assert_eq!(json["Address"], "123 Main St");
        assert_eq!(json["Link"], "https://example.com/a");
        assert_eq!(record.cells(), ["$450,000", "123 Main St", "https://example.com/a"]);
    }
}
