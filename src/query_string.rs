use std::collections::HashMap;

#[derive(PartialEq, Debug, Default)]
pub struct QueryString {
    items: HashMap<String, String>,
}

impl QueryString {
    pub fn from(buf: &str) -> Self {
        let vs: Vec<(String, String)> = serde_urlencoded::from_str(buf).unwrap_or_else(|_| vec![]);
        let items: HashMap<String, String> = vs.into_iter().collect();

        QueryString {
            items,
        }
    }

    pub fn from_opt(buf: Option<&str>) -> Self {
        buf.map(QueryString::from).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> &str {
        self.items.get(key).map(String::as_str).unwrap_or("")
    }

    /// Status filter label, `all` when absent.
    pub fn get_filter(&self) -> &str {
        match self.get("filter").trim() {
            "" => "all",
            label => label,
        }
    }

    pub fn get_query(&self) -> &str {
        self.get("q").trim()
    }
}
