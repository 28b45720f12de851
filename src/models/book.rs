use serde::{Deserialize, Serialize};

/// Book record as stored in the "books" table. No owner and no fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub book_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub book_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub book_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub book_cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub book_link: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct BookRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_link: Option<String>,
}
