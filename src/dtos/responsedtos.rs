use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time_ago::time_ago;

//Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

/// One page of results plus the navigation fields the clients render.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Paginated<T> {
    /// Wraps a page that was already limited in SQL.
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev: page > 1,
            has_next: page < pages,
        }
    }

    /// Cuts a page out of a fully loaded list.
    pub fn from_vec(all: Vec<T>, page: i64, per_page: i64) -> Self {
        let total = all.len() as i64;
        let offset = ((page - 1) * per_page).max(0) as usize;
        let items = all.into_iter().skip(offset).take(per_page as usize).collect();
        Self::new(items, page, per_page, total)
    }
}

/// A list item plus its human-readable age.
#[derive(Debug, Serialize, Clone)]
pub struct TimedDto<T> {
    #[serde(flatten)]
    pub item: T,
    pub time_ago: String,
}

impl<T> TimedDto<T> {
    pub fn new(item: T, at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            item,
            time_ago: time_ago(at, now),
        }
    }
}

/// `?page=` with 1 as the floor.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PageQueryDto {
    pub page: Option<i64>,
}

impl PageQueryDto {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self, per_page: i64) -> i64 {
        (self.page() - 1) * per_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_navigation() {
        let page = Paginated::new(vec![1, 2, 3], 2, 3, 8);
        assert_eq!(page.pages, 3);
        assert!(page.has_prev);
        assert!(page.has_next);

        let last = Paginated::new(vec![7, 8], 3, 3, 8);
        assert!(!last.has_next);

        let empty: Paginated<i32> = Paginated::new(vec![], 1, 10, 0);
        assert_eq!(empty.pages, 0);
        assert!(!empty.has_prev && !empty.has_next);
    }

    #[test]
    fn test_from_vec_slices() {
        let all: Vec<i32> = (1..=25).collect();
        let page = Paginated::from_vec(all.clone(), 3, 10);
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);

        let beyond = Paginated::from_vec(all, 4, 10);
        assert!(beyond.items.is_empty());
        assert!(beyond.has_prev);
    }

    #[test]
    fn test_page_query_floor() {
        let query = PageQueryDto { page: Some(0) };
        assert_eq!(query.page(), 1);
        assert_eq!(PageQueryDto { page: Some(3) }.offset(15), 30);
    }

    #[test]
    fn test_message_only_response_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("data").is_none());
    }
}
