use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformLinks {
    pub ios: Option<String>,
    pub android: Option<String>,
    pub web: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSummary {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

/// A directory entry as returned by `/platforms` and `/platforms/{slug}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub links: PlatformLinks,
    #[serde(default)]
    pub related_platforms: Vec<PlatformSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub pages: u32,
}

/// Facets the server offers for the current result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

/// `meta` object of the platform listing envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub pagination: PaginationMeta,
    #[serde(default)]
    pub filters: FilterOptions,
}

/// One page of a listing: items plus the optional listing meta.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: Option<ListMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetrics {
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub trending_score: f64,
}

/// Curated, titled grouping of platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub trending_score: f64,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platforms: Vec<PlatformSummary>,
    #[serde(default)]
    pub metrics: CollectionMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "pending"),
            SubmissionStatus::Approved => write!(f, "approved"),
            SubmissionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A platform proposal. Owned by the server; the client only moves `status`
/// through the admin approve/reject actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub submitter_name: String,
    pub submitter_email: String,
    pub platform_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub ios_url: Option<String>,
    #[serde(default)]
    pub android_url: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub screenshot_url: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub platform_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionList {
    pub items: Vec<Submission>,
    pub total: u64,
}

/// Body of `POST /submissions`. Optional fields are omitted, never sent as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    pub submitter_name: String,
    pub submitter_email: String,
    pub platform_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(rename = "recaptchaToken", skip_serializing_if = "Option::is_none")]
    pub recaptcha_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedUploadRequest {
    pub filename: String,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresignedUpload {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
}

#[derive(Clone, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Collection,
    Platform,
}

impl std::str::FromStr for EntityType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "collection" => Ok(EntityType::Collection),
            "platform" => Ok(EntityType::Platform),
            _ => Err(format!("Invalid entity type '{s}'. Valid options: collection, platform")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    View,
    Click,
}

pub type Metadata = BTreeMap<String, String>;

/// Wire shape of `POST /analytics/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetricPoint {
    pub date: NaiveDate,
    pub views: u64,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCollectionMetric {
    pub collection_id: i64,
    pub slug: String,
    pub title: String,
    pub views: u64,
    pub clicks: u64,
    pub trending_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsDashboard {
    #[serde(default)]
    pub daily: Vec<DailyMetricPoint>,
    #[serde(default)]
    pub top_collections: Vec<TopCollectionMetric>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analytics_event_omits_absent_fields() {
        let ev = AnalyticsEvent {
            entity_type: EntityType::Collection,
            entity_id: 4,
            event_type: EventType::Click,
            occurred_at: None,
            metadata: None,
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"entity_type": "collection", "entity_id": 4, "event_type": "click"})
        );
    }

    #[test]
    fn platform_tolerates_missing_collections() {
        let p: Platform = serde_json::from_value(json!({
            "id": 1, "slug": "deepl", "name": "DeepL"
        }))
        .unwrap();
        assert!(p.categories.is_empty());
        assert_eq!(p.links, PlatformLinks::default());
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let c = AdminCredentials { username: "root".into(), password: "hunter2".into() };
        let s = format!("{c:?}");
        assert!(s.contains("root"));
        assert!(!s.contains("hunter2"));
    }
}
