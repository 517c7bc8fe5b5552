// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// 已发布实体的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    #[default]
    Event,
    Class,
    Camp,
    Venue,
    Program,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActivityKind::Event => write!(f, "event"),
            ActivityKind::Class => write!(f, "class"),
            ActivityKind::Camp => write!(f, "camp"),
            ActivityKind::Venue => write!(f, "venue"),
            ActivityKind::Program => write!(f, "program"),
        }
    }
}

/// 地点
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// 联系方式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }
}

/// 已发布的活动
///
/// 只能通过审核流程的批准操作创建。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub age_groups: Vec<String>,
    pub location: Location,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub registration_url: Option<String>,
    pub detail_url: Option<String>,
    pub contact: Contact,
    pub provider: Option<String>,
    pub venue_id: Option<Uuid>,
    pub source_url: String,
    pub admin_event_id: Option<Uuid>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// 新建活动，其余字段由转换器填充
    pub fn new(kind: ActivityKind, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            description: None,
            category: None,
            age_groups: Vec::new(),
            location: Location::default(),
            start_date: None,
            start_time: None,
            end_date: None,
            price: None,
            image_url: None,
            registration_url: None,
            detail_url: None,
            contact: Contact::default(),
            provider: None,
            venue_id: None,
            source_url: source_url.into(),
            admin_event_id: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 去重键：`lowercase(title)|lowercase(location name)|start date`
    pub fn dedup_key(&self) -> String {
        dedup_key(
            &self.title,
            self.location.name.as_deref(),
            self.start_date.map(|d| d.to_string()).as_deref(),
        )
    }
}

/// 由标题、地点名和开始日期计算去重键
pub fn dedup_key(title: &str, location: Option<&str>, start_date: Option<&str>) -> String {
    format!(
        "{}|{}|{}",
        title.trim().to_lowercase(),
        location.unwrap_or_default().trim().to_lowercase(),
        start_date.unwrap_or_default().trim()
    )
}

const TITLE_KEYS: &[&str] = &["title", "name", "event_name", "eventName", "summary"];
const LOCATION_KEYS: &[&str] = &["location", "venue", "place", "location_name", "venue_name"];
const DATE_KEYS: &[&str] = &["start_date", "startDate", "date", "start", "event_date"];
const TIME_KEYS: &[&str] = &["start_time", "startTime", "time"];
const IMAGE_KEYS: &[&str] = &["image", "image_url", "imageUrl", "thumbnail", "photo"];
const REGISTRATION_KEYS: &[&str] = &[
    "registration_url",
    "registrationUrl",
    "register_url",
    "signup_url",
    "ticket_url",
];
const DETAIL_KEYS: &[&str] = &["url", "detail_url", "detailUrl", "link", "event_url"];
const EMAIL_KEYS: &[&str] = &["email", "contact_email", "contactEmail"];
const PHONE_KEYS: &[&str] = &["phone", "contact_phone", "contactPhone", "telephone"];

/// 提取服务返回的一条候选记录
///
/// 候选记录的结构不固定，访问器按别名表依次查找字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityCandidate(pub Value);

impl ActivityCandidate {
    /// 按别名查找第一个非空字符串字段
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        lookup_text(&self.0, keys)
    }

    pub fn title(&self) -> Option<String> {
        self.text(TITLE_KEYS)
    }

    /// 地点名，支持嵌套对象 `{"location": {"name": ...}}` 与扁平字段
    pub fn location_name(&self) -> Option<String> {
        for key in LOCATION_KEYS {
            match self.0.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
                Some(nested @ Value::Object(_)) => {
                    if let Some(name) = lookup_text(nested, &["name", "title"]) {
                        return Some(name);
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub fn start_date(&self) -> Option<String> {
        self.text(DATE_KEYS)
    }

    /// 与 [`Activity::dedup_key`] 一致：可解析的日期统一为 `YYYY-MM-DD`
    pub fn dedup_key(&self) -> String {
        let date = self
            .start_date()
            .map(|raw| parse_date(&raw).map(|d| d.to_string()).unwrap_or(raw));
        dedup_key(
            self.title().as_deref().unwrap_or_default(),
            self.location_name().as_deref(),
            date.as_deref(),
        )
    }

    pub fn has_image(&self) -> bool {
        self.text(IMAGE_KEYS).is_some()
    }

    /// 坐标可能在顶层，也可能在 `location` 对象内
    pub fn has_coordinates(&self) -> bool {
        let has_pair = |v: &Value| {
            let lat = v.get("latitude").or_else(|| v.get("lat"));
            let lng = v
                .get("longitude")
                .or_else(|| v.get("lng"))
                .or_else(|| v.get("lon"));
            matches!((lat, lng), (Some(a), Some(b)) if !a.is_null() && !b.is_null())
        };
        has_pair(&self.0)
            || self.0.get("location").map(has_pair).unwrap_or(false)
            || self.0.get("coordinates").map(has_pair).unwrap_or(false)
    }

    /// 是否给出了具体的时刻，而不只是日期
    pub fn has_specific_time(&self) -> bool {
        if self.text(TIME_KEYS).is_some() {
            return true;
        }
        self.start_date()
            .map(|d| d.contains('T') || d.contains(':'))
            .unwrap_or(false)
    }

    pub fn registration_url(&self) -> Option<String> {
        self.text(REGISTRATION_KEYS)
    }

    pub fn detail_url(&self) -> Option<String> {
        self.text(DETAIL_KEYS)
    }

    pub fn has_contact(&self) -> bool {
        self.text(EMAIL_KEYS).is_some()
            || self.text(PHONE_KEYS).is_some()
            || self
                .0
                .get("contact")
                .map(|c| !c.is_null() && c != &Value::String(String::new()))
                .unwrap_or(false)
    }
}

fn lookup_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// 解析常见的日期写法
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    const FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];
    if let Some(date) = FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    {
        return Some(date);
    }
    // "2025-06-01 10:00" 之类带时刻的写法
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// 解析常见的时刻写法
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.time());
    }
    const FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p", "%I %p"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&raw.to_uppercase(), fmt).ok())
}

const COLLECTION_KEYS: &[&str] = &["events", "activities", "items", "results", "data"];

/// 从提取服务的原始数据中展开候选记录
///
/// 接受数组、包含 `events`/`activities`/`items`/`results`/`data` 数组的对象，
/// 或单个对象。
pub fn candidates_from_payload(payload: &Value) -> Vec<ActivityCandidate> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter(|v| v.is_object())
            .cloned()
            .map(ActivityCandidate)
            .collect(),
        Value::Object(map) => {
            for key in COLLECTION_KEYS {
                if let Some(Value::Array(_)) = map.get(*key) {
                    return candidates_from_payload(&map[*key]);
                }
            }
            if map.is_empty() {
                Vec::new()
            } else {
                vec![ActivityCandidate(payload.clone())]
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_accessors_follow_aliases() {
        let candidate = ActivityCandidate(json!({
            "name": "  Toddler Story Time ",
            "venue": {"name": "Main Library", "lat": 45.1, "lng": -122.6},
            "startDate": "2025-06-01T10:00:00Z",
            "signup_url": "https://lib.example.org/register",
            "contact_email": "kids@lib.example.org"
        }));

        assert_eq!(candidate.title().as_deref(), Some("Toddler Story Time"));
        assert_eq!(candidate.location_name().as_deref(), Some("Main Library"));
        assert!(candidate.has_specific_time());
        assert!(candidate.registration_url().is_some());
        assert!(candidate.has_contact());
        assert!(!candidate.has_image());
        assert_eq!(
            candidate.dedup_key(),
            "toddler story time|main library|2025-06-01"
        );
    }

    #[test]
    fn test_candidates_from_payload_shapes() {
        let wrapped = json!({"events": [{"title": "a"}, {"title": "b"}, "noise"]});
        assert_eq!(candidates_from_payload(&wrapped).len(), 2);

        let single = json!({"title": "only one"});
        assert_eq!(candidates_from_payload(&single).len(), 1);

        assert!(candidates_from_payload(&json!({})).is_empty());
        assert!(candidates_from_payload(&json!("text")).is_empty());
    }

    #[test]
    fn test_parse_date_and_time_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 9);
        assert_eq!(parse_date("2025-03-09"), expected);
        assert_eq!(parse_date("03/09/2025"), expected);
        assert_eq!(parse_date("March 9, 2025"), expected);
        assert_eq!(parse_date("2025-03-09T18:30:00-07:00"), expected);
        assert_eq!(parse_date("sometime soon"), None);

        assert_eq!(parse_time("18:30"), NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(parse_time("6:30 pm"), NaiveTime::from_hms_opt(18, 30, 0));
    }

    #[test]
    fn test_activity_dedup_key_normalizes_case() {
        let mut activity = Activity::new(ActivityKind::Class, "Swim Lessons", "https://x.org");
        activity.location.name = Some("CITY POOL".to_string());
        activity.start_date = NaiveDate::from_ymd_opt(2025, 7, 4);
        assert_eq!(activity.dedup_key(), "swim lessons|city pool|2025-07-04");
    }
}
