// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::{
    candidates_from_payload, parse_date, parse_time, Activity, ActivityCandidate, ActivityKind,
    Contact, Location,
};
use crate::domain::models::admin_event::{AdminEvent, ExtractionSchema};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 转换结果
///
/// `activity` 为空时 `issues` 说明了原因；不为空时 `issues` 只是提示
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionOutcome {
    pub activity: Option<Activity>,
    pub issues: Vec<String>,
    /// 置信度 [0, 1]
    pub confidence_score: f64,
    /// 活动字段 → 原始数据中的字段名
    pub field_mappings: BTreeMap<String, String>,
}

impl ConversionOutcome {
    /// 是否可以批准
    pub fn can_approve(&self) -> bool {
        self.activity.is_some()
    }

    fn failed(issues: Vec<String>) -> Self {
        Self {
            activity: None,
            issues,
            confidence_score: 0.0,
            field_mappings: BTreeMap::new(),
        }
    }
}

/// 原始数据到活动的转换器
///
/// 每次审核操作前重新运行，结果不作为事实保存
#[async_trait]
pub trait ActivityConverter: Send + Sync {
    async fn convert(&self, event: &AdminEvent) -> ConversionOutcome;
}

const TITLE_KEYS: &[&str] = &["title", "name", "event_name", "eventName", "summary"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "details", "body"];
const CATEGORY_KEYS: &[&str] = &["category", "type", "genre"];
const AGE_KEYS: &[&str] = &["age_groups", "ageGroups", "ages", "age_range", "audience"];
const DATE_KEYS: &[&str] = &["start_date", "startDate", "date", "start", "event_date"];
const TIME_KEYS: &[&str] = &["start_time", "startTime", "time"];
const END_DATE_KEYS: &[&str] = &["end_date", "endDate", "end"];
const PRICE_KEYS: &[&str] = &["price", "cost", "fee"];
const IMAGE_KEYS: &[&str] = &["image", "image_url", "imageUrl", "thumbnail", "photo"];
const REGISTRATION_KEYS: &[&str] = &[
    "registration_url",
    "registrationUrl",
    "register_url",
    "signup_url",
    "ticket_url",
];
const DETAIL_KEYS: &[&str] = &["url", "detail_url", "detailUrl", "link", "event_url"];
const PROVIDER_KEYS: &[&str] = &["provider", "organizer", "host", "organization"];
const LOCATION_KEYS: &[&str] = &["location", "venue", "place", "location_name", "venue_name"];
const ADDRESS_KEYS: &[&str] = &["address", "street_address", "streetAddress"];
const CITY_KEYS: &[&str] = &["city", "locality"];
const EMAIL_KEYS: &[&str] = &["email", "contact_email", "contactEmail"];
const PHONE_KEYS: &[&str] = &["phone", "contact_phone", "contactPhone", "telephone"];

/// 参与置信度计算的字段数
const SCORED_FIELDS: f64 = 10.0;
/// 每条提示扣减的置信度
const ISSUE_PENALTY: f64 = 0.05;

/// 按提取模式分派的转换器
#[derive(Debug, Clone, Default)]
pub struct SchemaConverter;

impl SchemaConverter {
    pub fn new() -> Self {
        Self
    }

    /// 同步转换原始数据
    pub fn convert_payload(
        &self,
        schema: &ExtractionSchema,
        raw: &Value,
        source_url: &str,
    ) -> ConversionOutcome {
        let candidates = candidates_from_payload(raw);
        let Some(first) = candidates.first() else {
            return ConversionOutcome::failed(vec!["payload contains no records".to_string()]);
        };

        let mut issues = Vec::new();
        if candidates.len() > 1 {
            issues.push(format!(
                "payload contains {} records; only the first is converted",
                candidates.len()
            ));
        }

        let mapper = FieldMapper::new(schema, first);
        if let ExtractionSchema::Custom { document } = schema {
            let missing: Vec<String> = required_fields(document)
                .into_iter()
                .filter(|field| mapper.text(field, &[]).is_none())
                .map(|field| format!("missing required field: {}", field))
                .collect();
            if !missing.is_empty() {
                issues.extend(missing);
                return ConversionOutcome::failed(issues);
            }
        }

        mapper.build(schema, source_url, issues)
    }
}

#[async_trait]
impl ActivityConverter for SchemaConverter {
    async fn convert(&self, event: &AdminEvent) -> ConversionOutcome {
        let mut outcome = self.convert_payload(&event.schema, &event.raw_data, &event.source_url);
        if let Some(activity) = outcome.activity.as_mut() {
            activity.admin_event_id = Some(event.id);
        }
        outcome
    }
}

fn required_fields(document: &Value) -> Vec<String> {
    document
        .get("required")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 带字段映射追踪的取值器
struct FieldMapper<'a> {
    record: &'a Value,
    overrides: Map<String, Value>,
    mappings: std::cell::RefCell<BTreeMap<String, String>>,
}

impl<'a> FieldMapper<'a> {
    fn new(schema: &ExtractionSchema, candidate: &'a ActivityCandidate) -> Self {
        let overrides = match schema {
            ExtractionSchema::Custom { document } => document
                .get("field_map")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            _ => Map::new(),
        };
        Self {
            record: &candidate.0,
            overrides,
            mappings: std::cell::RefCell::new(BTreeMap::new()),
        }
    }

    fn raw(&self, field: &str, aliases: &[&str]) -> Option<(&'a Value, String)> {
        if let Some(key) = self.overrides.get(field).and_then(Value::as_str) {
            return self.record.get(key).map(|v| (v, key.to_string()));
        }
        if aliases.is_empty() {
            return self.record.get(field).map(|v| (v, field.to_string()));
        }
        aliases.iter().find_map(|key| {
            self.record
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (v, key.to_string()))
        })
    }

    fn text(&self, field: &str, aliases: &[&str]) -> Option<String> {
        let (value, key) = self.raw(field, aliases)?;
        let text = match value {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        self.mappings.borrow_mut().insert(field.to_string(), key);
        Some(text)
    }

    fn number(&self, value: &Value, key: &str) -> Option<f64> {
        match value.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn age_groups(&self) -> Vec<String> {
        let Some((value, key)) = self.raw("age_groups", AGE_KEYS) else {
            return Vec::new();
        };
        let groups: Vec<String> = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) => s
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        if !groups.is_empty() {
            self.mappings
                .borrow_mut()
                .insert("age_groups".to_string(), key);
        }
        groups
    }

    fn location(&self) -> Location {
        let mut location = Location::default();
        if let Some((value, key)) = self.raw("location", LOCATION_KEYS) {
            match value {
                Value::String(s) if !s.trim().is_empty() => {
                    location.name = Some(s.trim().to_string());
                    self.mappings.borrow_mut().insert("location".to_string(), key);
                }
                Value::Object(_) => {
                    location.name = lookup_plain(value, &["name", "title"]);
                    location.address = lookup_plain(value, ADDRESS_KEYS);
                    location.city = lookup_plain(value, CITY_KEYS);
                    location.latitude = self
                        .number(value, "latitude")
                        .or_else(|| self.number(value, "lat"));
                    location.longitude = self
                        .number(value, "longitude")
                        .or_else(|| self.number(value, "lng"))
                        .or_else(|| self.number(value, "lon"));
                    self.mappings.borrow_mut().insert("location".to_string(), key);
                }
                _ => {}
            }
        }
        if location.address.is_none() {
            location.address = self.text("address", ADDRESS_KEYS);
        }
        if location.city.is_none() {
            location.city = self.text("city", CITY_KEYS);
        }
        if !location.has_coordinates() {
            let coordinates = self.record.get("coordinates").unwrap_or(self.record);
            location.latitude = self
                .number(coordinates, "latitude")
                .or_else(|| self.number(coordinates, "lat"));
            location.longitude = self
                .number(coordinates, "longitude")
                .or_else(|| self.number(coordinates, "lng"))
                .or_else(|| self.number(coordinates, "lon"));
        }
        location
    }

    fn contact(&self) -> Contact {
        let nested = self.record.get("contact").filter(|v| v.is_object());
        let email = self
            .text("email", EMAIL_KEYS)
            .or_else(|| nested.and_then(|c| lookup_plain(c, EMAIL_KEYS)));
        let phone = self
            .text("phone", PHONE_KEYS)
            .or_else(|| nested.and_then(|c| lookup_plain(c, PHONE_KEYS)));
        Contact { email, phone }
    }

    fn build(
        self,
        schema: &ExtractionSchema,
        source_url: &str,
        mut issues: Vec<String>,
    ) -> ConversionOutcome {
        let Some(title) = self.text("title", TITLE_KEYS) else {
            issues.push("missing title".to_string());
            return ConversionOutcome::failed(issues);
        };

        let kind = schema.activity_kind();
        let raw_date = self.text("start_date", DATE_KEYS);
        let start_date = raw_date.as_deref().and_then(parse_date);
        match (&raw_date, start_date) {
            (Some(raw), None) => issues.push(format!("unparseable start date: {}", raw)),
            (None, _) if matches!(kind, ActivityKind::Event) => {
                issues.push("missing start date".to_string())
            }
            _ => {}
        }
        if matches!(kind, ActivityKind::Event) && start_date.is_none() {
            return ConversionOutcome::failed(issues);
        }

        let start_time = self
            .text("start_time", TIME_KEYS)
            .and_then(|raw| parse_time(&raw))
            .or_else(|| {
                raw_date
                    .as_deref()
                    .filter(|d| d.contains('T'))
                    .and_then(parse_time)
            });
        let end_date = self
            .text("end_date", END_DATE_KEYS)
            .and_then(|raw| parse_date(&raw));
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                issues.push("end date precedes start date".to_string());
            }
        }

        let mut activity = Activity::new(kind, title, source_url);
        activity.description = self.text("description", DESCRIPTION_KEYS);
        activity.category = self
            .text("category", CATEGORY_KEYS)
            .map(|c| c.to_lowercase());
        activity.age_groups = self.age_groups();
        activity.location = self.location();
        activity.start_date = start_date;
        activity.start_time = start_time;
        activity.end_date = end_date;
        activity.price = self.text("price", PRICE_KEYS);
        activity.image_url = self.text("image_url", IMAGE_KEYS);
        activity.registration_url = self.text("registration_url", REGISTRATION_KEYS);
        activity.detail_url = self.text("detail_url", DETAIL_KEYS);
        activity.contact = self.contact();
        activity.provider = self.text("provider", PROVIDER_KEYS);

        if activity.location.name.is_none() {
            issues.push("missing location".to_string());
        }
        if activity.category.is_none() {
            issues.push("missing category".to_string());
        }

        let populated = [
            activity.description.is_some(),
            activity.category.is_some(),
            activity.location.name.is_some(),
            activity.start_date.is_some(),
            activity.start_time.is_some(),
            activity.image_url.is_some(),
            activity.registration_url.is_some(),
            activity.detail_url.is_some(),
            !activity.contact.is_empty(),
            activity.location.has_coordinates(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as f64;
        let confidence =
            (populated / SCORED_FIELDS - ISSUE_PENALTY * issues.len() as f64).clamp(0.0, 1.0);

        ConversionOutcome {
            activity: Some(activity),
            issues,
            confidence_score: confidence,
            field_mappings: self.mappings.into_inner(),
        }
    }
}

fn lookup_plain(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}
