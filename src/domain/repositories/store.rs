// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 条件写入失败，记录已存在
    #[error("Record already exists")]
    AlreadyExists,
    /// 记录序列化失败
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 其他存储错误
    #[error("Storage error: {0}")]
    Storage(String),
}

/// 逻辑分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// 已发布实体与审核事件
    BusinessEntities,
    /// 数据源提交、分析与配置
    SourceManagement,
    /// 任务与执行记录
    ScrapingOperations,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Partition::BusinessEntities => write!(f, "business_entities"),
            Partition::SourceManagement => write!(f, "source_management"),
            Partition::ScrapingOperations => write!(f, "scraping_operations"),
        }
    }
}

impl FromStr for Partition {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business_entities" => Ok(Partition::BusinessEntities),
            "source_management" => Ok(Partition::SourceManagement),
            "scraping_operations" => Ok(Partition::ScrapingOperations),
            other => Err(RepositoryError::Storage(format!(
                "unknown partition: {}",
                other
            ))),
        }
    }
}

/// 二级索引键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub index: String,
    pub hash_key: String,
    pub sort_key: String,
}

impl IndexKey {
    pub fn new(
        index: impl Into<String>,
        hash_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            hash_key: hash_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

/// 存储中的一条记录
///
/// 主键为 `(partition, pk, sk)`，二级索引键在写入时由实体属性确定性地计算。
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub partition: Partition,
    pub pk: String,
    pub sk: String,
    pub data: Value,
    pub index_keys: Vec<IndexKey>,
    /// 过期时间，过期的记录在清理前对读取不可见
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// 序列化实体为记录
    pub fn encode<T: Serialize>(
        partition: Partition,
        pk: impl Into<String>,
        sk: impl Into<String>,
        entity: &T,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            partition,
            pk: pk.into(),
            sk: sk.into(),
            data: serde_json::to_value(entity)?,
            index_keys: Vec::new(),
            expires_at: None,
            updated_at: Utc::now(),
        })
    }

    pub fn with_index(mut self, key: IndexKey) -> Self {
        self.index_keys.push(key);
        self
    }

    pub fn with_indexes(mut self, keys: impl IntoIterator<Item = IndexKey>) -> Self {
        self.index_keys.extend(keys);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// 反序列化记录中的实体
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RepositoryError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// 索引排序键条件
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    /// 排序键以给定前缀开头
    Prefix(String),
    /// 排序键小于等于给定值
    AtMost(String),
    /// 排序键大于等于给定值
    AtLeast(String),
    /// 排序键在闭区间内
    Between(String, String),
}

impl SortCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortCondition::Prefix(prefix) => sort_key.starts_with(prefix.as_str()),
            SortCondition::AtMost(max) => sort_key <= max.as_str(),
            SortCondition::AtLeast(min) => sort_key >= min.as_str(),
            SortCondition::Between(min, max) => {
                sort_key >= min.as_str() && sort_key <= max.as_str()
            }
        }
    }
}

/// 二级索引查询
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub partition: Partition,
    pub index: String,
    pub hash_key: String,
    pub sort: Option<SortCondition>,
    /// 按排序键倒序返回
    pub descending: bool,
    pub limit: Option<usize>,
}

impl IndexQuery {
    pub fn new(partition: Partition, index: impl Into<String>, hash_key: impl Into<String>) -> Self {
        Self {
            partition,
            index: index.into(),
            hash_key: hash_key.into(),
            sort: None,
            descending: false,
            limit: None,
        }
    }

    pub fn sort(mut self, condition: SortCondition) -> Self {
        self.sort = Some(condition);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// 分区存储特质
///
/// 按分区组织的键值存储，支持条件写入、主键前缀查询与二级索引查询。
/// 实现不提供跨记录事务。
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// 写入记录，已存在时整体覆盖（包括索引键）
    async fn put(&self, record: StoredRecord) -> Result<(), RepositoryError>;

    /// 条件写入
    ///
    /// # 返回值
    ///
    /// 记录被创建时返回 `true`；同主键的未过期记录已存在时返回 `false` 且不做修改
    async fn put_if_absent(&self, record: StoredRecord) -> Result<bool, RepositoryError>;

    /// 按主键读取
    async fn get(
        &self,
        partition: Partition,
        pk: &str,
        sk: &str,
    ) -> Result<Option<StoredRecord>, RepositoryError>;

    /// 读取同一 `pk` 下的全部记录，按 `sk` 升序
    async fn query_primary(
        &self,
        partition: Partition,
        pk: &str,
    ) -> Result<Vec<StoredRecord>, RepositoryError>;

    /// 二级索引查询
    async fn query_index(&self, query: &IndexQuery) -> Result<Vec<StoredRecord>, RepositoryError>;

    /// 删除记录，返回记录是否存在
    async fn delete(&self, partition: Partition, pk: &str, sk: &str)
        -> Result<bool, RepositoryError>;

    /// 清理过期记录，返回清理数量
    async fn purge_expired(
        &self,
        partition: Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}
