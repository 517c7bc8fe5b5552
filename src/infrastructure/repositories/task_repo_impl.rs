// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::store::{
    IndexQuery, Partition, PartitionStore, RepositoryError, SortCondition, StoredRecord,
};
use crate::domain::repositories::task_repository::{PendingClaim, TaskRepository};
use crate::infrastructure::repositories::keys;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const PARTITION: Partition = Partition::ScrapingOperations;
const MAX_CLAIM_ATTEMPTS: usize = 3;
/// 找不到持有任务的槽位在此时间后视为陈旧
const ORPHAN_SLOT_GRACE_SECS: i64 = 300;

/// 待执行槽位记录
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingSlot {
    task_id: Uuid,
}

/// 任务仓库实现
///
/// 基于分区存储实现的任务数据访问层
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    store: Arc<dyn PartitionStore>,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `store` - 分区存储
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self { store }
    }

    fn task_record(task: &Task) -> Result<StoredRecord, RepositoryError> {
        Ok(
            StoredRecord::encode(PARTITION, keys::PK_TASK, task.id.to_string(), task)?
                .with_indexes(keys::task_indexes(task))
                .expires_at(task.expires_at),
        )
    }

    fn slot_record(
        source_id: Uuid,
        task_type: TaskType,
        task_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<StoredRecord, RepositoryError> {
        Ok(StoredRecord::encode(
            PARTITION,
            keys::PK_PENDING,
            keys::pending_sk(source_id, task_type),
            &PendingSlot { task_id },
        )?
        .expires_at(expires_at))
    }

    /// 槽位当前的持有者与写入时间
    async fn slot_holder(
        &self,
        source_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<(Uuid, DateTime<Utc>)>, RepositoryError> {
        let record = self
            .store
            .get(
                PARTITION,
                keys::PK_PENDING,
                &keys::pending_sk(source_id, task_type),
            )
            .await?;
        match record {
            Some(record) => {
                let slot: PendingSlot = record.decode()?;
                Ok(Some((slot.task_id, record.updated_at)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        if !self.store.put_if_absent(Self::task_record(task)?).await? {
            return Err(RepositoryError::AlreadyExists);
        }
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        self.store
            .get(PARTITION, keys::PK_TASK, &id.to_string())
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn update(&self, task: &Task) -> Result<Task, RepositoryError> {
        self.store.put(Self::task_record(task)?).await?;
        Ok(task.clone())
    }

    async fn find_due(&self, before: DateTime<Utc>) -> Result<Vec<Task>, RepositoryError> {
        let query = IndexQuery::new(PARTITION, keys::IDX_NEXT_RUN, keys::scheduled_bucket())
            .sort(SortCondition::AtMost(keys::next_run_upper_bound(before)));
        self.store
            .query_index(&query)
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    async fn list_by_source(&self, source_id: Uuid) -> Result<Vec<Task>, RepositoryError> {
        let query = IndexQuery::new(
            PARTITION,
            keys::IDX_SOURCE_PRIORITY,
            keys::source_hash(source_id),
        );
        self.store
            .query_index(&query)
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    async fn claim_pending_slot(
        &self,
        source_id: Uuid,
        task_type: TaskType,
        task_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<PendingClaim, RepositoryError> {
        let record = Self::slot_record(source_id, task_type, task_id, expires_at)?;
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            if self.store.put_if_absent(record.clone()).await? {
                return Ok(PendingClaim::Claimed);
            }
            match self.slot_holder(source_id, task_type).await? {
                // 槽位在两次读写之间过期或被释放
                None => continue,
                Some((holder, _)) if holder == task_id => return Ok(PendingClaim::Claimed),
                Some((holder, claimed_at)) => {
                    // 槽位先于任务写入，短时间内找不到持有者是正常的
                    let holder_pending = match self.find_by_id(holder).await? {
                        Some(task) => task.is_pending(),
                        None => Utc::now() - claimed_at < chrono::Duration::seconds(ORPHAN_SLOT_GRACE_SECS),
                    };
                    if holder_pending {
                        return Ok(PendingClaim::Existing(holder));
                    }
                    // 持有者已不再待执行，槽位是陈旧的
                    debug!(
                        "Reclaiming stale pending slot for source {} ({}) held by task {}",
                        source_id, task_type, holder
                    );
                    self.store
                        .delete(
                            PARTITION,
                            keys::PK_PENDING,
                            &keys::pending_sk(source_id, task_type),
                        )
                        .await?;
                }
            }
        }
        Err(RepositoryError::Storage(format!(
            "could not claim pending slot for source {} ({})",
            source_id, task_type
        )))
    }

    async fn release_pending_slot(
        &self,
        source_id: Uuid,
        task_type: TaskType,
        task_id: Uuid,
    ) -> Result<(), RepositoryError> {
        if let Some((holder, _)) = self.slot_holder(source_id, task_type).await? {
            if holder != task_id {
                return Ok(());
            }
            self.store
                .delete(PARTITION, keys::PK_PENDING, &keys::pending_sk(source_id, task_type))
                .await?;
        }
        Ok(())
    }
}
