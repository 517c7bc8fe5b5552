// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::ActivityCandidate;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// 去重结果
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated<T> {
    /// 每个去重键的首次出现，保持输入顺序
    pub unique: Vec<T>,
    /// 被丢弃的重复项数量
    pub removed: usize,
}

/// 按去重键保留首次出现的元素
///
/// # 参数
///
/// * `items` - 待去重的元素，顺序即优先级
/// * `key` - 计算去重键的函数
pub fn deduplicate_by<T, F>(items: impl IntoIterator<Item = T>, key: F) -> Deduplicated<T>
where
    F: Fn(&T) -> String,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut removed = 0;
    for item in items {
        if seen.insert(key(&item)) {
            unique.push(item);
        } else {
            removed += 1;
        }
    }
    Deduplicated { unique, removed }
}

/// 按 `标题|地点|开始日期` 规范化键对候选记录去重
pub fn deduplicate_candidates(
    candidates: impl IntoIterator<Item = ActivityCandidate>,
) -> Deduplicated<ActivityCandidate> {
    deduplicate_by(candidates, ActivityCandidate::dedup_key)
}

/// 计算一次抓取结果的内容指纹
///
/// 键排序后再哈希，同一组记录以不同顺序返回时指纹相同
pub fn content_fingerprint(candidates: &[ActivityCandidate]) -> String {
    let mut keys: Vec<String> = candidates.iter().map(|c| c.dedup_key()).collect();
    keys.sort();
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(title: &str, location: &str, date: &str) -> ActivityCandidate {
        ActivityCandidate(json!({
            "title": title,
            "location": location,
            "start_date": date,
        }))
    }

    #[test]
    fn test_identical_keys_keep_first() {
        let a = candidate("Story Time", "Central Library", "2025-06-01");
        let b = candidate("STORY TIME", "central library", "2025-06-01");
        let result = deduplicate_candidates(vec![a.clone(), b]);
        assert_eq!(result.unique, vec![a]);
        assert_eq!(result.removed, 1);
    }

    #[test]
    fn test_four_candidates_with_one_duplicate_pair() {
        let items = vec![
            candidate("Story Time", "Central Library", "2025-06-01"),
            candidate("Lego Club", "Central Library", "2025-06-01"),
            candidate("Story Time", "Central Library", "06/01/2025"),
            candidate("Story Time", "Central Library", "2025-06-02"),
        ];
        let result = deduplicate_candidates(items);
        assert_eq!(result.unique.len(), 3);
        assert_eq!(result.removed, 1);
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = candidate("Story Time", "Central Library", "2025-06-01");
        let b = candidate("Lego Club", "Central Library", "2025-06-01");
        assert_eq!(
            content_fingerprint(&[a.clone(), b.clone()]),
            content_fingerprint(&[b, a.clone()])
        );
        assert_ne!(content_fingerprint(&[a]), content_fingerprint(&[]));
    }
}
