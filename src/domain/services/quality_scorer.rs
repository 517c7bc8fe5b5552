// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::ActivityCandidate;
use serde::Deserialize;

/// 质量评分权重
///
/// 每项权重对应一个辅助字段是否存在
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub image: f64,
    pub coordinates: f64,
    pub specific_time: f64,
    pub registration_url: f64,
    pub detail_url: f64,
    pub contact: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            image: 0.20,
            coordinates: 0.20,
            specific_time: 0.15,
            registration_url: 0.15,
            detail_url: 0.15,
            contact: 0.15,
        }
    }
}

impl QualityWeights {
    fn total(&self) -> f64 {
        self.image
            + self.coordinates
            + self.specific_time
            + self.registration_url
            + self.detail_url
            + self.contact
    }
}

/// 候选记录质量评分器
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    /// 单条候选记录的质量分数，范围 [0, 1]
    ///
    /// 权重之和不为 1 时按总和归一化
    pub fn score(&self, candidate: &ActivityCandidate) -> f64 {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return 0.0;
        }

        let mut score = 0.0;
        if candidate.has_image() {
            score += w.image;
        }
        if candidate.has_coordinates() {
            score += w.coordinates;
        }
        if candidate.has_specific_time() {
            score += w.specific_time;
        }
        if candidate.registration_url().is_some() {
            score += w.registration_url;
        }
        if candidate.detail_url().is_some() {
            score += w.detail_url;
        }
        if candidate.has_contact() {
            score += w.contact;
        }
        (score / total).clamp(0.0, 1.0)
    }

    /// 一组候选记录的平均分数，空集合为 0
    pub fn average(&self, candidates: &[ActivityCandidate]) -> f64 {
        if candidates.is_empty() {
            return 0.0;
        }
        let sum: f64 = candidates.iter().map(|c| self.score(c)).sum();
        sum / candidates.len() as f64
    }
}

/// 平均多个分数，空集合为 0
pub fn mean(scores: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
