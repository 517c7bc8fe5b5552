// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;

#[test]
fn test_defaults_without_config_files() {
    let settings = Settings::new().expect("settings should load from defaults");

    assert_eq!(settings.server.port, 3000);
    assert_eq!(settings.engine.max_concurrency, 3);
    assert_eq!(settings.scheduler.manual_delay_secs, 60);
    assert!(settings.scheduler.manual_max_retries < settings.scheduler.default_max_retries);
}

#[test]
fn test_source_defaults_follow_engine_and_scheduler() {
    let settings = Settings::default();
    let defaults = settings.source_defaults();

    assert_eq!(defaults.max_attempts, settings.engine.default_max_attempts);
    assert_eq!(defaults.timeout_secs, settings.engine.default_timeout_secs);
    assert_eq!(
        defaults.min_frequency_hours,
        settings.scheduler.min_frequency_hours
    );
    assert!(defaults.min_frequency_hours <= defaults.max_frequency_hours);
}

#[test]
fn test_quality_weights_default_sum_to_one() {
    let weights = Settings::default().quality;
    let total = weights.image
        + weights.coordinates
        + weights.specific_time
        + weights.registration_url
        + weights.detail_url
        + weights.contact;
    assert!((total - 1.0).abs() < 1e-9);
}
