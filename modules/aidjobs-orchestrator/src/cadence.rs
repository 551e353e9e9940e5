use aidjobs_common::OrgCategory;

/// Cadence never drops below half a day.
const MIN_CADENCE_DAYS: f64 = 0.5;
/// Stale sources slow down to at most two weeks.
const MAX_CADENCE_DAYS: f64 = 14.0;
/// Failure backoff caps at one week.
const MAX_BACKOFF_DAYS: f64 = 7.0;
/// Changes per run that count as high activity.
const HIGH_ACTIVITY_CHANGES: u32 = 10;
/// No-change runs before the cadence stretches.
const NOCHANGE_SLOWDOWN_RUNS: i32 = 3;

/// Compute the effective cadence in days for a source after a run.
///
/// `jitter` is the uniform factor in [0.85, 1.15]; callers pass 1.0 in
/// tests and a sampled value in production.
pub fn compute_cadence_days(
    base_cadence_days: Option<f64>,
    category: OrgCategory,
    inserted: u32,
    updated: u32,
    consecutive_failures: i32,
    consecutive_nochange: i32,
    jitter: f64,
) -> f64 {
    let base = match base_cadence_days {
        Some(days) if days > 0.0 => days,
        _ => category.default_cadence_days(),
    };

    let changes = inserted + updated;
    let mut cadence = if changes >= HIGH_ACTIVITY_CHANGES {
        (base - 1.0).max(MIN_CADENCE_DAYS)
    } else if changes == 0 && consecutive_nochange >= NOCHANGE_SLOWDOWN_RUNS {
        (base + 1.0).min(MAX_CADENCE_DAYS)
    } else {
        base
    };

    if consecutive_failures > 0 {
        let backoff_hours = 6.0 * 2f64.powi(consecutive_failures);
        let backoff_days = (backoff_hours / 24.0).min(MAX_BACKOFF_DAYS);
        cadence = cadence.max(backoff_days);
    }

    cadence * jitter
}

/// Sample the production jitter factor.
pub fn sample_jitter() -> f64 {
    use rand::Rng;
    rand::rng().random_range(0.85..=1.15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_speedup_scenario() {
        // Base cadence 3 days, {inserted: 8, updated: 3} -> max(0.5, 3-1) = 2.
        let cadence = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 8, 3, 0, 0, 1.0);
        assert_eq!(cadence, 2.0);
    }

    #[test]
    fn failure_backoff_scenario() {
        // 3 consecutive failures: backoff = min(7, 6*2^3/24) = 2 days;
        // base 3 dominates -> 3.
        let cadence = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 3, 0, 1.0);
        assert_eq!(cadence, 3.0);

        // 5 failures: backoff = min(7, 6*32/24) = 7 -> dominates base 3.
        let cadence = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 5, 0, 1.0);
        assert_eq!(cadence, 7.0);
    }

    #[test]
    fn stale_source_slows_down() {
        let cadence = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 0, 3, 1.0);
        assert_eq!(cadence, 4.0);

        // Only after 3 consecutive no-change runs.
        let cadence = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 0, 2, 1.0);
        assert_eq!(cadence, 3.0);
    }

    #[test]
    fn slowdown_caps_at_two_weeks() {
        let cadence = compute_cadence_days(Some(14.0), OrgCategory::Academic, 0, 0, 0, 10, 1.0);
        assert_eq!(cadence, 14.0);
    }

    #[test]
    fn speedup_floors_at_half_day() {
        let cadence = compute_cadence_days(Some(1.0), OrgCategory::Un, 12, 0, 0, 0, 1.0);
        assert_eq!(cadence, 0.5);
    }

    #[test]
    fn category_defaults_used_without_base() {
        assert_eq!(
            compute_cadence_days(None, OrgCategory::Un, 0, 0, 0, 0, 1.0),
            1.0
        );
        assert_eq!(
            compute_cadence_days(None, OrgCategory::Ingo, 0, 0, 0, 0, 1.0),
            2.0
        );
        assert_eq!(
            compute_cadence_days(None, OrgCategory::Private, 0, 0, 0, 0, 1.0),
            5.0
        );
        assert_eq!(
            compute_cadence_days(None, OrgCategory::Academic, 0, 0, 0, 0, 1.0),
            7.0
        );
        assert_eq!(
            compute_cadence_days(Some(0.0), OrgCategory::Other, 0, 0, 0, 0, 1.0),
            3.0
        );
    }

    #[test]
    fn backoff_beats_speedup() {
        // High activity wants 2 days, but 4 failures force min(7, 4) = 4.
        let cadence = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 10, 5, 4, 0, 1.0);
        assert_eq!(cadence, 4.0);
    }

    #[test]
    fn jitter_scales_linearly() {
        let base = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 0, 0, 1.0);
        let low = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 0, 0, 0.85);
        let high = compute_cadence_days(Some(3.0), OrgCategory::Ngo, 0, 0, 0, 0, 1.15);
        assert!((low - base * 0.85).abs() < 1e-9);
        assert!((high - base * 1.15).abs() < 1e-9);
    }

    #[test]
    fn sampled_jitter_in_range() {
        for _ in 0..100 {
            let jitter = sample_jitter();
            assert!((0.85..=1.15).contains(&jitter));
        }
    }
}
