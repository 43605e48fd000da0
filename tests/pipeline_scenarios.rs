//! End-to-end runs of the two-stage pipeline.

mod common;

use approx::assert_relative_eq;
use common::{survey_dataset, uncorrelated_scenario, OUTLIER_ROW};
use twostage_regression::prelude::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scenario_roles() -> RoleAssignment {
    RoleAssignment {
        outcome: "Y".into(),
        controls: vec!["X".into()],
        factor_a: "A".into(),
        factor_b: "B".into(),
        ..Default::default()
    }
}

fn survey_roles(covariance: CovarianceMode) -> RoleAssignment {
    RoleAssignment {
        outcome: "life satisfaction".into(),
        controls: vec!["age".into(), "household income".into()],
        fixed_effects: vec!["region".into()],
        covariance,
        cluster: Some("school id".into()),
        factor_a: "treatment".into(),
        factor_b: "wave".into(),
        stage2_controls: vec!["age".into(), "region".into()],
    }
}

#[test]
fn test_hundred_row_uncorrelated_scenario() {
    init_logger();
    let dataset = uncorrelated_scenario(100, 42);
    let stage1 = Pipeline::new()
        .load(&dataset, scenario_roles())
        .unwrap()
        .fit_stage1()
        .unwrap();

    let table = stage1.coefficient_table();
    let terms: Vec<&str> = table.rows.iter().map(|r| r.term.as_str()).collect();
    assert_eq!(terms, vec!["Intercept", "X"]);
    assert_eq!(table.formula, "Y ~ X");
    assert_eq!(table.n_observations, 100);

    let stage2 = stage1
        .diagnose(&ResidualDiagnostics::default())
        .unwrap()
        .fit_stage2(&Stage2Options::default())
        .unwrap();
    let margins = stage2.margins(0.90).unwrap();
    assert_eq!(margins.len(), 4);

    let cells: Vec<(String, String)> = margins
        .rows
        .iter()
        .map(|r| (r.level_a.to_string(), r.level_b.to_string()))
        .collect();
    assert_eq!(
        cells,
        vec![
            ("0".to_string(), "0".to_string()),
            ("0".to_string(), "1".to_string()),
            ("1".to_string(), "0".to_string()),
            ("1".to_string(), "1".to_string()),
        ]
    );
    for row in &margins.rows {
        assert!(row.ci_lower <= row.mean && row.mean <= row.ci_upper);
    }
}

#[test]
fn test_cluster_mode_without_cluster_variable() {
    let mut roles = scenario_roles();
    roles.covariance = CovarianceMode::Cluster;
    roles.cluster = None;

    let loaded = Pipeline::new()
        .load(&uncorrelated_scenario(100, 7), roles)
        .unwrap();
    let err = loaded.fit_stage1().unwrap_err();
    assert_eq!(err.stage, Stage::Stage1);
    assert_eq!(err.source, AnalysisError::MissingClusterVariable);
}

#[test]
fn test_residual_mean_is_zero_in_every_mode() {
    let dataset = survey_dataset(200, 11);
    for mode in [
        CovarianceMode::Plain,
        CovarianceMode::Robust,
        CovarianceMode::Cluster,
    ] {
        let stage1 = Pipeline::new()
            .load(&dataset, survey_roles(mode))
            .unwrap()
            .fit_stage1()
            .unwrap();
        let residuals = stage1.stage1().result().residuals_vec();
        let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
        assert!(mean.abs() < 1e-9, "{:?}: mean residual {}", mode, mean);
    }
}

#[test]
fn test_coefficients_do_not_depend_on_covariance_mode() {
    let dataset = survey_dataset(200, 11);
    let fit = |mode| {
        Pipeline::new()
            .load(&dataset, survey_roles(mode))
            .unwrap()
            .fit_stage1()
            .unwrap()
            .coefficient_table()
    };
    let plain = fit(CovarianceMode::Plain);
    let robust = fit(CovarianceMode::Robust);
    let cluster = fit(CovarianceMode::Cluster);
    for ((p, r), c) in plain.rows.iter().zip(&robust.rows).zip(&cluster.rows) {
        assert_relative_eq!(p.coef, r.coef, epsilon = 1e-10);
        assert_relative_eq!(p.coef, c.coef, epsilon = 1e-10);
    }
    assert_eq!(plain.covariance, "nonrobust");
    assert_eq!(robust.covariance, "HC1");
    assert_eq!(cluster.n_clusters, Some(8));
}

#[test]
fn test_listwise_deletion_over_referenced_variables() {
    let dataset = survey_dataset(200, 3);
    let loaded = Pipeline::new()
        .load(&dataset, survey_roles(CovarianceMode::Plain))
        .unwrap();
    assert_eq!(loaded.sample().n_raw(), 200);
    assert_eq!(loaded.sample().len(), 180);
    assert_eq!(loaded.sample().n_dropped(), 20);

    let mut roles = survey_roles(CovarianceMode::Plain);
    roles.controls = vec!["age".into()];
    let loaded = Pipeline::new().load(&dataset, roles).unwrap();
    assert_eq!(loaded.sample().len(), 200);
}

#[test]
fn test_outlier_flagged_and_excluded() {
    let dataset = survey_dataset(200, 5);
    let diagnosed = Pipeline::new()
        .load(&dataset, survey_roles(CovarianceMode::Robust))
        .unwrap()
        .fit_stage1()
        .unwrap()
        .diagnose(&ResidualDiagnostics::default())
        .unwrap();

    assert!(diagnosed.extreme_rows().contains(&OUTLIER_ROW));
    let summary = diagnosed.summary();
    assert_relative_eq!(summary.threshold, 3.0 * summary.std_dev, epsilon = 1e-12);
    assert!(summary.max > summary.threshold);

    let kept = diagnosed.fit_stage2(&Stage2Options::default()).unwrap();
    let all = diagnosed
        .fit_stage2(&Stage2Options::default().exclude_extremes(false))
        .unwrap();
    assert_eq!(kept.sample().len() + summary.n_extreme, all.sample().len());
    assert!(!kept.sample().row_ids().contains(&OUTLIER_ROW));
    assert!(all.sample().row_ids().contains(&OUTLIER_ROW));
}

#[test]
fn test_flag_count_monotone_in_multiple() {
    let stage1 = Pipeline::new()
        .load(&survey_dataset(200, 9), survey_roles(CovarianceMode::Plain))
        .unwrap()
        .fit_stage1()
        .unwrap();
    let residuals = stage1.stage1().result().residuals_vec();

    let mut previous = usize::MAX;
    for k in [0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 10.0] {
        let diagnosed = stage1.diagnose(&ResidualDiagnostics::new(k).unwrap()).unwrap();
        let n_extreme = diagnosed.summary().n_extreme;
        let std_dev = diagnosed.summary().std_dev;
        let expected = residuals.iter().filter(|e| e.abs() > k * std_dev).count();
        assert_eq!(n_extreme, expected);
        assert!(n_extreme <= previous);
        previous = n_extreme;
    }
}

#[test]
fn test_margins_bounds_at_any_level() {
    let stage2 = Pipeline::new()
        .load(&survey_dataset(240, 21), survey_roles(CovarianceMode::Cluster))
        .unwrap()
        .fit_stage1()
        .unwrap()
        .diagnose(&ResidualDiagnostics::default())
        .unwrap()
        .fit_stage2(&Stage2Options::default())
        .unwrap();

    for level in [0.01, 0.5, 0.9, 0.95, 0.999] {
        let margins = stage2.margins(level).unwrap();
        assert_eq!(margins.len(), 6);
        for row in &margins.rows {
            assert!(row.ci_lower <= row.mean && row.mean <= row.ci_upper);
        }
    }

    let margins = stage2.margins(0.9).unwrap();
    assert_eq!(margins.factor_b, "wave");
    let held: Vec<&str> = margins.held.iter().map(|h| h.variable.as_str()).collect();
    assert_eq!(held, vec!["age", "region"]);
    assert!(matches!(margins.held[1].value, Level::Text(_)));
    assert_eq!(margins.rows[0].level_b, Level::from("wave 1"));

    let err = stage2.margins(1.0).unwrap_err();
    assert_eq!(err.stage, Stage::Margins);
}

#[test]
fn test_collinear_control_is_reported_by_original_name() {
    let dataset = Dataset::new(vec![
        Column::from_f64("score", [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]),
        Column::from_f64("hours", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
        Column::from_f64("minutes", [60.0, 120.0, 180.0, 240.0, 300.0, 360.0, 420.0, 480.0]),
        Column::from_f64("g1", [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]),
        Column::from_f64("g2", [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]),
    ])
    .unwrap();
    let roles = RoleAssignment {
        outcome: "score".into(),
        controls: vec!["hours".into(), "minutes".into()],
        factor_a: "g1".into(),
        factor_b: "g2".into(),
        ..Default::default()
    };
    let err = Pipeline::new()
        .load(&dataset, roles)
        .unwrap()
        .fit_stage1()
        .unwrap_err();
    assert_eq!(err.stage, Stage::Stage1);
    assert!(err.to_string().contains("`minutes`"), "{}", err);
}

#[test]
fn test_describe_reports_original_names() {
    let loaded = Pipeline::new()
        .load(&survey_dataset(50, 1), survey_roles(CovarianceMode::Plain))
        .unwrap();
    let summaries = loaded.describe();
    assert_eq!(summaries.len(), loaded.schema().len());
    let json = serde_json::to_string(&summaries).unwrap();
    assert!(json.contains("life satisfaction"));
    assert!(json.contains("household income"));
}

#[test]
fn test_margins_grid_drops_levels_seen_only_in_excluded_rows() {
    init_logger();
    let n = 40;
    let outliers = [10, 21];
    let x: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
    let y: Vec<f64> = (0..n)
        .map(|i| {
            let noise = (((i * 7) % 5) as f64 - 2.0) * 0.1;
            let shock = if outliers.contains(&i) { 50.0 } else { 0.0 };
            1.0 + 0.5 * x[i] + noise + shock
        })
        .collect();
    let a: Vec<&str> = (0..n)
        .map(|i| match i {
            _ if outliers.contains(&i) => "rare",
            _ if i % 2 == 0 => "a0",
            _ => "a1",
        })
        .collect();
    let b: Vec<&str> = (0..n).map(|i| if (i / 2) % 2 == 0 { "b0" } else { "b1" }).collect();
    let dataset = Dataset::new(vec![
        Column::from_f64("Y", y),
        Column::from_f64("X", x),
        Column::from_strs("A", a),
        Column::from_strs("B", b),
    ])
    .unwrap();

    let diagnosed = Pipeline::new()
        .load(&dataset, scenario_roles())
        .unwrap()
        .fit_stage1()
        .unwrap()
        .diagnose(&ResidualDiagnostics::default())
        .unwrap();
    assert_eq!(diagnosed.extreme_rows(), outliers.to_vec());

    let rare = Level::from("rare");
    let filtered = diagnosed
        .fit_stage2(&Stage2Options::default().exclude_extremes(true))
        .unwrap()
        .margins(0.9)
        .unwrap();
    assert_eq!(filtered.len(), 4);
    assert!(filtered.rows.iter().all(|r| r.level_a != rare));

    let full = diagnosed
        .fit_stage2(&Stage2Options::default().exclude_extremes(false))
        .unwrap()
        .margins(0.9)
        .unwrap();
    assert_eq!(full.len(), 6);
    assert_eq!(full.rows.iter().filter(|r| r.level_a == rare).count(), 2);
}
