use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2};
use single_pcgse::enrichment::gene_level::{correlation_with_scores, fisher_z, FISHER_Z_MAX_ABS_R};
use single_pcgse::enrichment::{
    gene_level_statistics, gene_set_statistics, GeneSetCollection, GeneSetSummary, GeneStatistic, Membership,
    Transformation,
};
use single_pcgse::pca::{compute_pca, resolve_pca, PcaResult, PcaSource};
use single_pcgse::testing::inference::nonparametric::{normal_p_value, rank_sum_variance, rank_sum_z_test};
use single_pcgse::testing::inference::parametric::{pooled_t_test, t_test_p_value};
use single_pcgse::testing::inference::permutation::permutation_p_values;
use single_pcgse::testing::inference::{variance_inflation_factor, NullModel};
use single_pcgse::testing::utils::{average_ranks, mean_pairwise_correlation, standardize_columns, standardize_vector};
use single_pcgse::testing::{GeneSetStatistic, GeneSetTest};
use single_pcgse::PcgseError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

fn random_matrix(n: usize, p: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n, p), |_| rng.sample::<f64, _>(StandardNormal))
}

fn pcgse_error(err: &anyhow::Error) -> &PcgseError {
    err.downcast_ref::<PcgseError>().expect("expected a PcgseError")
}

#[cfg(test)]
mod parametric_tests {
    use super::*;

    #[test]
    fn pooled_t_test_separates_distinct_groups() {
        // Group 1: [1, 2, 3], group 2: [7, 8, 9] -> pooled sd 1, se sqrt(2/3)
        let result = pooled_t_test(-6.0, 1.0, 3.0, 3.0, 1.0, 4.0);

        println!("t = {}, p = {}", result.statistic, result.p_value);
        assert_relative_eq!(result.statistic, -6.0 / (2.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert!(result.p_value > 0.001 && result.p_value < 0.003);
        assert_eq!(result.degrees_of_freedom, Some(4.0));
    }

    #[test]
    fn zero_pooled_variance_is_degenerate() {
        let result = pooled_t_test(0.0, 0.0, 5.0, 20.0, 1.0, 23.0);
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn variance_inflation_widens_the_null() {
        let plain = pooled_t_test(0.8, 1.0, 10.0, 190.0, 1.0, 198.0);
        let vif = variance_inflation_factor(10.0, 0.1);
        let inflated = pooled_t_test(0.8, 1.0, 10.0, 190.0, vif, 198.0);

        assert_relative_eq!(vif, 1.9, epsilon = 1e-12);
        assert!(inflated.statistic.abs() < plain.statistic.abs());
        assert!(inflated.p_value > plain.p_value);
    }

    #[test]
    fn non_positive_vif_is_floored() {
        assert_eq!(variance_inflation_factor(10.0, -0.5), f64::EPSILON);
    }

    #[test]
    fn t_p_value_edge_cases() {
        assert_eq!(t_test_p_value(f64::NAN, 10.0), 1.0);
        assert_eq!(t_test_p_value(f64::INFINITY, 10.0), 0.0);
        assert_eq!(t_test_p_value(2.0, 0.0), 1.0);
        assert_relative_eq!(t_test_p_value(0.0, 10.0), 1.0, epsilon = 1e-12);
    }
}

#[cfg(test)]
mod nonparametric_tests {
    use super::*;

    #[test]
    fn rank_sum_of_lowest_members() {
        // members take ranks 1, 2, 3 out of 6: U = 0, mean 4.5, variance 5.25
        let result = rank_sum_z_test(0.0, 3.0, 3.0, None);
        assert_relative_eq!(result.statistic, -4.5 / 5.25_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(result.p_value, 0.0495, epsilon = 1e-3);
    }

    #[test]
    fn correlated_variance_matches_independent_at_zero_correlation() {
        for &(n1, n2) in &[(1.0, 10.0), (10.0, 190.0), (37.0, 4.0)] {
            assert_relative_eq!(
                rank_sum_variance(n1, n2, Some(0.0)),
                rank_sum_variance(n1, n2, None),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn correlated_variance_grows_with_correlation() {
        let low = rank_sum_variance(10.0, 190.0, Some(0.05));
        let high = rank_sum_variance(10.0, 190.0, Some(0.3));
        assert!(high > low);
        assert!(low > rank_sum_variance(10.0, 190.0, None));
    }

    #[test]
    fn normal_p_value_is_symmetric() {
        assert_relative_eq!(normal_p_value(1.96), 0.05, epsilon = 1e-3);
        assert_relative_eq!(normal_p_value(-1.96), normal_p_value(1.96), epsilon = 1e-15);
    }
}

#[cfg(test)]
mod utils_tests {
    use super::*;

    #[test]
    fn ranks_average_ties() {
        let ranks = average_ranks(array![3.0, 1.0, 3.0, 2.0].view());
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn standardized_columns_have_unit_variance() {
        let data = random_matrix(30, 4, 7);
        let z = standardize_columns(data.view()).unwrap();
        for column in z.columns() {
            assert_relative_eq!(column.sum(), 0.0, epsilon = 1e-10);
            let var = column.iter().map(|v| v * v).sum::<f64>() / 29.0;
            assert_relative_eq!(var, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn constant_column_is_rejected() {
        let mut data = random_matrix(10, 3, 1);
        data.column_mut(1).fill(4.2);
        let err = standardize_columns(data.view()).unwrap_err();
        assert_eq!(pcgse_error(&err), &PcgseError::ConstantVariable { index: 1 });

        // rounding in the mean must not let non-representable levels through
        for &level in &[0.1, 4.2, -7.3, 1e6 + 0.3, 0.0] {
            data.column_mut(2).fill(level);
            data.column_mut(1).assign(&random_matrix(10, 1, 3).column(0));
            let err = standardize_columns(data.view()).unwrap_err();
            assert_eq!(pcgse_error(&err), &PcgseError::ConstantVariable { index: 2 }, "level {}", level);
        }
        assert!(standardize_vector(array![4.2, 4.2, 4.2, 4.2].view()).is_none());
    }

    #[test]
    fn large_offset_columns_are_still_standardized() {
        let mut data = random_matrix(25, 2, 21);
        data.column_mut(0).mapv_inplace(|v| 1e6 + v);
        let z = standardize_columns(data.view()).unwrap();
        assert_relative_eq!(z.column(0).sum(), 0.0, epsilon = 1e-6);
        let var = z.column(0).iter().map(|v| v * v).sum::<f64>() / 24.0;
        assert_relative_eq!(var, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn mean_pairwise_correlation_of_known_columns() {
        let x = array![1.0, 2.0, 4.0, 8.0, 3.0];
        let mut data = Array2::<f64>::zeros((5, 3));
        data.column_mut(0).assign(&x);
        data.column_mut(1).assign(&x.mapv(|v| 2.0 * v + 1.0));
        data.column_mut(2).assign(&x.mapv(|v| -v));
        let z = standardize_columns(data.view()).unwrap();

        // pairs: (0,1) = 1, (0,2) = -1, (1,2) = -1
        assert_relative_eq!(mean_pairwise_correlation(z.view(), None), -1.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(mean_pairwise_correlation(z.view(), Some(&[0usize, 1][..])), 1.0, epsilon = 1e-10);
        assert_eq!(mean_pairwise_correlation(z.view(), Some(&[2usize][..])), 0.0);
    }
}

#[cfg(test)]
mod gene_level_tests {
    use super::*;

    #[test]
    fn fisher_z_values() {
        assert_eq!(fisher_z(0.0), 0.0);
        assert_relative_eq!(fisher_z(0.5), 0.5 * 3.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(fisher_z(-0.5), -fisher_z(0.5), epsilon = 1e-15);
    }

    #[test]
    fn fisher_z_is_finite_at_perfect_correlation() {
        assert!(fisher_z(1.0).is_finite());
        assert_eq!(fisher_z(1.0), FISHER_Z_MAX_ABS_R.atanh());
        assert_eq!(fisher_z(-1.0), -fisher_z(1.0));
    }

    #[test]
    fn correlations_are_scaled_loadings() {
        let data = random_matrix(40, 12, 11);
        let pca = resolve_pca(data.view(), &PcaSource::ComputeFromData, &[1, 2, 3]).unwrap();

        let loadings = gene_level_statistics(data.view(), &pca, GeneStatistic::Loading, Transformation::None).unwrap();
        let cors = gene_level_statistics(data.view(), &pca, GeneStatistic::Correlation, Transformation::None).unwrap();

        for j in 0..3 {
            let scale = pca.eigenvalues[j].sqrt();
            for k in 0..12 {
                assert_relative_eq!(cors[[k, j]], loadings[[k, j]] * scale, epsilon = 1e-8);
            }
        }

        // same rank order within each PC
        for j in 0..3 {
            let r_cor = average_ranks(cors.column(j));
            let r_load = average_ranks(loadings.column(j));
            assert_eq!(r_cor, r_load);
        }
    }

    #[test]
    fn correlation_with_scores_matches_pearson() {
        let data = random_matrix(20, 3, 8);
        let scores = random_matrix(20, 1, 9);
        let r = correlation_with_scores(data.view(), scores.view()).unwrap();

        let y = scores.column(0);
        let y_mean = y.sum() / 20.0;
        for k in 0..3 {
            let x = data.column(k);
            let x_mean = x.sum() / 20.0;
            let sxy: f64 = x.iter().zip(y.iter()).map(|(a, b)| (a - x_mean) * (b - y_mean)).sum();
            let sxx: f64 = x.iter().map(|a| (a - x_mean).powi(2)).sum();
            let syy: f64 = y.iter().map(|b| (b - y_mean).powi(2)).sum();
            assert_relative_eq!(r[[k, 0]], sxy / (sxx * syy).sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn abs_transformation_is_elementwise() {
        let data = random_matrix(25, 8, 3);
        let pca = resolve_pca(data.view(), &PcaSource::ComputeFromData, &[1]).unwrap();
        let raw = gene_level_statistics(data.view(), &pca, GeneStatistic::FisherZ, Transformation::None).unwrap();
        let abs = gene_level_statistics(data.view(), &pca, GeneStatistic::FisherZ, Transformation::AbsValue).unwrap();
        assert_eq!(abs, raw.mapv(f64::abs));
    }

    #[test]
    fn parses_external_names() {
        assert_eq!("loading".parse::<GeneStatistic>().unwrap(), GeneStatistic::Loading);
        assert_eq!("cor".parse::<GeneStatistic>().unwrap(), GeneStatistic::Correlation);
        assert_eq!("z".parse::<GeneStatistic>().unwrap(), GeneStatistic::FisherZ);
        assert_eq!("abs.value".parse::<Transformation>().unwrap(), Transformation::AbsValue);
        assert_eq!("rank.sum".parse::<GeneSetStatistic>().unwrap(), GeneSetStatistic::RankSum);
        assert_eq!(
            "cor.adj.parametric".parse::<GeneSetTest>().unwrap(),
            GeneSetTest::CorAdjParametric
        );
        assert_eq!(
            "spearman".parse::<GeneStatistic>().unwrap_err(),
            PcgseError::UnknownName {
                kind: "gene statistic",
                name: "spearman".to_string()
            }
        );
        assert!(matches!(
            "sqrt".parse::<Transformation>(),
            Err(PcgseError::UnknownName { kind: "transformation", .. })
        ));
        assert!(matches!(
            "median.diff".parse::<GeneSetStatistic>(),
            Err(PcgseError::UnknownName { kind: "gene set statistic", .. })
        ));
        assert!(matches!(
            "bootstrap".parse::<GeneSetTest>(),
            Err(PcgseError::UnknownName { kind: "gene set test", .. })
        ));
    }
}

#[cfg(test)]
mod pca_tests {
    use super::*;

    #[test]
    fn eigenvalues_of_correlation_matrix_sum_to_variable_count() {
        let data = random_matrix(30, 6, 5);
        let pca = compute_pca(data.view()).unwrap();

        assert_eq!(pca.n_components(), 6);
        assert_relative_eq!(pca.eigenvalues.sum(), 6.0, epsilon = 1e-8);
        for w in pca.eigenvalues.as_slice().unwrap().windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn scores_have_eigenvalue_variance_and_unit_loadings() {
        let data = random_matrix(15, 40, 9);
        let pca = compute_pca(data.view()).unwrap();
        assert_eq!(pca.scores.dim(), (15, 15));
        assert_eq!(pca.loadings.dim(), (40, 15));

        for j in 0..5 {
            let scores = pca.scores.column(j);
            let var = scores.iter().map(|v| v * v).sum::<f64>() / 14.0;
            assert_relative_eq!(var, pca.eigenvalues[j], max_relative = 1e-8);
            let norm = pca.loadings.column(j).iter().map(|v| v * v).sum::<f64>();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn select_keeps_requested_order() {
        let data = random_matrix(20, 5, 2);
        let pca = compute_pca(data.view()).unwrap();
        let selected = pca.select(&[3, 1]).unwrap();
        assert_eq!(selected.eigenvalues, Array1::from(vec![pca.eigenvalues[2], pca.eigenvalues[0]]));
        assert_eq!(selected.scores.column(1), pca.scores.column(0));
    }

    #[test]
    fn out_of_range_pc_index_is_rejected() {
        let data = random_matrix(8, 20, 4);
        let err = resolve_pca(data.view(), &PcaSource::ComputeFromData, &[9]).unwrap_err();
        assert_eq!(pcgse_error(&err), &PcgseError::InvalidIndex { index: 9, max: 8 });

        let err = resolve_pca(data.view(), &PcaSource::ComputeFromData, &[0]).unwrap_err();
        assert!(matches!(pcgse_error(&err), PcgseError::InvalidIndex { index: 0, .. }));
    }

    #[test]
    fn zero_variance_scores_report_the_requested_pc() {
        let data = random_matrix(12, 5, 14);
        let mut pca: PcaResult = compute_pca(data.view()).unwrap();
        pca.scores.column_mut(3).fill(0.5);

        assert!(resolve_pca(data.view(), &PcaSource::Provided(pca.clone()), &[1, 2]).is_ok());
        let err = resolve_pca(data.view(), &PcaSource::Provided(pca), &[2, 4]).unwrap_err();
        match pcgse_error(&err) {
            PcgseError::InsufficientData(msg) => assert!(msg.contains("PC 4"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn provided_pca_with_wrong_shape_is_rejected() {
        let data = random_matrix(20, 6, 12);
        let other = compute_pca(random_matrix(20, 7, 13).view()).unwrap();
        let err = resolve_pca(data.view(), &PcaSource::Provided(other), &[1]).unwrap_err();
        assert!(matches!(pcgse_error(&err), PcgseError::DimensionMismatch(_)));
    }
}

#[cfg(test)]
mod gene_set_tests {
    use super::*;

    fn indexed(sets: &[&[usize]]) -> GeneSetCollection {
        GeneSetCollection::Indexed(
            sets.iter()
                .enumerate()
                .map(|(i, s)| (format!("set{}", i), s.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn universal_gene_set_is_degenerate() {
        let sets = indexed(&[&[0, 1], &[0, 1, 2, 3]]);
        let err = sets.validate(4).unwrap_err();
        assert_eq!(
            pcgse_error(&err),
            &PcgseError::DegenerateGeneSet {
                gene_set: 1,
                size: 4,
                n_variables: 4
            }
        );
    }

    #[test]
    fn empty_gene_set_is_degenerate() {
        let sets = GeneSetCollection::Matrix(array![[1u8, 0, 0], [0, 0, 0]]);
        let err = sets.validate(3).unwrap_err();
        assert!(matches!(pcgse_error(&err), PcgseError::DegenerateGeneSet { gene_set: 1, size: 0, .. }));
    }

    #[test]
    fn malformed_collections_are_rejected() {
        let err = indexed(&[&[0, 7]]).validate(5).unwrap_err();
        assert!(matches!(pcgse_error(&err), PcgseError::InvalidGeneSet(_)));

        let err = GeneSetCollection::Matrix(array![[1u8, 2, 0]]).validate(3).unwrap_err();
        assert!(matches!(pcgse_error(&err), PcgseError::InvalidGeneSet(_)));

        let err = GeneSetCollection::Matrix(array![[1u8, 0]]).validate(3).unwrap_err();
        assert!(matches!(pcgse_error(&err), PcgseError::DimensionMismatch(_)));
    }

    #[test]
    fn matrix_and_indexed_forms_agree() {
        let sets = indexed(&[&[0, 2], &[3, 1, 1]]);
        assert_eq!(sets.members(1), vec![1, 3]);
        assert_eq!(sets.names(), vec!["set0".to_string(), "set1".to_string()]);

        let matrix = GeneSetCollection::Matrix(array![[1u8, 0, 1, 0], [0, 1, 0, 1]]);
        assert_eq!(sets.membership_matrix(4), matrix.membership_matrix(4));
        assert_eq!(matrix.members(0), vec![0, 2]);
    }

    #[test]
    fn mean_diff_matches_two_sample_t() {
        let stats = array![[1.0], [2.0], [3.0], [7.0], [8.0], [9.0]];
        let sets = indexed(&[&[0, 1, 2]]);
        let result = gene_set_statistics(stats.view(), &sets, GeneSetStatistic::MeanDiff).unwrap();
        assert_relative_eq!(result[[0, 0]], -6.0 / (2.0_f64 / 3.0).sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn single_member_rank_sum_is_defined() {
        let stats = array![[0.3], [-1.2], [2.5], [0.1], [0.7]];
        let sets = indexed(&[&[2]]);
        let result = gene_set_statistics(stats.view(), &sets, GeneSetStatistic::RankSum).unwrap();

        // rank 5 of 5: U = 4, mean 2, variance 1 * 4 * 6 / 12 = 2
        assert_relative_eq!(result[[0, 0]], 2.0 / 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn weighted_mean_differences_cancel_for_a_partition() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let stats = Array1::from_shape_fn(60, |_| rng.sample::<f64, _>(StandardNormal));
        let partition: Vec<Vec<usize>> = vec![(0..10).collect(), (10..35).collect(), (35..38).collect(), (38..60).collect()];
        let sets = GeneSetCollection::Indexed(
            partition
                .into_iter()
                .enumerate()
                .map(|(i, m)| (format!("part{}", i), m))
                .collect(),
        );

        let membership = Membership::new(&sets, 60);
        let weighted: f64 = membership
            .summarize(stats.view(), GeneSetStatistic::MeanDiff)
            .iter()
            .map(|s| match *s {
                GeneSetSummary::MeanDiff {
                    n_members,
                    n_non_members,
                    mean_diff,
                    ..
                } => n_members * n_non_members * mean_diff,
                GeneSetSummary::RankSum { .. } => unreachable!(),
            })
            .sum();
        assert_relative_eq!(weighted, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn abs_value_rank_sums_depend_on_sign_mix() {
        let sets = indexed(&[&[0, 1, 2], &[5, 6]]);
        let positive = array![[0.4], [1.3], [2.2], [0.1], [0.9], [0.05], [0.6], [1.7]];
        let mixed = array![[-0.4], [1.3], [-2.2], [0.1], [-0.9], [0.05], [0.6], [-1.7]];

        let raw = gene_set_statistics(positive.view(), &sets, GeneSetStatistic::RankSum).unwrap();
        let abs = gene_set_statistics(positive.mapv(f64::abs).view(), &sets, GeneSetStatistic::RankSum).unwrap();
        assert_eq!(raw, abs);

        let raw = gene_set_statistics(mixed.view(), &sets, GeneSetStatistic::RankSum).unwrap();
        let abs = gene_set_statistics(mixed.mapv(f64::abs).view(), &sets, GeneSetStatistic::RankSum).unwrap();
        assert!((raw[[0, 0]] - abs[[0, 0]]).abs() > 1e-6);
    }

    #[test]
    fn correlation_adjusted_summary_reduces_statistic() {
        let stats = array![1.0, 1.5, 2.0, 0.1, -0.2, 0.3, 0.0, -0.4];
        let sets = indexed(&[&[0, 1, 2]]);
        let membership = Membership::new(&sets, 8);
        let summary = membership.summarize(stats.view(), GeneSetStatistic::MeanDiff)[0];

        let plain = summary.test(&NullModel::Independent);
        let adjusted = summary.test(&NullModel::CorrelationAdjusted {
            mean_correlation: 0.3,
            degrees_of_freedom: 6.0,
        });
        assert!(adjusted.statistic.abs() < plain.statistic.abs());
        assert!(adjusted.p_value >= plain.p_value);
    }
}

#[cfg(test)]
mod permutation_tests {
    use super::*;

    fn mean_of_first_half(values: &[f64]) -> Vec<f64> {
        let half = values.len() / 2;
        vec![values[..half].iter().sum::<f64>() / half as f64]
    }

    #[test]
    fn seeded_permutations_are_reproducible() {
        let labels: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let observed = vec![3.0];

        let mut rng_a = ChaCha8Rng::seed_from_u64(99);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);
        let a = permutation_p_values(&observed, &labels, 500, &mut rng_a, mean_of_first_half);
        let b = permutation_p_values(&observed, &labels, 500, &mut rng_b, mean_of_first_half);
        assert_eq!(a, b);
    }

    #[test]
    fn permutation_p_values_are_bounded() {
        let labels: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        // no permutation reaches a mean of 1000, and every one reaches 0
        let p = permutation_p_values(&[1000.0, 0.0], &labels, 99, &mut rng, |v| {
            let m = mean_of_first_half(v)[0];
            vec![m, m]
        });
        assert_relative_eq!(p[0], 1.0 / 100.0, epsilon = 1e-15);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-15);
    }
}
