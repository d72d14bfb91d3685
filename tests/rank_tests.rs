use follow_rank::config::RankConfig;
use follow_rank::events::{Event, RecordingSink};
use follow_rank::graph::{DenseMatrix, LinkMatrix, SparseMatrix};
use follow_rank::rank::{hits_step, HitsState, RankEngine};
use ndarray::arr2;

fn star_with_cycle() -> Vec<(usize, usize, f64)> {
    // 0..3 all follow 4; 4 follows 0; 1 follows 2
    vec![(0, 4, 1.0), (1, 4, 1.0), (2, 4, 1.0), (3, 4, 1.0), (4, 0, 1.0), (1, 2, 1.0)]
}

#[test]
fn test_pagerank_identical_across_representations() {
    let dense = DenseMatrix::from_cells(5, &star_with_cycle()).unwrap();
    let sparse = SparseMatrix::from_cells(5, &star_with_cycle()).unwrap();
    let engine = RankEngine::new(RankConfig::default().with_max_iterations(50));

    let a = engine.page_rank(&dense);
    let b = engine.page_rank(&sparse);

    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.converged, b.converged);
    for (x, y) in a.scores.iter().zip(b.scores.iter()) {
        assert!((x - y).abs() < 1e-9);
    }
}

#[test]
fn test_hits_identical_across_representations() {
    let dense = DenseMatrix::from_cells(5, &star_with_cycle()).unwrap();
    let sparse: SparseMatrix = dense.convert().unwrap();
    let engine = RankEngine::new(RankConfig::default());

    let a = engine.hits(&dense);
    let b = engine.hits(&sparse);

    assert!(a.converged && b.converged);
    assert_eq!(a.hubs, b.hubs);
    assert_eq!(a.auths, b.auths);
    // Everyone points at 4, so it is the top authority
    assert_eq!(a.top_auths(1)[0].0, 4);
}

#[test]
fn test_hits_step_is_pure() {
    let matrix = DenseMatrix::from_array(arr2(&[[0.0, 1.0], [1.0, 1.0]])).unwrap();
    let transpose = matrix.transpose();
    let start = HitsState::ones(2);

    let once = hits_step(&matrix, &transpose, &start);
    let again = hits_step(&matrix, &transpose, &start);
    assert_eq!(once, again);
    assert_eq!(start, HitsState::ones(2));

    // auths = [1, 2] / 2, hubs = [1, 1.5] / 1.5
    assert_eq!(once.auths.to_vec(), vec![0.5, 1.0]);
    assert_eq!(once.hubs[1], 1.0);
}

#[test]
fn test_engine_reports_each_iteration() {
    let matrix = DenseMatrix::from_array(arr2(&[
        [0.5, 0.5, 0.0],
        [0.5, 0.0, 1.0],
        [0.0, 0.5, 0.0],
    ]))
    .unwrap();
    let sink = RecordingSink::new();
    let engine = RankEngine::new(RankConfig::default()).with_sink(&sink);

    let result = engine.page_rank(&matrix);
    let events = sink.events();

    let iterations = events
        .iter()
        .filter(|e| matches!(e, Event::RankIteration { algorithm: "pagerank", .. }))
        .count();
    assert_eq!(iterations, result.iterations);
    assert_eq!(
        events.last(),
        Some(&Event::RankFinished {
            algorithm: "pagerank",
            iterations: result.iterations,
            converged: true,
        })
    );
}

#[test]
fn test_looser_epsilon_stops_sooner() {
    let matrix = DenseMatrix::from_array(arr2(&[
        [0.5, 0.5, 0.0],
        [0.5, 0.0, 1.0],
        [0.0, 0.5, 0.0],
    ]))
    .unwrap();

    let strict = RankEngine::new(RankConfig::default()).page_rank(&matrix);
    let loose = RankEngine::new(RankConfig::default().with_epsilon(0.1)).page_rank(&matrix);

    assert!(loose.converged);
    assert!(loose.iterations < strict.iterations);
}

#[test]
fn test_damping_scales_before_normalization() {
    // Normalizing by the maximum cancels a uniform damping factor
    let matrix = SparseMatrix::from_cells(3, &[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0), (0, 2, 1.0)]).unwrap();
    let config = RankConfig::default().with_max_iterations(20);

    let plain = RankEngine::new(config).page_rank(&matrix);
    let damped = RankEngine::new(config.with_damping(0.85)).page_rank(&matrix);

    for (x, y) in plain.scores.iter().zip(damped.scores.iter()) {
        assert!((x - y).abs() < 1e-9);
    }
}
