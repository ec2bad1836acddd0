use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::DVec2;
use protspace_tui::app::App;
use protspace_tui::config::ViewerConfig;
use protspace_tui::data::generate_demo_dataset;
use protspace_tui::plot::filter::{filter_points, SplitHistory};
use protspace_tui::plot::legend::{aggregate, LegendMemory, LegendSettings};
use protspace_tui::plot::scale::{Margins, Scales};
use protspace_tui::plot::spatial::Quadtree;
use protspace_tui::plot::style::HiddenLabels;

const POINTS: usize = 100_000;

fn positions(n: usize) -> Vec<(DVec2, usize)> {
    let dataset = generate_demo_dataset(n);
    let points = filter_points(&dataset, 0, &SplitHistory::new());
    let scales = Scales::build(&points, 400.0, 200.0, Margins::default()).expect("demo dataset has points");
    points.iter().enumerate().map(|(i, p)| (scales.project(p), i)).collect()
}

fn bench_quadtree(c: &mut Criterion) {
    let items = positions(POINTS);

    c.bench_function("quadtree_build_100k", |b| {
        b.iter(|| black_box(Quadtree::build(items.iter().copied())))
    });

    let tree = Quadtree::build(items.iter().copied());
    c.bench_function("quadtree_find_nearest", |b| {
        b.iter(|| black_box(tree.find_nearest(black_box(200.0), black_box(100.0), 4.0)))
    });
    c.bench_function("quadtree_query_rect", |b| {
        b.iter(|| black_box(tree.query_rect(150.0, 60.0, 250.0, 140.0)))
    });
}

fn bench_filter_and_legend(c: &mut Criterion) {
    let dataset = generate_demo_dataset(POINTS);
    let history = SplitHistory::new();

    c.bench_function("filter_points_100k", |b| {
        b.iter(|| black_box(filter_points(&dataset, 0, &history)))
    });

    let points = filter_points(&dataset, 0, &history);
    let feature = dataset.feature("family");
    let settings = LegendSettings::default();
    let memory = LegendMemory::default();
    let hidden = HiddenLabels::new();
    c.bench_function("legend_aggregate_100k", |b| {
        b.iter(|| black_box(aggregate(&points, feature, &settings, &memory, &hidden)))
    });
}

fn bench_frame(c: &mut Criterion) {
    let mut app = App::new(generate_demo_dataset(POINTS), ViewerConfig::default(), 200, 60);

    c.bench_function("render_frame_100k", |b| b.iter(|| app.render_frame()));
}

criterion_group!(benches, bench_quadtree, bench_filter_and_legend, bench_frame);
criterion_main!(benches);
