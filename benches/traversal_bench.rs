use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use hgrid::forest::{GridOptions, SimplexGridBuilder};
use hgrid::index::LevelIndexSet;
use hgrid::topology::PartitionIteratorType;
use hgrid::traverse::MarkerVector;
use hgrid::Grid;

fn refined_square(levels: usize) -> Grid<hgrid::forest::SimplexGrid<2>> {
    let forest = SimplexGridBuilder::unit_square(8, GridOptions::default())
        .create_grid()
        .expect("valid macro grid");
    let mut grid = Grid::new(forest).expect("leaf index set");
    grid.global_refine(levels).expect("global refinement");
    grid.compress().expect("compress");
    grid
}

fn bench_leaf_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_traversal");

    for &levels in &[2usize, 4usize] {
        let grid = refined_square(levels);
        let max = grid.max_level();

        for codim in 0..=2usize {
            group.bench_with_input(
                BenchmarkId::new(format!("codim{codim}"), levels),
                &levels,
                |b, _| {
                    b.iter(|| {
                        let n = grid
                            .leafbegin(codim, PartitionIteratorType::All, max)
                            .expect("valid level")
                            .count();
                        black_box(n);
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_calc_new_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("calc_new_index");

    for &levels in &[2usize, 4usize] {
        let grid = refined_square(levels);
        let level = grid.max_level();
        let marker = MarkerVector::for_level(grid.forest(), level);

        group.bench_with_input(BenchmarkId::new("finest_level", levels), &levels, |b, _| {
            b.iter(|| {
                let set = LevelIndexSet::compute(grid.forest(), level, &marker)
                    .expect("level in range");
                black_box(set.size(0));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_leaf_traversal, bench_calc_new_index);
criterion_main!(benches);
