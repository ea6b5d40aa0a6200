use canopy::{Boundary, FieldConfig, SpatialField};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn populated_field(count: u64, boundary: Boundary) -> SpatialField<u64> {
    let mut field = SpatialField::new(FieldConfig {
        width: 200.0,
        height: 200.0,
        boundary,
        cell_size: 10.0,
    })
    .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for key in 0..count {
        let p = DVec2::new(rng.gen::<f64>() * 200.0, rng.gen::<f64>() * 200.0);
        field.insert(key, p).unwrap();
    }
    field
}

fn bench_query_radius(c: &mut Criterion) {
    let field = populated_field(1000, Boundary::Toroidal);
    c.bench_function("query_radius_1000", |b| {
        b.iter(|| {
            field
                .query_radius(black_box(DVec2::new(3.0, 197.0)), black_box(10.0))
                .count()
        })
    });
}

fn bench_nearest(c: &mut Criterion) {
    let field = populated_field(1000, Boundary::Clamped);
    c.bench_function("nearest_8_of_1000", |b| {
        b.iter(|| {
            field
                .nearest(black_box(DVec2::new(100.0, 100.0)), black_box(8))
                .count()
        })
    });
}

fn bench_move(c: &mut Criterion) {
    let mut field = populated_field(1000, Boundary::Toroidal);
    let mut x = 0.0;
    c.bench_function("move_to", |b| {
        b.iter(|| {
            x += 0.37;
            field.move_to(black_box(500), DVec2::new(x, 50.0)).unwrap();
        })
    });
}

criterion_group!(benches, bench_query_radius, bench_nearest, bench_move);
criterion_main!(benches);
