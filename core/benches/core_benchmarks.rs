use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ember_core::blackboard::Blackboard;

struct ViewConstants {
    view_projection: [[f32; 4]; 4],
}

struct FrameIndex(u64);

// ---------------------------------------------------------------------------
// Blackboard
// ---------------------------------------------------------------------------

fn bench_blackboard_publish(c: &mut Criterion) {
    c.bench_function("blackboard_publish_2_values", |b| {
        b.iter(|| {
            let mut board = Blackboard::new();
            let _ = board.add(ViewConstants {
                view_projection: [[0.0; 4]; 4],
            });
            let _ = board.add(FrameIndex(black_box(42)));
            black_box(board);
        });
    });
}

fn bench_blackboard_lookup(c: &mut Criterion) {
    let mut board = Blackboard::new();
    let _ = board.add(ViewConstants {
        view_projection: [[1.0; 4]; 4],
    });
    let _ = board.add(FrameIndex(7));

    c.bench_function("blackboard_lookup", |b| {
        b.iter(|| {
            let view = board.get::<ViewConstants>().map(|v| v.view_projection[0][0]);
            let frame = board.get::<FrameIndex>().map(|f| f.0);
            black_box((view, frame));
        });
    });
}

criterion_group!(benches, bench_blackboard_publish, bench_blackboard_lookup);
criterion_main!(benches);
