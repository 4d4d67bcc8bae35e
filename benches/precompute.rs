use criterion::{criterion_group, criterion_main, Criterion};
use lidar_odom::{
    prelude::{
        GeometricResidual, MotionKnot, Residual, ResidualWorkspace, ScanFrame, StateRequest,
        Transformer, TransformerParams,
    },
    slam::se3,
};
use nalgebra::{Matrix3, Matrix4xX, Vector3, Vector6};

fn transformer(params: TransformerParams) -> Transformer {
    let knot_count = params.knot_count();
    let mut tf = Transformer::new(params).unwrap();
    let mut pose = se3::SE3::identity();
    let mut knots = Vec::with_capacity(knot_count);
    for i in 0..knot_count {
        let vel = Vector6::new(0.0, 0.0, 0.5, 2.0, if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0);
        knots.push(MotionKnot::new(pose, vel));
        pose = se3::exp(&(vel * 0.05)) * pose;
    }
    let stamps = (0..knot_count).map(|i| i as f64 * 0.05).collect();
    tf.update(knots, stamps).unwrap();
    tf
}

fn scan(n: usize, duration: f64) -> Matrix4xX<f64> {
    Matrix4xX::from_fn(n, |r, c| {
        let a = c as f64 / n as f64 * std::f64::consts::TAU;
        match r {
            0 => 10.0 * a.cos(),
            1 => 10.0 * a.sin(),
            2 => 0.5 * (3.0 * a).sin(),
            _ => duration * c as f64 / n as f64,
        }
    })
}

fn precompute(c: &mut Criterion) {
    let params = TransformerParams::default();
    let duration = 0.05 * params.segments_per_scan() as f64;
    let tf = transformer(params);
    let points = scan(10000, duration);
    c.bench_function("precompute_10k", |b| {
        b.iter(|| tf.precompute(&points, 1, ScanFrame::End).unwrap())
    });
}

fn evaluate(c: &mut Criterion) {
    let params = TransformerParams::default();
    let duration = 0.05 * params.segments_per_scan() as f64;
    let tf = transformer(params);
    let points = scan(10000, duration);
    let pre = tf.precompute(&points, 1, ScanFrame::End).unwrap();
    let residuals: Vec<GeometricResidual> = (0..pre.len())
        .map(|i| {
            tf.point_to_plane(
                i,
                &Vector3::new(0.0, 0.0, 0.0),
                &Vector3::new(1.0, 0.0, 0.1),
                &Vector3::new(0.0, 1.0, 0.0),
                &(Matrix3::identity() * 0.01),
            )
            .unwrap()
            .into()
        })
        .collect();
    let requests: Vec<Vec<StateRequest>> = (0..pre.len())
        .map(|i| {
            pre.keys(i)
                .into_iter()
                .map(StateRequest::Differentiate)
                .collect()
        })
        .collect();
    let mut ws = ResidualWorkspace::default();
    c.bench_function("evaluate_plane_10k", |b| {
        b.iter(|| {
            for (r, req) in residuals.iter().zip(requests.iter()) {
                r.evaluate(&pre, &mut ws, req).unwrap();
            }
        })
    });
}

criterion_group!(benches, precompute, evaluate);
criterion_main!(benches);
